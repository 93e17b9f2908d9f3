//! Metrics definitions for the auth client.
//!
//! All metrics follow Prometheus naming conventions:
//! - `auth_client_` prefix
//! - `_total` suffix for counters
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `status`: 2 values (success, error)
//! - `result`: success plus one value per `VerifyError` variant
//! - `decision`: allow plus one value per `Rejection` variant

use metrics::counter;

/// Record a key refresh attempt.
///
/// Metric: `auth_client_key_refresh_total`
/// Labels: `status`
pub fn record_key_refresh(status: &'static str) {
    counter!("auth_client_key_refresh_total", "status" => status).increment(1);
}

/// Record a client token refresh attempt.
///
/// Metric: `auth_client_token_refresh_total`
/// Labels: `status`
pub fn record_token_refresh(status: &'static str) {
    counter!("auth_client_token_refresh_total", "status" => status).increment(1);
}

/// Record a token verification outcome.
///
/// Metric: `auth_client_token_verifications_total`
/// Labels: `result`
pub fn record_token_verification(result: &'static str) {
    counter!("auth_client_token_verifications_total", "result" => result).increment(1);
}

/// Record a gate decision.
///
/// Metric: `auth_client_gate_decisions_total`
/// Labels: `decision`
pub fn record_gate_decision(decision: &'static str) {
    counter!("auth_client_gate_decisions_total", "decision" => decision).increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    type Entry = (
        metrics_util::CompositeKey,
        Option<metrics::Unit>,
        Option<metrics::SharedString>,
        DebugValue,
    );

    fn counter_value(snapshot: &[Entry], name: &str, label: (&str, &str)) -> Option<u64> {
        snapshot.iter().find_map(|(composite, _, _, value)| {
            let key = composite.key();
            let label_matches = key
                .labels()
                .any(|l| l.key() == label.0 && l.value() == label.1);
            match value {
                DebugValue::Counter(v) if key.name() == name && label_matches => Some(*v),
                _ => None,
            }
        })
    }

    #[test]
    fn test_counters_recorded_with_labels() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_key_refresh("success");
            record_token_refresh("error");
            record_token_verification("expired");
            record_token_verification("expired");
            record_gate_decision("allow");
        });

        let snapshot = snapshotter.snapshot().into_vec();
        assert_eq!(
            counter_value(&snapshot, "auth_client_key_refresh_total", ("status", "success")),
            Some(1)
        );
        assert_eq!(
            counter_value(&snapshot, "auth_client_token_refresh_total", ("status", "error")),
            Some(1)
        );
        assert_eq!(
            counter_value(
                &snapshot,
                "auth_client_token_verifications_total",
                ("result", "expired")
            ),
            Some(2)
        );
        assert_eq!(
            counter_value(&snapshot, "auth_client_gate_decisions_total", ("decision", "allow")),
            Some(1)
        );
    }
}
