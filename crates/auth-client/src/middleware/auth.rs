//! Authorization middleware for protected routes.
//!
//! Runs the [`AuthGate`] for each request. Allowed requests continue with
//! their [`Identity`] in request extensions; rejected requests get the
//! `Rejection` response (401 or 403, generic JSON body).

use crate::gate::{AuthGate, Decision, Identity};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::instrument;

/// Authorization middleware.
///
/// # Usage
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/orders/:id", get(handler))
///     .layer(middleware::from_fn_with_state(gate, require_permission));
/// ```
#[instrument(skip(gate, req, next), name = "auth.middleware")]
pub async fn require_permission(
    State(gate): State<Arc<AuthGate>>,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let headers = req.headers();
    let decision = gate.authorize(headers, &path).await;

    match decision {
        Decision::Allow(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Decision::Reject(rejection) => rejection.into_response(),
    }
}

/// Read the authenticated identity from a request.
pub trait IdentityExt {
    /// The identity the middleware attached, if it ran.
    fn identity(&self) -> Option<Identity>;

    /// User id of an end-user request.
    fn user_id(&self) -> Option<u64> {
        self.identity().and_then(|i| i.user_id())
    }

    /// Client id of a service-to-service request.
    fn client_id(&self) -> Option<u64> {
        self.identity().and_then(|i| i.client_id())
    }
}

impl<B> IdentityExt for axum::http::Request<B> {
    fn identity(&self) -> Option<Identity> {
        self.extensions().get::<Identity>().copied()
    }
}

impl IdentityExt for axum::http::Extensions {
    fn identity(&self) -> Option<Identity> {
        self.get::<Identity>().copied()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_identity_ext_on_request() {
        let mut req = axum::http::Request::new(Body::empty());
        assert!(req.identity().is_none());

        req.extensions_mut().insert(Identity::User(42));
        assert_eq!(req.user_id(), Some(42));
        assert_eq!(req.client_id(), None);
    }

    #[test]
    fn test_identity_ext_on_extensions() {
        let mut extensions = axum::http::Extensions::new();
        extensions.insert(Identity::Caller(9));
        assert_eq!(extensions.client_id(), Some(9));
        assert_eq!(extensions.user_id(), None);
    }
}
