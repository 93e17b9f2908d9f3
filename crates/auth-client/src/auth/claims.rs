//! JWT claims structure.
//!
//! The authority issues one token shape for both end users and calling
//! services. `tkt` says which; `uid` or `cid` carries the matching id.
//! Both ids are redacted in Debug output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of principal a token represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SubjectType {
    /// A human end user.
    #[serde(rename = "u")]
    User,

    /// A calling application or service.
    #[serde(rename = "c")]
    Caller,

    /// Any other or missing value. Never authorized.
    #[default]
    #[serde(other, rename = "")]
    Unknown,
}

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectType::User => "user",
            SubjectType::Caller => "caller",
            SubjectType::Unknown => "unknown",
        }
    }
}

/// The `aud` claim: a single audience or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Many(Vec<String>),
}

impl Audience {
    /// True when `audience` is named by this claim.
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == audience,
            Audience::Many(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

/// Claims of a verified token.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// End-user id, set for `SubjectType::User`.
    #[serde(rename = "uid", default, skip_serializing_if = "is_zero")]
    pub user_id: u64,

    /// Calling application id, set for `SubjectType::Caller`.
    #[serde(rename = "cid", default, skip_serializing_if = "is_zero")]
    pub client_id: u64,

    #[serde(rename = "tkt", default)]
    pub subject_type: SubjectType,

    /// Expiration (Unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issued-at (Unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Not-before (Unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(v: &u64) -> bool {
    *v == 0
}

impl Claims {
    /// Id of the principal named by `subject_type`; `None` for `Unknown`.
    pub fn subject_id(&self) -> Option<u64> {
        match self.subject_type {
            SubjectType::User => Some(self.user_id),
            SubjectType::Caller => Some(self.client_id),
            SubjectType::Unknown => None,
        }
    }
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("user_id", &"[REDACTED]")
            .field("client_id", &"[REDACTED]")
            .field("subject_type", &self.subject_type)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("nbf", &self.nbf)
            .field("iss", &self.iss)
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .field("aud", &self.aud)
            .field("jti", &self.jti)
            .finish()
    }
}
