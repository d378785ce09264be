//! The single error type that flows through the decision core, and the
//! broker-facing error-kind taxonomy it is mapped down to at the HTTP boundary.

use serde::Serialize;

/// Infrastructure-level failure. Every variant is fail-closed: the HTTP layer
/// never lets one of these escape as anything other than a deny envelope.
#[derive(Debug, thiserror::Error)]
pub enum AuthdError {
    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("credential store unavailable")]
    StoreUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("decision deadline exceeded")]
    Timeout,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthdError {
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            AuthdError::BadRequest(_) => ErrorKind::BadRequest,
            AuthdError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            AuthdError::Timeout => ErrorKind::Timeout,
            AuthdError::Internal(_) => ErrorKind::InternalError,
        }
    }
}

/// The `<error-kind>` values the broker's deny envelope carries. Never expose
/// anything richer than this string across the HTTP boundary (no traces, no PII).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadRequest,
    UnknownUser,
    Inactive,
    BadCredentials,
    ClientIdMismatch,
    QuotaExceeded,
    NotAuthorized,
    AdminRequired,
    StoreUnavailable,
    Timeout,
    InternalError,
}

impl ErrorKind {
    /// True for infrastructure failures (store outage, deadline exceeded,
    /// unexpected internal fault) as opposed to policy denials (bad
    /// credentials, ACL mismatch, quota). Used to pick between
    /// `DecisionResult::Deny` and `DecisionResult::Error` in the activity log.
    pub fn is_infra_failure(kind: &str) -> bool {
        matches!(
            kind,
            "store_unavailable" | "timeout" | "internal_error"
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::UnknownUser => "unknown_user",
            ErrorKind::Inactive => "inactive",
            ErrorKind::BadCredentials => "bad_credentials",
            ErrorKind::ClientIdMismatch => "client_id_mismatch",
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::NotAuthorized => "not_authorized",
            ErrorKind::AdminRequired => "admin_required",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::InternalError => "internal_error",
        }
    }
}

pub type AuthdResult<T> = Result<T, AuthdError>;
