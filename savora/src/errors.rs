use crate::store::errors::StoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error as ThisError;

/// Next step the client should take after a `NotFound`, surfaced as a
/// machine-readable field rather than prose.
pub const NEXT_SIGNUP: &str = "requires_signup";

/// Actions attached to blocked logins.
pub const ACTION_VERIFY_NEEDED: &str = "verify_needed";
pub const ACTION_RESET_NEEDED: &str = "reset_needed";

/// Action attached to signup conflicts that the conflict resolver can clear.
pub const ACTION_RESOLVE_CONFLICT: &str = "resolve_conflict";
pub const ACTION_REDIRECT_TO_LOGIN: &str = "redirect_to_login";

/// Resolution marker when neither a verified holder nor clearable
/// unverified rows exist; the conflict needs a human to look at it.
pub const ACTION_MANUAL_INTERVENTION: &str = "manual_intervention";

#[derive(ThisError, Debug)]
pub enum Error {
    /// Malformed input; always recoverable with a corrective message
    #[error("{message}")]
    Validation { message: String },

    /// Duplicate verified account or equivalent business conflict.
    /// Never resolved by auto-deleting verified data.
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        action: Option<&'static str>,
    },

    /// No matching account/OTP; carries an actionable next step
    #[error("{resource} not found")]
    NotFound {
        resource: String,
        next_step: Option<&'static str>,
    },

    /// Bad credentials or bad/expired token. The message never reveals
    /// which of identifier/password was wrong.
    #[error("Not authenticated")]
    Auth { message: Option<String> },

    /// Authenticated but the role is insufficient
    #[error("Access denied")]
    Forbidden { required: &'static str },

    /// Login refused for a reason the client can act on (unverified
    /// account, forced reset)
    #[error("{message}")]
    LoginBlocked { message: String, action: &'static str },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Store operation error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_step: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    degraded: Option<bool>,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Signup conflicts are 400 on this API (clients branch on the
            // action field, not the status).
            Error::Validation { .. } | Error::Conflict { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Auth { .. } | Error::LoginBlocked { .. } => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Store(store_err) => match store_err {
                StoreError::NotFound => StatusCode::NOT_FOUND,
                StoreError::Conflict { .. } => StatusCode::CONFLICT,
                StoreError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                StoreError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal detail
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation { message } => message.clone(),
            Error::Conflict { message, .. } => message.clone(),
            Error::NotFound { resource, .. } => format!("{resource} not found"),
            Error::Auth { message } => message
                .clone()
                .unwrap_or_else(|| "authentication required".to_string()),
            Error::Forbidden { .. } => "access denied".to_string(),
            Error::LoginBlocked { message, .. } => message.clone(),
            Error::Internal { .. } => "internal server error".to_string(),
            Error::Store(store_err) => match store_err {
                StoreError::NotFound => "resource not found".to_string(),
                StoreError::Conflict { field, .. } => match *field {
                    "email" => "an account with this email address already exists".to_string(),
                    "username" => "this username is already taken".to_string(),
                    _ => "resource already exists".to_string(),
                },
                StoreError::Unavailable { .. } => "account store is temporarily unavailable".to_string(),
                StoreError::Other(_) => "store error occurred".to_string(),
            },
            Error::Other(_) => "internal server error".to_string(),
        }
    }

    fn action(&self) -> Option<&'static str> {
        match self {
            Error::Conflict { action, .. } => *action,
            Error::LoginBlocked { action, .. } => Some(action),
            _ => None,
        }
    }

    fn next_step(&self) -> Option<&'static str> {
        match self {
            Error::NotFound { next_step, .. } => *next_step,
            _ => None,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details server-side, leveled by severity
        match &self {
            Error::Store(StoreError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Store(StoreError::Unavailable { .. }) => {
                tracing::warn!("Store unavailable: {}", self);
            }
            Error::Auth { .. } | Error::Forbidden { .. } | Error::LoginBlocked { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::Conflict { .. } | Error::Store(_) => {
                tracing::warn!("Conflict error: {}", self);
            }
            Error::Validation { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();
        let body = ErrorBody {
            success: false,
            message: self.user_message(),
            action: self.action(),
            next_step: self.next_step(),
            degraded: None,
        };

        (status, Json(body)).into_response()
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::Validation {
                message: "weak password".to_string()
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Conflict {
                message: "exists".to_string(),
                action: None
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::Auth { message: None }.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Error::Forbidden { required: "super_admin" }.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::Store(StoreError::Unavailable {
                reason: "down".to_string()
            })
            .status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::Store(StoreError::Conflict {
                field: "email",
                value: "a@b.c".to_string(),
                verified_holder: true
            })
            .status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_auth_message_never_names_the_wrong_field() {
        let err = Error::Auth { message: None };
        let message = err.user_message();
        assert!(!message.contains("password"));
        assert!(!message.contains("identifier"));
    }
}
