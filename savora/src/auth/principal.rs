//! Request principal extraction.
//!
//! Two credential schemes are accepted on the `Authorization` header:
//!
//! - `Bearer <jwt>` - a session token issued by login
//! - `Admin <base64(email:password)>` - direct admin credentials, checked
//!   against the stored hash plus an active grant or elevated role
//!
//! Each scheme reports one of three things: not applicable (no such
//! credentials on the request), authenticated, or present-but-invalid.
//! Schemes are tried in order and the first success wins; a request that
//! presented credentials but failed every applicable scheme gets the first
//! scheme error back.

use axum::{extract::FromRequestParts, http::request::Parts};
use base64::{Engine as _, engine::general_purpose};
use tracing::{debug, instrument, trace};

use crate::{
    AppState,
    api::models::accounts::CurrentPrincipal,
    auth::{password, session},
    errors::{Error, Result},
    store::handlers::{Accounts, AdminGrants},
};

fn authorization_str(parts: &Parts) -> Option<std::result::Result<&str, Error>> {
    let header = parts.headers.get(axum::http::header::AUTHORIZATION)?;
    Some(header.to_str().map_err(|e| Error::Validation {
        message: format!("Invalid authorization header: {e}"),
    }))
}

/// Extract a principal from a `Bearer` session token if present and valid.
/// Returns:
/// - None: no Authorization header or not a Bearer token
/// - Some(Ok(principal)): valid token
/// - Some(Err(error)): Bearer token present but invalid/expired
#[instrument(skip(parts, state))]
fn try_bearer_token_auth(parts: &Parts, state: &AppState) -> Option<Result<CurrentPrincipal>> {
    let auth_str = match authorization_str(parts)? {
        Ok(s) => s,
        Err(e) => return Some(Err(e)),
    };

    let token = auth_str.strip_prefix("Bearer ")?;
    Some(session::verify_session_token(token, &state.config))
}

/// Extract a principal from an `Admin` credential header if present and
/// valid. The payload is `base64(email:password)`; the account must hold an
/// elevated role or an active admin grant.
/// Returns:
/// - None: no Authorization header or not an Admin scheme
/// - Some(Ok(principal)): credentials valid and elevation confirmed
/// - Some(Err(error)): Admin credentials present but rejected
#[instrument(skip(parts, state))]
async fn try_admin_credential_auth(parts: &Parts, state: &AppState) -> Option<Result<CurrentPrincipal>> {
    let auth_str = match authorization_str(parts)? {
        Ok(s) => s,
        Err(e) => return Some(Err(e)),
    };

    let payload = auth_str.strip_prefix("Admin ")?;

    let decoded = match general_purpose::STANDARD.decode(payload) {
        Ok(bytes) => bytes,
        Err(_) => {
            return Some(Err(Error::Auth {
                message: Some("malformed admin credentials".to_string()),
            }));
        }
    };
    let decoded = match String::from_utf8(decoded) {
        Ok(s) => s,
        Err(_) => {
            return Some(Err(Error::Auth {
                message: Some("malformed admin credentials".to_string()),
            }));
        }
    };
    let Some((email, supplied_password)) = decoded.split_once(':') else {
        return Some(Err(Error::Auth {
            message: Some("malformed admin credentials".to_string()),
        }));
    };

    let accounts = Accounts::new(&state.store);
    let account = match accounts.find_by_identifier(email).await {
        Ok(Some(account)) => account,
        Ok(None) => return Some(Err(Error::Auth { message: None })),
        Err(e) => return Some(Err(e.into())),
    };

    let hash = account.password_hash.clone();
    let supplied = supplied_password.to_string();
    let verified = match tokio::task::spawn_blocking(move || password::verify_string(&supplied, &hash)).await {
        Ok(v) => v,
        Err(e) => {
            return Some(Err(Error::Internal {
                operation: format!("password verification task: {e}"),
            }));
        }
    };
    if !verified {
        return Some(Err(Error::Auth { message: None }));
    }

    // Hardcoded-role admins pass directly; everyone else needs an active grant
    let elevated = if account.role.is_admin() {
        true
    } else {
        match AdminGrants::new(&state.store).is_active(&account.email).await {
            Ok(active) => active,
            Err(e) => return Some(Err(e.into())),
        }
    };

    if !elevated {
        return Some(Err(Error::Forbidden { required: "admin" }));
    }

    Some(Ok(CurrentPrincipal::from(account)))
}

impl FromRequestParts<AppState> for CurrentPrincipal {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let mut auth_errors = Vec::new();

        match try_bearer_token_auth(parts, state) {
            Some(Ok(principal)) => {
                debug!("Bearer token authenticated principal: {}", principal.id);
                return Ok(principal);
            }
            Some(Err(e)) => {
                trace!("Bearer token authentication failed: {:?}", e);
                auth_errors.push(e);
            }
            None => {
                trace!("No bearer token presented");
            }
        }

        match try_admin_credential_auth(parts, state).await {
            Some(Ok(principal)) => {
                debug!("Admin credentials authenticated principal: {}", principal.id);
                return Ok(principal);
            }
            Some(Err(e)) => {
                trace!("Admin credential authentication failed: {:?}", e);
                auth_errors.push(e);
            }
            None => {
                trace!("No admin credentials presented");
            }
        }

        match auth_errors.into_iter().next() {
            Some(e) => Err(e),
            None => Err(Error::Auth { message: None }),
        }
    }
}

/// A principal holding at least the admin role or an equivalent grant.
#[derive(Debug, Clone)]
pub struct AdminPrincipal(pub CurrentPrincipal);

impl FromRequestParts<AppState> for AdminPrincipal {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let principal = CurrentPrincipal::from_request_parts(parts, state).await?;
        if principal.role.is_admin() {
            return Ok(AdminPrincipal(principal));
        }
        // Role may lag behind a freshly approved grant
        if AdminGrants::new(&state.store).is_active(&principal.email).await? {
            return Ok(AdminPrincipal(principal));
        }
        Err(Error::Forbidden { required: "admin" })
    }
}

/// A principal holding the super-admin role.
#[derive(Debug, Clone)]
pub struct SuperAdminPrincipal(pub CurrentPrincipal);

impl FromRequestParts<AppState> for SuperAdminPrincipal {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let principal = CurrentPrincipal::from_request_parts(parts, state).await?;
        if principal.role == crate::api::models::accounts::Role::SuperAdmin {
            return Ok(SuperAdminPrincipal(principal));
        }
        Err(Error::Forbidden {
            required: "super_admin",
        })
    }
}

/// Build the value for an `Admin` scheme Authorization header.
pub fn encode_admin_credentials(email: &str, password: &str) -> String {
    format!(
        "Admin {}",
        general_purpose::STANDARD.encode(format!("{email}:{password}"))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_admin_credentials_round_trip() {
        let header = encode_admin_credentials("ops@savora.app", "s3cret:with:colons");
        let payload = header.strip_prefix("Admin ").unwrap();
        let decoded = String::from_utf8(general_purpose::STANDARD.decode(payload).unwrap()).unwrap();
        // Only the first colon separates email from password
        let (email, pw) = decoded.split_once(':').unwrap();
        assert_eq!(email, "ops@savora.app");
        assert_eq!(pw, "s3cret:with:colons");
    }
}
