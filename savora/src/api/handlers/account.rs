//! Profile and credential handlers for the authenticated account.

use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::accounts::{AccountResponse, ChangePasswordRequest, CurrentPrincipal, ProfileResponse, ProfileUpdateRequest},
    auth::password,
    errors::Error,
    store::errors::StoreError,
    store::fallback::TieredAccounts,
    store::handlers::{Accounts, Repository},
    store::models::accounts::AccountProfileUpdate,
    types::normalize_identifier,
};

/// Fetch the caller's profile
///
/// When the account store is unreachable and a demo identity is configured,
/// the demo profile is served with `degraded: true` instead of failing.
#[utoipa::path(
    get,
    path = "/user/profile",
    tag = "account",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Not authenticated"),
        (status = 503, description = "Store unreachable and no fallback configured"),
    )
)]
#[tracing::instrument(skip_all, fields(account_id = %crate::types::abbrev_uuid(&principal.id)))]
pub async fn get_profile(principal: CurrentPrincipal, State(state): State<AppState>) -> Result<Json<ProfileResponse>, Error> {
    let tiered = TieredAccounts::new(&state.store, state.fallback.clone());
    let result = tiered.get_by_id(principal.id).await?;

    let Some(account) = result.value else {
        return Err(Error::NotFound {
            resource: "account".to_string(),
            next_step: None,
        });
    };

    Ok(Json(ProfileResponse {
        success: true,
        user: AccountResponse::from(account),
        degraded: result.degraded.then_some(true),
    }))
}

/// Update the caller's username or mobile number
#[utoipa::path(
    put,
    path = "/user/profile",
    request_body = ProfileUpdateRequest,
    tag = "account",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Username already taken"),
        (status = 503, description = "Store unreachable"),
    )
)]
#[tracing::instrument(skip_all, fields(account_id = %crate::types::abbrev_uuid(&principal.id)))]
pub async fn update_profile(
    principal: CurrentPrincipal,
    State(state): State<AppState>,
    Json(request): Json<ProfileUpdateRequest>,
) -> Result<Json<ProfileResponse>, Error> {
    if let Some(username) = &request.username
        && normalize_identifier(username).is_empty()
    {
        return Err(Error::Validation {
            message: "username must not be empty".to_string(),
        });
    }
    if let Some(mobile) = &request.mobile {
        let digits = mobile.trim();
        if digits.len() < 10 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::Validation {
                message: "mobile number must be 10 to 15 digits".to_string(),
            });
        }
    }

    let update = AccountProfileUpdate {
        username: request.username.clone(),
        mobile: request.mobile.as_deref().map(|m| m.trim().to_string()),
    };

    let accounts = Accounts::new(&state.store);
    match accounts.update(principal.id, &update).await {
        Ok(account) => Ok(Json(ProfileResponse {
            success: true,
            user: AccountResponse::from(account),
            degraded: None,
        })),
        // Degraded acceptance: with the demo identity enabled the write is
        // acknowledged, flagged, and dropped; it does not survive recovery.
        Err(StoreError::Unavailable { .. }) if state.fallback.is_some() => {
            tracing::warn!("profile update accepted in degraded mode, changes will not persist");
            let fallback = state.fallback.as_ref().unwrap();
            let mut account = fallback.account_for(principal.id);
            if let Some(username) = request.username {
                account.username = normalize_identifier(&username);
            }
            if let Some(mobile) = request.mobile {
                account.mobile = mobile.trim().to_string();
            }
            Ok(Json(ProfileResponse {
                success: true,
                user: AccountResponse::from(account),
                degraded: Some(true),
            }))
        }
        Err(e) => Err(e.into()),
    }
}

/// Change the caller's password
#[utoipa::path(
    post,
    path = "/user/change-password",
    request_body = ChangePasswordRequest,
    tag = "account",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "New password violates policy"),
        (status = 401, description = "Current password is wrong"),
    )
)]
#[tracing::instrument(skip_all, fields(account_id = %crate::types::abbrev_uuid(&principal.id)))]
pub async fn change_password(
    principal: CurrentPrincipal,
    State(state): State<AppState>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, Error> {
    let policy = &state.config.auth.password;
    if request.new_password.len() < policy.min_length {
        return Err(Error::Validation {
            message: format!("Password must be at least {} characters", policy.min_length),
        });
    }
    if request.new_password.len() > policy.max_length {
        return Err(Error::Validation {
            message: format!("Password must be no more than {} characters", policy.max_length),
        });
    }

    let accounts = Accounts::new(&state.store);
    let Some(account) = accounts.get_by_id(principal.id).await? else {
        return Err(Error::NotFound {
            resource: "account".to_string(),
            next_step: None,
        });
    };

    let current = request.current_password.clone();
    let hash = account.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || password::verify_string(&current, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })?;
    if !verified {
        return Err(Error::Auth {
            message: Some("current password is incorrect".to_string()),
        });
    }

    let new_password = request.new_password;
    let new_hash = tokio::task::spawn_blocking(move || password::hash_string(&new_password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })??;

    accounts.update_password(account.id, &new_hash).await?;
    tracing::info!(email = %account.email, "password changed");

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "password changed"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_profile_requires_auth() {
        let harness = TestHarness::new().await;
        let response = harness.server.get("/user/profile").await;
        response.assert_status_unauthorized();
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "authentication required");
    }

    #[tokio::test]
    async fn test_garbage_token_reported_as_invalid() {
        let harness = TestHarness::new().await;
        let response = harness
            .server
            .get("/user/profile")
            .add_header("authorization", "Bearer not.a.valid.token")
            .await;
        response.assert_status_unauthorized();
        let body: serde_json::Value = response.json();
        assert_eq!(body["message"], "invalid token");
    }

    #[tokio::test]
    async fn test_get_and_update_profile() {
        let harness = TestHarness::new().await;
        let token = harness.signup_verified("pat", "pat@x.com", "longpassword").await;

        let response = harness
            .server
            .get("/user/profile")
            .add_header("authorization", format!("Bearer {token}"))
            .await;
        response.assert_status_ok();
        let profile: ProfileResponse = response.json();
        assert_eq!(profile.user.username, "pat");
        assert!(profile.degraded.is_none());

        let response = harness
            .server
            .put("/user/profile")
            .add_header("authorization", format!("Bearer {token}"))
            .json(&json!({"username": "patricia", "mobile": "5559998888"}))
            .await;
        response.assert_status_ok();
        let updated: ProfileResponse = response.json();
        assert_eq!(updated.user.username, "patricia");
        assert_eq!(updated.user.mobile, "5559998888");
    }

    #[tokio::test]
    async fn test_update_profile_rejects_taken_username() {
        let harness = TestHarness::new().await;
        harness.signup_verified("first", "first@x.com", "longpassword").await;
        let token = harness.signup_verified("second", "second@x.com", "longpassword").await;

        let response = harness
            .server
            .put("/user/profile")
            .add_header("authorization", format!("Bearer {token}"))
            .json(&json!({"username": "first"}))
            .await;
        response.assert_status(axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_change_password_flow() {
        let harness = TestHarness::new().await;
        let token = harness.signup_verified("pw", "pw@x.com", "longpassword").await;

        // Wrong current password
        let response = harness
            .server
            .post("/user/change-password")
            .add_header("authorization", format!("Bearer {token}"))
            .json(&json!({"current_password": "wrong", "new_password": "brand-new-password"}))
            .await;
        response.assert_status_unauthorized();

        // Correct flow
        let response = harness
            .server
            .post("/user/change-password")
            .add_header("authorization", format!("Bearer {token}"))
            .json(&json!({"current_password": "longpassword", "new_password": "brand-new-password"}))
            .await;
        response.assert_status_ok();

        // Old password no longer works, new one does
        harness
            .server
            .post("/auth/login")
            .json(&json!({"identifier": "pw@x.com", "password": "longpassword"}))
            .await
            .assert_status_unauthorized();
        harness
            .server
            .post("/auth/login")
            .json(&json!({"identifier": "pw@x.com", "password": "brand-new-password"}))
            .await
            .assert_status_ok();
    }

    #[test_log::test(tokio::test)]
    async fn test_degraded_profile_read() {
        let harness = TestHarness::with_demo_fallback().await;
        let token = harness.signup_verified("deg", "deg@x.com", "longpassword").await;

        harness.state.store.set_available(false);

        let response = harness
            .server
            .get("/user/profile")
            .add_header("authorization", format!("Bearer {token}"))
            .await;
        response.assert_status_ok();
        let profile: ProfileResponse = response.json();
        assert_eq!(profile.degraded, Some(true));

        harness.state.store.set_available(true);
        let response = harness
            .server
            .get("/user/profile")
            .add_header("authorization", format!("Bearer {token}"))
            .await;
        response.assert_status_ok();
        let profile: ProfileResponse = response.json();
        assert!(profile.degraded.is_none());
        assert_eq!(profile.user.username, "deg");
    }

    #[test_log::test(tokio::test)]
    async fn test_outage_without_fallback_is_unavailable() {
        let harness = TestHarness::new().await;
        let token = harness.signup_verified("down", "down@x.com", "longpassword").await;

        harness.state.store.set_available(false);

        let response = harness
            .server
            .get("/user/profile")
            .add_header("authorization", format!("Bearer {token}"))
            .await;
        response.assert_status(axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test_log::test(tokio::test)]
    async fn test_degraded_write_flagged_and_dropped() {
        let harness = TestHarness::with_demo_fallback().await;
        let token = harness.signup_verified("w", "w@x.com", "longpassword").await;

        harness.state.store.set_available(false);
        let response = harness
            .server
            .put("/user/profile")
            .add_header("authorization", format!("Bearer {token}"))
            .json(&json!({"username": "ghostwrite"}))
            .await;
        response.assert_status_ok();
        let updated: ProfileResponse = response.json();
        assert_eq!(updated.degraded, Some(true));

        // Change did not survive recovery
        harness.state.store.set_available(true);
        let response = harness
            .server
            .get("/user/profile")
            .add_header("authorization", format!("Bearer {token}"))
            .await;
        let profile: ProfileResponse = response.json();
        assert_eq!(profile.user.username, "w");
    }
}
