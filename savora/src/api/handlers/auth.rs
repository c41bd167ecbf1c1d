//! Signup, verification, login and conflict-resolution handlers.

use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    api::models::{
        accounts::{AccountResponse, AccountSummary, CurrentPrincipal, Role},
        auth::{
            DebugConflictRequest, DebugConflictResponse, LoginRequest, LoginResponse, ResendOtpRequest, ResolveAction,
            ResolveConflictRequest, ResolveConflictResponse, SignupRequest, SignupResponse, VerifyOtpRequest,
            VerifyOtpResponse,
        },
    },
    auth::{
        otp::OtpManager,
        password,
        principal::AdminPrincipal,
        resolver::{ConflictResolver, Resolution},
        session,
    },
    email::DeliveryStatus,
    errors::{
        ACTION_MANUAL_INTERVENTION, ACTION_REDIRECT_TO_LOGIN, ACTION_RESET_NEEDED, ACTION_RESOLVE_CONFLICT,
        ACTION_VERIFY_NEEDED, Error,
        NEXT_SIGNUP,
    },
    store::errors::StoreError,
    store::handlers::{Accounts, AdminGrants, Repository},
    store::models::accounts::{AccountCreateRequest, AccountRecord},
    types::normalize_identifier,
};

fn validate_email(email: &str) -> Result<(), Error> {
    let trimmed = email.trim();
    if trimmed.len() < 3 || !trimmed.contains('@') || trimmed.starts_with('@') || trimmed.ends_with('@') {
        return Err(Error::Validation {
            message: "a valid email address is required".to_string(),
        });
    }
    Ok(())
}

fn validate_mobile(mobile: &str) -> Result<(), Error> {
    let digits = mobile.trim();
    if digits.len() < 10 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::Validation {
            message: "mobile number must be 10 to 15 digits".to_string(),
        });
    }
    Ok(())
}

fn validate_password(password: &str, state: &AppState) -> Result<(), Error> {
    let policy = &state.config.auth.password;
    if password.len() < policy.min_length {
        return Err(Error::Validation {
            message: format!("Password must be at least {} characters", policy.min_length),
        });
    }
    if password.len() > policy.max_length {
        return Err(Error::Validation {
            message: format!("Password must be no more than {} characters", policy.max_length),
        });
    }
    Ok(())
}

async fn hash_on_blocking_thread(password: String) -> Result<String, Error> {
    tokio::task::spawn_blocking(move || password::hash_string(&password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

async fn verify_on_blocking_thread(password: String, hash: String) -> Result<bool, Error> {
    tokio::task::spawn_blocking(move || password::verify_string(&password, &hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })
}

/// Issue a fresh code and mail it; the flow succeeds even when delivery is
/// uncertain because the code stays live for a resend.
async fn issue_and_mail_otp(state: &AppState, email: &str) -> Result<DeliveryStatus, Error> {
    let manager = OtpManager::new(&state.store, state.config.auth.otp_ttl);
    let challenge = manager.issue(email).await?;
    let ttl_minutes = state.config.auth.otp_ttl.as_secs() / 60;
    state.mailer.send_otp_email(&challenge.email, &challenge.code, ttl_minutes).await
}

/// Register a new account and send a verification code
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    tag = "auth",
    responses(
        (status = 201, description = "Account created, verification pending", body = SignupResponse),
        (status = 400, description = "Invalid input or identifier conflict"),
    )
)]
#[tracing::instrument(skip_all, fields(email = %request.email))]
pub async fn signup(State(state): State<AppState>, Json(request): Json<SignupRequest>) -> Result<(StatusCode, Json<SignupResponse>), Error> {
    validate_email(&request.email)?;
    validate_mobile(&request.mobile)?;
    validate_password(&request.password, &state)?;
    if normalize_identifier(&request.username).is_empty() {
        return Err(Error::Validation {
            message: "username must not be empty".to_string(),
        });
    }

    // Hold both identifier locks across the conflict check and the insert so
    // a concurrent resolver run cannot interleave.
    let _guards = {
        let mut keys = vec![normalize_identifier(&request.email), normalize_identifier(&request.username)];
        keys.sort();
        keys.dedup();
        let mut guards = Vec::with_capacity(keys.len());
        for key in &keys {
            guards.push(state.store.identifier_lock(key).await);
        }
        guards
    };

    let accounts = Accounts::new(&state.store);
    if accounts
        .find_verified_matching(&request.email, &request.username)
        .await?
        .is_some()
    {
        return Err(Error::Conflict {
            message: "an account with these details already exists, please log in".to_string(),
            action: Some(ACTION_REDIRECT_TO_LOGIN),
        });
    }

    let password_hash = hash_on_blocking_thread(request.password.clone()).await?;
    let created = match accounts
        .create(&AccountCreateRequest {
            username: request.username.clone(),
            email: request.email.clone(),
            password_hash,
            mobile: request.mobile.trim().to_string(),
            is_verified: false,
            role: Role::User,
        })
        .await
    {
        Ok(account) => account,
        Err(StoreError::Conflict { field, verified_holder, .. }) => {
            let (message, action) = if verified_holder {
                (
                    format!("an account with this {field} already exists, please log in"),
                    ACTION_REDIRECT_TO_LOGIN,
                )
            } else {
                (
                    format!("an unfinished signup already holds this {field}"),
                    ACTION_RESOLVE_CONFLICT,
                )
            };
            return Err(Error::Conflict {
                message,
                action: Some(action),
            });
        }
        Err(e) => return Err(e.into()),
    };

    let delivery = issue_and_mail_otp(&state, &created.email).await?;
    let message = match delivery {
        DeliveryStatus::Sent => "account created, check your email for the verification code".to_string(),
        DeliveryStatus::Uncertain => {
            "account created, but the verification email may be delayed; you can request a resend".to_string()
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            success: true,
            message,
            email: created.email,
        }),
    ))
}

/// Verify an email address with a one-time code
#[utoipa::path(
    post,
    path = "/auth/verify-otp",
    request_body = VerifyOtpRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Email verified", body = VerifyOtpResponse),
        (status = 400, description = "Code missing, wrong, expired or already used", body = VerifyOtpResponse),
    )
)]
#[tracing::instrument(skip_all, fields(email = %request.email))]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<(StatusCode, Json<VerifyOtpResponse>), Error> {
    validate_email(&request.email)?;

    let manager = OtpManager::new(&state.store, state.config.auth.otp_ttl);
    match manager.verify(&request.email, request.otp.trim()).await? {
        Ok(_account) => Ok((
            StatusCode::OK,
            Json(VerifyOtpResponse {
                success: true,
                message: "email verified, you can now log in".to_string(),
                reason: None,
            }),
        )),
        Err(failure) => Ok((
            StatusCode::BAD_REQUEST,
            Json(VerifyOtpResponse {
                success: false,
                message: failure.message().to_string(),
                reason: Some(failure.reason().to_string()),
            }),
        )),
    }
}

/// Re-send a verification code, invalidating the previous one
#[utoipa::path(
    post,
    path = "/auth/resend-otp",
    request_body = ResendOtpRequest,
    tag = "auth",
    responses(
        (status = 200, description = "A fresh code was issued", body = SignupResponse),
        (status = 404, description = "No account for this email"),
    )
)]
#[tracing::instrument(skip_all, fields(email = %request.email))]
pub async fn resend_otp(State(state): State<AppState>, Json(request): Json<ResendOtpRequest>) -> Result<Json<SignupResponse>, Error> {
    validate_email(&request.email)?;

    let accounts = Accounts::new(&state.store);
    let Some(account) = accounts.find_by_identifier(&request.email).await? else {
        return Err(Error::NotFound {
            resource: "account".to_string(),
            next_step: Some(NEXT_SIGNUP),
        });
    };
    if account.is_verified {
        return Err(Error::Validation {
            message: "this account is already verified, please log in".to_string(),
        });
    }

    let delivery = issue_and_mail_otp(&state, &account.email).await?;
    let message = match delivery {
        DeliveryStatus::Sent => "a fresh verification code is on its way".to_string(),
        DeliveryStatus::Uncertain => "a fresh code was issued but delivery may be delayed".to_string(),
    };

    Ok(Json(SignupResponse {
        success: true,
        message,
        email: account.email,
    }))
}

/// Shared credential check for login and admin-login. Does not reveal
/// whether the identifier or the password was wrong.
async fn authenticate(state: &AppState, identifier: &str, supplied_password: &str) -> Result<AccountRecord, Error> {
    let accounts = Accounts::new(&state.store);
    let Some(account) = accounts.find_by_identifier(identifier).await? else {
        return Err(Error::NotFound {
            resource: "account".to_string(),
            next_step: Some(NEXT_SIGNUP),
        });
    };

    if !password::is_valid_hash(&account.password_hash) {
        // Stored credential is unusable; the user has to reset, not retry
        return Err(Error::LoginBlocked {
            message: "this account needs a password reset before logging in".to_string(),
            action: ACTION_RESET_NEEDED,
        });
    }

    let verified = verify_on_blocking_thread(supplied_password.to_string(), account.password_hash.clone()).await?;
    if !verified {
        return Err(Error::Auth { message: None });
    }

    if !account.is_verified {
        return Err(Error::LoginBlocked {
            message: "please verify your email before logging in".to_string(),
            action: ACTION_VERIFY_NEEDED,
        });
    }

    Ok(account)
}

/// Log in with email or username
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Bad credentials or unverified account"),
        (status = 404, description = "No such account"),
    )
)]
#[tracing::instrument(skip_all, fields(identifier = %request.identifier))]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<LoginResponse>, Error> {
    let account = authenticate(&state, &request.identifier, &request.password).await?;

    let principal = CurrentPrincipal::from(account.clone());
    let token = session::create_session_token(&principal, &state.config)?;
    tracing::info!(email = %account.email, "login successful");

    Ok(Json(LoginResponse {
        success: true,
        user: AccountResponse::from(account),
        token,
    }))
}

/// Log in with admin credentials; requires an elevated role or active grant
#[utoipa::path(
    post,
    path = "/auth/admin-login",
    request_body = LoginRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Admin login successful", body = LoginResponse),
        (status = 401, description = "Bad credentials"),
        (status = 403, description = "Account is not an admin"),
    )
)]
#[tracing::instrument(skip_all, fields(identifier = %request.identifier))]
pub async fn admin_login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<LoginResponse>, Error> {
    let account = authenticate(&state, &request.identifier, &request.password).await?;

    let elevated = account.role.is_admin() || AdminGrants::new(&state.store).is_active(&account.email).await?;
    if !elevated {
        return Err(Error::Forbidden { required: "admin" });
    }

    let principal = CurrentPrincipal::from(account.clone());
    let token = session::create_session_token(&principal, &state.config)?;
    tracing::info!(email = %account.email, role = %account.role.as_str(), "admin login successful");

    Ok(Json(LoginResponse {
        success: true,
        user: AccountResponse::from(account),
        token,
    }))
}

/// Resolve a duplicate or partially-completed signup
#[utoipa::path(
    post,
    path = "/auth/resolve-conflict",
    request_body = ResolveConflictRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Resolution outcome", body = ResolveConflictResponse),
    )
)]
#[tracing::instrument(skip_all, fields(email = %request.email, action = ?request.action))]
pub async fn resolve_conflict(
    State(state): State<AppState>,
    Json(request): Json<ResolveConflictRequest>,
) -> Result<Json<ResolveConflictResponse>, Error> {
    validate_email(&request.email)?;

    let resolver = ConflictResolver::new(&state.store);
    let response = match request.action {
        ResolveAction::GetVerifiedAccount => match resolver.find_verified(&request.email, &request.username).await? {
            Some(account) => ResolveConflictResponse {
                success: true,
                message: format!("a verified account already exists for {}", account.email),
                action: Some(ACTION_REDIRECT_TO_LOGIN.to_string()),
                removed: None,
            },
            None => ResolveConflictResponse {
                success: false,
                message: "no verified account holds these details".to_string(),
                action: None,
                removed: None,
            },
        },
        ResolveAction::ClearUnverified => match resolver.clear_unverified(&request.email, &request.username).await? {
            Resolution::VerifiedAccountExists(account) => ResolveConflictResponse {
                success: false,
                message: format!("a verified account already exists for {}, nothing was removed", account.email),
                action: Some(ACTION_REDIRECT_TO_LOGIN.to_string()),
                removed: None,
            },
            Resolution::ClearedUnverified { removed } => ResolveConflictResponse {
                success: true,
                message: "unverified signups cleared, you can sign up again".to_string(),
                action: None,
                removed: Some(removed),
            },
            Resolution::ManualIntervention => ResolveConflictResponse {
                success: false,
                message: "no account matches these details and nothing could be cleared automatically".to_string(),
                action: Some(ACTION_MANUAL_INTERVENTION.to_string()),
                removed: Some(0),
            },
        },
    };

    Ok(Json(response))
}

/// Inspect accounts loosely matching an identifier pair (admin only)
#[utoipa::path(
    post,
    path = "/auth/debug-conflict",
    request_body = DebugConflictRequest,
    tag = "auth",
    responses(
        (status = 200, description = "Redacted matches", body = DebugConflictResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an admin"),
    )
)]
#[tracing::instrument(skip_all, fields(admin = %admin.0.email))]
pub async fn debug_conflict(
    admin: AdminPrincipal,
    State(state): State<AppState>,
    Json(request): Json<DebugConflictRequest>,
) -> Result<Json<DebugConflictResponse>, Error> {
    let matches = ConflictResolver::new(&state.store)
        .inspect(&request.email, &request.username)
        .await?
        .into_iter()
        .map(AccountSummary::from)
        .collect();

    Ok(Json(DebugConflictResponse { success: true, matches }))
}
