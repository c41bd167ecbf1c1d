//! # savora: Account Service for the Savora Platform
//!
//! `savora` is the authentication and account-state reconciliation service
//! behind the Savora food-ordering platform. It owns signup, email
//! verification, login, session issuance and the cleanup of accounts left
//! half-created when a signup stalls between steps.
//!
//! ## Overview
//!
//! Signup is a two-step flow: an account row is written unverified, then a
//! six-digit one-time passcode is mailed to the address and must be entered
//! before login is allowed. Because the flow has two steps it can be
//! abandoned in the middle, and because identifiers are unique a stalled
//! signup blocks anyone else from using that email or username. The
//! conflict resolver ([`auth::resolver`]) reconciles these states: it finds
//! the verified holder of a contested identifier pair, or clears unverified
//! leftovers so signup can be retried. Verified accounts are never deleted
//! by reconciliation.
//!
//! ### Request Flow
//!
//! Public endpoints (`/auth/*`) drive the signup and login lifecycle.
//! Authenticated endpoints (`/user/*`, most of `/admin/*`) resolve the
//! caller through the extractors in [`auth::principal`], which accept a
//! `Bearer` session token or an `Admin base64(email:password)` credential
//! header. Role escalation flows through elevation requests and grants in
//! `/admin/*`, decided by a super admin.
//!
//! ### Core Components
//!
//! The **API layer** ([`api`]) exposes the REST surface with OpenAPI
//! documentation at `/docs`.
//!
//! The **authentication layer** ([`auth`]) covers Argon2 password hashing,
//! HS256 session tokens, OTP issuance/verification and the conflict
//! resolver.
//!
//! The **store layer** ([`store`]) uses the repository pattern over a keyed
//! in-process store. It exposes an availability switch that the degraded
//! mode ([`store::fallback`]) hangs off: when the store is unreachable and a
//! demo identity is configured, profile reads keep working and are flagged
//! `degraded`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use savora::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = savora::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     savora::telemetry::init_tracing();
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod email;
pub mod errors;
pub mod openapi;
pub mod store;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::{
    api::models::accounts::Role,
    auth::password,
    email::OtpMailer,
    openapi::ApiDoc,
    store::Store,
    store::fallback::FallbackIdentity,
    store::handlers::{Accounts, Repository},
    store::models::accounts::AccountCreateRequest,
};
use axum::{
    Router,
    routing::{delete, get, post, put},
};
use bon::Builder;
pub use config::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{AccountId, RequestId};

/// Application state shared across all request handlers.
///
/// # Fields
///
/// - `store`: Keyed account/challenge/grant store
/// - `config`: Application configuration loaded from environment/files
/// - `mailer`: Outbound OTP email transport
/// - `fallback`: Degraded-mode identity, present when `demo.enabled` is set
#[derive(Clone, Builder)]
pub struct AppState {
    pub store: Store,
    pub config: Config,
    pub mailer: Arc<OtpMailer>,
    pub fallback: Option<Arc<FallbackIdentity>>,
}

/// Create the seed super-admin account if it doesn't exist.
///
/// Idempotent: an existing account for the email keeps its data, but its
/// role is raised to super admin if something downgraded it. Called during
/// startup so admin approval flows always have a deciding account.
#[instrument(skip(store, password_plain), fields(email = %email))]
pub async fn create_seed_super_admin(store: &Store, email: &str, password_plain: &str) -> anyhow::Result<AccountId> {
    let accounts = Accounts::new(store);

    if let Some(existing) = accounts.find_by_identifier(email).await? {
        if existing.role != Role::SuperAdmin {
            accounts.update_role(existing.id, Role::SuperAdmin).await?;
        }
        info!("Seed super admin already exists");
        return Ok(existing.id);
    }

    let password_hash = password::hash_string(password_plain).map_err(|e| anyhow::anyhow!("{e}"))?;
    let created = accounts
        .create(&AccountCreateRequest {
            username: email.to_string(),
            email: email.to_string(),
            password_hash,
            mobile: "0000000000".to_string(),
            is_verified: true,
            role: Role::SuperAdmin,
        })
        .await?;

    info!("Created seed super admin");
    Ok(created.id)
}

/// Build the main application router with all endpoints and middleware.
pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/auth/signup", post(api::handlers::auth::signup))
        .route("/auth/verify-otp", post(api::handlers::auth::verify_otp))
        .route("/auth/resend-otp", post(api::handlers::auth::resend_otp))
        .route("/auth/login", post(api::handlers::auth::login))
        .route("/auth/admin-login", post(api::handlers::auth::admin_login))
        .route("/auth/resolve-conflict", post(api::handlers::auth::resolve_conflict))
        .route("/auth/debug-conflict", post(api::handlers::auth::debug_conflict));

    let account_routes = Router::new()
        .route("/user/profile", get(api::handlers::account::get_profile))
        .route("/user/profile", put(api::handlers::account::update_profile))
        .route("/user/change-password", post(api::handlers::account::change_password));

    let admin_routes = Router::new()
        .route("/admin/requests", post(api::handlers::admin::create_admin_request))
        .route("/admin/requests", get(api::handlers::admin::list_admin_requests))
        .route("/admin/requests/{id}/approve", post(api::handlers::admin::approve_admin_request))
        .route("/admin/requests/{id}/reject", post(api::handlers::admin::reject_admin_request))
        .route("/admin/grants", get(api::handlers::admin::list_admin_grants))
        .route("/admin/grants/{email}", delete(api::handlers::admin::deactivate_admin_grant));

    Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .merge(auth_routes)
        .merge(account_routes)
        .merge(admin_routes)
        .with_state(state)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// The assembled service, ready to bind and serve.
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::new();

        if let Some(seed) = &config.auth.seed_admin {
            create_seed_super_admin(&store, &seed.email, &seed.password).await?;
        }

        let mailer = Arc::new(OtpMailer::new(&config).map_err(|e| anyhow::anyhow!("{e}"))?);
        let fallback = config
            .demo
            .enabled
            .then(|| Arc::new(FallbackIdentity::from_config(&config.demo)));

        let state = AppState::builder()
            .store(store)
            .config(config.clone())
            .mailer(mailer)
            .maybe_fallback(fallback)
            .build();

        let router = build_router(state);

        Ok(Self { router, config })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Account service listening on http://{bind_addr}");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
