//! Test utilities for integration testing (available with `test-utils` feature).

use crate::api::models::auth::LoginResponse;
use crate::config::{Config, EmailTransportConfig, SeedAdminConfig};
use crate::email::OtpMailer;
use crate::store::Store;
use crate::store::fallback::FallbackIdentity;
use crate::store::handlers::OtpChallenges;
use crate::{AppState, build_router, create_seed_super_admin};
use axum_test::TestServer;
use std::sync::Arc;
use std::time::Duration;

pub const SEED_ADMIN_EMAIL: &str = "root@savora.test";
pub const SEED_ADMIN_PASSWORD: &str = "seed-admin-password";

pub fn create_test_config(email_dir: &std::path::Path) -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        ..Default::default()
    };
    config.email.transport = EmailTransportConfig::File {
        path: email_dir.to_string_lossy().to_string(),
    };
    config.auth.seed_admin = Some(SeedAdminConfig {
        email: SEED_ADMIN_EMAIL.to_string(),
        password: SEED_ADMIN_PASSWORD.to_string(),
    });
    config
}

/// A fully wired service under test: router, state and a live email spool
/// directory. The seed super admin is always present.
pub struct TestHarness {
    pub server: TestServer,
    pub state: AppState,
    _email_dir: tempfile::TempDir,
}

impl TestHarness {
    pub async fn new() -> Self {
        let email_dir = tempfile::tempdir().expect("create email spool dir");
        let config = create_test_config(email_dir.path());
        Self::from_config(config, email_dir).await
    }

    pub async fn with_otp_ttl(ttl: Duration) -> Self {
        let email_dir = tempfile::tempdir().expect("create email spool dir");
        let mut config = create_test_config(email_dir.path());
        config.auth.otp_ttl = ttl;
        Self::from_config(config, email_dir).await
    }

    pub async fn with_demo_fallback() -> Self {
        let email_dir = tempfile::tempdir().expect("create email spool dir");
        let mut config = create_test_config(email_dir.path());
        config.demo.enabled = true;
        config.demo.email = "demo@savora.test".to_string();
        config.demo.username = "demo-diner".to_string();
        Self::from_config(config, email_dir).await
    }

    async fn from_config(config: Config, email_dir: tempfile::TempDir) -> Self {
        let store = Store::new();
        let seed = config.auth.seed_admin.as_ref().expect("test config seeds an admin");
        create_seed_super_admin(&store, &seed.email, &seed.password)
            .await
            .expect("seed super admin");

        let mailer = Arc::new(OtpMailer::new(&config).expect("build mailer"));
        let fallback = config
            .demo
            .enabled
            .then(|| Arc::new(FallbackIdentity::from_config(&config.demo)));

        let state = AppState::builder()
            .store(store)
            .config(config)
            .mailer(mailer)
            .maybe_fallback(fallback)
            .build();

        let server = TestServer::new(build_router(state.clone())).expect("Failed to create test server");

        Self {
            server,
            state,
            _email_dir: email_dir,
        }
    }

    /// The code most recently mailed to `email`. The live challenge in the
    /// store is by construction the one the mailer sent last.
    pub async fn last_emailed_code(&self, email: &str) -> String {
        OtpChallenges::new(&self.state.store)
            .current(email)
            .await
            .expect("store read")
            .expect("a challenge should be pending")
            .code
    }

    /// Sign up an account; verification is left pending.
    pub async fn signup(&self, username: &str, email: &str, password: &str) {
        let response = self
            .server
            .post("/auth/signup")
            .json(&serde_json::json!({
                "username": username,
                "email": email,
                "password": password,
                "mobile": "5550001111"
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
    }

    /// Sign up, verify via the mailed code, log in, and return the session token.
    pub async fn signup_verified(&self, username: &str, email: &str, password: &str) -> String {
        self.signup(username, email, password).await;
        let code = self.last_emailed_code(email).await;

        self.server
            .post("/auth/verify-otp")
            .json(&serde_json::json!({"email": email, "otp": code}))
            .await
            .assert_status_ok();

        let response = self
            .server
            .post("/auth/login")
            .json(&serde_json::json!({"identifier": email, "password": password}))
            .await;
        response.assert_status_ok();
        let login: LoginResponse = response.json();
        login.token
    }

    /// Session token for the seed super admin.
    pub async fn super_admin_token(&self) -> String {
        let response = self
            .server
            .post("/auth/admin-login")
            .json(&serde_json::json!({"identifier": SEED_ADMIN_EMAIL, "password": SEED_ADMIN_PASSWORD}))
            .await;
        response.assert_status_ok();
        let login: LoginResponse = response.json();
        login.token
    }
}
