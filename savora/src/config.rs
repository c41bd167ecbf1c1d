//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `SAVORA_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `SAVORA_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `SAVORA_AUTH__OTP_TTL=5m` sets the `auth.otp_ttl` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use savora::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::Error;

/// Signing secret accepted only outside production.
pub const DEV_SECRET: &str = "savora-dev-secret-do-not-deploy";

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "SAVORA_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Deployment environment. Controls whether the dev signing secret and
/// server-side OTP logging are permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Deployment environment
    pub environment: Environment,
    /// HMAC secret for signing session tokens. Required in production;
    /// development falls back to [`DEV_SECRET`] when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    /// Authentication and OTP settings
    pub auth: AuthConfig,
    /// Outbound email settings
    pub email: EmailConfig,
    /// Degraded-mode demo identity served when the account store is unreachable
    pub demo: DemoConfig,
}

/// Authentication, password and OTP policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// How long an issued OTP stays valid
    #[serde(with = "humantime_serde")]
    pub otp_ttl: Duration,
    /// Session token lifetime
    #[serde(with = "humantime_serde")]
    pub jwt_expiry: Duration,
    /// Password policy
    pub password: PasswordConfig,
    /// Super-admin account seeded at startup, if configured
    pub seed_admin: Option<SeedAdminConfig>,
}

/// Password requirements applied at signup and password change.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordConfig {
    pub min_length: usize,
    pub max_length: usize,
}

/// Initial super-admin credentials, usually supplied via environment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SeedAdminConfig {
    pub email: String,
    pub password: String,
}

/// Email delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
// Note: Cannot use deny_unknown_fields here due to #[serde(flatten)] on transport
pub struct EmailConfig {
    /// Email transport method
    #[serde(flatten)]
    pub transport: EmailTransportConfig,
    /// Sender email address
    pub from_email: String,
    /// Sender display name
    pub from_name: String,
    /// How long to wait for the transport before reporting delivery as uncertain
    #[serde(with = "humantime_serde")]
    pub send_timeout: Duration,
}

/// Email transport configuration - either SMTP or file-based for testing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmailTransportConfig {
    /// Send emails via SMTP server
    Smtp {
        /// SMTP server hostname
        host: String,
        /// SMTP server port
        port: u16,
        /// SMTP authentication username
        username: String,
        /// SMTP authentication password
        password: String,
        /// Use TLS encryption
        use_tls: bool,
    },
    /// Write emails to files (for development/testing)
    File {
        /// Directory path where email files will be written
        path: String,
    },
}

/// Fallback identity used when the account store is unreachable. Reads are
/// served from this profile, flagged as degraded; writes are accepted only
/// while `enabled` is true.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    pub enabled: bool,
    pub email: String,
    pub username: String,
    pub mobile: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: Environment::Development,
            secret_key: None,
            auth: AuthConfig::default(),
            email: EmailConfig::default(),
            demo: DemoConfig::default(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            otp_ttl: Duration::from_secs(10 * 60),
            jwt_expiry: Duration::from_secs(24 * 60 * 60),
            password: PasswordConfig::default(),
            seed_admin: None,
        }
    }
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            transport: EmailTransportConfig::default(),
            from_email: "no-reply@savora.app".to_string(),
            from_name: "Savora".to_string(),
            send_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for EmailTransportConfig {
    fn default() -> Self {
        EmailTransportConfig::File {
            path: "/tmp/savora-emails".to_string(),
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            email: "demo@savora.app".to_string(),
            username: "demo".to_string(),
            mobile: "0000000000".to_string(),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config
            .validate()
            .map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("SAVORA_").split("__"))
    }

    /// The effective token-signing secret. Production requires an explicit
    /// secret; development may run on the built-in dev secret.
    pub fn signing_secret(&self) -> &str {
        self.secret_key.as_deref().unwrap_or(DEV_SECRET)
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.is_production() {
            match self.secret_key.as_deref() {
                None => {
                    return Err(Error::Internal {
                        operation: "Config validation: running in production without a secret_key. \
                         Set SAVORA_SECRET_KEY or add secret_key to the config file."
                            .to_string(),
                    });
                }
                Some(DEV_SECRET) => {
                    return Err(Error::Internal {
                        operation:
                            "Config validation: the built-in development secret cannot be used in production."
                                .to_string(),
                    });
                }
                Some(_) => {}
            }
        }

        if self.auth.password.min_length > self.auth.password.max_length {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: Invalid password configuration: min_length ({}) cannot be greater than max_length ({})",
                    self.auth.password.min_length, self.auth.password.max_length
                ),
            });
        }

        if self.auth.otp_ttl.is_zero() {
            return Err(Error::Internal {
                operation: "Config validation: auth.otp_ttl must be non-zero".to_string(),
            });
        }

        if let Some(seed) = &self.auth.seed_admin {
            if !seed.email.contains('@') {
                return Err(Error::Internal {
                    operation: format!(
                        "Config validation: seed admin email '{}' is not a valid address",
                        seed.email
                    ),
                });
            }
            if seed.password.len() < self.auth.password.min_length {
                return Err(Error::Internal {
                    operation: "Config validation: seed admin password does not meet the password policy"
                        .to_string(),
                });
            }
        }

        if self.demo.enabled && !self.demo.email.contains('@') {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: demo email '{}' is not a valid address",
                    self.demo.email
                ),
            });
        }

        Ok(())
    }
}
