//! One-time passcode issuance and verification.
//!
//! Codes are always six decimal digits, zero-padded. Issuing a new code for
//! an email replaces any outstanding one atomically, so at most one code is
//! live per address at any time.

use chrono::Utc;
use rand::prelude::RngExt;
use rand::rng;
use std::time::Duration;

use crate::errors::Result;
use crate::store::Store;
use crate::store::handlers::{Accounts, OtpChallenges};
use crate::store::models::accounts::AccountRecord;
use crate::store::models::otp_challenges::{ConsumeOutcome, OtpChallengeRecord};
use crate::types::normalize_identifier;

/// Why a verification attempt failed. Carries both a human message and a
/// machine-readable reason code for the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpFailure {
    NotFound,
    AlreadyUsed,
    Expired,
    Invalid,
}

impl OtpFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            OtpFailure::NotFound => "not_found",
            OtpFailure::AlreadyUsed => "already_used",
            OtpFailure::Expired => "expired",
            OtpFailure::Invalid => "invalid",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            OtpFailure::NotFound => "no verification code is pending for this email",
            OtpFailure::AlreadyUsed => "this verification code has already been used",
            OtpFailure::Expired => "this verification code has expired, request a new one",
            OtpFailure::Invalid => "incorrect verification code",
        }
    }
}

/// Generate a six-digit code. Zero-padded, so "004217" is a valid code.
pub fn generate_code() -> String {
    let n: u32 = rng().random_range(0..1_000_000);
    format!("{n:06}")
}

pub struct OtpManager<'s> {
    store: &'s Store,
    ttl: Duration,
}

impl<'s> OtpManager<'s> {
    pub fn new(store: &'s Store, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Issue a fresh code for `email`, invalidating any outstanding one.
    /// Returns the stored challenge so the caller can mail the code.
    #[tracing::instrument(skip(self), err)]
    pub async fn issue(&self, email: &str) -> Result<OtpChallengeRecord> {
        let now = Utc::now();
        let record = OtpChallengeRecord {
            email: normalize_identifier(email),
            code: generate_code(),
            issued_at: now,
            expires_at: now + self.ttl,
            consumed: false,
        };

        OtpChallenges::new(self.store).replace(record.clone()).await?;
        tracing::debug!(email = %record.email, expires_at = %record.expires_at, "issued OTP challenge");
        Ok(record)
    }

    /// Attempt to consume the outstanding code for `email` and, on success,
    /// mark the account verified. The inner `Err` reports why a well-formed
    /// attempt failed; the outer `Err` is a transport or store error.
    #[tracing::instrument(skip(self, code), err)]
    pub async fn verify(&self, email: &str, code: &str) -> Result<std::result::Result<AccountRecord, OtpFailure>> {
        let outcome = OtpChallenges::new(self.store)
            .consume(email, code, Utc::now())
            .await?;

        let failure = match outcome {
            ConsumeOutcome::Consumed => {
                let accounts = Accounts::new(self.store);
                let Some(account) = accounts.find_by_identifier(email).await? else {
                    // Challenge existed but the account is gone: treat as an
                    // unknown email rather than a server fault.
                    return Ok(Err(OtpFailure::NotFound));
                };
                let updated = accounts.update_verification(account.id, true).await?;
                tracing::info!(email = %updated.email, "account verified");
                return Ok(Ok(updated));
            }
            ConsumeOutcome::NotFound => OtpFailure::NotFound,
            ConsumeOutcome::AlreadyConsumed => OtpFailure::AlreadyUsed,
            ConsumeOutcome::Expired => OtpFailure::Expired,
            ConsumeOutcome::Invalid => OtpFailure::Invalid,
        };

        Ok(Err(failure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::accounts::Role;
    use crate::store::handlers::Repository;
    use crate::store::models::accounts::AccountCreateRequest;

    fn code_is_six_digits(code: &str) -> bool {
        code.len() == 6 && code.chars().all(|c| c.is_ascii_digit())
    }

    #[test]
    fn test_generated_codes_are_six_digits() {
        for _ in 0..64 {
            assert!(code_is_six_digits(&generate_code()));
        }
    }

    async fn seed_account(store: &Store, email: &str) {
        Accounts::new(store)
            .create(&AccountCreateRequest {
                username: "otpuser".to_string(),
                email: email.to_string(),
                password_hash: "hash".to_string(),
                mobile: "5550001111".to_string(),
                is_verified: false,
                role: Role::User,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_issue_then_verify_marks_account() {
        let store = Store::new();
        seed_account(&store, "v@example.com").await;

        let manager = OtpManager::new(&store, Duration::from_secs(600));
        let challenge = manager.issue("V@Example.com").await.unwrap();
        assert!(code_is_six_digits(&challenge.code));
        assert_eq!(challenge.email, "v@example.com");

        let account = manager
            .verify("v@example.com", &challenge.code)
            .await
            .unwrap()
            .expect("verification should succeed");
        assert!(account.is_verified);
    }

    #[tokio::test]
    async fn test_reissue_invalidates_previous_code() {
        let store = Store::new();
        seed_account(&store, "r@example.com").await;

        let manager = OtpManager::new(&store, Duration::from_secs(600));
        let first = manager.issue("r@example.com").await.unwrap();
        let second = manager.issue("r@example.com").await.unwrap();

        if first.code != second.code {
            let result = manager.verify("r@example.com", &first.code).await.unwrap();
            assert_eq!(result.unwrap_err(), OtpFailure::Invalid);
        }

        let result = manager.verify("r@example.com", &second.code).await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_verify_without_challenge_reports_not_found() {
        let store = Store::new();
        let manager = OtpManager::new(&store, Duration::from_secs(600));

        let result = manager.verify("nobody@example.com", "123456").await.unwrap();
        assert_eq!(result.unwrap_err(), OtpFailure::NotFound);
    }

    #[tokio::test]
    async fn test_expired_code_reports_expired_even_when_correct() {
        let store = Store::new();
        seed_account(&store, "x@example.com").await;

        let manager = OtpManager::new(&store, Duration::from_secs(0));
        let challenge = manager.issue("x@example.com").await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let result = manager.verify("x@example.com", &challenge.code).await.unwrap();
        assert_eq!(result.unwrap_err(), OtpFailure::Expired);
    }

    #[tokio::test]
    async fn test_code_single_use() {
        let store = Store::new();
        seed_account(&store, "s@example.com").await;

        let manager = OtpManager::new(&store, Duration::from_secs(600));
        let challenge = manager.issue("s@example.com").await.unwrap();

        assert!(manager.verify("s@example.com", &challenge.code).await.unwrap().is_ok());
        let again = manager.verify("s@example.com", &challenge.code).await.unwrap();
        assert_eq!(again.unwrap_err(), OtpFailure::AlreadyUsed);
    }
}
