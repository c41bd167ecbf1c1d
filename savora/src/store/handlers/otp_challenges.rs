//! Store repository for OTP challenges.
//!
//! Challenges are keyed by normalized email, so the "at most one active
//! challenge per email" invariant is structural: replacing the row is what
//! invalidates the prior challenge, and both happen in one write.

use crate::store::{
    Store,
    errors::Result,
    models::otp_challenges::{ConsumeOutcome, OtpChallengeRecord},
};
use crate::types::normalize_identifier;
use chrono::{DateTime, Utc};
use tracing::instrument;

pub struct OtpChallenges<'s> {
    store: &'s Store,
}

impl<'s> OtpChallenges<'s> {
    pub fn new(store: &'s Store) -> Self {
        Self { store }
    }

    /// Atomically replace any prior challenge for the email with a new one.
    #[instrument(skip(self, record), fields(email = %record.email), err)]
    pub async fn replace(&self, record: OtpChallengeRecord) -> Result<()> {
        self.store.ensure_available()?;
        let mut table = self.store.challenges_table().write().await;
        table.insert(record.email.clone(), record);
        Ok(())
    }

    #[instrument(skip(self, email), err)]
    pub async fn current(&self, email: &str) -> Result<Option<OtpChallengeRecord>> {
        self.store.ensure_available()?;
        let table = self.store.challenges_table().read().await;
        Ok(table.get(&normalize_identifier(email)).cloned())
    }

    /// Atomically attempt to consume the challenge for an email.
    ///
    /// Decision order is part of the contract: missing challenge, then
    /// already consumed, then expired (before the code is even compared),
    /// then code mismatch. Only `Consumed` mutates the row.
    #[instrument(skip(self, email, code), err)]
    pub async fn consume(&self, email: &str, code: &str, now: DateTime<Utc>) -> Result<ConsumeOutcome> {
        self.store.ensure_available()?;
        let mut table = self.store.challenges_table().write().await;
        let Some(challenge) = table.get_mut(&normalize_identifier(email)) else {
            return Ok(ConsumeOutcome::NotFound);
        };
        if challenge.consumed {
            return Ok(ConsumeOutcome::AlreadyConsumed);
        }
        if challenge.is_expired(now) {
            return Ok(ConsumeOutcome::Expired);
        }
        if challenge.code != code {
            return Ok(ConsumeOutcome::Invalid);
        }
        challenge.consumed = true;
        Ok(ConsumeOutcome::Consumed)
    }
}
