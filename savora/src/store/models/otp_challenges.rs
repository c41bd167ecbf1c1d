//! Store models for OTP challenges.

use chrono::{DateTime, Utc};

/// One-time passcode challenge bound to a normalized email address.
///
/// At most one challenge exists per email in the store; issuing a new one
/// replaces the prior row wholesale, which is what invalidates it.
#[derive(Debug, Clone)]
pub struct OtpChallengeRecord {
    pub email: String,
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
}

impl OtpChallengeRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Outcome of an atomic consume attempt, in the order the checks are applied.
///
/// Expiry is checked before code match: a correct code on an expired
/// challenge reports `Expired`, not `Invalid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Consumed,
    NotFound,
    AlreadyConsumed,
    Expired,
    Invalid,
}
