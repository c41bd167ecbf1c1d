//! Conflict resolution for duplicate and partially-completed signups.
//!
//! A signup can stall after the account row is written but before the email
//! is verified. The resolver answers two questions about a contested
//! email/username pair: is there a verified holder the user should log in
//! as, and if not, can the unverified leftovers be cleared so signup can be
//! retried.
//!
//! Verified accounts are never deleted here under any circumstances.

use tokio::sync::OwnedMutexGuard;
use tracing::instrument;

use crate::errors::Result;
use crate::store::Store;
use crate::store::handlers::Accounts;
use crate::store::models::accounts::AccountRecord;
use crate::types::normalize_identifier;

/// What the resolver concluded about a contested identifier pair.
#[derive(Debug)]
pub enum Resolution {
    /// A verified account already holds one of the identifiers; the user
    /// should log in rather than sign up again
    VerifiedAccountExists(Box<AccountRecord>),
    /// Unverified partial accounts were removed; signup can be retried
    ClearedUnverified { removed: usize },
    /// Nothing matched either identifier; there is no automatic fix and
    /// support has to look at the stuck signup by hand
    ManualIntervention,
}

pub struct ConflictResolver<'s> {
    store: &'s Store,
}

impl<'s> ConflictResolver<'s> {
    pub fn new(store: &'s Store) -> Self {
        Self { store }
    }

    /// Lock both identifiers in sorted order so concurrent resolutions and
    /// signups over the same pair cannot deadlock or interleave.
    async fn lock_pair(&self, email: &str, username: &str) -> Vec<OwnedMutexGuard<()>> {
        let mut keys = vec![normalize_identifier(email), normalize_identifier(username)];
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in &keys {
            guards.push(self.store.identifier_lock(key).await);
        }
        guards
    }

    /// Look for a verified holder of either identifier.
    #[instrument(skip(self), err)]
    pub async fn find_verified(&self, email: &str, username: &str) -> Result<Option<AccountRecord>> {
        let _guards = self.lock_pair(email, username).await;
        Ok(Accounts::new(self.store).find_verified_matching(email, username).await?)
    }

    /// Clear unverified partial accounts matching either identifier.
    ///
    /// Refuses to clear while a verified holder exists, reporting the
    /// verified account instead, so a stale client cannot delete its way
    /// past a legitimate owner.
    #[instrument(skip(self), err)]
    pub async fn clear_unverified(&self, email: &str, username: &str) -> Result<Resolution> {
        let _guards = self.lock_pair(email, username).await;

        let accounts = Accounts::new(self.store);
        if let Some(verified) = accounts.find_verified_matching(email, username).await? {
            return Ok(Resolution::VerifiedAccountExists(Box::new(verified)));
        }

        let removed = accounts.delete_unverified_matching(email, username).await?;
        if removed == 0 {
            return Ok(Resolution::ManualIntervention);
        }
        tracing::info!(removed, "cleared unverified partial accounts");
        Ok(Resolution::ClearedUnverified { removed })
    }

    /// Fuzzy inspection for support tooling. Substring match in both
    /// directions, redaction is the caller's responsibility.
    #[instrument(skip(self), err)]
    pub async fn inspect(&self, email: &str, username: &str) -> Result<Vec<AccountRecord>> {
        Ok(Accounts::new(self.store).find_fuzzy(email, username).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::accounts::Role;
    use crate::store::handlers::Repository;
    use crate::store::models::accounts::AccountCreateRequest;

    async fn seed(store: &Store, username: &str, email: &str, verified: bool) -> AccountRecord {
        let accounts = Accounts::new(store);
        let record = accounts
            .create(&AccountCreateRequest {
                username: username.to_string(),
                email: email.to_string(),
                password_hash: "hash".to_string(),
                mobile: "5550001111".to_string(),
                is_verified: false,
                role: Role::User,
            })
            .await
            .unwrap();
        if verified {
            accounts.update_verification(record.id, true).await.unwrap()
        } else {
            record
        }
    }

    #[tokio::test]
    async fn test_finds_verified_holder_by_either_identifier() {
        let store = Store::new();
        seed(&store, "taken", "holder@example.com", true).await;

        let resolver = ConflictResolver::new(&store);
        let hit = resolver
            .find_verified("other@example.com", "taken")
            .await
            .unwrap()
            .expect("should match on username");
        assert_eq!(hit.email, "holder@example.com");
    }

    #[tokio::test]
    async fn test_clear_removes_only_unverified() {
        let store = Store::new();
        seed(&store, "stuck", "stuck@example.com", false).await;

        let resolver = ConflictResolver::new(&store);
        let resolution = resolver.clear_unverified("stuck@example.com", "stuck").await.unwrap();
        assert!(matches!(resolution, Resolution::ClearedUnverified { removed: 1 }));

        // Cleared, signup can proceed
        assert!(
            Accounts::new(&store)
                .find_by_identifier("stuck@example.com")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_clear_refuses_when_verified_holder_exists() {
        let store = Store::new();
        let verified = seed(&store, "owner", "owner@example.com", true).await;

        let resolver = ConflictResolver::new(&store);
        let resolution = resolver.clear_unverified("owner@example.com", "owner").await.unwrap();
        match resolution {
            Resolution::VerifiedAccountExists(account) => assert_eq!(account.id, verified.id),
            other => panic!("expected verified holder, got {other:?}"),
        }

        // The verified account survived
        assert!(
            Accounts::new(&store)
                .find_by_identifier("owner@example.com")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_clear_with_no_matches_needs_manual_intervention() {
        let store = Store::new();
        let resolver = ConflictResolver::new(&store);
        let resolution = resolver.clear_unverified("ghost@example.com", "ghost").await.unwrap();
        assert!(matches!(resolution, Resolution::ManualIntervention));
    }

    #[tokio::test]
    async fn test_identical_identifiers_do_not_deadlock() {
        let store = Store::new();
        let resolver = ConflictResolver::new(&store);
        // email == username after normalization; lock_pair must dedup
        let resolution = resolver.clear_unverified("same", "SAME").await.unwrap();
        assert!(matches!(resolution, Resolution::ManualIntervention));
    }
}
