//! Abstract keyed repository backing the account service.
//!
//! Persistence for this service is an abstract keyed store; the engine here
//! is an in-process concurrent map guarded by async locks.
//! Everything above it goes through the repository handlers in [`handlers`],
//! which keep the same shape they would have against an external database:
//! typed create/update requests in [`models`], a [`StoreError`] taxonomy the
//! rest of the app can match on, and `Unavailable` as the one transport
//! failure mode (used by [`fallback`] to switch into degraded mode).
//!
//! Concurrency guarantees:
//!
//! - `Accounts::create` performs its uniqueness check and insert under a
//!   single writer section, so two racing signups for the same normalized
//!   email end with exactly one row and one `Conflict`.
//! - OTP issue is an atomic replace; a prior challenge for the email cannot
//!   survive next to the new one.
//! - Multi-step sequences (signup's check-then-create, the conflict
//!   resolver's check-verified-else-delete) additionally serialize on
//!   [`Store::identifier_lock`], a per-normalized-email mutex registry.

pub mod errors;
pub mod fallback;
pub mod handlers;
pub mod models;

pub use errors::{Result, StoreError};

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::types::{AccountId, RequestId};
use models::{
    accounts::AccountRecord, admin_grants::AdminGrantRecord, admin_requests::AdminRequestRecord,
    otp_challenges::OtpChallengeRecord,
};

/// Registry size past which idle identifier locks are swept on acquire.
const LOCK_SWEEP_THRESHOLD: usize = 64;

/// Cheaply cloneable handle to the account store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

struct Inner {
    accounts: RwLock<HashMap<AccountId, AccountRecord>>,
    challenges: RwLock<HashMap<String, OtpChallengeRecord>>,
    grants: RwLock<HashMap<String, AdminGrantRecord>>,
    requests: RwLock<HashMap<RequestId, AdminRequestRecord>>,
    identifier_locks: DashMap<String, Arc<Mutex<()>>>,
    available: AtomicBool,
}

impl Store {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                accounts: RwLock::new(HashMap::new()),
                challenges: RwLock::new(HashMap::new()),
                grants: RwLock::new(HashMap::new()),
                requests: RwLock::new(HashMap::new()),
                identifier_locks: DashMap::new(),
                available: AtomicBool::new(true),
            }),
        }
    }

    /// Simulate store transport health. While unavailable, every repository
    /// operation fails with [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    pub(crate) fn ensure_available(&self) -> Result<()> {
        if self.inner.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable {
                reason: "account store is unreachable".to_string(),
            })
        }
    }

    /// Acquire the per-identifier mutex for a normalized email/username.
    ///
    /// Multi-step sequences keyed on one identifier (existence check followed
    /// by create, or check-verified followed by delete-unverified) must hold
    /// this guard across both steps.
    ///
    /// The registry only tracks contended identifiers: once it grows past
    /// [`LOCK_SWEEP_THRESHOLD`] keys, entries nobody holds are swept before
    /// the new lock is registered.
    pub async fn identifier_lock(&self, normalized: &str) -> OwnedMutexGuard<()> {
        let locks = &self.inner.identifier_locks;
        if locks.len() > LOCK_SWEEP_THRESHOLD {
            // Strong count 1 means only the registry holds the mutex; no
            // guard is out and no task is waiting on it
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        let lock = {
            let entry = locks.entry(normalized.to_string()).or_default();
            entry.value().clone()
        };
        lock.lock_owned().await
    }

    pub(crate) fn accounts_table(&self) -> &RwLock<HashMap<AccountId, AccountRecord>> {
        &self.inner.accounts
    }

    pub(crate) fn challenges_table(&self) -> &RwLock<HashMap<String, OtpChallengeRecord>> {
        &self.inner.challenges
    }

    pub(crate) fn grants_table(&self) -> &RwLock<HashMap<String, AdminGrantRecord>> {
        &self.inner.grants
    }

    pub(crate) fn requests_table(&self) -> &RwLock<HashMap<RequestId, AdminRequestRecord>> {
        &self.inner.requests
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_store_rejects_operations() {
        let store = Store::new();
        assert!(store.ensure_available().is_ok());

        store.set_available(false);
        let err = store.ensure_available().unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { .. }));

        store.set_available(true);
        assert!(store.ensure_available().is_ok());
    }

    #[tokio::test]
    async fn test_identifier_lock_serializes_same_key() {
        let store = Store::new();
        let guard = store.identifier_lock("ana@x.com").await;

        // A different identifier is not blocked.
        let _other = store.identifier_lock("bob@x.com").await;

        // The same identifier is blocked until the guard drops.
        let store2 = store.clone();
        let contended = tokio::spawn(async move {
            let _g = store2.identifier_lock("ana@x.com").await;
        });
        tokio::task::yield_now().await;
        assert!(!contended.is_finished());

        drop(guard);
        contended.await.unwrap();
    }

    #[tokio::test]
    async fn test_idle_identifier_locks_are_swept() {
        let store = Store::new();
        for i in 0..200 {
            let guard = store.identifier_lock(&format!("user{i}@example.com")).await;
            drop(guard);
        }

        // A held lock must survive the sweep
        let _held = store.identifier_lock("held@example.com").await;
        let _fresh = store.identifier_lock("fresh@example.com").await;

        let len = store.inner.identifier_locks.len();
        assert!(len <= LOCK_SWEEP_THRESHOLD + 2, "registry grew unbounded: {len} entries");
        assert!(store.inner.identifier_locks.contains_key("held@example.com"));
    }
}
