//! Two-tier account reads with a degraded-mode fallback identity.
//!
//! When the primary store is unreachable, the app keeps serving identity
//! reads from a small fixed demo record instead of failing the request.
//! The fallback fires only on [`StoreError::Unavailable`] - a plain miss is
//! still a miss - and every response that came from the fallback is marked
//! `degraded` so it can never be mistaken for a real store read.

use std::sync::Arc;

use crate::api::models::accounts::Role;
use crate::config::DemoConfig;
use crate::store::{
    Store,
    errors::{Result, StoreError},
    handlers::{Accounts, Repository},
    models::accounts::AccountRecord,
};
use crate::types::{AccountId, normalize_identifier};
use chrono::Utc;
use uuid::Uuid;

/// The fixed identity served while the primary store is down.
#[derive(Debug, Clone)]
pub struct FallbackIdentity {
    pub account: AccountRecord,
}

impl FallbackIdentity {
    pub fn from_config(demo: &DemoConfig) -> Self {
        let now = Utc::now();
        Self {
            account: AccountRecord {
                id: Uuid::new_v4(),
                username: normalize_identifier(&demo.username),
                email: normalize_identifier(&demo.email),
                // Never a usable credential; degraded mode does not verify
                // passwords against the fallback identity.
                password_hash: String::new(),
                mobile: demo.mobile.clone(),
                is_verified: true,
                role: Role::User,
                created_at: now,
                updated_at: now,
            },
        }
    }

    /// The fallback record presented as the caller's own account, so a
    /// degraded response still carries the id the client authenticated with.
    pub fn account_for(&self, id: AccountId) -> AccountRecord {
        let mut account = self.account.clone();
        account.id = id;
        account
    }
}

/// A value plus whether it was served from the fallback tier.
#[derive(Debug, Clone)]
pub struct Degraded<T> {
    pub value: T,
    pub degraded: bool,
}

impl<T> Degraded<T> {
    fn primary(value: T) -> Self {
        Self { value, degraded: false }
    }

    fn fallback(value: T) -> Self {
        Self { value, degraded: true }
    }
}

/// Account reads that try the primary store first and substitute the
/// fallback identity on transport failure only.
pub struct TieredAccounts<'s> {
    primary: Accounts<'s>,
    fallback: Option<Arc<FallbackIdentity>>,
}

impl<'s> TieredAccounts<'s> {
    pub fn new(store: &'s Store, fallback: Option<Arc<FallbackIdentity>>) -> Self {
        Self {
            primary: Accounts::new(store),
            fallback,
        }
    }

    pub async fn get_by_id(&self, id: AccountId) -> Result<Degraded<Option<AccountRecord>>> {
        match self.primary.get_by_id(id).await {
            Ok(found) => Ok(Degraded::primary(found)),
            Err(StoreError::Unavailable { .. }) if self.fallback.is_some() => {
                let identity = self.fallback.as_ref().unwrap();
                Ok(Degraded::fallback(Some(identity.account_for(id))))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn find_by_identifier(&self, identifier: &str) -> Result<Degraded<Option<AccountRecord>>> {
        match self.primary.find_by_identifier(identifier).await {
            Ok(found) => Ok(Degraded::primary(found)),
            Err(StoreError::Unavailable { .. }) if self.fallback.is_some() => {
                let identity = self.fallback.as_ref().unwrap();
                let needle = normalize_identifier(identifier);
                let hit = (identity.account.email == needle || identity.account.username == needle)
                    .then(|| identity.account.clone());
                Ok(Degraded::fallback(hit))
            }
            Err(e) => Err(e),
        }
    }
}
