//! Store repository for admin grants.

use crate::store::{
    Store,
    errors::Result,
    models::admin_grants::AdminGrantRecord,
};
use crate::types::normalize_identifier;
use chrono::Utc;
use tracing::instrument;

pub struct AdminGrants<'s> {
    store: &'s Store,
}

impl<'s> AdminGrants<'s> {
    pub fn new(store: &'s Store) -> Self {
        Self { store }
    }

    /// Create or reactivate the grant for an email. Exactly one grant row
    /// exists per email; re-granting overwrites grantor and timestamp.
    #[instrument(skip(self, email, granted_by), err)]
    pub async fn upsert_active(&self, email: &str, granted_by: &str) -> Result<AdminGrantRecord> {
        self.store.ensure_available()?;
        let email = normalize_identifier(email);
        let record = AdminGrantRecord {
            email: email.clone(),
            granted_by: granted_by.to_string(),
            granted_at: Utc::now(),
            is_active: true,
        };
        let mut table = self.store.grants_table().write().await;
        table.insert(email, record.clone());
        Ok(record)
    }

    #[instrument(skip(self, email), err)]
    pub async fn get(&self, email: &str) -> Result<Option<AdminGrantRecord>> {
        self.store.ensure_available()?;
        let table = self.store.grants_table().read().await;
        Ok(table.get(&normalize_identifier(email)).cloned())
    }

    /// Whether an active grant exists for the email.
    pub async fn is_active(&self, email: &str) -> Result<bool> {
        Ok(self.get(email).await?.is_some_and(|g| g.is_active))
    }

    /// Deactivate the grant, keeping the row for the audit trail.
    /// Returns false if no grant exists for the email.
    #[instrument(skip(self, email), err)]
    pub async fn deactivate(&self, email: &str) -> Result<bool> {
        self.store.ensure_available()?;
        let mut table = self.store.grants_table().write().await;
        match table.get_mut(&normalize_identifier(email)) {
            Some(grant) => {
                grant.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[instrument(skip(self), err)]
    pub async fn list(&self) -> Result<Vec<AdminGrantRecord>> {
        self.store.ensure_available()?;
        let table = self.store.grants_table().read().await;
        let mut grants: Vec<AdminGrantRecord> = table.values().cloned().collect();
        grants.sort_by_key(|g| g.granted_at);
        Ok(grants)
    }
}
