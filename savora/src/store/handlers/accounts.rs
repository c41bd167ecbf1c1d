//! Store repository for accounts.

use crate::types::{AccountId, abbrev_uuid, normalize_identifier};
use crate::{
    api::models::accounts::Role,
    store::{
        Store,
        errors::{Result, StoreError},
        handlers::repository::Repository,
        models::accounts::{AccountCreateRequest, AccountProfileUpdate, AccountRecord},
    },
};
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing accounts
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    pub verified: Option<bool>,
    pub role: Option<Role>,
}

pub struct Accounts<'s> {
    store: &'s Store,
}

impl<'s> Accounts<'s> {
    pub fn new(store: &'s Store) -> Self {
        Self { store }
    }

    /// Look up an account whose normalized email or username equals the
    /// given identifier.
    #[instrument(skip(self, identifier), err)]
    pub async fn find_by_identifier(&self, identifier: &str) -> Result<Option<AccountRecord>> {
        self.store.ensure_available()?;
        let needle = normalize_identifier(identifier);
        let table = self.store.accounts_table().read().await;
        Ok(table
            .values()
            .find(|a| a.email == needle || a.username == needle)
            .cloned())
    }

    /// Look up a verified account matching either the email or the username.
    #[instrument(skip_all, err)]
    pub async fn find_verified_matching(&self, email: &str, username: &str) -> Result<Option<AccountRecord>> {
        self.store.ensure_available()?;
        let email = normalize_identifier(email);
        let username = normalize_identifier(username);
        let table = self.store.accounts_table().read().await;
        Ok(table
            .values()
            .find(|a| a.is_verified && (a.email == email || a.username == username || a.email == username || a.username == email))
            .cloned())
    }

    /// Delete every strictly-unverified account matching the email or the
    /// username and return how many were removed. Verified accounts are never
    /// eligible.
    #[instrument(skip_all, err)]
    pub async fn delete_unverified_matching(&self, email: &str, username: &str) -> Result<usize> {
        self.store.ensure_available()?;
        let email = normalize_identifier(email);
        let username = normalize_identifier(username);
        let mut table = self.store.accounts_table().write().await;
        let doomed: Vec<AccountId> = table
            .values()
            .filter(|a| !a.is_verified && (a.email == email || a.username == username || a.email == username || a.username == email))
            .map(|a| a.id)
            .collect();
        for id in &doomed {
            table.remove(id);
        }
        Ok(doomed.len())
    }

    /// Bidirectional case-insensitive substring match on email and username,
    /// used by the conflict diagnostic to suggest likely-intended accounts.
    #[instrument(skip_all, err)]
    pub async fn find_fuzzy(&self, email: &str, username: &str) -> Result<Vec<AccountRecord>> {
        self.store.ensure_available()?;
        let email = normalize_identifier(email);
        let username = normalize_identifier(username);
        let contains_either_way = |field: &str, input: &str| {
            !input.is_empty() && (field.contains(input) || input.contains(field))
        };
        let table = self.store.accounts_table().read().await;
        let mut matches: Vec<AccountRecord> = table
            .values()
            .filter(|a| {
                contains_either_way(&a.email, &email)
                    || contains_either_way(&a.username, &username)
                    || contains_either_way(&a.email, &username)
                    || contains_either_way(&a.username, &email)
            })
            .cloned()
            .collect();
        matches.sort_by_key(|a| a.created_at);
        Ok(matches)
    }

    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&id)), err)]
    pub async fn update_verification(&self, id: AccountId, verified: bool) -> Result<AccountRecord> {
        self.store.ensure_available()?;
        let mut table = self.store.accounts_table().write().await;
        let account = table.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.is_verified = verified;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    #[instrument(skip(self, hash), fields(account_id = %abbrev_uuid(&id)), err)]
    pub async fn update_password(&self, id: AccountId, hash: &str) -> Result<AccountRecord> {
        self.store.ensure_available()?;
        let mut table = self.store.accounts_table().write().await;
        let account = table.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.password_hash = hash.to_string();
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&id)), err)]
    pub async fn update_role(&self, id: AccountId, role: Role) -> Result<AccountRecord> {
        self.store.ensure_available()?;
        let mut table = self.store.accounts_table().write().await;
        let account = table.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.role = role;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    /// Uniqueness check shared by create and username updates. Caller must
    /// hold the table write lock; `exclude` skips the account being updated.
    fn check_taken(
        table: &std::collections::HashMap<AccountId, AccountRecord>,
        email: &str,
        username: &str,
        exclude: Option<AccountId>,
    ) -> Result<()> {
        for existing in table.values() {
            if Some(existing.id) == exclude {
                continue;
            }
            if existing.email == email {
                return Err(StoreError::Conflict {
                    field: "email",
                    value: email.to_string(),
                    verified_holder: existing.is_verified,
                });
            }
            if existing.username == username {
                return Err(StoreError::Conflict {
                    field: "username",
                    value: username.to_string(),
                    verified_holder: existing.is_verified,
                });
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Repository for Accounts<'_> {
    type CreateRequest = AccountCreateRequest;
    type UpdateRequest = AccountProfileUpdate;
    type Response = AccountRecord;
    type Id = AccountId;
    type Filter = AccountFilter;

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        self.store.ensure_available()?;
        let email = normalize_identifier(&request.email);
        let username = normalize_identifier(&request.username);

        // Check and insert under one writer section so a signup race cannot
        // produce two rows for the same normalized identifier.
        let mut table = self.store.accounts_table().write().await;
        Self::check_taken(&table, &email, &username, None)?;

        let now = Utc::now();
        let account = AccountRecord {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash: request.password_hash.clone(),
            mobile: request.mobile.clone(),
            is_verified: request.is_verified,
            role: request.role,
            created_at: now,
            updated_at: now,
        };
        table.insert(account.id, account.clone());
        Ok(account)
    }

    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        self.store.ensure_available()?;
        let table = self.store.accounts_table().read().await;
        Ok(table.get(&id).cloned())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        self.store.ensure_available()?;
        let table = self.store.accounts_table().read().await;
        let mut accounts: Vec<AccountRecord> = table
            .values()
            .filter(|a| filter.verified.is_none_or(|v| a.is_verified == v))
            .filter(|a| filter.role.is_none_or(|r| a.role == r))
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.created_at);
        Ok(accounts)
    }

    #[instrument(skip(self, request), fields(account_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        self.store.ensure_available()?;
        let mut table = self.store.accounts_table().write().await;

        // Username changes must re-check uniqueness before touching the row.
        if let Some(new_username) = &request.username {
            let current_email = table.get(&id).ok_or(StoreError::NotFound)?.email.clone();
            let username = normalize_identifier(new_username);
            Self::check_taken(&table, &current_email, &username, Some(id))?;
        }

        let account = table.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(username) = &request.username {
            account.username = normalize_identifier(username);
        }
        if let Some(mobile) = &request.mobile {
            account.mobile = mobile.clone();
        }
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    #[instrument(skip(self), fields(account_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        self.store.ensure_available()?;
        let mut table = self.store.accounts_table().write().await;
        Ok(table.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request(username: &str, email: &str) -> AccountCreateRequest {
        AccountCreateRequest {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$fake".to_string(),
            mobile: "9998887777".to_string(),
            is_verified: false,
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn test_create_normalizes_identifiers() {
        let store = Store::new();
        let repo = Accounts::new(&store);

        let account = repo.create(&create_request("Ana", "Ana@X.com")).await.unwrap();
        assert_eq!(account.email, "ana@x.com");
        assert_eq!(account.username, "ana");
        assert!(!account.is_verified);

        let found = repo.find_by_identifier("ANA@x.COM").await.unwrap();
        assert_eq!(found.unwrap().id, account.id);
    }

    #[tokio::test]
    async fn test_create_conflicts_on_either_field() {
        let store = Store::new();
        let repo = Accounts::new(&store);
        repo.create(&create_request("ana", "ana@x.com")).await.unwrap();

        let err = repo.create(&create_request("other", "ANA@X.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { field: "email", .. }));

        let err = repo.create(&create_request("ana", "fresh@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { field: "username", .. }));
    }

    #[tokio::test]
    async fn test_concurrent_creates_single_winner() {
        let store = Store::new();
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let repo = Accounts::new(&store);
                repo.create(&create_request(&format!("user{i}"), "race@x.com")).await
            }));
        }
        let mut created = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(StoreError::Conflict { .. }) => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(conflicts, 7);

        let repo = Accounts::new(&store);
        let all = repo.list(&AccountFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_unverified_matching_spares_verified() {
        let store = Store::new();
        let repo = Accounts::new(&store);
        let ghost = repo.create(&create_request("ghost", "ghost@x.com")).await.unwrap();
        let kept = repo.create(&create_request("kept", "kept@x.com")).await.unwrap();
        repo.update_verification(kept.id, true).await.unwrap();

        let removed = repo.delete_unverified_matching("ghost@x.com", "anything").await.unwrap();
        assert_eq!(removed, 1);
        assert!(repo.get_by_id(ghost.id).await.unwrap().is_none());

        let removed = repo.delete_unverified_matching("kept@x.com", "kept").await.unwrap();
        assert_eq!(removed, 0);
        assert!(repo.get_by_id(kept.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_find_fuzzy_matches_both_directions() {
        let store = Store::new();
        let repo = Accounts::new(&store);
        repo.create(&create_request("foodfan42", "foodfan@mail.com")).await.unwrap();
        repo.create(&create_request("unrelated", "zzz@mail.com")).await.unwrap();

        // Input contained in stored field.
        let hits = repo.find_fuzzy("foodfan", "").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].username, "foodfan42");

        // Stored field contained in (mistyped, longer) input.
        let hits = repo.find_fuzzy("", "foodfan42x").await.unwrap();
        assert_eq!(hits.len(), 1);

        // Empty inputs match nothing rather than everything.
        let hits = repo.find_fuzzy("", "").await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_update_rejects_taken_username() {
        let store = Store::new();
        let repo = Accounts::new(&store);
        repo.create(&create_request("first", "first@x.com")).await.unwrap();
        let second = repo.create(&create_request("second", "second@x.com")).await.unwrap();

        let update = AccountProfileUpdate {
            username: Some("First".to_string()),
            mobile: None,
        };
        let err = repo.update(second.id, &update).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { field: "username", .. }));
    }

    #[tokio::test]
    async fn test_unavailable_store_surfaces_transport_error() {
        let store = Store::new();
        let repo = Accounts::new(&store);
        store.set_available(false);

        let err = repo.find_by_identifier("ana@x.com").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { .. }));
    }
}
