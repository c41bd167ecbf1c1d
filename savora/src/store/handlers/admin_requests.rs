//! Store repository for admin elevation requests.

use crate::types::{RequestId, abbrev_uuid, normalize_identifier};
use crate::store::{
    Store,
    errors::{Result, StoreError},
    handlers::repository::Repository,
    models::admin_requests::{AdminRequestCreateRequest, AdminRequestRecord, RequestStatus},
};
use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing requests
#[derive(Debug, Clone, Default)]
pub struct AdminRequestFilter {
    pub status: Option<RequestStatus>,
}

/// Decision applied to a pending request
#[derive(Debug, Clone)]
pub struct AdminRequestDecision {
    pub status: RequestStatus,
    pub decided_by: String,
}

pub struct AdminRequests<'s> {
    store: &'s Store,
}

impl<'s> AdminRequests<'s> {
    pub fn new(store: &'s Store) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Repository for AdminRequests<'_> {
    type CreateRequest = AdminRequestCreateRequest;
    type UpdateRequest = AdminRequestDecision;
    type Response = AdminRequestRecord;
    type Id = RequestId;
    type Filter = AdminRequestFilter;

    #[instrument(skip(self, request), fields(email = %request.email), err)]
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response> {
        self.store.ensure_available()?;
        let email = normalize_identifier(&request.email);
        let mut table = self.store.requests_table().write().await;

        // One pending request per email at a time.
        if table
            .values()
            .any(|r| r.email == email && r.status == RequestStatus::Pending)
        {
            return Err(StoreError::Conflict {
                field: "email",
                value: email,
                verified_holder: false,
            });
        }

        let record = AdminRequestRecord {
            id: Uuid::new_v4(),
            requester_name: request.requester_name.clone(),
            email,
            department: request.department.clone(),
            employee_id: request.employee_id.clone(),
            reason: request.reason.clone(),
            status: RequestStatus::Pending,
            approved_by: None,
            approved_at: None,
            created_at: Utc::now(),
        };
        table.insert(record.id, record.clone());
        Ok(record)
    }

    #[instrument(skip(self), fields(request_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>> {
        self.store.ensure_available()?;
        let table = self.store.requests_table().read().await;
        Ok(table.get(&id).cloned())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        self.store.ensure_available()?;
        let table = self.store.requests_table().read().await;
        let mut requests: Vec<AdminRequestRecord> = table
            .values()
            .filter(|r| filter.status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    /// Apply a decision to a pending request. Decided requests are terminal;
    /// a second decision fails `Conflict`.
    #[instrument(skip(self, request), fields(request_id = %abbrev_uuid(&id)), err)]
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        self.store.ensure_available()?;
        let mut table = self.store.requests_table().write().await;
        let record = table.get_mut(&id).ok_or(StoreError::NotFound)?;
        if record.status != RequestStatus::Pending {
            return Err(StoreError::Conflict {
                field: "email",
                value: record.email.clone(),
                verified_holder: false,
            });
        }
        record.status = request.status;
        record.approved_by = Some(request.decided_by.clone());
        record.approved_at = Some(Utc::now());
        Ok(record.clone())
    }

    #[instrument(skip(self), fields(request_id = %abbrev_uuid(&id)), err)]
    async fn delete(&self, id: Self::Id) -> Result<bool> {
        self.store.ensure_available()?;
        let mut table = self.store.requests_table().write().await;
        Ok(table.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elevation_request(email: &str) -> AdminRequestCreateRequest {
        AdminRequestCreateRequest {
            requester_name: "Pat".to_string(),
            email: email.to_string(),
            department: "kitchen-ops".to_string(),
            employee_id: "EMP-0042".to_string(),
            reason: "manage restaurant menus".to_string(),
        }
    }

    #[tokio::test]
    async fn test_decisions_are_terminal() {
        let store = Store::new();
        let repo = AdminRequests::new(&store);
        let created = repo.create(&elevation_request("pat@savora.dev")).await.unwrap();
        assert_eq!(created.status, RequestStatus::Pending);

        let decision = AdminRequestDecision {
            status: RequestStatus::Approved,
            decided_by: "root@savora.dev".to_string(),
        };
        let approved = repo.update(created.id, &decision).await.unwrap();
        assert_eq!(approved.status, RequestStatus::Approved);
        assert_eq!(approved.approved_by.as_deref(), Some("root@savora.dev"));

        // Already decided: a second decision must not go through.
        let rejection = AdminRequestDecision {
            status: RequestStatus::Rejected,
            decided_by: "root@savora.dev".to_string(),
        };
        assert!(matches!(
            repo.update(created.id, &rejection).await.unwrap_err(),
            StoreError::Conflict { .. }
        ));
    }

    #[tokio::test]
    async fn test_one_pending_request_per_email() {
        let store = Store::new();
        let repo = AdminRequests::new(&store);
        repo.create(&elevation_request("pat@savora.dev")).await.unwrap();

        let err = repo.create(&elevation_request("Pat@Savora.dev")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let store = Store::new();
        let repo = AdminRequests::new(&store);
        let first = repo.create(&elevation_request("one@savora.dev")).await.unwrap();
        repo.create(&elevation_request("two@savora.dev")).await.unwrap();

        repo.update(
            first.id,
            &AdminRequestDecision {
                status: RequestStatus::Rejected,
                decided_by: "root@savora.dev".to_string(),
            },
        )
        .await
        .unwrap();

        let pending = repo
            .list(&AdminRequestFilter {
                status: Some(RequestStatus::Pending),
            })
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].email, "two@savora.dev");
        assert_eq!(repo.list(&AdminRequestFilter::default()).await.unwrap().len(), 2);
    }
}
