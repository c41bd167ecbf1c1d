//! API request/response models for the admin escalation flow.

use crate::store::models::admin_grants::AdminGrantRecord;
use crate::store::models::admin_requests::{AdminRequestRecord, RequestStatus};
use crate::types::RequestId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminRequestCreate {
    pub requester_name: String,
    pub email: String,
    pub department: String,
    pub employee_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminRequestResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: RequestId,
    pub requester_name: String,
    pub email: String,
    pub department: String,
    pub reason: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
}

/// Query parameters for listing admin requests
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListAdminRequestsQuery {
    /// Filter by status (pending, approved, rejected)
    pub status: Option<RequestStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminGrantResponse {
    pub email: String,
    pub granted_by: String,
    pub granted_at: DateTime<Utc>,
    pub is_active: bool,
}

impl From<AdminRequestRecord> for AdminRequestResponse {
    fn from(record: AdminRequestRecord) -> Self {
        Self {
            id: record.id,
            requester_name: record.requester_name,
            email: record.email,
            department: record.department,
            reason: record.reason,
            status: record.status,
            created_at: record.created_at,
            approved_by: record.approved_by,
            approved_at: record.approved_at,
        }
    }
}

impl From<AdminGrantRecord> for AdminGrantResponse {
    fn from(record: AdminGrantRecord) -> Self {
        Self {
            email: record.email,
            granted_by: record.granted_by,
            granted_at: record.granted_at,
            is_active: record.is_active,
        }
    }
}
