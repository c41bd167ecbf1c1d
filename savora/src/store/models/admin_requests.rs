//! Store models for admin elevation requests.

use crate::types::RequestId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// Pending employee request for elevation; terminal once decided.
#[derive(Debug, Clone)]
pub struct AdminRequestRecord {
    pub id: RequestId,
    pub requester_name: String,
    pub email: String,
    pub department: String,
    pub employee_id: String,
    pub reason: String,
    pub status: RequestStatus,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Store request for creating an admin elevation request
#[derive(Debug, Clone)]
pub struct AdminRequestCreateRequest {
    pub requester_name: String,
    pub email: String,
    pub department: String,
    pub employee_id: String,
    pub reason: String,
}
