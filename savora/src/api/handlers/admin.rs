//! Admin escalation handlers: elevation requests, approvals and grants.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        accounts::Role,
        admin::{AdminGrantResponse, AdminRequestCreate, AdminRequestResponse, ListAdminRequestsQuery},
    },
    auth::principal::SuperAdminPrincipal,
    errors::Error,
    store::handlers::{Accounts, AdminGrants, AdminRequests, Repository},
    store::handlers::admin_requests::{AdminRequestDecision, AdminRequestFilter},
    store::models::admin_requests::{AdminRequestCreateRequest, RequestStatus},
    types::RequestId,
};

/// Submit a request for admin access
#[utoipa::path(
    post,
    path = "/admin/requests",
    request_body = AdminRequestCreate,
    tag = "admin",
    responses(
        (status = 201, description = "Request submitted", body = AdminRequestResponse),
        (status = 409, description = "A pending request already exists for this email"),
    )
)]
#[tracing::instrument(skip_all, fields(email = %request.email))]
pub async fn create_admin_request(
    State(state): State<AppState>,
    Json(request): Json<AdminRequestCreate>,
) -> Result<(StatusCode, Json<AdminRequestResponse>), Error> {
    if !request.email.contains('@') {
        return Err(Error::Validation {
            message: "a valid email address is required".to_string(),
        });
    }
    if request.reason.trim().is_empty() {
        return Err(Error::Validation {
            message: "a reason is required".to_string(),
        });
    }

    let created = AdminRequests::new(&state.store)
        .create(&AdminRequestCreateRequest {
            requester_name: request.requester_name,
            email: request.email,
            department: request.department,
            employee_id: request.employee_id,
            reason: request.reason,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(AdminRequestResponse::from(created))))
}

/// List elevation requests (super admin only)
#[utoipa::path(
    get,
    path = "/admin/requests",
    params(ListAdminRequestsQuery),
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Requests", body = Vec<AdminRequestResponse>),
        (status = 403, description = "Not a super admin"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_admin_requests(
    _super_admin: SuperAdminPrincipal,
    State(state): State<AppState>,
    Query(query): Query<ListAdminRequestsQuery>,
) -> Result<Json<Vec<AdminRequestResponse>>, Error> {
    let requests = AdminRequests::new(&state.store)
        .list(&AdminRequestFilter { status: query.status })
        .await?;
    Ok(Json(requests.into_iter().map(AdminRequestResponse::from).collect()))
}

/// Approve an elevation request (super admin only)
///
/// Approval records an active grant for the request's email and, when an
/// account already exists for it, escalates the account role to admin.
#[utoipa::path(
    post,
    path = "/admin/requests/{id}/approve",
    params(("id" = String, Path, description = "Request ID")),
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Request approved", body = AdminRequestResponse),
        (status = 404, description = "No such request"),
        (status = 409, description = "Request already decided"),
    )
)]
#[tracing::instrument(skip_all, fields(request_id = %id))]
pub async fn approve_admin_request(
    super_admin: SuperAdminPrincipal,
    State(state): State<AppState>,
    Path(id): Path<RequestId>,
) -> Result<Json<AdminRequestResponse>, Error> {
    let decided = AdminRequests::new(&state.store)
        .update(
            id,
            &AdminRequestDecision {
                status: RequestStatus::Approved,
                decided_by: super_admin.0.email.clone(),
            },
        )
        .await?;

    AdminGrants::new(&state.store)
        .upsert_active(&decided.email, &super_admin.0.email)
        .await?;

    // Escalate the existing account, never downgrade
    let accounts = Accounts::new(&state.store);
    if let Some(account) = accounts.find_by_identifier(&decided.email).await?
        && account.role == Role::User
    {
        accounts.update_role(account.id, Role::Admin).await?;
    }

    tracing::info!(email = %decided.email, approved_by = %super_admin.0.email, "admin request approved");
    Ok(Json(AdminRequestResponse::from(decided)))
}

/// Reject an elevation request (super admin only)
#[utoipa::path(
    post,
    path = "/admin/requests/{id}/reject",
    params(("id" = String, Path, description = "Request ID")),
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Request rejected", body = AdminRequestResponse),
        (status = 404, description = "No such request"),
        (status = 409, description = "Request already decided"),
    )
)]
#[tracing::instrument(skip_all, fields(request_id = %id))]
pub async fn reject_admin_request(
    super_admin: SuperAdminPrincipal,
    State(state): State<AppState>,
    Path(id): Path<RequestId>,
) -> Result<Json<AdminRequestResponse>, Error> {
    let decided = AdminRequests::new(&state.store)
        .update(
            id,
            &AdminRequestDecision {
                status: RequestStatus::Rejected,
                decided_by: super_admin.0.email.clone(),
            },
        )
        .await?;

    Ok(Json(AdminRequestResponse::from(decided)))
}

/// List admin grants (super admin only)
#[utoipa::path(
    get,
    path = "/admin/grants",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Grants", body = Vec<AdminGrantResponse>),
        (status = 403, description = "Not a super admin"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_admin_grants(
    _super_admin: SuperAdminPrincipal,
    State(state): State<AppState>,
) -> Result<Json<Vec<AdminGrantResponse>>, Error> {
    let grants = AdminGrants::new(&state.store).list().await?;
    Ok(Json(grants.into_iter().map(AdminGrantResponse::from).collect()))
}

/// Deactivate an admin grant (super admin only). The grant row is kept
/// inactive for the audit trail.
#[utoipa::path(
    delete,
    path = "/admin/grants/{email}",
    params(("email" = String, Path, description = "Grantee email")),
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Grant deactivated"),
        (status = 404, description = "No grant for this email"),
    )
)]
#[tracing::instrument(skip_all, fields(email = %email))]
pub async fn deactivate_admin_grant(
    super_admin: SuperAdminPrincipal,
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<serde_json::Value>, Error> {
    let deactivated = AdminGrants::new(&state.store).deactivate(&email).await?;
    if !deactivated {
        return Err(Error::NotFound {
            resource: "admin grant".to_string(),
            next_step: None,
        });
    }

    tracing::info!(email = %email, deactivated_by = %super_admin.0.email, "admin grant deactivated");
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "grant deactivated"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use serde_json::json;

    async fn submit_request(harness: &TestHarness, email: &str) -> AdminRequestResponse {
        let response = harness
            .server
            .post("/admin/requests")
            .json(&json!({
                "requester_name": "Sam Ops",
                "email": email,
                "department": "operations",
                "employee_id": "EMP-0042",
                "reason": "needs to manage menus"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    #[tokio::test]
    async fn test_one_pending_request_per_email() {
        let harness = TestHarness::new().await;
        submit_request(&harness, "sam@x.com").await;

        let response = harness
            .server
            .post("/admin/requests")
            .json(&json!({
                "requester_name": "Sam Ops",
                "email": "sam@x.com",
                "department": "operations",
                "employee_id": "EMP-0042",
                "reason": "asking again"
            }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_listing_requires_super_admin() {
        let harness = TestHarness::new().await;
        let user_token = harness.signup_verified("plain", "plain@x.com", "longpassword").await;

        harness.server.get("/admin/requests").await.assert_status_unauthorized();

        harness
            .server
            .get("/admin/requests")
            .add_header("authorization", format!("Bearer {user_token}"))
            .await
            .assert_status_forbidden();

        let admin_token = harness.super_admin_token().await;
        harness
            .server
            .get("/admin/requests")
            .add_header("authorization", format!("Bearer {admin_token}"))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_approval_grants_and_escalates() {
        let harness = TestHarness::new().await;
        harness.signup_verified("sam", "sam@x.com", "longpassword").await;
        let request = submit_request(&harness, "sam@x.com").await;
        let admin_token = harness.super_admin_token().await;

        let response = harness
            .server
            .post(&format!("/admin/requests/{}/approve", request.id))
            .add_header("authorization", format!("Bearer {admin_token}"))
            .await;
        response.assert_status_ok();
        let decided: AdminRequestResponse = response.json();
        assert_eq!(decided.status, RequestStatus::Approved);
        assert_eq!(decided.approved_by.as_deref(), Some(SEED_ADMIN_EMAIL));

        // Grant is live and account role escalated; admin-login now works
        let response = harness
            .server
            .post("/auth/admin-login")
            .json(&json!({"identifier": "sam@x.com", "password": "longpassword"}))
            .await;
        response.assert_status_ok();

        // A second decision on the same request is refused
        let response = harness
            .server
            .post(&format!("/admin/requests/{}/reject", request.id))
            .add_header("authorization", format!("Bearer {admin_token}"))
            .await;
        response.assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_deactivation_keeps_audit_row() {
        let harness = TestHarness::new().await;
        let request = submit_request(&harness, "temp@x.com").await;
        let admin_token = harness.super_admin_token().await;

        harness
            .server
            .post(&format!("/admin/requests/{}/approve", request.id))
            .add_header("authorization", format!("Bearer {admin_token}"))
            .await
            .assert_status_ok();

        harness
            .server
            .delete("/admin/grants/temp@x.com")
            .add_header("authorization", format!("Bearer {admin_token}"))
            .await
            .assert_status_ok();

        let response = harness
            .server
            .get("/admin/grants")
            .add_header("authorization", format!("Bearer {admin_token}"))
            .await;
        let grants: Vec<AdminGrantResponse> = response.json();
        let grant = grants.iter().find(|g| g.email == "temp@x.com").unwrap();
        assert!(!grant.is_active);
    }
}
