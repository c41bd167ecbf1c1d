//! OpenAPI documentation configuration.
//!
//! The generated document backs the browsable UI at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api;

/// Security scheme for session-token protected endpoints.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "bearer_auth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token authentication. Include the token from login in the `Authorization` header:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```\n\n\
                            Admin tooling may instead use `Authorization: Admin base64(email:password)`.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Savora Account Service",
        description = "Authentication and account-state reconciliation for the Savora platform."
    ),
    paths(
        api::handlers::auth::signup,
        api::handlers::auth::verify_otp,
        api::handlers::auth::resend_otp,
        api::handlers::auth::login,
        api::handlers::auth::admin_login,
        api::handlers::auth::resolve_conflict,
        api::handlers::auth::debug_conflict,
        api::handlers::account::get_profile,
        api::handlers::account::update_profile,
        api::handlers::account::change_password,
        api::handlers::admin::create_admin_request,
        api::handlers::admin::list_admin_requests,
        api::handlers::admin::approve_admin_request,
        api::handlers::admin::reject_admin_request,
        api::handlers::admin::list_admin_grants,
        api::handlers::admin::deactivate_admin_grant,
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Signup, verification, login and conflict resolution"),
        (name = "account", description = "Profile and credential management"),
        (name = "admin", description = "Admin elevation requests and grants"),
    )
)]
pub struct ApiDoc;
