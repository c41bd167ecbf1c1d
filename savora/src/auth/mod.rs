//! Authentication and account reconciliation.
//!
//! # Authentication Methods
//!
//! The service accepts two credential schemes on the `Authorization` header:
//!
//! ## 1. Bearer Session Tokens
//!
//! Issued by `/auth/login` (and `/auth/admin-login`) as signed HS256 JWTs
//! carrying the account id, email, username and role. Passed as
//! `Authorization: Bearer <token>`.
//!
//! ## 2. Admin Credentials
//!
//! Direct credential authentication for admin tooling, passed as
//! `Authorization: Admin <base64(email:password)>`. The password is checked
//! against the stored hash and the account must hold an elevated role or an
//! active admin grant.
//!
//! # Modules
//!
//! - [`principal`]: Extractors resolving the authenticated caller in handlers
//! - [`password`]: Password hashing and verification using Argon2
//! - [`session`]: JWT session token creation and verification
//! - [`otp`]: One-time passcode issuance and verification
//! - [`resolver`]: Duplicate/partial signup reconciliation
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use savora::api::models::accounts::CurrentPrincipal;
//!
//! async fn protected_handler(principal: CurrentPrincipal) -> String {
//!     format!("Hello, {}!", principal.username)
//! }
//! ```

pub mod otp;
pub mod password;
pub mod principal;
pub mod resolver;
pub mod session;
