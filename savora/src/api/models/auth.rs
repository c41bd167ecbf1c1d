//! API request/response models for signup, OTP verification, login and
//! conflict resolution.

use crate::api::models::accounts::{AccountResponse, AccountSummary};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub mobile: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignupResponse {
    pub success: bool,
    pub message: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

/// OTP verification result. On failure, `reason` carries a machine-readable
/// code (`not_found`, `already_used`, `expired`, `invalid`) so clients can
/// branch without parsing the message.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyOtpResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResendOtpRequest {
    pub email: String,
}

/// Login accepts either the email address or the username.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub success: bool,
    pub user: AccountResponse,
    pub token: String,
}

/// What the resolver should do about a signup conflict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResolveAction {
    /// Look for a verified account holding either identifier
    GetVerifiedAccount,
    /// Remove unverified partial accounts holding either identifier
    ClearUnverified,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResolveConflictRequest {
    pub email: String,
    pub username: String,
    pub action: ResolveAction,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResolveConflictResponse {
    pub success: bool,
    pub message: String,
    /// `redirect_to_login` when a verified account was found,
    /// `manual_intervention` when nothing matched and nothing could be
    /// cleared automatically.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Unverified accounts removed by a clear action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DebugConflictRequest {
    pub email: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DebugConflictResponse {
    pub success: bool,
    /// Redacted matches; never includes credential material
    pub matches: Vec<AccountSummary>,
}
