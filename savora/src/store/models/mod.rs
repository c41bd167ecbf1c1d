//! Store entity models (records and create/update requests).

pub mod accounts;
pub mod admin_grants;
pub mod admin_requests;
pub mod otp_challenges;
