//! Repository handlers over the keyed store.

pub mod accounts;
pub mod admin_grants;
pub mod admin_requests;
pub mod otp_challenges;
pub mod repository;

pub use accounts::Accounts;
pub use admin_grants::AdminGrants;
pub use admin_requests::AdminRequests;
pub use otp_challenges::OtpChallenges;
pub use repository::Repository;
