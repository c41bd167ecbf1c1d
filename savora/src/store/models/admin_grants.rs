//! Store models for admin grants.

use chrono::{DateTime, Utc};

/// Elevation record for non-hardcoded admins, keyed by normalized email.
///
/// Deactivated grants are kept with `is_active = false` to preserve the
/// audit trail; they are never deleted.
#[derive(Debug, Clone)]
pub struct AdminGrantRecord {
    pub email: String,
    pub granted_by: String,
    pub granted_at: DateTime<Utc>,
    pub is_active: bool,
}
