//! Common type definitions and identifier normalization.
//!
//! All entity IDs are UUIDs wrapped in type aliases:
//!
//! - [`AccountId`]: account identifier
//! - [`RequestId`]: admin elevation request identifier
//!
//! Identifier normalization policy: both emails and usernames are compared
//! case-insensitively after trimming. The single normalization function lives
//! here so the store, the conflict resolver, and the handlers cannot drift
//! apart on this.

use uuid::Uuid;

pub type AccountId = Uuid;
pub type RequestId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Normalize an account identifier (email or username) for storage and lookup.
pub fn normalize_identifier(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier("Ana@X.com"), "ana@x.com");
        assert_eq!(normalize_identifier("  FoodFan42 "), "foodfan42");
        assert_eq!(normalize_identifier("already-lower"), "already-lower");
    }

    #[test]
    fn test_abbrev_uuid() {
        let id: Uuid = "550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }
}
