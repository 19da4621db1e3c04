//! Secondary indexes declared on the shared table.

/// Attributes promoted to a global secondary index.
///
/// Each index is keyed on the attribute alone (HASH only) and projects
/// every attribute, so index queries return full records.
pub const INDEXED_ATTRIBUTES: &[&str] = &["type", "user_id", "listing_id", "email", "username"];

/// Name of the index keyed on `attribute`.
pub fn index_name(attribute: &str) -> String {
    format!("{attribute}_index")
}

/// Returns true if `attribute` has its own index.
pub fn is_indexed(attribute: &str) -> bool {
    INDEXED_ATTRIBUTES.contains(&attribute)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_name() {
        assert_eq!(index_name("user_id"), "user_id_index");
    }

    #[test]
    fn test_type_is_indexed() {
        assert!(is_indexed("type"));
        assert!(is_indexed("email"));
        assert!(!is_indexed("name"));
    }
}
