/// Key prefix for artifacts that do not belong to a listing.
pub const ARTIFACT_ENTITY: &str = "artifacts";

/// Object key of an artifact blob.
///
/// Blobs of an artifact attached to a listing live under the listing so
/// they can be enumerated per listing; other artifacts fall back to the
/// generic `{entity}/{id}/{filename}` layout.
pub fn artifact_object_key(listing_id: Option<&str>, artifact_id: &str, filename: &str) -> String {
    match listing_id {
        Some(listing_id) => format!("{listing_id}/{artifact_id}/{filename}"),
        None => entity_object_key(ARTIFACT_ENTITY, artifact_id, filename),
    }
}

/// Object key of a blob owned by an arbitrary entity.
pub fn entity_object_key(entity: &str, id: &str, filename: &str) -> String {
    format!("{entity}/{id}/{filename}")
}

/// Replace characters that cannot appear in a quoted header filename.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' | '/' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "download".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `Content-Disposition` header value that makes browsers save the object
/// under `filename`.
pub fn content_disposition(filename: &str) -> String {
    format!("attachment; filename=\"{}\"", sanitize_filename(filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_scoped_key() {
        assert_eq!(
            artifact_object_key(Some("l1"), "a1", "arm.stl"),
            "l1/a1/arm.stl"
        );
    }

    #[test]
    fn test_unscoped_key() {
        assert_eq!(
            artifact_object_key(None, "a1", "arm.stl"),
            "artifacts/a1/arm.stl"
        );
        assert_eq!(entity_object_key("users", "u1", "avatar.png"), "users/u1/avatar.png");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("arm.stl"), "arm.stl");
        assert_eq!(sanitize_filename("my \"best\" arm.stl"), "my _best_ arm.stl");
        assert_eq!(sanitize_filename("../x\n"), ".._x_");
        assert_eq!(sanitize_filename("   "), "download");
    }

    #[test]
    fn test_content_disposition() {
        assert_eq!(
            content_disposition("Robot Arm.urdf"),
            "attachment; filename=\"Robot Arm.urdf\""
        );
    }
}
