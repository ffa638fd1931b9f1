//! Input validation for identifiers that end up in blob-store keys or metric
//! labels — path-traversal-safe, bounded length.

/// Maximum prompt length accepted for an inline scene description (`POST
/// /generate-clip`).
pub const MAX_PROMPT_LENGTH: usize = 5000;

/// Validate a `project_id` or `job_id`: alphanumeric and hyphens only,
/// 1-128 chars, no path traversal once interpolated into a blob key.
pub fn is_valid_identifier(id: &str) -> bool {
    if id.is_empty() || id.len() > 128 {
        return false;
    }
    id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Sanitize a user-provided string for safe logging and storage.
pub fn sanitize_string(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .take(MAX_PROMPT_LENGTH)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_project_ids() {
        assert!(is_valid_identifier("proj-123"));
        assert!(is_valid_identifier("render-proj-1-1700000000000"));
    }

    #[test]
    fn rejects_path_traversal_and_empty() {
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("../etc/passwd"));
        assert!(!is_valid_identifier("a/b"));
    }

    #[test]
    fn rejects_overlong_identifiers() {
        let long = "a".repeat(129);
        assert!(!is_valid_identifier(&long));
    }
}
