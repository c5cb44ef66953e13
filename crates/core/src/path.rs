//! Target path normalization and traversal checks

use thiserror::Error;

/// Why a target path was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathSafetyError {
    #[error("target path is empty")]
    Empty,

    #[error("target path '{0}' is absolute")]
    Absolute(String),

    #[error("target path '{0}' escapes the repository root")]
    EscapesRoot(String),

    #[error("target path '{path}' is inside the reserved directory '{reserved}'")]
    Reserved { path: String, reserved: String },
}

/// Normalize a repository-relative target path
///
/// - Converts `\` separators to `/`
/// - Drops `.` segments and empty segments
/// - Resolves `..` lexically, rejecting any that climb above the root
/// - Rejects absolute paths and drive prefixes
///
/// The result uses `/` separators and never starts with `./`.
pub fn normalize_target(raw: &str) -> Result<String, PathSafetyError> {
    let unified = raw.trim().replace('\\', "/");
    if unified.is_empty() {
        return Err(PathSafetyError::Empty);
    }
    if unified.starts_with('/') || has_drive_prefix(&unified) {
        return Err(PathSafetyError::Absolute(raw.to_string()));
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(PathSafetyError::EscapesRoot(raw.to_string()));
                }
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return Err(PathSafetyError::Empty);
    }
    Ok(segments.join("/"))
}

/// Normalize and additionally refuse paths under a reserved top-level directory
pub fn check_target(raw: &str, reserved: Option<&str>) -> Result<String, PathSafetyError> {
    let normalized = normalize_target(raw)?;
    if let Some(reserved) = reserved {
        let inside = normalized == reserved
            || normalized
                .strip_prefix(reserved)
                .is_some_and(|rest| rest.starts_with('/'));
        if inside {
            return Err(PathSafetyError::Reserved {
                path: normalized,
                reserved: reserved.to_string(),
            });
        }
    }
    Ok(normalized)
}

/// Parent directory of a normalized path, `None` for root-level files
pub fn parent_dir(normalized: &str) -> Option<&str> {
    normalized.rsplit_once('/').map(|(parent, _)| parent)
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plain() {
        assert_eq!(normalize_target("src/main.rs").unwrap(), "src/main.rs");
        assert_eq!(normalize_target("./src//main.rs").unwrap(), "src/main.rs");
        assert_eq!(normalize_target("src\\lib.rs").unwrap(), "src/lib.rs");
    }

    #[test]
    fn test_interior_parent_segments_resolve() {
        assert_eq!(normalize_target("a/b/../c.txt").unwrap(), "a/c.txt");
        assert_eq!(normalize_target("a/../b.txt").unwrap(), "b.txt");
    }

    #[test]
    fn test_traversal_rejected() {
        assert_eq!(
            normalize_target("../outside-repo/file.txt"),
            Err(PathSafetyError::EscapesRoot("../outside-repo/file.txt".into()))
        );
        assert!(matches!(
            normalize_target("a/../../b"),
            Err(PathSafetyError::EscapesRoot(_))
        ));
    }

    #[test]
    fn test_absolute_rejected() {
        assert!(matches!(
            normalize_target("/etc/passwd"),
            Err(PathSafetyError::Absolute(_))
        ));
        assert!(matches!(
            normalize_target("C:\\Windows\\x"),
            Err(PathSafetyError::Absolute(_))
        ));
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(normalize_target(""), Err(PathSafetyError::Empty));
        assert_eq!(normalize_target("./."), Err(PathSafetyError::Empty));
        assert_eq!(normalize_target("a/.."), Err(PathSafetyError::Empty));
    }

    #[test]
    fn test_reserved_directory() {
        assert!(matches!(
            check_target(".st-patches/state.json", Some(".st-patches")),
            Err(PathSafetyError::Reserved { .. })
        ));
        assert!(matches!(
            check_target("./.st-patches", Some(".st-patches")),
            Err(PathSafetyError::Reserved { .. })
        ));
        assert_eq!(
            check_target(".st-patches-notes.md", Some(".st-patches")).unwrap(),
            ".st-patches-notes.md"
        );
        assert_eq!(check_target("a.txt", None).unwrap(), "a.txt");
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("path/to/new.txt"), Some("path/to"));
        assert_eq!(parent_dir("top.txt"), None);
    }
}
