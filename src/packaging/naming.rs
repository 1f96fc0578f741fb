//! Name rules for units and modules
//!
//! Unit and module names are dot-segmented (`app.api.routes`). All matching
//! here is done per segment, never on raw string prefixes.

use crate::packaging::traits::{PackagingError, Result};

/// Name segment separator
pub const SEPARATOR: char = '.';

/// Wildcard segment accepted in ignore patterns
pub const WILDCARD: &str = "*";

/// Check whether `name` is covered by `pattern`.
///
/// The pattern may be shorter than the name, in which case it covers the whole
/// subtree. A `*` segment matches any single segment, so `app.*.v1` matches
/// `app.legacy.v1` and `app.legacy.v1.handlers` but not `app.legacy`.
pub fn matches_pattern(pattern: &str, name: &str) -> bool {
    let pattern_parts: Vec<&str> = pattern.split(SEPARATOR).collect();
    let name_parts: Vec<&str> = name.split(SEPARATOR).collect();

    if pattern_parts.len() > name_parts.len() {
        return false;
    }

    pattern_parts
        .iter()
        .zip(&name_parts)
        .all(|(p, n)| *p == WILDCARD || p == n)
}

/// Check whether `name` is `root` itself or nested inside it.
pub fn contains(root: &str, name: &str) -> bool {
    let root_parts: Vec<&str> = root.split(SEPARATOR).collect();
    let name_parts: Vec<&str> = name.split(SEPARATOR).collect();

    name_parts.len() >= root_parts.len() && name_parts[..root_parts.len()] == root_parts[..]
}

/// Check whether `name` is nested inside `root`, excluding `root` itself.
pub fn is_descendant(root: &str, name: &str) -> bool {
    name != root && contains(root, name)
}

/// Get the parent unit name, or `None` for a root-level unit.
pub fn parent_name(name: &str) -> Result<Option<&str>> {
    if name.is_empty() || name.split(SEPARATOR).any(str::is_empty) {
        return Err(PackagingError::InvalidUnitName(name.to_string()));
    }

    Ok(name.rsplit_once(SEPARATOR).map(|(parent, _)| parent))
}

/// Join name segments into a fully qualified name.
pub fn join_segments(segments: &[&str]) -> String {
    let mut separator = [0u8; 4];
    segments.join(SEPARATOR.encode_utf8(&mut separator))
}

/// Build a fully qualified module name.
pub fn module_name(unit: &str, module: &str) -> String {
    format!("{}{}{}", unit, SEPARATOR, module)
}

/// Build the fully qualified name of a unit's first module.
///
/// Only the last segment of `component` is used, so both `scheduler` and
/// `jobs.scheduler` resolve to `<unit>.scheduler`.
pub fn first_module_name(unit: &str, component: &str) -> String {
    let last = component.rsplit(SEPARATOR).next().unwrap_or(component);
    module_name(unit, last)
}

/// Check whether a module is covered by an ignored-module entry.
///
/// Entries may be fully qualified (`app.api.enumerations`) or a trailing part
/// of the name (`enumerations`, `api.enumerations`).
pub fn matches_module_suffix(ignored: &str, module: &str) -> bool {
    module == ignored
        || module
            .strip_suffix(ignored)
            .is_some_and(|head| head.ends_with(SEPARATOR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_covers_subtree() {
        assert!(matches_pattern("app.legacy", "app.legacy"));
        assert!(matches_pattern("app.legacy", "app.legacy.v1"));
        assert!(!matches_pattern("app.legacy", "app.legacyx"));
        assert!(!matches_pattern("app.legacy.v1", "app.legacy"));
    }

    #[test]
    fn test_pattern_wildcard_segments() {
        assert!(matches_pattern("app.legacy.*", "app.legacy.v1"));
        assert!(matches_pattern("*.db", "app.db"));
        assert!(matches_pattern("*.db", "app.db.pool"));
        assert!(!matches_pattern("*.db", "app.api"));
        assert!(!matches_pattern("app.legacy.*", "app.legacy"));
    }

    #[test]
    fn test_contains_and_descendant() {
        assert!(contains("app.custom", "app.custom"));
        assert!(contains("app.custom", "app.custom.api"));
        assert!(!contains("app.custom", "app.customer"));
        assert!(!contains("app.custom.api", "app.custom"));
        assert!(is_descendant("app", "app.db"));
        assert!(!is_descendant("app", "app"));
    }

    #[test]
    fn test_parent_name() {
        assert_eq!(parent_name("app").unwrap(), None);
        assert_eq!(parent_name("app.db").unwrap(), Some("app"));
        assert_eq!(parent_name("app.db.pool").unwrap(), Some("app.db"));
        assert!(matches!(
            parent_name(""),
            Err(PackagingError::InvalidUnitName(_))
        ));
        assert!(parent_name("app..db").is_err());
    }

    #[test]
    fn test_first_module_uses_last_segment() {
        assert_eq!(first_module_name("app.jobs", "scheduler"), "app.jobs.scheduler");
        assert_eq!(
            first_module_name("app.jobs", "jobs.scheduler"),
            "app.jobs.scheduler"
        );
    }

    #[test]
    fn test_module_suffix() {
        assert!(matches_module_suffix("enumerations", "app.api.enumerations"));
        assert!(matches_module_suffix("api.enumerations", "app.api.enumerations"));
        assert!(matches_module_suffix("app.api.enumerations", "app.api.enumerations"));
        assert!(!matches_module_suffix("enumerations", "app.api.my_enumerations"));
    }
}
