//! Path-key composition: the `"::"` separator contract used by
//! [`crate::Cache`]'s path operations and by [`crate::NamespacedCache`].

/// The literal separator joining path-key segments and prefixing namespaces.
pub const SEPARATOR: &str = "::";

/// Joins path segments with [`SEPARATOR`]. Empty segments are preserved
/// (callers composing paths are expected to supply non-empty segments;
/// this function does not validate that).
pub fn join(segments: &[&str]) -> String {
    segments.join(SEPARATOR)
}

/// Splits a flat key back into its `::`-delimited segments. This is a pure
/// string split: a key containing `::` because a caller typed it directly
/// (rather than via [`join`]) splits the same way, per §9's documented
/// collision risk — this crate does not escape the separator.
pub fn split(key: &str) -> Vec<&str> {
    key.split(SEPARATOR).collect()
}

/// Builds the namespace prefix for `name`, i.e. `"<name>::"`.
pub fn namespace_prefix(name: &str) -> String {
    format!("{name}{SEPARATOR}")
}

/// Prepends `prefix` (expected to already end in `SEPARATOR`, as produced by
/// [`namespace_prefix`]) to `key`.
pub fn with_prefix(prefix: &str, key: &str) -> String {
    format!("{prefix}{key}")
}

/// Strips `prefix` from `key` if present, returning the remainder.
pub fn strip_prefix<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_composes_with_double_colon() {
        assert_eq!(join(&["users", "1", "profile"]), "users::1::profile");
    }

    #[test]
    fn split_reverses_join_for_simple_segments() {
        let joined = join(&["a", "b", "c"]);
        assert_eq!(split(&joined), vec!["a", "b", "c"]);
    }

    #[test]
    fn namespace_prefix_and_with_prefix() {
        let prefix = namespace_prefix("users");
        assert_eq!(prefix, "users::");
        assert_eq!(with_prefix(&prefix, "1"), "users::1");
    }

    #[test]
    fn strip_prefix_recovers_the_unprefixed_key() {
        let prefix = namespace_prefix("sessions");
        let full = with_prefix(&prefix, "abc");
        assert_eq!(strip_prefix(&full, &prefix), Some("abc"));
        assert_eq!(strip_prefix("other::abc", &prefix), None);
    }

    #[test]
    fn nested_namespaces_compose_prefixes() {
        let outer = namespace_prefix("users");
        let inner = format!("{outer}{}", namespace_prefix("profiles"));
        assert_eq!(inner, "users::profiles::");
    }
}
