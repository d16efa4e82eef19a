/// Collapse redundant separators and resolve `.`/`..` segments the way
/// component I's transport factory is required to before using a URL path
/// as a router key (§4.I, §6).
pub fn canonicalize_path(raw: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut out = String::with_capacity(raw.len() + 1);
    out.push('/');
    out.push_str(&segments.join("/"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Canonicalizing an already-canonical path is a no-op — the
        /// router's equality keys are stable under repeated normalization.
        #[test]
        fn canonicalize_is_idempotent(raw in "[a-zA-Z0-9/._-]{0,64}") {
            let once = canonicalize_path(&raw);
            let twice = canonicalize_path(&once);
            prop_assert_eq!(once, twice);
        }

        /// The result always has a leading slash and no doubled
        /// separators, regardless of how much cosmetic noise the input
        /// carries.
        #[test]
        fn canonicalize_output_is_clean(raw in "[a-zA-Z0-9/._-]{0,64}") {
            let cleaned = canonicalize_path(&raw);
            prop_assert!(cleaned.starts_with('/'));
            prop_assert!(!cleaned.contains("//"));
        }
    }

    #[test]
    fn collapses_duplicate_slashes() {
        assert_eq!(canonicalize_path("/a//b///c"), "/a/b/c");
    }

    #[test]
    fn resolves_dot_dot() {
        assert_eq!(canonicalize_path("/a/b/../c"), "/a/c");
        assert_eq!(canonicalize_path("/a/../../c"), "/c");
    }

    #[test]
    fn root_is_single_slash() {
        assert_eq!(canonicalize_path("/"), "/");
        assert_eq!(canonicalize_path(""), "/");
    }

    #[test]
    fn leading_slash_is_implicit() {
        assert_eq!(canonicalize_path("foo/bar"), "/foo/bar");
    }
}
