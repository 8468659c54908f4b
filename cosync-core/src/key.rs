//! Remote key derivation.
//!
//! Keys are built by plain concatenation: both the prefix and the path must
//! already use `/` as separator. The only adjustment made is dropping trailing
//! slashes from the prefix so `docs/` and `docs` yield the same key.

/// Join the destination prefix and a repository-relative path into an object key.
///
/// An empty prefix maps the path to the bucket root.
pub fn remote_key(sub_path: &str, path: &str) -> String {
    let prefix = sub_path.trim_end_matches('/');
    if prefix.is_empty() {
        path.to_owned()
    } else {
        format!("{prefix}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_prefix_and_path() {
        assert_eq!(remote_key("docs", "a.txt"), "docs/a.txt");
        assert_eq!(remote_key("site/static", "img/logo.png"), "site/static/img/logo.png");
    }

    #[test]
    fn trailing_slash_on_prefix_is_dropped() {
        assert_eq!(remote_key("docs/", "a.txt"), "docs/a.txt");
    }

    #[test]
    fn empty_prefix_maps_to_bucket_root() {
        assert_eq!(remote_key("", "a.txt"), "a.txt");
    }

    #[test]
    fn path_is_not_normalised() {
        assert_eq!(remote_key("docs", "./a.txt"), "docs/./a.txt");
    }
}
