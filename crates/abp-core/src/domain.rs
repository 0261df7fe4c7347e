//! Domain suffix utilities for hierarchical domain matching.
//!
//! A rule's `domain=` entries and a request's source domain are compared by
//! walking the request domain's suffix chain from the most specific name down
//! to its last two labels.
//!
//! # Examples
//!
//! ```
//! use abp_core::domain::domain_variants;
//!
//! assert_eq!(
//!     domain_variants("foo.bar.example.com"),
//!     vec!["foo.bar.example.com", "bar.example.com", "example.com"]
//! );
//! assert!(domain_variants("localhost").is_empty());
//! ```

use std::borrow::Cow;

/// Get the parent domain (strip leftmost label).
pub fn get_parent_domain(host: &str) -> Option<&str> {
    match host.find('.') {
        Some(idx) if idx < host.len() - 1 => Some(&host[idx + 1..]),
        _ => None,
    }
}

/// Iterator over a domain's suffixes, most specific first.
///
/// Stops before a single-label suffix, so the top-level domain on its own is
/// never produced.
#[derive(Debug, Clone)]
pub struct DomainVariants<'a> {
    current: &'a str,
}

impl<'a> DomainVariants<'a> {
    pub fn new(domain: &'a str) -> Self {
        Self { current: domain }
    }
}

impl<'a> Iterator for DomainVariants<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.current.contains('.') {
            return None;
        }

        let result = self.current;
        self.current = get_parent_domain(self.current).unwrap_or("");
        Some(result)
    }
}

/// Walk domain suffixes from most specific to least specific.
pub fn walk_domain_variants(domain: &str) -> DomainVariants<'_> {
    DomainVariants::new(domain)
}

/// Collect the suffix chain of `domain`, most specific first.
pub fn domain_variants(domain: &str) -> Vec<&str> {
    walk_domain_variants(domain).collect()
}

/// Lowercase a domain, borrowing when it is already lowercase.
pub fn fold_domain(domain: &str) -> Cow<'_, str> {
    if domain.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(domain.to_ascii_lowercase())
    } else {
        Cow::Borrowed(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_variants() {
        assert_eq!(
            domain_variants("foo.bar.example.com"),
            vec!["foo.bar.example.com", "bar.example.com", "example.com"]
        );
        assert_eq!(domain_variants("example.com"), vec!["example.com"]);
    }

    #[test]
    fn test_domain_variants_single_label() {
        assert!(domain_variants("com").is_empty());
        assert!(domain_variants("").is_empty());
    }

    #[test]
    fn test_domain_variants_trailing_dot() {
        assert_eq!(domain_variants("example.com."), vec!["example.com.", "com."]);
    }

    #[test]
    fn test_get_parent_domain() {
        assert_eq!(get_parent_domain("sub.example.com"), Some("example.com"));
        assert_eq!(get_parent_domain("example.com"), Some("com"));
        assert_eq!(get_parent_domain("com"), None);
        assert_eq!(get_parent_domain(""), None);
    }

    #[test]
    fn test_fold_domain() {
        assert!(matches!(fold_domain("example.com"), Cow::Borrowed("example.com")));
        assert_eq!(fold_domain("Ads.Example.COM"), "ads.example.com");
    }
}
