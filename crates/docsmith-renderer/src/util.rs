//! Shared utility functions for page rendering.

use pulldown_cmark::HeadingLevel;

/// Relative prefix from a page to the site root.
///
/// Every page is written to `<url_path>/index.html`, so the page directory
/// is the URL path itself and each segment adds one `../`.
///
/// # Examples
///
/// ```
/// use docsmith_renderer::root_prefix;
///
/// assert_eq!(root_prefix(""), "");
/// assert_eq!(root_prefix("guide"), "../");
/// assert_eq!(root_prefix("domain/billing"), "../../");
/// ```
#[must_use]
pub fn root_prefix(url_path: &str) -> String {
    let depth = url_path.split('/').filter(|s| !s.is_empty()).count();
    "../".repeat(depth)
}

/// Convert heading text into an anchor slug.
///
/// Lowercases alphanumerics, maps whitespace, `-` and `_` to a single `-`,
/// and drops everything else.
///
/// # Examples
///
/// ```
/// use docsmith_renderer::slugify;
///
/// assert_eq!(slugify("Getting Started!"), "getting-started");
/// ```
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }

    slug
}

/// Convert heading level enum to number (1-6).
#[must_use]
pub(crate) fn heading_level_to_num(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_prefix_ignores_empty_segments() {
        assert_eq!(root_prefix("a//b/"), "../../");
    }

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("  Foo -- Bar__baz "), "foo-bar-baz");
    }

    #[test]
    fn test_slugify_strips_punctuation() {
        assert_eq!(slugify("What's new? (v2.0)"), "whats-new-v20");
    }

    #[test]
    fn test_slugify_keeps_unicode_letters() {
        assert_eq!(slugify("Über Straße"), "über-straße");
    }

    #[test]
    fn test_slugify_empty() {
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_heading_level_to_num() {
        assert_eq!(heading_level_to_num(HeadingLevel::H1), 1);
        assert_eq!(heading_level_to_num(HeadingLevel::H6), 6);
    }
}
