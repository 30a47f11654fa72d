//! Recognize soft error pages served with a success status.

use regex::Regex;
use std::sync::LazyLock;

/// A title segment or heading that is nothing but an error notice.
static RE_ERROR_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)^(?:
            (?:error[:\s]*)?(?:403|404|410)(?:\s+(?:error|not\s+found|forbidden|gone))?
          | (?:(?:page|file)\s+)?not\s+found
          | access\s+denied
          | forbidden
          | (?:sorry,?\s+)?(?:this|the)\s+page\s+(?:could\s+not\s+be\s+found|does(?:\s+not|n't)\s+exist|is\s+no\s+longer\s+available)
        )[.!]?$",
    )
    .expect("valid error page pattern")
});

/// Separators between a page's own title and the site name.
static RE_TITLE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[|·–—]\s*|\s+[-:]\s+").expect("valid separator pattern"));

/// Matched error signature in the title or main heading, if any.
///
/// A signature must make up a whole title segment (`Page not found | Docs`)
/// or the whole heading, so ordinary pages that merely mention a status
/// code or the word "forbidden" are kept.
pub fn detect(title: Option<&str>, heading: Option<&str>) -> Option<String> {
    let title_segments = title
        .into_iter()
        .flat_map(|t| RE_TITLE_SEPARATOR.split(t));
    title_segments
        .chain(heading)
        .map(str::trim)
        .find(|segment| RE_ERROR_SIGNATURE.is_match(segment))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_common_signatures() {
        assert!(detect(Some("404"), None).is_some());
        assert!(detect(Some("Page Not Found | Docs"), None).is_some());
        assert!(detect(Some("Docs"), Some("Access Denied")).is_some());
        assert!(detect(None, Some("This page could not be found.")).is_some());
        assert!(detect(Some("403 Forbidden"), None).is_some());
        assert!(detect(Some("Docs - Error 404"), None).is_some());
    }

    #[test]
    fn test_ignores_normal_pages() {
        assert!(detect(Some("Getting started"), Some("Install")).is_none());
        assert!(detect(Some("Release 4040 notes"), None).is_none());
        assert!(detect(Some("Forbidden City guide"), None).is_none());
        assert!(detect(Some("Route 404 | Transit"), Some("Route 404")).is_none());
        assert!(detect(None, Some("Files not found in the index are skipped")).is_none());
        assert!(detect(None, None).is_none());
    }
}
