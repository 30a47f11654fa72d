//! Path normalization helpers shared by canonicalization and storage layout.
//!
//! - Internal representation: decoded (human-readable), except for escapes
//!   whose decoded form would change how the key parses again
//! - Always starts with `/`; no trailing slash except for the root

use percent_encoding::percent_decode_str;
use regex::Regex;
use std::sync::LazyLock;

/// `%`, `/`, `?`, `#`, `\` and control bytes stay escaped.
static RE_KEPT_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)%(?:25|2F|3F|23|5C|7F|[01][0-9A-F])").expect("valid escape pattern")
});

/// Normalize a URL path into a canonical key.
///
/// Decodes percent-encoding (keeping reserved escapes, uppercased),
/// collapses repeated slashes and strips a trailing slash (except for the
/// root).
pub fn normalize_path(path: &str) -> String {
    let decoded = decode_unreserved(path);

    let mut out = String::with_capacity(decoded.len() + 1);
    out.push('/');
    for segment in decoded.split('/').filter(|s| !s.is_empty()) {
        if !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(segment);
    }
    out
}

fn decode_unreserved(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut last = 0;
    for kept in RE_KEPT_ESCAPE.find_iter(path) {
        out.push_str(&decode_piece(&path[last..kept.start()]));
        out.push_str(&kept.as_str().to_ascii_uppercase());
        last = kept.end();
    }
    out.push_str(&decode_piece(&path[last..]));
    out
}

fn decode_piece(piece: &str) -> String {
    percent_decode_str(piece)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| piece.to_string())
}

/// Directory that relative references inside a document resolve against.
///
/// `/guide/` -> `/guide/`, `/guide/intro` -> `/guide/`, `/` -> `/`
pub fn document_dir(url_path: &str) -> &str {
    match url_path.rfind('/') {
        Some(idx) => &url_path[..=idx],
        None => "/",
    }
}

/// Whether the last segment of a canonical path carries an HTML extension.
pub fn has_html_extension(path: &str) -> bool {
    strip_html_extension(path).is_some()
}

/// Strip a trailing `.html` / `.htm` (ASCII case-insensitive).
pub fn strip_html_extension(path: &str) -> Option<&str> {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".html") {
        Some(&path[..path.len() - 5])
    } else if lower.ends_with(".htm") {
        Some(&path[..path.len() - 4])
    } else {
        None
    }
}

/// Path under which a page with the given canonical path is stored.
///
/// `/` -> `/index.html`, `/about` -> `/about/index.html`,
/// `/legacy.html` -> `/legacy.html`
pub fn page_storage_path(canonical: &str) -> String {
    let canonical = normalize_path(canonical);
    if canonical == "/" {
        "/index.html".to_string()
    } else if has_html_extension(&canonical) {
        canonical
    } else {
        format!("{canonical}/index.html")
    }
}

/// Last path segment's extension, lowercased.
pub fn extension(path: &str) -> Option<String> {
    let name = path.rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_root() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("//"), "/");
    }

    #[test]
    fn test_normalize_collapses_and_trims() {
        assert_eq!(normalize_path("/guide/"), "/guide");
        assert_eq!(normalize_path("/a//b///c/"), "/a/b/c");
        assert_eq!(normalize_path("guide"), "/guide");
    }

    #[test]
    fn test_normalize_decodes() {
        assert_eq!(normalize_path("/posts/hello%20world"), "/posts/hello world");
        assert_eq!(normalize_path("/posts/%E4%B8%AD%E6%96%87/"), "/posts/中文");
    }

    #[test]
    fn test_normalize_keeps_reserved_escapes() {
        assert_eq!(normalize_path("/faq%3fv2"), "/faq%3Fv2");
        assert_eq!(normalize_path("/100%25/off"), "/100%25/off");
        assert_eq!(normalize_path("/a%2Fb%23c"), "/a%2Fb%23c");
        assert_eq!(normalize_path("/50%2541"), "/50%2541");
        assert_eq!(normalize_path(&normalize_path("/faq%3Fv2%20x")), "/faq%3Fv2 x");
        assert_ne!(normalize_path("/faq%3Fv2"), normalize_path("/faq"));
    }

    #[test]
    fn test_normalize_invalid_utf8_preserved() {
        assert_eq!(normalize_path("/posts/%FF"), "/posts/%FF");
    }

    #[test]
    fn test_document_dir() {
        assert_eq!(document_dir("/guide/"), "/guide/");
        assert_eq!(document_dir("/guide/intro"), "/guide/");
        assert_eq!(document_dir("/"), "/");
        assert_eq!(document_dir("/index.html"), "/");
    }

    #[test]
    fn test_page_storage_path() {
        assert_eq!(page_storage_path("/"), "/index.html");
        assert_eq!(page_storage_path("/about"), "/about/index.html");
        assert_eq!(page_storage_path("/about/"), "/about/index.html");
        assert_eq!(page_storage_path("/legacy.html"), "/legacy.html");
        assert_eq!(page_storage_path("/docs/index.htm"), "/docs/index.htm");
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("/css/site.CSS"), Some("css".to_string()));
        assert_eq!(extension("/img/logo.png"), Some("png".to_string()));
        assert_eq!(extension("/about"), None);
        assert_eq!(extension("/.well-known"), None);
        assert_eq!(extension("/v1.2/readme"), None);
    }
}
