//! Locate references inside CSS text.

use regex::Regex;
use std::sync::LazyLock;

use super::Located;
use crate::canon::RefAttr;

static RE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)"'\s]*))\s*\)"#)
        .expect("valid css url pattern")
});

static RE_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)@import\s+(?:"([^"]*)"|'([^']*)')"#).expect("valid css import pattern")
});

/// All `url(...)` and `@import "..."` references, ordered by position.
///
/// Spans cover the reference value only (no quotes or `url(`), so a
/// rewrite keeps the surrounding syntax byte for byte.
pub fn references(css: &str) -> Vec<Located> {
    let mut out = Vec::new();

    for caps in RE_URL.captures_iter(css) {
        if let Some(m) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) {
            if !m.as_str().is_empty() {
                out.push(Located::new(m.start(), m.end(), m.as_str(), RefAttr::CssUrl));
            }
        }
    }

    for caps in RE_IMPORT.captures_iter(css) {
        if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
            if !m.as_str().is_empty() {
                out.push(Located::new(m.start(), m.end(), m.as_str(), RefAttr::CssImport));
            }
        }
    }

    out.sort_by_key(|l| l.start);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_forms() {
        let css = r#"a{background:url(../img/a.png)} b{background:url( "b.png" )} c{src:url('c.woff2')}"#;
        let refs = references(css);
        let values: Vec<_> = refs.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, vec!["../img/a.png", "b.png", "c.woff2"]);
        assert!(refs.iter().all(|r| r.attr == RefAttr::CssUrl));
        for r in &refs {
            assert_eq!(&css[r.start..r.end], r.value);
        }
    }

    #[test]
    fn test_imports() {
        let css = "@import \"base.css\";\n@import url(theme.css) screen;\n@import 'print.css' print;";
        let refs = references(css);
        let imports: Vec<_> = refs
            .iter()
            .filter(|r| r.attr == RefAttr::CssImport)
            .map(|r| r.value.as_str())
            .collect();
        assert_eq!(imports, vec!["base.css", "print.css"]);
        assert!(refs.iter().any(|r| r.value == "theme.css" && r.attr == RefAttr::CssUrl));
    }

    #[test]
    fn test_ignores_empty_url() {
        assert!(references("a{background:url()}").is_empty());
    }

    #[test]
    fn test_ordered_by_position() {
        let refs = references("b{background:url(x.png)} @import 'a.css';");
        assert_eq!(refs[0].value, "x.png");
        assert_eq!(refs[1].value, "a.css");
    }
}
