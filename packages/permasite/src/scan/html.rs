//! Locate references inside an HTML document.
//!
//! Covers tag attributes (`href`, `src`, `data-src`, `poster`, `srcset`,
//! `style`), `<style>` blocks, module import specifiers in inline scripts and
//! path strings in inline JSON (`application/json`, `ld+json`, import maps).

use regex::Regex;
use std::sync::LazyLock;

use super::{css, Located};
use crate::canon::RefAttr;

static RE_STYLE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<style\b[^>]*>(.*?)</style\s*>").expect("valid style block pattern")
});

static RE_SCRIPT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script\s*>").expect("valid script block pattern")
});

static RE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<[a-zA-Z][a-zA-Z0-9:-]*(?:=\s*(?:"[^"]*"|'[^']*'|[^\s>]*)|[^>=])*>"#)
        .expect("valid tag pattern")
});

static RE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .expect("valid attribute pattern")
});

static RE_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(?:import\s*\(\s*|from\s+|import\s+)(?:"([^"\n]+)"|'([^'\n]+)')"#)
        .expect("valid import pattern")
});

static RE_JSON_STRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""((?:[^"\\\n]|\\.)*)""#).expect("valid json string pattern")
});

/// How the body of an inline `<script>` is scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScriptBody {
    Module,
    Json,
    Opaque,
}

/// All rewritable references in `html`, ordered by position.
pub fn references(html: &str) -> Vec<Located> {
    let mut out = Vec::new();
    let mut raw_text: Vec<(usize, usize)> = Vec::new();

    for caps in RE_STYLE_BLOCK.captures_iter(html) {
        if let Some(body) = caps.get(1) {
            raw_text.push((body.start(), body.end()));
            out.extend(
                css::references(body.as_str())
                    .into_iter()
                    .map(|l| l.shifted(body.start())),
            );
        }
    }

    for caps in RE_SCRIPT_BLOCK.captures_iter(html) {
        let (Some(attrs), Some(body)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        raw_text.push((body.start(), body.end()));
        let found = match script_body(attrs.as_str()) {
            ScriptBody::Module => import_specifiers(body.as_str()),
            ScriptBody::Json => json_paths(body.as_str()),
            ScriptBody::Opaque => Vec::new(),
        };
        out.extend(found.into_iter().map(|l| l.shifted(body.start())));
    }

    for tag in RE_TAG.find_iter(html) {
        if raw_text
            .iter()
            .any(|(s, e)| tag.start() >= *s && tag.start() < *e)
        {
            continue;
        }
        out.extend(
            tag_references(tag.as_str())
                .into_iter()
                .map(|l| l.shifted(tag.start())),
        );
    }

    out.sort_by_key(|l| l.start);
    out.dedup_by(|later, earlier| later.start < earlier.end);
    out
}

/// References in the attributes of one tag.
fn tag_references(tag: &str) -> Vec<Located> {
    let mut out = Vec::new();
    for caps in RE_ATTR.captures_iter(tag) {
        let Some(name) = caps.get(1) else { continue };
        let Some(value) = caps.get(2).or_else(|| caps.get(3)).or_else(|| caps.get(4)) else {
            continue;
        };
        match name.as_str().to_ascii_lowercase().as_str() {
            "href" => out.push(Located::new(value.start(), value.end(), value.as_str(), RefAttr::Href)),
            "src" | "data-src" | "poster" => {
                out.push(Located::new(value.start(), value.end(), value.as_str(), RefAttr::Src))
            }
            "srcset" | "data-srcset" | "imagesrcset" => {
                for (s, e) in srcset_candidates(value.as_str()) {
                    out.push(Located::new(
                        value.start() + s,
                        value.start() + e,
                        &value.as_str()[s..e],
                        RefAttr::Srcset,
                    ));
                }
            }
            "style" => out.extend(
                css::references(value.as_str())
                    .into_iter()
                    .map(|l| l.shifted(value.start())),
            ),
            _ => {}
        }
    }
    out
}

fn script_body(attrs: &str) -> ScriptBody {
    let mut script_type = None;
    for caps in RE_ATTR.captures_iter(attrs) {
        let Some(name) = caps.get(1) else { continue };
        let name = name.as_str().to_ascii_lowercase();
        if name == "src" {
            return ScriptBody::Opaque;
        }
        if name == "type" {
            script_type = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_ascii_lowercase());
        }
    }
    match script_type.as_deref() {
        None | Some("") | Some("module") => ScriptBody::Module,
        Some(t) if t.contains("javascript") || t.contains("ecmascript") => ScriptBody::Module,
        Some(t) if t.contains("json") || t == "importmap" => ScriptBody::Json,
        _ => ScriptBody::Opaque,
    }
}

/// `import x from "./a.js"`, `import "./b.js"`, `import("./c.js")`.
pub fn import_specifiers(js: &str) -> Vec<Located> {
    RE_IMPORT
        .captures_iter(js)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| Located::new(m.start(), m.end(), m.as_str(), RefAttr::ImportSpecifier))
        .collect()
}

/// Path-looking string values in JSON text; object keys are skipped.
pub fn json_paths(json: &str) -> Vec<Located> {
    let mut out = Vec::new();
    for caps in RE_JSON_STRING.captures_iter(json) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if json[whole.end()..].trim_start().starts_with(':') {
            continue;
        }
        let raw = inner.as_str();
        if raw.len() < 2 {
            continue;
        }
        let unescaped = raw.replace("\\/", "/");
        if unescaped.contains('\\') {
            continue;
        }
        let looks_like_path = unescaped.starts_with('/')
            || unescaped.starts_with("./")
            || unescaped.starts_with("../")
            || unescaped.starts_with("http://")
            || unescaped.starts_with("https://");
        if looks_like_path {
            out.push(Located::new(inner.start(), inner.end(), unescaped, RefAttr::JsonString));
        }
    }
    out
}

/// Byte spans of the URL part of each `srcset` candidate.
pub fn srcset_candidates(value: &str) -> Vec<(usize, usize)> {
    let bytes = value.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    if value.trim_start().starts_with("data:") {
        return out;
    }

    while i < bytes.len() {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b',') {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let mut end = i;
        while end > start && bytes[end - 1] == b',' {
            end -= 1;
        }
        let had_trailing_comma = end < i;
        if end > start {
            out.push((start, end));
        }
        if had_trailing_comma {
            continue;
        }

        // Skip the descriptor up to the next candidate separator.
        let mut depth = 0usize;
        while i < bytes.len() {
            match bytes[i] {
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                b',' if depth == 0 => break,
                _ => {}
            }
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(html: &str) -> Vec<(String, RefAttr)> {
        references(html)
            .into_iter()
            .map(|l| (l.value, l.attr))
            .collect()
    }

    #[test]
    fn test_attribute_references() {
        let html = r#"<a href="/about">About</a><img src='logo.png' data-src=lazy.png><video poster="p.jpg"></video>"#;
        let found = values(html);
        assert_eq!(
            found,
            vec![
                ("/about".to_string(), RefAttr::Href),
                ("logo.png".to_string(), RefAttr::Src),
                ("lazy.png".to_string(), RefAttr::Src),
                ("p.jpg".to_string(), RefAttr::Src),
            ]
        );
    }

    #[test]
    fn test_apostrophe_in_unquoted_value_ends_at_tag() {
        let html = r#"<a title=it's href=/x>x</a><img src="/logo.png"><a href='/y?q=a>b'>y</a>"#;
        let urls: Vec<_> = values(html).into_iter().map(|(v, _)| v).collect();
        assert_eq!(urls, vec!["/x", "/logo.png", "/y?q=a>b"]);
    }

    #[test]
    fn test_spans_point_at_values() {
        let html = r#"<link rel="stylesheet" href="/css/site.css"><p style="background:url('/bg.png')">"#;
        for l in references(html) {
            assert_eq!(&html[l.start..l.end], l.value);
        }
    }

    #[test]
    fn test_srcset() {
        let html = r#"<img srcset="a.png 1x, /b.png 2x,c.png 3x">"#;
        let urls: Vec<_> = values(html).into_iter().map(|(v, _)| v).collect();
        assert_eq!(urls, vec!["a.png", "/b.png", "c.png"]);
    }

    #[test]
    fn test_srcset_candidates_with_width_descriptors() {
        let value = "small.jpg 480w, large.jpg 1080w";
        let spans = srcset_candidates(value);
        let urls: Vec<_> = spans.iter().map(|(s, e)| &value[*s..*e]).collect();
        assert_eq!(urls, vec!["small.jpg", "large.jpg"]);
    }

    #[test]
    fn test_style_block_and_attribute() {
        let html = "<style>@import 'base.css'; body{background:url(bg.png)}</style><div style=\"background:url(/x.png)\"></div>";
        let found = values(html);
        assert!(found.contains(&("base.css".to_string(), RefAttr::CssImport)));
        assert!(found.contains(&("bg.png".to_string(), RefAttr::CssUrl)));
        assert!(found.contains(&("/x.png".to_string(), RefAttr::CssUrl)));
    }

    #[test]
    fn test_tags_inside_scripts_are_not_scanned() {
        let html = r#"<script>var s = '<a href="/nope">';</script><a href="/yes">y</a>"#;
        let found = values(html);
        assert_eq!(found, vec![("/yes".to_string(), RefAttr::Href)]);
    }

    #[test]
    fn test_module_imports() {
        let html = r#"<script type="module">import { a } from "./a.js"; import 'react'; const b = import('/b.js');</script>"#;
        let found = values(html);
        assert!(found.contains(&("./a.js".to_string(), RefAttr::ImportSpecifier)));
        assert!(found.contains(&("react".to_string(), RefAttr::ImportSpecifier)));
        assert!(found.contains(&("/b.js".to_string(), RefAttr::ImportSpecifier)));
    }

    #[test]
    fn test_json_values_not_keys() {
        let html = r#"<script type="application/json">{"/docs":"x","page":"/docs\/start","n":"a"}</script>"#;
        let found = values(html);
        assert_eq!(found, vec![("/docs/start".to_string(), RefAttr::JsonString)]);
    }

    #[test]
    fn test_external_script_body_ignored() {
        let html = r#"<script src="/app.js">import x from "./ignored.js"</script>"#;
        let found = values(html);
        assert_eq!(found, vec![("/app.js".to_string(), RefAttr::Src)]);
    }

    #[test]
    fn test_quoted_gt_inside_attribute() {
        let html = r#"<a title="a > b" href="/x">x</a>"#;
        assert_eq!(values(html), vec![("/x".to_string(), RefAttr::Href)]);
    }
}
