//! DOM-based discovery of links and asset references.

use scraper::{ElementRef, Html, Selector};

use crate::canon::RefAttr;
use crate::scan;

/// Where navigable links are found, and the attribute holding the target.
const LINK_SELECTORS: &[(&str, &str)] = &[
    ("a[href]", "href"),
    ("area[href]", "href"),
    ("link[rel~='next'][href]", "href"),
    ("link[rel~='prev'][href]", "href"),
    ("nav [data-href]", "data-href"),
    ("aside [data-href]", "data-href"),
    ("[role='navigation'] [data-href]", "data-href"),
];

/// Where asset references are found.
const ASSET_SELECTORS: &[(&str, &str, RefAttr)] = &[
    ("link[rel~='stylesheet'][href]", "href", RefAttr::Href),
    ("link[rel~='icon'][href]", "href", RefAttr::Href),
    ("link[rel='apple-touch-icon'][href]", "href", RefAttr::Href),
    ("link[rel~='preload'][href]", "href", RefAttr::Href),
    ("link[rel~='modulepreload'][href]", "href", RefAttr::Href),
    ("link[rel~='manifest'][href]", "href", RefAttr::Href),
    ("script[src]", "src", RefAttr::Src),
    ("img[src]", "src", RefAttr::Src),
    ("img[data-src]", "data-src", RefAttr::Src),
    ("source[src]", "src", RefAttr::Src),
    ("video[src]", "src", RefAttr::Src),
    ("audio[src]", "src", RefAttr::Src),
    ("video[poster]", "poster", RefAttr::Src),
];

const SRCSET_SELECTORS: &[&str] = &["img[srcset]", "source[srcset]"];

/// References and signals found in one rendered document.
#[derive(Debug, Clone, Default)]
pub struct Discovered {
    pub title: Option<String>,
    /// Text of the first `<h1>`
    pub heading: Option<String>,
    /// Raw link targets, in document order, deduplicated
    pub links: Vec<String>,
    /// Raw asset references with their syntactic position, deduplicated
    pub assets: Vec<(String, RefAttr)>,
}

/// Parse a document and collect everything the crawler follows.
pub fn discover(html: &str) -> Discovered {
    let document = Html::parse_document(html);
    let mut found = Discovered {
        title: first_text(&document, "title"),
        heading: first_text(&document, "h1"),
        ..Default::default()
    };

    for (selector_str, attr) in LINK_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            for el in document.select(&selector) {
                if let Some(target) = el.value().attr(attr) {
                    push_unique(&mut found.links, target.trim());
                }
            }
        }
    }

    let mut assets: Vec<(String, RefAttr)> = Vec::new();
    let mut add_asset = |value: &str, attr: RefAttr| {
        let value = value.trim();
        if !value.is_empty() && !assets.iter().any(|(v, _)| v == value) {
            assets.push((value.to_string(), attr));
        }
    };

    for (selector_str, name, attr) in ASSET_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            for el in document.select(&selector) {
                if let Some(value) = el.value().attr(name) {
                    add_asset(value, *attr);
                }
            }
        }
    }

    for selector_str in SRCSET_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            for el in document.select(&selector) {
                if let Some(value) = el.value().attr("srcset") {
                    for (start, end) in scan::html::srcset_candidates(value) {
                        add_asset(&value[start..end], RefAttr::Srcset);
                    }
                }
            }
        }
    }

    if let Ok(selector) = Selector::parse("style") {
        for el in document.select(&selector) {
            for r in scan::css::references(&text_of(&el)) {
                add_asset(&r.value, r.attr);
            }
        }
    }

    if let Ok(selector) = Selector::parse("[style]") {
        for el in document.select(&selector) {
            if let Some(style) = el.value().attr("style") {
                for r in scan::css::references(style) {
                    add_asset(&r.value, r.attr);
                }
            }
        }
    }

    if let Ok(selector) = Selector::parse("script:not([src])") {
        for el in document.select(&selector) {
            let is_module = el
                .value()
                .attr("type")
                .map(|t| t.eq_ignore_ascii_case("module"))
                .unwrap_or(false);
            if is_module {
                for r in scan::html::import_specifiers(&text_of(&el)) {
                    add_asset(&r.value, r.attr);
                }
            }
        }
    }

    found.assets = assets;
    found
}

fn first_text(document: &Html, selector_str: &str) -> Option<String> {
    let selector = Selector::parse(selector_str).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn text_of(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !value.is_empty() && !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html>
<head>
  <title> Guide </title>
  <link rel="stylesheet" href="/css/site.css">
  <link rel="shortcut icon" href="/favicon.ico">
  <link rel="canonical" href="https://example.com/guide">
  <style>body { background: url(/img/bg.png) }</style>
</head>
<body>
  <nav><a href="/about">About</a><span data-href="/pricing">Pricing</span></nav>
  <h1>Getting started</h1>
  <a href="/about">About again</a>
  <a href="https://other.org/">Elsewhere</a>
  <img src="/img/logo.png" srcset="/img/logo@2x.png 2x">
  <div style="background-image: url('hero.jpg')"></div>
  <script src="/js/app.js"></script>
  <script type="module">import "./chunk.js";</script>
</body>
</html>"#;

    #[test]
    fn test_title_and_heading() {
        let found = discover(PAGE);
        assert_eq!(found.title.as_deref(), Some("Guide"));
        assert_eq!(found.heading.as_deref(), Some("Getting started"));
    }

    #[test]
    fn test_links_deduplicated() {
        let found = discover(PAGE);
        assert_eq!(found.links, vec!["/about", "https://other.org/", "/pricing"]);
    }

    #[test]
    fn test_assets() {
        let found = discover(PAGE);
        let values: Vec<&str> = found.assets.iter().map(|(v, _)| v.as_str()).collect();
        for expected in [
            "/css/site.css",
            "/favicon.ico",
            "/js/app.js",
            "/img/logo.png",
            "/img/logo@2x.png",
            "/img/bg.png",
            "hero.jpg",
            "./chunk.js",
        ] {
            assert!(values.contains(&expected), "missing {expected}");
        }
        assert!(!values.contains(&"https://example.com/guide"));
    }

    #[test]
    fn test_import_specifier_attr() {
        let found = discover(PAGE);
        let chunk = found.assets.iter().find(|(v, _)| v == "./chunk.js").unwrap();
        assert_eq!(chunk.1, RefAttr::ImportSpecifier);
    }
}
