//! Property tests for reference canonicalization and lookup variants.

use permasite::canon::{page_storage_path, variants, PathIndex};
use permasite::{Canonicalizer, RefAttr, RefContext};
use proptest::prelude::*;
use url::Url;

fn site() -> Url {
    Url::parse("https://example.com/").unwrap()
}

fn segments() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z0-9][a-z0-9_-]{0,7}", 1..5)
}

/// Segments that may carry escaped reserved characters or spaces.
fn escaped_segments() -> impl Strategy<Value = Vec<String>> {
    let escape = prop_oneof![
        Just("%3F"),
        Just("%3f"),
        Just("%23"),
        Just("%25"),
        Just("%2541"),
        Just("%2F"),
        Just("%20"),
    ];
    prop::collection::vec(
        ("[a-z0-9]{1,6}", escape, "[a-z0-9]{0,4}").prop_map(|(head, esc, tail)| format!("{head}{esc}{tail}")),
        1..4,
    )
}

fn attrs() -> impl Strategy<Value = RefAttr> {
    prop_oneof![Just(RefAttr::Href), Just(RefAttr::Src), Just(RefAttr::CssUrl)]
}

proptest! {
    #[test]
    fn canonicalize_is_idempotent(segs in segments(), attr in attrs()) {
        let base = site();
        let canon = Canonicalizer::new(&base);
        let ctx = RefContext::new(&base, attr);
        let once = canon.canonicalize(&format!("/{}/", segs.join("/")), &ctx);
        let twice = canon.canonicalize(&once, &ctx);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn escaped_paths_are_idempotent_and_distinct(segs in escaped_segments()) {
        let base = site();
        let canon = Canonicalizer::new(&base);
        let ctx = RefContext::new(&base, RefAttr::Href);
        let once = canon.canonicalize(&format!("/{}", segs.join("/")), &ctx);
        let twice = canon.canonicalize(&once, &ctx);
        prop_assert_eq!(&once, &twice);

        let head: String = segs[0].chars().take_while(|c| c.is_ascii_alphanumeric()).collect();
        prop_assert_ne!(once, format!("/{head}"));
    }

    #[test]
    fn syntactic_forms_share_one_key(segs in segments(), query in "[a-z]{0,4}") {
        let base = site();
        let canon = Canonicalizer::new(&base);
        let ctx = RefContext::new(&base, RefAttr::Href);
        let path = segs.join("/");
        let expected = format!("/{path}");

        let forms = [
            format!("/{path}"),
            format!("/{path}/"),
            format!("./{path}"),
            path.clone(),
            format!("https://example.com/{path}"),
            format!("https://www.example.com/{path}/"),
            format!("/{path}?{query}#section"),
            format!("/{}", segs.join("//")),
        ];
        for form in forms {
            let key = canon.canonicalize(&form, &ctx);
            prop_assert_eq!(&key, &expected, "form {}", form);
        }
    }

    #[test]
    fn variants_contain_identity(segs in segments(), html in any::<bool>()) {
        let stored = if html {
            page_storage_path(&format!("/{}", segs.join("/")))
        } else {
            format!("/{}.png", segs.join("/"))
        };
        prop_assert!(variants(&stored).contains(&stored));
    }

    #[test]
    fn page_references_resolve_to_stored_page(segs in segments()) {
        let base = site();
        let canon = Canonicalizer::new(&base);
        let ctx = RefContext::new(&base, RefAttr::Href);
        let canonical = format!("/{}", segs.join("/"));
        let stored = page_storage_path(&canonical);
        let index = PathIndex::from_paths([stored.as_str(), "/index.html"]);

        for form in [canonical.clone(), format!("{canonical}/"), stored.clone()] {
            let key = canon.canonicalize(&form, &ctx);
            let resolved = index.resolve(&key).map(|r| r.path.to_string());
            prop_assert_eq!(resolved.as_deref(), Some(stored.as_str()), "form {}", form);
        }
    }
}

#[test]
fn test_external_and_non_navigable_untouched() {
    let base = site();
    let canon = Canonicalizer::new(&base);
    let ctx = RefContext::new(&base, RefAttr::Href);
    for raw in [
        "https://other.org/a",
        "mailto:team@example.com",
        "javascript:void(0)",
        "data:image/png;base64,AAAA",
        "#top",
        "https://arweave.net/abc",
    ] {
        assert_eq!(canon.canonicalize(raw, &ctx), raw);
    }
}
