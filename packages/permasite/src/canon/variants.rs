//! Inverse canonicalization: which keys may address a stored path.
//!
//! A stored object lives under exactly one path (`/guide/index.html`), but
//! documents refer to it in many ways (`./guide`, `/guide/`,
//! `guide/index.html`). [`variants`] enumerates those keys together with the
//! number of transformations each needs, and [`PathIndex`] uses that cost to
//! resolve a canonical key back to the most specific stored path.

use std::collections::{BTreeSet, HashMap};

use super::path::strip_html_extension;

/// One key a stored path can be addressed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub key: String,
    /// Number of transformations applied to the stored path (0 = exact)
    pub cost: u8,
}

/// Every canonical key a reference might use to mean `stored`.
pub fn variants(stored: &str) -> BTreeSet<String> {
    variants_with_cost(stored)
        .into_iter()
        .map(|v| v.key)
        .collect()
}

/// [`variants`] with the transformation cost of each key.
pub fn variants_with_cost(stored: &str) -> Vec<Variant> {
    let rooted = format!("/{}", stored.trim_start_matches('/'));
    let mut forms: Vec<(String, u8)> = vec![(rooted.clone(), 0)];

    if let Some(stem) = strip_html_extension(&rooted) {
        forms.push((stem.to_string(), 1));

        match stem.strip_suffix("index") {
            Some(dir) if dir.ends_with('/') => {
                forms.push((dir.to_string(), 1));
                if dir != "/" {
                    forms.push((dir.trim_end_matches('/').to_string(), 1));
                }
            }
            _ => forms.push((format!("{stem}/"), 2)),
        }
    }

    let mut out: Vec<Variant> = Vec::with_capacity(forms.len() * 2);
    for (key, cost) in forms {
        let relative = key.trim_start_matches('/').to_string();
        push_min(&mut out, key, cost);
        push_min(&mut out, relative, cost + 1);
    }
    out
}

fn push_min(out: &mut Vec<Variant>, key: String, cost: u8) {
    match out.iter_mut().find(|v| v.key == key) {
        Some(existing) => existing.cost = existing.cost.min(cost),
        None => out.push(Variant { key, cost }),
    }
}

/// Outcome of resolving a canonical key against stored paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'a> {
    /// Stored path chosen by precedence
    pub path: &'a str,
    /// Other stored paths that matched with equal specificity
    pub ambiguous_with: Vec<&'a str>,
}

impl Resolution<'_> {
    pub fn is_ambiguous(&self) -> bool {
        !self.ambiguous_with.is_empty()
    }
}

/// Lookup table from every variant key to the stored paths it may denote.
#[derive(Debug, Clone, Default)]
pub struct PathIndex {
    entries: HashMap<String, Vec<(String, u8)>>,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index over a set of stored paths.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::new();
        for path in paths {
            index.insert(path.as_ref());
        }
        index
    }

    /// Register a stored path and all its variants.
    pub fn insert(&mut self, stored: &str) {
        let rooted = format!("/{}", stored.trim_start_matches('/'));
        for variant in variants_with_cost(&rooted) {
            let candidates = self.entries.entry(variant.key).or_default();
            if !candidates.iter().any(|(p, _)| *p == rooted) {
                candidates.push((rooted.clone(), variant.cost));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a canonical key to a stored path.
    ///
    /// Precedence: exact match, then fewest transformations, then the longer
    /// stored path. Remaining ties fall back to lexicographic order and are
    /// reported through [`Resolution::ambiguous_with`].
    pub fn resolve(&self, key: &str) -> Option<Resolution<'_>> {
        let candidates = self.entries.get(key)?;
        let best = candidates.iter().min_by(|(pa, ca), (pb, cb)| {
            ca.cmp(cb)
                .then_with(|| pb.len().cmp(&pa.len()))
                .then_with(|| pa.cmp(pb))
        })?;

        let ambiguous_with = candidates
            .iter()
            .filter(|(p, c)| *c == best.1 && p.len() == best.0.len() && *p != best.0)
            .map(|(p, _)| p.as_str())
            .collect();

        Some(Resolution {
            path: &best.0,
            ambiguous_with,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_file_variants() {
        let v = variants("/guide/index.html");
        for key in [
            "/guide/index.html",
            "guide/index.html",
            "/guide/index",
            "/guide/",
            "/guide",
            "guide/",
            "guide",
        ] {
            assert!(v.contains(key), "missing variant {key}");
        }
    }

    #[test]
    fn test_plain_html_variants() {
        let v = variants("/about.html");
        for key in ["/about.html", "about.html", "/about", "about", "/about/"] {
            assert!(v.contains(key), "missing variant {key}");
        }
    }

    #[test]
    fn test_root_index_variants() {
        let v = variants("/index.html");
        assert!(v.contains("/"));
        assert!(v.contains("/index"));
        assert!(v.contains("index.html"));
    }

    #[test]
    fn test_asset_variants_are_slash_forms_only() {
        let v = variants("/img/logo.png");
        assert_eq!(
            v,
            ["/img/logo.png", "img/logo.png"]
                .into_iter()
                .map(String::from)
                .collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn test_variants_contain_identity() {
        for p in ["/guide/index.html", "/a.css", "/index.html", "/x/y/z.htm"] {
            assert!(variants(p).contains(p));
        }
    }

    #[test]
    fn test_resolve_prefers_exact() {
        let index = PathIndex::from_paths(["/guide", "/guide/index.html"]);
        assert_eq!(index.resolve("/guide").unwrap().path, "/guide");
        assert_eq!(
            index.resolve("/guide/index.html").unwrap().path,
            "/guide/index.html"
        );
    }

    #[test]
    fn test_resolve_prefers_longer_on_equal_cost() {
        let index = PathIndex::from_paths(["/about.html", "/about/index.html"]);
        let res = index.resolve("/about").unwrap();
        assert_eq!(res.path, "/about/index.html");
        assert!(!res.is_ambiguous());
    }

    #[test]
    fn test_resolve_reports_ambiguity() {
        let index = PathIndex::from_paths(["/x.html", "/x.HTML"]);
        let res = index.resolve("/x").unwrap();
        assert_eq!(res.path, "/x.HTML");
        assert_eq!(res.ambiguous_with, vec!["/x.html"]);
    }

    #[test]
    fn test_resolve_missing() {
        let index = PathIndex::from_paths(["/img/logo.png"]);
        assert!(index.resolve("/img/other.png").is_none());
        assert_eq!(index.resolve("/img/logo.png").unwrap().path, "/img/logo.png");
    }
}
