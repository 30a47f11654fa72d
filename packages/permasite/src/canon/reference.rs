//! Typed references and the canonicalizer.
//!
//! A raw reference string is classified once into a [`Reference`] using its
//! [`RefContext`] (the enclosing document and the syntactic position it was
//! found in). Only [`Reference::Site`] values carry a canonical key; every
//! other kind passes through rewriting untouched.
//!
//! | Kind | Example | Result |
//! |------|---------|--------|
//! | `External` | `https://other.org/x` | untouched |
//! | `NonNavigable` | `mailto:a@b.c`, `data:...`, bare `react` import | untouched |
//! | `Fragment` | `#section` | untouched |
//! | `Stored` | `https://arweave.net/<id>` | untouched (already rewritten) |
//! | `Site` | `../img/logo.png`, `/guide/` | canonical key + query/fragment |

use serde::{Deserialize, Serialize};
use url::Url;

use super::path::normalize_path;
use crate::types::config::StorageAddressing;

/// Schemes that never denote a fetchable same-site resource.
const NON_NAVIGABLE_SCHEMES: &[&str] = &[
    "mailto", "tel", "sms", "javascript", "data", "blob", "about", "file",
];

/// Syntactic position a reference was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefAttr {
    /// `<a href>`, `<link href>`
    Href,
    /// `src`, `data-src`, `poster`
    Src,
    /// One candidate URL of a `srcset` list
    Srcset,
    /// CSS `url(...)`
    CssUrl,
    /// CSS `@import`
    CssImport,
    /// ES module import specifier (`import x from "./a.js"`, `import("./b.js")`)
    ImportSpecifier,
    /// Path-looking string embedded in JSON
    JsonString,
}

impl RefAttr {
    /// Whether bare words (`react`, `logo.png`) are paths in this position.
    fn allows_bare_relative(self) -> bool {
        !matches!(self, RefAttr::ImportSpecifier | RefAttr::JsonString)
    }
}

/// Context needed to resolve a reference.
#[derive(Debug, Clone, Copy)]
pub struct RefContext<'a> {
    /// URL of the document the reference appears in
    pub document: &'a Url,
    /// Where in the document it appears
    pub attr: RefAttr,
}

impl<'a> RefContext<'a> {
    pub fn new(document: &'a Url, attr: RefAttr) -> Self {
        Self { document, attr }
    }
}

/// A same-site reference resolved to its canonical key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRef {
    /// Canonical key (decoded, leading slash, no trailing slash except root)
    pub key: String,
    /// Query string without `?`, kept for re-attachment only
    pub query: Option<String>,
    /// Fragment without `#`, kept for re-attachment only
    pub fragment: Option<String>,
    /// Absolute URL the reference resolves to (no fragment)
    pub url: Url,
}

impl SiteRef {
    /// `?query#fragment` suffix to re-attach after rewriting.
    pub fn suffix(&self) -> String {
        let mut out = String::new();
        if let Some(q) = &self.query {
            out.push('?');
            out.push_str(q);
        }
        if let Some(f) = &self.fragment {
            out.push('#');
            out.push_str(f);
        }
        out
    }
}

/// Classification of a raw reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference<'a> {
    /// Absolute URL to a different host
    External(&'a str),
    /// Non-navigable scheme, empty value, or bare module specifier
    NonNavigable(&'a str),
    /// Fragment-only reference (`#top`)
    Fragment(&'a str),
    /// Already points at the storage network
    Stored(&'a str),
    /// Same-site resource
    Site(SiteRef),
}

impl Reference<'_> {
    /// Canonical key for same-site references.
    pub fn key(&self) -> Option<&str> {
        match self {
            Reference::Site(site) => Some(&site.key),
            _ => None,
        }
    }

    pub fn is_site(&self) -> bool {
        matches!(self, Reference::Site(_))
    }
}

/// Turns written references into canonical keys for one site.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    site: Url,
    addressing: StorageAddressing,
}

impl Canonicalizer {
    /// Create a canonicalizer for the site the seed URL belongs to.
    pub fn new(site: &Url) -> Self {
        Self {
            site: site.clone(),
            addressing: StorageAddressing::default(),
        }
    }

    /// Use custom storage-network addressing (gateway hosts, schemes).
    pub fn with_addressing(mut self, addressing: StorageAddressing) -> Self {
        self.addressing = addressing;
        self
    }

    pub fn site(&self) -> &Url {
        &self.site
    }

    pub fn addressing(&self) -> &StorageAddressing {
        &self.addressing
    }

    /// Canonical key of an absolute URL's path.
    pub fn canonical_path(url: &Url) -> String {
        normalize_path(url.path())
    }

    /// Whether a URL belongs to the same site (host ignoring `www.`, same explicit port).
    pub fn is_same_site(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        host_key(url) == host_key(&self.site) && url.port() == self.site.port()
    }

    /// Classify a raw reference in its context.
    pub fn parse<'r>(&self, raw: &'r str, ctx: &RefContext<'_>) -> Reference<'r> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Reference::NonNavigable(raw);
        }
        if trimmed.starts_with('#') {
            return Reference::Fragment(raw);
        }
        if self.addressing.is_storage_ref(trimmed) {
            return Reference::Stored(raw);
        }

        match scheme_of(trimmed) {
            Some(scheme) => {
                let scheme = scheme.to_ascii_lowercase();
                if NON_NAVIGABLE_SCHEMES.contains(&scheme.as_str()) {
                    return Reference::NonNavigable(raw);
                }
                if scheme != "http" && scheme != "https" {
                    return Reference::External(raw);
                }
            }
            None => {
                let explicit = trimmed.starts_with('/') || trimmed.starts_with('.');
                if !explicit && !ctx.attr.allows_bare_relative() {
                    return Reference::NonNavigable(raw);
                }
                if ctx.attr == RefAttr::JsonString && trimmed.starts_with("//") {
                    return Reference::NonNavigable(raw);
                }
            }
        }

        let (without_fragment, fragment) = match trimmed.split_once('#') {
            Some((rest, frag)) => (rest, Some(frag.to_string())),
            None => (trimmed, None),
        };
        let (path_part, query) = match without_fragment.split_once('?') {
            Some((rest, q)) => (rest, Some(q.to_string())),
            None => (without_fragment, None),
        };

        let Ok(mut resolved) = ctx.document.join(path_part) else {
            return Reference::NonNavigable(raw);
        };
        if !self.is_same_site(&resolved) {
            return Reference::External(raw);
        }
        resolved.set_query(None);
        resolved.set_fragment(None);

        Reference::Site(SiteRef {
            key: Self::canonical_path(&resolved),
            query: query.filter(|q| !q.is_empty()),
            fragment: fragment.filter(|f| !f.is_empty()),
            url: resolved,
        })
    }

    /// Canonical key for a same-site reference; any other reference is
    /// returned untouched.
    pub fn canonicalize(&self, raw: &str, ctx: &RefContext<'_>) -> String {
        match self.parse(raw, ctx) {
            Reference::Site(site) => site.key,
            _ => raw.to_string(),
        }
    }

    /// Absolute same-site URL for crawling (query and fragment dropped).
    pub fn resolve_url(&self, raw: &str, ctx: &RefContext<'_>) -> Option<Url> {
        match self.parse(raw, ctx) {
            Reference::Site(site) => Some(site.url),
            _ => None,
        }
    }
}

/// Host compared without a leading `www.`.
fn host_key(url: &Url) -> Option<String> {
    url.host_str().map(|h| {
        let h = h.to_ascii_lowercase();
        h.strip_prefix("www.").map(str::to_string).unwrap_or(h)
    })
}

/// URL scheme if the string starts with `scheme:`.
pub(crate) fn scheme_of(s: &str) -> Option<&str> {
    let colon = s.find(':')?;
    let scheme = &s[..colon];
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        Some(scheme)
    } else {
        None
    }
}
