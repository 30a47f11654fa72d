//! Reference rewriting against published identifiers.
//!
//! Every same-site reference in a stylesheet or page is resolved to a stored
//! path through [`PathIndex`], and replaced with the storage address of that
//! path's identifier. The query and fragment of the original reference are
//! re-attached. References that do not resolve are left byte-for-byte
//! untouched, as is everything that is not a reference.

use bytes::Bytes;
use std::collections::BTreeMap;
use url::Url;

use crate::canon::{Canonicalizer, PathIndex, RefContext, Reference};
use crate::scan::{self, splice, Located};
use crate::types::config::StorageAddressing;

/// A reference key that matched several stored paths equally well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ambiguity {
    pub key: String,
    pub chosen: String,
    pub others: Vec<String>,
}

/// Output of rewriting one document.
#[derive(Debug, Clone, Default)]
pub struct Rewrite {
    pub output: String,
    /// References replaced with storage addresses
    pub rewritten: usize,
    /// Same-site keys with no published identifier (left as written)
    pub unresolved: Vec<String>,
    pub ambiguities: Vec<Ambiguity>,
}

impl Rewrite {
    pub fn is_changed(&self) -> bool {
        self.rewritten > 0
    }
}

/// Text view of a captured body that encodes back to the same bytes.
///
/// Bodies that are not valid UTF-8 are read one byte per character
/// (ISO-8859-1), so every byte outside a rewritten reference survives.
#[derive(Debug, Clone)]
pub struct DocumentText {
    text: String,
    utf8: bool,
}

impl DocumentText {
    pub fn decode(body: &[u8]) -> Self {
        match std::str::from_utf8(body) {
            Ok(text) => Self {
                text: text.to_string(),
                utf8: true,
            },
            Err(_) => Self {
                text: body.iter().map(|&b| char::from(b)).collect(),
                utf8: false,
            },
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_utf8(&self) -> bool {
        self.utf8
    }

    /// Encode rewritten text the way the body was decoded.
    pub fn encode(&self, text: &str) -> Bytes {
        if self.utf8 {
            return Bytes::copy_from_slice(text.as_bytes());
        }
        let mut out = Vec::with_capacity(text.len());
        for c in text.chars() {
            match u8::try_from(u32::from(c)) {
                Ok(byte) => out.push(byte),
                Err(_) => out.extend_from_slice(c.encode_utf8(&mut [0; 4]).as_bytes()),
            }
        }
        Bytes::from(out)
    }
}

/// Snapshot of published identifiers, indexed for reference lookup.
#[derive(Debug, Clone)]
pub struct AddressBook {
    ids: BTreeMap<String, String>,
    index: PathIndex,
    addressing: StorageAddressing,
}

impl AddressBook {
    /// Build from a `stored path -> identifier` snapshot.
    pub fn new(ids: BTreeMap<String, String>, addressing: StorageAddressing) -> Self {
        let index = PathIndex::from_paths(ids.keys());
        Self {
            ids,
            index,
            addressing,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Storage address for a canonical key, with any ambiguity found.
    pub fn address(&self, key: &str) -> Option<(String, Option<Ambiguity>)> {
        let resolution = self.index.resolve(key)?;
        let id = self.ids.get(resolution.path)?;
        let ambiguity = resolution.is_ambiguous().then(|| Ambiguity {
            key: key.to_string(),
            chosen: resolution.path.to_string(),
            others: resolution
                .ambiguous_with
                .iter()
                .map(|p| p.to_string())
                .collect(),
        });
        Some((self.addressing.address(id), ambiguity))
    }
}

/// Rewrites documents of one site against one [`AddressBook`].
pub struct Rewriter<'a> {
    canon: &'a Canonicalizer,
    book: &'a AddressBook,
}

impl<'a> Rewriter<'a> {
    pub fn new(canon: &'a Canonicalizer, book: &'a AddressBook) -> Self {
        Self { canon, book }
    }

    /// Rewrite a stylesheet located at `base`.
    pub fn css(&self, css: &str, base: &Url) -> Rewrite {
        self.apply(css, base, scan::css::references(css))
    }

    /// Rewrite an HTML document located at `base`.
    pub fn html(&self, html: &str, base: &Url) -> Rewrite {
        self.apply(html, base, scan::html::references(html))
    }

    /// Rewrite a captured stylesheet body; unchanged bodies come back as-is.
    pub fn css_body(&self, body: &Bytes, base: &Url) -> (Bytes, Rewrite) {
        self.body(body, |text| self.css(text, base))
    }

    /// Rewrite a captured page body; unchanged bodies come back as-is.
    pub fn html_body(&self, body: &Bytes, base: &Url) -> (Bytes, Rewrite) {
        self.body(body, |text| self.html(text, base))
    }

    fn body(&self, body: &Bytes, rewrite: impl FnOnce(&str) -> Rewrite) -> (Bytes, Rewrite) {
        let document = DocumentText::decode(body);
        let result = rewrite(document.as_str());
        if result.is_changed() {
            (document.encode(&result.output), result)
        } else {
            (body.clone(), result)
        }
    }

    fn apply(&self, text: &str, base: &Url, found: Vec<Located>) -> Rewrite {
        let mut result = Rewrite::default();
        let mut replacements = Vec::new();

        for located in found {
            let ctx = RefContext::new(base, located.attr);
            let Reference::Site(site) = self.canon.parse(&located.value, &ctx) else {
                continue;
            };
            match self.book.address(&site.key) {
                Some((address, ambiguity)) => {
                    replacements.push((located.start, located.end, address + &site.suffix()));
                    result.rewritten += 1;
                    if let Some(ambiguity) = ambiguity {
                        if !result.ambiguities.contains(&ambiguity) {
                            result.ambiguities.push(ambiguity);
                        }
                    }
                }
                None => {
                    if !result.unresolved.contains(&site.key) {
                        result.unresolved.push(site.key);
                    }
                }
            }
        }

        result.output = if replacements.is_empty() {
            text.to_string()
        } else {
            splice(text, &replacements)
        };
        result
    }
}
