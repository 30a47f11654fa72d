//! Path canonicalization.
//!
//! - [`Canonicalizer`] turns a written reference into a canonical key
//! - [`variants`] / [`PathIndex`] go the other way: from a stored path to
//!   every key that may address it

pub mod path;
pub mod reference;
pub mod variants;

pub use path::{normalize_path, page_storage_path};
pub use reference::{Canonicalizer, RefAttr, RefContext, Reference, SiteRef};
pub use variants::{variants, variants_with_cost, PathIndex, Resolution, Variant};
