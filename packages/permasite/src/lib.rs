//! Website Snapshot Publishing Library
//!
//! Captures a website by breadth-first crawl and republishes it onto
//! immutable, content-addressed storage, where every object's identifier is
//! derived from its final bytes.
//!
//! # Pipeline
//!
//! 1. **Extract** - crawl from a seed URL into a [`SiteGraph`] of pages and
//!    assets, recording per-item failures in a [`RunReport`]
//! 2. **Publish** - upload in dependency order (leaf assets, stylesheets,
//!    pages in rounds), rewriting same-site references to storage addresses
//! 3. **Manifest** - map every relative path to its identifier; the
//!    manifest's own identifier addresses the whole site
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use permasite::{
//!     ExtractSettings, Extractor, HttpRenderer, MemoryStorage, PublishConfig, Publisher,
//!     RenderHandle,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let http = Arc::new(HttpRenderer::new()?);
//! let renderer = Arc::new(RenderHandle::ready(http.clone(), 4));
//!
//! let extractor = Extractor::new(renderer.clone(), http, ExtractSettings::default());
//! let extraction = extractor.extract("https://docs.example.com/", &cancel).await?;
//! renderer.shutdown().await;
//!
//! let publisher = Publisher::new(Arc::new(MemoryStorage::new()), PublishConfig::default());
//! let site = publisher.publish_site(&extraction.graph, &cancel).await?;
//! println!("https://arweave.net/{}", site.manifest_id);
//! ```
//!
//! # Modules
//!
//! - [`canon`] - Reference classification, canonical paths and lookup variants
//! - [`extractor`] - BFS crawl and asset fetching
//! - [`publisher`] - Three-pass upload protocol
//! - [`manifest`] - Path manifest wire format
//! - [`snapshot`] - Persist a site graph between extract and publish runs
//! - [`traits`] - Backend seams (renderer, fetcher, storage, blob store)
//! - [`testing`] - Mock implementations for testing

pub mod canon;
pub mod error;
pub mod estimate;
pub mod extractor;
pub mod fetchers;
pub mod manifest;
pub mod mime;
pub mod publisher;
pub mod render;
pub mod rewrite;
pub mod scan;
pub mod security;
pub mod snapshot;
pub mod storage;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use canon::{Canonicalizer, PathIndex, RefAttr, RefContext, Reference, SiteRef};
pub use error::{
    BlobError, ExtractError, FetchError, ManifestError, PublishError, StorageError,
};
pub use traits::{
    blob::BlobStore,
    renderer::{Fetched, Fetcher, Renderer},
    storage::{StorageClient, Tag},
};
pub use types::{
    config::{ExtractSettings, PublishConfig, StorageAddressing},
    report::{Issue, IssueKind, RunReport},
    site::{Asset, AssetKind, Page, SiteGraph},
};

pub use extractor::{Extraction, Extractor};
pub use manifest::{build_manifest, Manifest};
pub use publisher::{Pass, PassSummary, Publication, PublishedSite, Publisher};
pub use render::RenderHandle;
pub use rewrite::{AddressBook, Rewriter};

// Re-export backends
pub use fetchers::HttpRenderer;
pub use storage::{HttpStorageClient, MemoryStorage};
pub use stores::{FsBlobStore, MemoryBlobStore};

pub use secrecy::SecretString;
pub use security::UploadCredentials;
