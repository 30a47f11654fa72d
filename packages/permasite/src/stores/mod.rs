//! Blob store implementations.
//!
//! Available backends:
//! - `MemoryBlobStore` - In-memory storage for tests and single-process runs
//! - `FsBlobStore` - Files under a data directory; survives between runs

pub mod fs;
pub mod memory;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;
