//! Storage network clients.
//!
//! - `HttpStorageClient` - uploads through an HTTP upload service, reads through a gateway
//! - `MemoryStorage` - content-addressed in-process store for dry runs

pub mod http;
pub mod memory;

pub use http::HttpStorageClient;
pub use memory::MemoryStorage;
