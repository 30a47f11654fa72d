//! Render and fetch backend implementations.

pub mod http;

pub use http::HttpRenderer;
