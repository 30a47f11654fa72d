//! Core trait abstractions for the permasite library.
//!
//! These traits are the seams between the pipeline and its backends:
//! rendering pages, fetching assets, writing to the storage network and
//! keeping snapshots between the extract and publish stages.

pub mod blob;
pub mod renderer;
pub mod storage;
