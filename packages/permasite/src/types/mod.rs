//! Domain types shared by the extractor, publisher and manifest builder.

pub mod config;
pub mod report;
pub mod site;
