//! SSTable files on disk: naming convention, companion discovery, binary
//! layout and the read handle.

pub mod component;
pub mod data;
pub mod reader;
pub mod statistics;

#[cfg(test)]
pub mod builder;

pub use component::{
    discover_sstables, validate_sstable, Component, DiscoveredSstable, SstableName,
    ValidationReport,
};
pub use data::{Row, ScanSummary};
pub use reader::Sstable;
pub use statistics::SstableStats;
