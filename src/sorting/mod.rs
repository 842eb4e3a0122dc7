//! Arrival sorting engine for the tag-sorter library
//!
//! Everything that happens to a single file between "it appeared in the watch
//! root" and "it sits in its destination folder" lives here. The watch session
//! only feeds paths in and collects the resulting events.
//!
//! # Module Organization
//!
//! - [`config`] - Timing and behaviour settings
//! - [`tag`] - Leading tag extraction and stripping
//! - [`stability`] - Waiting for a file to stop changing
//! - [`resolver`] - Collision-free destination naming
//! - [`executor`] - Rename or verified copy-then-delete
//! - [`pipeline`] - One arrival from stability check to outcome
//! - [`error`] - Sorting specific error types

pub mod config;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod resolver;
pub mod stability;
pub mod tag;

// Re-export main types for convenience
pub use config::SorterConfig;
pub use error::SortError;
pub use executor::{FsTransport, MoveExecutor, MoveMethod, Transport};
pub use pipeline::ArrivalPipeline;
pub use resolver::resolve_destination;
pub use stability::{FileProbe, FsProbe, Stability, StabilityDetector, StabilityReport};
pub use tag::{extract_tag, strip_tag};
