//! The MCDA geoprocessing engine: resolves layers, aligns them to a
//! common analysis grid, derives slope, normalizes, compiles the
//! exclusion mask, overlays, and computes summary statistics.

pub mod catalog;
pub mod concurrency;
pub mod constraints;
pub mod derive;
pub mod error;
pub mod normalize;
pub mod overlay;
pub mod pipeline;
pub mod source;
pub mod statistics;
pub mod window_aligner;
pub mod writer;

pub use error::{Error, Result};
