//! Job lifecycle, metadata store, queue binding, and the worker binary's
//! ambient stack (spec.md §2 components 9-10, plus SPEC_FULL.md §7).

pub mod config;
pub mod context;
pub mod error;
pub mod janitor;
pub mod job_controller;
pub mod metadata;
pub mod queue;

pub use error::{Error, Result};
