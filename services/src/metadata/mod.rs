//! The relational data model of spec.md §3 and its Postgres binding
//! (spec.md §6's "Metadata store"). `types` holds the plain Rust row
//! shapes; `postgres` holds the schema and the repository functions
//! `JobController` and `janitor` call through a pooled connection.

pub mod postgres;
pub mod types;

pub use types::{
    Aoi, AoiId, InfrastructureFeature, Job, JobId, JobStatus, Project, ProjectId, User, UserId,
};
