//! The external broker binding of spec.md §4.10/§6: a trait abstracting
//! "receive a job id, ack once terminal", with a concrete Redis stream
//! implementation.

mod redis_stream;

pub use redis_stream::RedisStreamQueue;

use crate::error::Result;
use crate::metadata::JobId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The JSON envelope spec.md §6 names: `{"task":"run_mcda_analysis","job_id":<int>}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMessage {
    pub task: String,
    pub job_id: JobId,
    /// Broker-specific delivery handle (e.g. a Redis stream entry id),
    /// opaque to everything but the `JobQueue` implementation that
    /// produced it — `ack` hands it back unchanged.
    #[serde(skip)]
    pub delivery_tag: String,
}

/// At-least-once delivery is assumed (spec.md §4.10); exactly-once
/// *execution* is the `JobController`'s compare-and-set, not this
/// trait's job.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn recv(&self) -> Result<Option<JobMessage>>;
    async fn ack(&self, msg: &JobMessage) -> Result<()>;
}
