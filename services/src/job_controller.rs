//! The job-lifecycle controller of spec.md §4.9: owns admission,
//! claiming, and the terminal commit. This is the only thing that calls
//! `mcda_operators::pipeline::run` — everything upstream (`QueueBinding`)
//! just hands it a job id.

use crate::context::EngineContext;
use crate::error::{self, Result};
use crate::metadata::postgres;
use crate::metadata::types::{Aoi, Job, JobId, JobStatus, ProjectId};
use mcda_operators::catalog::FactorId;
use mcda_operators::constraints::ConstraintSpec;
use mcda_operators::pipeline::{self, JobInput, PipelineContext};
use mcda_operators::writer::ResultWriter;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Validates a job admission request and, only if every check passes,
/// inserts the `PENDING` row (spec.md §4.9's `admit` entry point — a
/// validation failure never creates a row at all, per spec.md §3's
/// invariant that `weights` always sums to 100 at creation).
pub async fn admit(
    ctx: &EngineContext,
    project_id: ProjectId,
    aoi_id: crate::metadata::types::AoiId,
    weights: HashMap<String, f64>,
    constraints: HashMap<String, serde_json::Value>,
) -> Result<JobId> {
    let project = postgres::fetch_project(&ctx.db_pool, project_id).await?;
    let aoi = postgres::fetch_aoi(&ctx.db_pool, aoi_id).await?;

    if aoi.project_id != project_id {
        return Err(error::Error::ValidationError {
            reason: format!("aoi {aoi_id} does not belong to project {project_id}"),
        });
    }

    if aoi.area_km2 > ctx.config.max_aoi_area_km2 {
        return Err(error::Error::ValidationError {
            reason: format!(
                "aoi area {:.1} km2 exceeds max_aoi_area_km2 {:.1}",
                aoi.area_km2, ctx.config.max_aoi_area_km2
            ),
        });
    }

    validate_weights(&weights)?;
    // Every constraint kind resolves to a fixed, always-present data-lake
    // layer (spec.md §4.5's closed table), so parsing successfully is
    // the whole of admission's constraint check.
    validate_constraints(&constraints)?;

    let active = postgres::count_active_jobs_for_user(&ctx.db_pool, project.user_id).await?;
    if active >= ctx.config.max_concurrent_jobs_per_user as i64 {
        return Err(error::Error::ValidationError {
            reason: format!(
                "user {} already has {active} active jobs (limit {})",
                project.user_id, ctx.config.max_concurrent_jobs_per_user
            ),
        });
    }

    postgres::insert_pending_job(&ctx.db_pool, project_id, aoi_id, &weights, &constraints).await
}

fn validate_weights(weights: &HashMap<String, f64>) -> Result<()> {
    let mut sum = 0.0;
    for (key, &value) in weights {
        if FactorId::from_key(key).is_none() {
            return Err(error::Error::ValidationError {
                reason: format!("unknown factor: {key}"),
            });
        }
        if value < 0.0 {
            return Err(error::Error::ValidationError {
                reason: format!("factor {key} has a negative weight: {value}"),
            });
        }
        sum += value;
    }
    if (sum - 100.0).abs() > 0.01 {
        return Err(error::Error::ValidationError {
            reason: format!("weights sum to {sum}, not 100 (+/- 0.01)"),
        });
    }
    Ok(())
}

fn validate_constraints(constraints: &HashMap<String, serde_json::Value>) -> Result<()> {
    for (key, value) in constraints {
        ConstraintSpec::from_key_value(key, value)?;
    }
    Ok(())
}

/// Handles one queue delivery: claims the job (no-op if it is not
/// `PENDING` — spec.md §4.10/§8 scenario 6), runs the pipeline, and
/// commits the terminal transition. Never returns an `Err` for a
/// business failure — those land as a `FAILED` row; `Err` here means the
/// controller itself could not reach a terminal commit (e.g. the
/// database is down), which the queue binding should NOT ack, so the
/// message can be redelivered.
pub async fn run_job(ctx: &EngineContext, job_id: JobId) -> Result<()> {
    let job = match postgres::claim_pending_job(&ctx.db_pool, job_id).await? {
        Some(job) => job,
        None => {
            info!(job_id = job_id.get(), "job was not PENDING, no-op");
            return Ok(());
        }
    };

    info!(job_id = job_id.get(), "job claimed, starting pipeline");

    let outcome = execute(ctx, &job).await;

    match outcome {
        Ok((score_uri, statistics)) => {
            let stats_json = serde_json::to_value(statistics)?;
            postgres::complete_job(&ctx.db_pool, job_id, &score_uri, &stats_json).await?;
            info!(job_id = job_id.get(), result = %score_uri, "job complete");
        }
        Err(err) => {
            let message = failure_message(&err);
            warn!(job_id = job_id.get(), error = %message, "job failed");
            postgres::fail_job(&ctx.db_pool, job_id, &message).await?;
        }
    }

    Ok(())
}

/// Maps an engine error to the `error_message` string persisted to the
/// row. Cancellation and the soft timeout get the exact strings spec.md
/// §4.10/§5 name (`"cancelled"`, `"timeout_soft"`); everything else gets
/// a descriptive message (spec.md §7: "a single `error_message` string").
fn failure_message(err: &error::Error) -> String {
    let kind = err.classify();
    match kind {
        error::FailureKind::Cancelled | error::FailureKind::TimedOut => kind.to_string(),
        _ => err.to_string(),
    }
}

async fn execute(ctx: &EngineContext, job: &Job) -> Result<(String, mcda_operators::statistics::Statistics)> {
    let aoi: Aoi = postgres::fetch_aoi(&ctx.db_pool, job.aoi_id).await?;

    let weights: HashMap<FactorId, f64> = job
        .weights
        .iter()
        .map(|(key, &value)| {
            FactorId::from_key(key)
                .map(|id| (id, value))
                .ok_or_else(|| error::Error::ValidationError {
                    reason: format!("unknown factor persisted on job {}: {key}", job.id),
                })
        })
        .collect::<Result<_>>()?;

    let constraints: Vec<ConstraintSpec> = job
        .constraints
        .iter()
        .map(|(key, value)| ConstraintSpec::from_key_value(key, value))
        .collect::<mcda_operators::error::Result<_>>()?;

    let job_input = JobInput {
        job_id: job.id.get(),
        aoi: aoi.polygon,
        weights,
        constraints,
    };

    let cancelled = Arc::new(AtomicBool::new(false));
    let poll_handle = spawn_cancellation_poll(ctx, job.id, Arc::clone(&cancelled));

    let pipeline_ctx = PipelineContext {
        source_cache: Arc::clone(&ctx.source_cache),
        read_concurrency: ctx.read_concurrency.clone(),
        data_lake_uri_prefix: ctx.data_lake_uri_prefix.clone(),
        row_bands: ctx.config.worker_processes.max(1),
        cancelled,
        soft_deadline: Some(Instant::now() + Duration::from_secs(ctx.config.soft_time_limit_s)),
    };

    let result = pipeline::run(&job_input, &pipeline_ctx).await;
    poll_handle.abort();
    let output = result?;

    let writer = ResultWriter::new(Arc::clone(&ctx.results_store));
    let uri = writer.write(&output.score, &output.grid, job.id.get()).await?;

    Ok((uri, output.statistics))
}

/// Polls the cancellation flag a few times a second for the duration of
/// the pipeline run, mirroring it onto the in-memory `AtomicBool` the
/// pipeline actually checks at stage boundaries (spec.md §4.10:
/// cancellation is cooperative and coarse-grained, not fine-grained, so
/// a polling interval well under one stage's typical duration is
/// sufficient).
fn spawn_cancellation_poll(ctx: &EngineContext, job_id: JobId, flag: Arc<AtomicBool>) -> tokio::task::JoinHandle<()> {
    let pool = ctx.db_pool.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(500)).await;
            match postgres::is_cancellation_requested(&pool, job_id).await {
                Ok(true) => {
                    flag.store(true, Ordering::Relaxed);
                    break;
                }
                Ok(false) => {}
                Err(err) => {
                    error!(job_id = job_id.get(), %err, "cancellation poll failed");
                }
            }
        }
    })
}

/// Sets the cancellation flag checked by [`spawn_cancellation_poll`]
/// above (spec.md §4.10: "Cancellation (delete of a RUNNING job) sets a
/// cancellation flag").
pub async fn request_cancellation(ctx: &EngineContext, job_id: JobId) -> Result<()> {
    postgres::request_cancellation(&ctx.db_pool, job_id).await
}

/// Whether `status` could still validly transition forward — used by
/// callers that want to distinguish "already terminal" from "in
/// progress" without re-deriving spec.md §3(b)'s forward-only rule
/// inline.
pub fn is_terminal(status: JobStatus) -> bool {
    matches!(status, JobStatus::Complete | JobStatus::Failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn weights_summing_to_100_are_accepted() {
        let w = weights(&[("ghi", 40.0), ("slope", 30.0), ("grid_dist", 30.0)]);
        assert!(validate_weights(&w).is_ok());
    }

    #[test]
    fn weights_not_summing_to_100_are_rejected() {
        let w = weights(&[("ghi", 40.0), ("slope", 30.0)]);
        assert!(validate_weights(&w).is_err());
    }

    #[test]
    fn an_unknown_factor_key_is_rejected() {
        let w = weights(&[("not_a_factor", 100.0)]);
        assert!(validate_weights(&w).is_err());
    }

    #[test]
    fn a_negative_weight_is_rejected() {
        let w = weights(&[("ghi", 120.0), ("slope", -20.0)]);
        assert!(validate_weights(&w).is_err());
    }

    #[test]
    fn an_unknown_constraint_key_is_rejected() {
        let mut constraints = HashMap::new();
        constraints.insert("not_a_constraint".to_string(), serde_json::json!(10.0));
        assert!(validate_constraints(&constraints).is_err());
    }

    #[test]
    fn cancelled_and_timed_out_map_to_their_fixed_strings() {
        let cancelled: error::Error = mcda_operators::Error::Cancelled.into();
        assert_eq!(failure_message(&cancelled), "cancelled");

        let timed_out: error::Error = mcda_operators::Error::TimedOut.into();
        assert_eq!(failure_message(&timed_out), "timeout_soft");
    }

    #[test]
    fn other_failures_keep_their_descriptive_message() {
        let err = error::Error::ValidationError {
            reason: "bad weights".to_string(),
        };
        assert_eq!(failure_message(&err), err.to_string());
    }

    #[test]
    fn only_complete_and_failed_are_terminal() {
        assert!(!is_terminal(JobStatus::Pending));
        assert!(!is_terminal(JobStatus::Running));
        assert!(is_terminal(JobStatus::Complete));
        assert!(is_terminal(JobStatus::Failed));
    }
}
