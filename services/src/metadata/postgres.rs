//! Postgres binding for the metadata store (spec.md §6). Raw SQL via
//! `tokio_postgres`/`bb8_postgres` (the teacher's exact dependency pair),
//! no ORM — matches spec.md §9's "ambient session" redesign note: these
//! functions are the only place that touches rows; `JobController` holds
//! no session object of its own.

use super::types::{Aoi, AoiId, Job, JobId, JobStatus, Project, ProjectId, UserId};
use crate::error::{self, Result};
use bb8_postgres::PostgresConnectionManager;
use mcda_datatypes::{AoiPolygon, Coordinate2D};
use std::collections::HashMap;
use tokio_postgres::NoTls;

pub type PgPool = bb8::Pool<PostgresConnectionManager<NoTls>>;

/// Every table spec.md §6 lists, created idempotently at startup — the
/// single-string-of-statements style of the pack's sqlx `Catalog::migrate`,
/// adapted to `tokio_postgres::simple_query`.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id BIGSERIAL PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS projects (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL REFERENCES users(id),
    name TEXT NOT NULL,
    description TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS areas_of_interest (
    id BIGSERIAL PRIMARY KEY,
    project_id BIGINT NOT NULL REFERENCES projects(id),
    name TEXT NOT NULL,
    geom TEXT NOT NULL,
    area_km2 DOUBLE PRECISION NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS analysis_jobs (
    id BIGSERIAL PRIMARY KEY,
    project_id BIGINT NOT NULL REFERENCES projects(id),
    aoi_id BIGINT NOT NULL REFERENCES areas_of_interest(id),
    status TEXT NOT NULL DEFAULT 'PENDING',
    weights_json JSONB NOT NULL,
    constraints_json JSONB NOT NULL,
    started_at TIMESTAMPTZ,
    completed_at TIMESTAMPTZ,
    result_url TEXT,
    result_tiles_url TEXT,
    stats_json JSONB,
    error_log TEXT,
    cancel_requested BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS infrastructure_osm (
    id BIGSERIAL PRIMARY KEY,
    osm_id BIGINT,
    type TEXT NOT NULL,
    subtype TEXT,
    source TEXT NOT NULL,
    geom TEXT NOT NULL,
    tags JSONB NOT NULL DEFAULT '{}'::jsonb
);
"#;

/// Applies `SCHEMA_SQL` against `pool`. Safe to call on every startup:
/// every statement is `CREATE TABLE IF NOT EXISTS`.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    let conn = pool.get().await?;
    conn.batch_execute(SCHEMA_SQL).await?;
    Ok(())
}

pub async fn fetch_project(pool: &PgPool, project_id: ProjectId) -> Result<Project> {
    let conn = pool.get().await?;
    let row = conn
        .query_opt(
            "SELECT id, user_id, name, description, created_at, updated_at FROM projects WHERE id = $1",
            &[&project_id.get()],
        )
        .await?
        .ok_or(error::Error::ProjectNotFound {
            project_id: project_id.get(),
        })?;

    Ok(Project {
        id: ProjectId(row.get(0)),
        user_id: UserId(row.get(1)),
        name: row.get(2),
        description: row.get(3),
        created_at: row.get(4),
        updated_at: row.get(5),
    })
}

pub async fn fetch_aoi(pool: &PgPool, aoi_id: AoiId) -> Result<Aoi> {
    let conn = pool.get().await?;
    let row = conn
        .query_opt(
            "SELECT id, project_id, name, geom, area_km2, created_at, updated_at FROM areas_of_interest WHERE id = $1",
            &[&aoi_id.get()],
        )
        .await?
        .ok_or(error::Error::AoiNotFound {
            aoi_id: aoi_id.get(),
        })?;

    let geom_wkt: String = row.get(3);
    let polygon = parse_polygon_wkt(&geom_wkt)?;

    Ok(Aoi {
        id: AoiId(row.get(0)),
        project_id: ProjectId(row.get(1)),
        name: row.get(2),
        polygon,
        area_km2: row.get(4),
        created_at: row.get(5),
        updated_at: row.get(6),
    })
}

/// Admission entry point: inserts a new `PENDING` row. Never called for
/// a job that failed validation — `JobController::admit` validates
/// before this is reached (spec.md §4.9: "PENDING -> FAILED" only
/// happens for rows that never actually land here, matching spec.md §3's
/// invariant that a job's `weights` always sum to 100 at creation).
pub async fn insert_pending_job(
    pool: &PgPool,
    project_id: ProjectId,
    aoi_id: AoiId,
    weights: &HashMap<String, f64>,
    constraints: &HashMap<String, serde_json::Value>,
) -> Result<JobId> {
    let conn = pool.get().await?;
    let weights_json = serde_json::to_value(weights)?;
    let constraints_json = serde_json::to_value(constraints)?;
    let row = conn
        .query_one(
            "INSERT INTO analysis_jobs (project_id, aoi_id, status, weights_json, constraints_json)
             VALUES ($1, $2, 'PENDING', $3, $4) RETURNING id",
            &[&project_id.get(), &aoi_id.get(), &weights_json, &constraints_json],
        )
        .await?;
    Ok(JobId(row.get(0)))
}

pub async fn fetch_job(pool: &PgPool, job_id: JobId) -> Result<Job> {
    let conn = pool.get().await?;
    let row = conn
        .query_opt(
            "SELECT id, project_id, aoi_id, status, weights_json, constraints_json,
                    created_at, started_at, completed_at, error_log, result_url, stats_json
             FROM analysis_jobs WHERE id = $1",
            &[&job_id.get()],
        )
        .await?
        .ok_or(error::Error::JobNotFound { job_id: job_id.get() })?;
    Ok(row_to_job(&row)?)
}

/// The at-most-once `PENDING -> RUNNING` compare-and-set of spec.md §4.9.
/// Returns `None` if the row was not in `PENDING` (another worker already
/// claimed it, or a duplicate queue delivery arrived after completion) —
/// the caller no-ops rather than erroring (spec.md §4.10, §8 scenario 6).
pub async fn claim_pending_job(pool: &PgPool, job_id: JobId) -> Result<Option<Job>> {
    let conn = pool.get().await?;
    let row = conn
        .query_opt(
            "UPDATE analysis_jobs SET status = 'RUNNING', started_at = now(), updated_at = now()
             WHERE id = $1 AND status = 'PENDING'
             RETURNING id, project_id, aoi_id, status, weights_json, constraints_json,
                       created_at, started_at, completed_at, error_log, result_url, stats_json",
            &[&job_id.get()],
        )
        .await?;
    row.map(|row| row_to_job(&row)).transpose()
}

/// `RUNNING -> COMPLETE`, a single commit (spec.md §4.9).
pub async fn complete_job(
    pool: &PgPool,
    job_id: JobId,
    result_uri: &str,
    statistics: &serde_json::Value,
) -> Result<()> {
    let conn = pool.get().await?;
    let rows = conn
        .execute(
            "UPDATE analysis_jobs SET status = 'COMPLETE', completed_at = now(), updated_at = now(),
                    result_url = $2, stats_json = $3
             WHERE id = $1 AND status = 'RUNNING'",
            &[&job_id.get(), &result_uri, statistics],
        )
        .await?;
    if rows == 0 {
        return Err(error::Error::JobNotRunning { job_id: job_id.get() });
    }
    Ok(())
}

/// `RUNNING -> FAILED`, a single commit (spec.md §4.9).
pub async fn fail_job(pool: &PgPool, job_id: JobId, error_message: &str) -> Result<()> {
    let conn = pool.get().await?;
    let rows = conn
        .execute(
            "UPDATE analysis_jobs SET status = 'FAILED', completed_at = now(), updated_at = now(),
                    error_log = $2
             WHERE id = $1 AND status = 'RUNNING'",
            &[&job_id.get(), &error_message],
        )
        .await?;
    if rows == 0 {
        return Err(error::Error::JobNotRunning { job_id: job_id.get() });
    }
    Ok(())
}

/// Admission-time `PENDING -> FAILED` used only when a row was inserted
/// then immediately found invalid by a later, more expensive check (the
/// common path validates before `insert_pending_job` and never creates
/// the row at all — this exists for completeness of the state machine).
pub async fn fail_pending_job(pool: &PgPool, job_id: JobId, error_message: &str) -> Result<()> {
    let conn = pool.get().await?;
    conn.execute(
        "UPDATE analysis_jobs SET status = 'FAILED', completed_at = now(), updated_at = now(),
                error_log = $2
         WHERE id = $1 AND status = 'PENDING'",
        &[&job_id.get(), &error_message],
    )
    .await?;
    Ok(())
}

/// Sets the cancellation flag a `RUNNING` job's pipeline checks at stage
/// boundaries (spec.md §4.10).
pub async fn request_cancellation(pool: &PgPool, job_id: JobId) -> Result<()> {
    let conn = pool.get().await?;
    conn.execute(
        "UPDATE analysis_jobs SET cancel_requested = true, updated_at = now()
         WHERE id = $1 AND status = 'RUNNING'",
        &[&job_id.get()],
    )
    .await?;
    Ok(())
}

pub async fn is_cancellation_requested(pool: &PgPool, job_id: JobId) -> Result<bool> {
    let conn = pool.get().await?;
    let row = conn
        .query_opt(
            "SELECT cancel_requested FROM analysis_jobs WHERE id = $1",
            &[&job_id.get()],
        )
        .await?;
    Ok(row.map(|r| r.get(0)).unwrap_or(false))
}

/// The number of `PENDING`/`RUNNING` jobs a user currently has in flight,
/// across all their projects — used by admission's
/// `max_concurrent_jobs_per_user` check (spec.md §6).
pub async fn count_active_jobs_for_user(pool: &PgPool, user_id: UserId) -> Result<i64> {
    let conn = pool.get().await?;
    let row = conn
        .query_one(
            "SELECT count(*) FROM analysis_jobs j
             JOIN projects p ON p.id = j.project_id
             WHERE p.user_id = $1 AND j.status IN ('PENDING', 'RUNNING')",
            &[&user_id.get()],
        )
        .await?;
    Ok(row.get(0))
}

/// The hard-timeout janitor sweep of spec.md §5: any row stuck `RUNNING`
/// past `hard_time_limit_s` is force-failed. Returns the ids swept, so
/// the caller can log how many it reset.
pub async fn sweep_hard_timeouts(pool: &PgPool, hard_time_limit_s: i64) -> Result<Vec<JobId>> {
    let conn = pool.get().await?;
    let rows = conn
        .query(
            "UPDATE analysis_jobs SET status = 'FAILED', completed_at = now(), updated_at = now(),
                    error_log = 'timeout_hard'
             WHERE status = 'RUNNING' AND started_at < now() - ($1 || ' seconds')::interval
             RETURNING id",
            &[&hard_time_limit_s.to_string()],
        )
        .await?;
    Ok(rows.iter().map(|r| JobId(r.get(0))).collect())
}

fn row_to_job(row: &tokio_postgres::Row) -> Result<Job> {
    let status_str: String = row.get(3);
    let status = JobStatus::from_db_str(&status_str).ok_or_else(|| error::Error::ValidationError {
        reason: format!("unrecognized job status in database: {status_str}"),
    })?;
    let weights_json: serde_json::Value = row.get(4);
    let constraints_json: serde_json::Value = row.get(5);
    let stats_json: Option<serde_json::Value> = row.get(11);

    Ok(Job {
        id: JobId(row.get(0)),
        project_id: ProjectId(row.get(1)),
        aoi_id: AoiId(row.get(2)),
        status,
        weights: serde_json::from_value(weights_json)?,
        constraints: serde_json::from_value(constraints_json)?,
        created_at: row.get(6),
        started_at: row.get(7),
        completed_at: row.get(8),
        error_message: row.get(9),
        result_uri: row.get(10),
        statistics: stats_json,
    })
}

/// `areas_of_interest.geom` is stored as WKT `POLYGON((lon lat, ...))`
/// (spec.md §6's table lists a `geom[polygon, WGS84]` column; this
/// exercise's scope does not include a full WKT/WKB geometry library, so
/// only the one ring shape the admission path ever writes is parsed).
fn parse_polygon_wkt(wkt: &str) -> Result<AoiPolygon> {
    let inner = wkt
        .trim()
        .strip_prefix("POLYGON((")
        .and_then(|s| s.strip_suffix("))"))
        .ok_or_else(|| error::Error::ValidationError {
            reason: format!("malformed AOI geometry: {wkt}"),
        })?;

    let mut ring = Vec::new();
    for pair in inner.split(',') {
        let mut coords = pair.trim().split_whitespace();
        let x: f64 = coords
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| error::Error::ValidationError {
                reason: format!("malformed AOI vertex: {pair}"),
            })?;
        let y: f64 = coords
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| error::Error::ValidationError {
                reason: format!("malformed AOI vertex: {pair}"),
            })?;
        ring.push(Coordinate2D::new(x, y));
    }

    AoiPolygon::new(ring).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_simple_square_ring() {
        let wkt = "POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))";
        let polygon = parse_polygon_wkt(wkt).unwrap();
        assert_eq!(polygon.ring().len(), 5);
    }

    #[test]
    fn rejects_malformed_wkt() {
        assert!(parse_polygon_wkt("not wkt").is_err());
    }
}
