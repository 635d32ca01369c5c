//! The data model of spec.md §3, expressed as plain Rust types read and
//! written via `tokio_postgres` row accessors — no ORM, matching the
//! teacher's raw-SQL style and its "ambient session" redesign note
//! (spec.md §9): invariants are enforced by `JobController`, never by
//! these row types themselves.

use chrono::{DateTime, Utc};
use mcda_datatypes::AoiPolygon;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl $name {
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

opaque_id!(UserId);
opaque_id!(ProjectId);
opaque_id!(AoiId);
opaque_id!(JobId);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub user_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aoi {
    pub id: AoiId,
    pub project_id: ProjectId,
    pub name: String,
    pub polygon: AoiPolygon,
    pub area_km2: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored as the Postgres `TEXT` values `PENDING`/`RUNNING`/`COMPLETE`/
/// `FAILED` (spec.md §6).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn as_db_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Complete => "COMPLETE",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(JobStatus::Pending),
            "RUNNING" => Some(JobStatus::Running),
            "COMPLETE" => Some(JobStatus::Complete),
            "FAILED" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub project_id: ProjectId,
    pub aoi_id: AoiId,
    pub status: JobStatus,
    /// Raw JSON keys (`"ghi"`, `"slope"`, ...), parsed into `FactorId`s
    /// by `JobController::admit` — the row itself stores the admission
    /// payload's shape, not the engine's internal catalog types.
    pub weights: HashMap<String, f64>,
    /// Raw `(constraint key, value)` pairs as submitted, e.g.
    /// `("slope_gt", 15.0)` or `("lulc_exclude", [50, 80])`.
    pub constraints: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub result_uri: Option<String>,
    pub statistics: Option<serde_json::Value>,
}

/// Carried from `original_source/backend/models/infrastructure.py`;
/// read-only reference data for the out-of-scope point inspector. No
/// engine code queries it — its presence documents the external
/// contract spec.md §6's table list names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfrastructureFeature {
    pub id: i64,
    pub osm_id: Option<i64>,
    pub feature_type: String,
    pub subtype: Option<String>,
    pub source: String,
    /// WKT, since this row type has no engine-side geometry consumer
    /// that would need a parsed representation.
    pub geometry: String,
    pub tags: serde_json::Value,
}
