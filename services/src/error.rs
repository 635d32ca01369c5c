//! The crate's error enum, composing `mcda-datatypes` and `mcda-operators`
//! errors via `#[snafu(context(false))]` `From` wiring exactly as the
//! teacher's `services/src/error.rs` does, then collapsing everything
//! into the flat `FailureKind` taxonomy spec.md §7 calls for at the
//! `JobController` boundary (the one place a flat shape is needed, since
//! it decides the single `error_message` string persisted to a job row).

use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[snafu(context(suffix(false)))]
pub enum Error {
    #[snafu(context(false))]
    DataType { source: mcda_datatypes::Error },

    #[snafu(context(false))]
    Operator { source: mcda_operators::Error },

    #[snafu(display("configuration error: {source}"))]
    Config { source: config::ConfigError },

    #[snafu(display("database error: {source}"))]
    TokioPostgres { source: tokio_postgres::Error },

    TokioPostgresTimeout,

    #[snafu(display("redis error: {source}"))]
    Redis { source: redis::RedisError },

    #[snafu(display("object storage error: {source}"))]
    ObjectStore { source: object_store::Error },

    #[snafu(display("failed to serialize/deserialize job message: {source}"))]
    SerdeJson { source: serde_json::Error },

    #[snafu(display("validation failed: {reason}"))]
    ValidationError { reason: String },

    #[snafu(display("job {job_id} was not found"))]
    JobNotFound { job_id: i64 },

    #[snafu(display("aoi {aoi_id} was not found"))]
    AoiNotFound { aoi_id: i64 },

    #[snafu(display("project {project_id} was not found"))]
    ProjectNotFound { project_id: i64 },

    #[snafu(display("job {job_id} was not RUNNING at commit time"))]
    JobNotRunning { job_id: i64 },
}

impl From<bb8::RunError<tokio_postgres::Error>> for Error {
    fn from(e: bb8::RunError<tokio_postgres::Error>) -> Self {
        match e {
            bb8::RunError::User(source) => Self::TokioPostgres { source },
            bb8::RunError::TimedOut => Self::TokioPostgresTimeout,
        }
    }
}

impl From<tokio_postgres::Error> for Error {
    fn from(source: tokio_postgres::Error) -> Self {
        Self::TokioPostgres { source }
    }
}

impl From<redis::RedisError> for Error {
    fn from(source: redis::RedisError) -> Self {
        Self::Redis { source }
    }
}

impl From<object_store::Error> for Error {
    fn from(source: object_store::Error) -> Self {
        Self::ObjectStore { source }
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Self::SerdeJson { source }
    }
}

/// The flat failure taxonomy of spec.md §7, used only at the point a
/// `Job` row's `error_message` column is written — every richer error
/// above classifies into exactly one of these.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FailureKind {
    ValidationError,
    SourceUnavailable,
    SourceCorrupt,
    WriteFailed,
    Cancelled,
    TimedOut,
    InternalError,
}

impl Error {
    pub fn classify(&self) -> FailureKind {
        match self {
            Error::ValidationError { .. } => FailureKind::ValidationError,
            Error::Operator { source } => classify_operator(source),
            _ => FailureKind::InternalError,
        }
    }
}

fn classify_operator(source: &mcda_operators::Error) -> FailureKind {
    use mcda_operators::Error as OpError;
    match source {
        OpError::SourceUnavailable { .. } => FailureKind::SourceUnavailable,
        OpError::SourceCorrupt { .. } => FailureKind::SourceCorrupt,
        OpError::WriteFailed { .. } => FailureKind::WriteFailed,
        OpError::Cancelled => FailureKind::Cancelled,
        OpError::TimedOut => FailureKind::TimedOut,
        _ => FailureKind::InternalError,
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::ValidationError => "validation_error",
            FailureKind::SourceUnavailable => "source_unavailable",
            FailureKind::SourceCorrupt => "source_corrupt",
            FailureKind::WriteFailed => "write_failed",
            FailureKind::Cancelled => "cancelled",
            FailureKind::TimedOut => "timeout_soft",
            FailureKind::InternalError => "internal_error",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_classify_as_validation_error() {
        let err = Error::ValidationError {
            reason: "bad weights".to_string(),
        };
        assert_eq!(err.classify(), FailureKind::ValidationError);
    }

    #[test]
    fn a_cancelled_operator_error_classifies_as_cancelled() {
        let err: Error = mcda_operators::Error::Cancelled.into();
        assert_eq!(err.classify(), FailureKind::Cancelled);
        assert_eq!(err.classify().to_string(), "cancelled");
    }
}
