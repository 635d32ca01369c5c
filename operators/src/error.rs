use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[snafu(context(suffix(false)))]
pub enum Error {
    #[snafu(context(false))]
    DataType { source: mcda_datatypes::Error },

    #[snafu(display("could not open raster source {uri}: {source}"))]
    SourceUnavailable {
        uri: String,
        source: gdal::errors::GdalError,
    },

    #[snafu(display("raster source {uri} has a malformed COG structure: {reason}"))]
    SourceCorrupt { uri: String, reason: String },

    #[snafu(display("normalize bounds are invalid: min {min} must be < max {max}"))]
    InvalidNormalizeBounds { min: f64, max: f64 },

    #[snafu(display("constraint '{kind}' references layer '{layer}' which was not resolved for this job"))]
    UnresolvedConstraintLayer { kind: String, layer: String },

    #[snafu(display("unknown constraint kind: {kind}"))]
    UnknownConstraintKind { kind: String },

    #[snafu(display("unknown factor: {factor}"))]
    UnknownFactor { factor: String },

    #[snafu(display("failed to encode result raster: {reason}"))]
    EncodeFailed { reason: String },

    #[snafu(display("failed to write result to object storage: {source}"))]
    WriteFailed { source: object_store::Error },

    #[snafu(display("GDAL error: {source}"))]
    Gdal { source: gdal::errors::GdalError },

    #[snafu(display("job was cancelled"))]
    Cancelled,

    #[snafu(display("job exceeded its soft time limit"))]
    TimedOut,
}

impl From<gdal::errors::GdalError> for Error {
    fn from(source: gdal::errors::GdalError) -> Self {
        Self::Gdal { source }
    }
}
