use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[snafu(context(suffix(false)))]
pub enum Error {
    #[snafu(display("Bounding box is degenerate: lower left {:?} is not below/left of upper right {:?}", lower_left, upper_right))]
    DegenerateBoundingBox {
        lower_left: crate::primitives::Coordinate2D,
        upper_right: crate::primitives::Coordinate2D,
    },

    #[snafu(display("AOI polygon must have at least 3 vertices, has {count}"))]
    PolygonTooFewVertices { count: usize },

    #[snafu(display("AOI polygon ring is not closed (first vertex != last vertex)"))]
    PolygonRingNotClosed,

    #[snafu(display(
        "grid index ({row}, {col}) is out of bounds for a grid of shape {rows}x{cols}"
    ))]
    GridIndexOutOfBounds {
        row: isize,
        col: isize,
        rows: usize,
        cols: usize,
    },

    #[snafu(display(
        "grid shapes do not match: {lhs_rows}x{lhs_cols} vs {rhs_rows}x{rhs_cols}"
    ))]
    GridShapeMismatch {
        lhs_rows: usize,
        lhs_cols: usize,
        rhs_rows: usize,
        rhs_cols: usize,
    },

    #[snafu(display("unsupported spatial reference: {srs}, only EPSG:4326 is supported"))]
    UnsupportedSpatialReference { srs: String },
}
