/// A value that can live inside a [`Grid2D`](super::Grid2D). Mirrors the
/// set of types GDAL can hand back for the data lake's source layers
/// (float continuous layers, byte/int16 categorical layers).
pub trait Pixel: Copy + PartialEq + Send + Sync + std::fmt::Debug + 'static {}

impl Pixel for f32 {}
impl Pixel for f64 {}
impl Pixel for u8 {}
impl Pixel for u16 {}
impl Pixel for i16 {}
impl Pixel for i32 {}
impl Pixel for bool {}
