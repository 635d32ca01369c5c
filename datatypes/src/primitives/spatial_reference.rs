use crate::error::{self, Result};
use serde::{Deserialize, Serialize};
use snafu::ensure;

/// An EPSG spatial reference identifier. The engine only ever operates
/// in geographic WGS84 (spec.md §1 non-goals: no area-accurate
/// reprojection), so the only value this type can hold is 4326 — it
/// exists to make that assumption explicit and checkable at the
/// boundary rather than implicit everywhere.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialReference(u32);

impl SpatialReference {
    pub const WGS84: SpatialReference = SpatialReference(4326);

    pub fn from_epsg(code: u32) -> Result<Self> {
        ensure!(
            code == 4326,
            error::UnsupportedSpatialReference {
                srs: format!("EPSG:{code}")
            }
        );
        Ok(Self(code))
    }

    pub fn epsg_code(&self) -> u32 {
        self.0
    }
}

impl Default for SpatialReference {
    fn default() -> Self {
        Self::WGS84
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_wgs84_is_accepted() {
        assert!(SpatialReference::from_epsg(4326).is_ok());
        assert!(SpatialReference::from_epsg(3857).is_err());
    }
}
