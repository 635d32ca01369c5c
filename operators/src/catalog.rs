//! The static, closed-set catalogs spec.md §3 calls `FactorSpec` and
//! `ConstraintSpec`. Extending the system to a new factor or constraint
//! kind is a single entry here (spec.md §9's "dynamic dispatch by factor
//! name becomes a data-driven table" redesign note) rather than a new
//! `if` branch scattered through the pipeline.

use serde::{Deserialize, Serialize};

/// Identifies one of the data lake's global COG layers, independent of
/// whether a given job actually uses it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerId {
    Ghi,
    Dni,
    Dem,
    /// Derived on the fly from `Dem` (spec.md §4.3); never read directly
    /// from object storage.
    Slope,
    DistanceToGrid,
    DistanceToRoads,
    Lulc,
}

impl LayerId {
    /// The data-lake object key this layer is stored under (spec.md §6),
    /// or `None` for layers that only ever exist as a derived array.
    pub fn object_key(&self) -> Option<&'static str> {
        match self {
            LayerId::Ghi => Some("ghi.tif"),
            LayerId::Dni => Some("dni.tif"),
            LayerId::Dem => Some("dem.tif"),
            LayerId::Slope => None,
            LayerId::DistanceToGrid => Some("distance_to_grid.tif"),
            LayerId::DistanceToRoads => Some("distance_to_roads.tif"),
            LayerId::Lulc => Some("lulc.tif"),
        }
    }

    /// Whether this layer is categorical (and must be resampled with
    /// nearest-neighbor, never bilinear — spec.md §4.1/§4.2).
    pub fn is_categorical(&self) -> bool {
        matches!(self, LayerId::Lulc)
    }
}

/// A recognized suitability factor: which layer backs it, how to clip
/// and normalize it to 0-100, and whether higher raw values are better
/// (`invert = false`) or worse (`invert = true`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FactorId {
    Ghi,
    Dni,
    Slope,
    GridDist,
    RoadDist,
}

#[derive(Debug, Copy, Clone)]
pub struct FactorSpec {
    pub id: FactorId,
    pub layer: LayerId,
    pub clip_min: f64,
    pub clip_max: f64,
    pub invert: bool,
}

/// The closed factor catalog. Clip bounds for `ghi`/`slope`/`grid_dist`/
/// `road_dist` are grounded in
/// `examples/original_source/backend/workers/geoprocessing/mcda_engine.py::process_mcda_job`;
/// `dni` is a new entry (the original's data layer catalog lists DNI but
/// never uses it as a weighted factor) added on the same irradiance
/// units and a comparable value range (spec.md §9 silence on additional
/// factors is an invitation, per the task's supplement rule).
pub const FACTOR_CATALOG: &[FactorSpec] = &[
    FactorSpec {
        id: FactorId::Ghi,
        layer: LayerId::Ghi,
        clip_min: 1000.0,
        clip_max: 2500.0,
        invert: false,
    },
    FactorSpec {
        id: FactorId::Dni,
        layer: LayerId::Dni,
        clip_min: 1200.0,
        clip_max: 2800.0,
        invert: false,
    },
    FactorSpec {
        id: FactorId::Slope,
        layer: LayerId::Slope,
        clip_min: 0.0,
        clip_max: 10.0,
        invert: true,
    },
    FactorSpec {
        id: FactorId::GridDist,
        layer: LayerId::DistanceToGrid,
        clip_min: 0.0,
        clip_max: 10_000.0,
        invert: true,
    },
    FactorSpec {
        id: FactorId::RoadDist,
        layer: LayerId::DistanceToRoads,
        clip_min: 0.0,
        clip_max: 5_000.0,
        invert: true,
    },
];

impl FactorId {
    /// Parses the JSON key a job's `weights` map uses for this factor.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ghi" => Some(FactorId::Ghi),
            "dni" => Some(FactorId::Dni),
            "slope" => Some(FactorId::Slope),
            "grid_dist" => Some(FactorId::GridDist),
            "road_dist" => Some(FactorId::RoadDist),
            _ => None,
        }
    }

    pub fn spec(&self) -> FactorSpec {
        *FACTOR_CATALOG
            .iter()
            .find(|f| f.id == *self)
            .expect("every FactorId variant has a FACTOR_CATALOG entry")
    }
}

/// ESA WorldCover land-cover class codes (spec.md §6), named here purely
/// for documentation — the engine itself only ever compares raw `u16`
/// codes against a job's `lulc_exclude` list.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u16)]
pub enum LulcClass {
    TreeCover = 10,
    Shrubland = 20,
    Grassland = 30,
    Cropland = 40,
    BuiltUp = 50,
    BareOrSparseVegetation = 60,
    SnowAndIce = 70,
    PermanentWaterBodies = 80,
    HerbaceousWetland = 90,
    Mangroves = 95,
    MossAndLichen = 100,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_factor_id_resolves_a_spec() {
        for factor in [
            FactorId::Ghi,
            FactorId::Dni,
            FactorId::Slope,
            FactorId::GridDist,
            FactorId::RoadDist,
        ] {
            let spec = factor.spec();
            assert!(spec.clip_max > spec.clip_min);
        }
    }

    #[test]
    fn unknown_factor_key_is_none() {
        assert!(FactorId::from_key("elevation").is_none());
    }
}
