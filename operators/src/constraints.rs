//! Compiles a job's constraint dictionary into a boolean exclusion mask
//! (spec.md §4.5). The closed set of recognized kinds lives here as a
//! data-driven enum rather than the original's `if kind in constraints`
//! chain (spec.md §9's dynamic-dispatch redesign note).

use crate::catalog::LayerId;
use crate::error::{self, Result};
use mcda_datatypes::{Grid2D, GridShape2D, NoDataMask};
use rayon::prelude::*;
use std::collections::HashMap;

/// One entry of a job's `constraints` dictionary, already parsed and
/// validated against the closed set of spec.md §4.5's table. Admission
/// is the only place `from_key_value` is called; `compile` below can
/// then assume every constraint's layer was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintSpec {
    SlopeGt(f64),
    SlopeLt(f64),
    GridDistGt(f64),
    GridDistLt(f64),
    RoadDistGt(f64),
    RoadDistLt(f64),
    LulcExclude(Vec<u16>),
}

impl ConstraintSpec {
    /// The layer this constraint's predicate reads. Used both by
    /// admission (to check the layer was declared) and by `compile` (to
    /// look the array up).
    pub fn layer(&self) -> LayerId {
        match self {
            ConstraintSpec::SlopeGt(_) | ConstraintSpec::SlopeLt(_) => LayerId::Slope,
            ConstraintSpec::GridDistGt(_) | ConstraintSpec::GridDistLt(_) => {
                LayerId::DistanceToGrid
            }
            ConstraintSpec::RoadDistGt(_) | ConstraintSpec::RoadDistLt(_) => {
                LayerId::DistanceToRoads
            }
            ConstraintSpec::LulcExclude(_) => LayerId::Lulc,
        }
    }

    /// Parses one `(key, value)` pair of a job's `constraints` JSON
    /// object (spec.md §4.5's table; the `*_lt` variants are the
    /// "symmetrical less-than" ones the table names but doesn't spell
    /// out).
    pub fn from_key_value(key: &str, value: &serde_json::Value) -> Result<Self> {
        let as_f64 = |v: &serde_json::Value| {
            v.as_f64().ok_or_else(|| error::Error::UnknownConstraintKind {
                kind: format!("{key} (expected a number, got {v})"),
            })
        };
        match key {
            "slope_gt" => Ok(ConstraintSpec::SlopeGt(as_f64(value)?)),
            "slope_lt" => Ok(ConstraintSpec::SlopeLt(as_f64(value)?)),
            "grid_dist_gt" => Ok(ConstraintSpec::GridDistGt(as_f64(value)?)),
            "grid_dist_lt" => Ok(ConstraintSpec::GridDistLt(as_f64(value)?)),
            "road_dist_gt" => Ok(ConstraintSpec::RoadDistGt(as_f64(value)?)),
            "road_dist_lt" => Ok(ConstraintSpec::RoadDistLt(as_f64(value)?)),
            "lulc_exclude" => {
                let classes = value
                    .as_array()
                    .ok_or_else(|| error::Error::UnknownConstraintKind {
                        kind: format!("lulc_exclude (expected an array, got {value})"),
                    })?
                    .iter()
                    .map(|v| {
                        v.as_u64()
                            .map(|n| n as u16)
                            .ok_or_else(|| error::Error::UnknownConstraintKind {
                                kind: format!("lulc_exclude entry {v} is not a land-cover code"),
                            })
                    })
                    .collect::<Result<Vec<u16>>>()?;
                Ok(ConstraintSpec::LulcExclude(classes))
            }
            other => Err(error::Error::UnknownConstraintKind {
                kind: other.to_string(),
            }),
        }
    }

    fn excludes(&self, value: f64) -> bool {
        match self {
            ConstraintSpec::SlopeGt(t) | ConstraintSpec::GridDistGt(t) | ConstraintSpec::RoadDistGt(t) => {
                value > *t
            }
            ConstraintSpec::SlopeLt(t) | ConstraintSpec::GridDistLt(t) | ConstraintSpec::RoadDistLt(t) => {
                value < *t
            }
            ConstraintSpec::LulcExclude(classes) => classes.contains(&(value.round() as u16)),
        }
    }
}

/// Builds the AnalysisGrid-shaped exclusion mask (`true` = excluded) from
/// every declared constraint. Pixels no-data in a constraint's input
/// layer are conservatively excluded (spec.md §4.5): we will not score a
/// pixel we cannot evaluate.
pub fn compile(
    constraints: &[ConstraintSpec],
    layers: &HashMap<LayerId, Grid2D<f64>>,
    shape: GridShape2D,
) -> Result<NoDataMask> {
    let mut flags = vec![false; shape.number_of_elements()];

    for constraint in constraints {
        let layer_id = constraint.layer();
        let layer = layers
            .get(&layer_id)
            .ok_or_else(|| error::Error::UnresolvedConstraintLayer {
                kind: format!("{constraint:?}"),
                layer: format!("{layer_id:?}"),
            })?;
        if layer.shape() != shape {
            return Err(mcda_datatypes::error::Error::GridShapeMismatch {
                lhs_rows: shape.rows,
                lhs_cols: shape.cols,
                rhs_rows: layer.shape().rows,
                rhs_cols: layer.shape().cols,
            }
            .into());
        }

        flags
            .par_chunks_mut(shape.cols.max(1))
            .enumerate()
            .for_each(|(row, out_row)| {
                for (col, flag) in out_row.iter_mut().enumerate() {
                    if *flag {
                        continue;
                    }
                    if layer.is_no_data_at(row, col) {
                        *flag = true;
                        continue;
                    }
                    let value = layer.get_unchecked(row, col);
                    if constraint.excludes(value) {
                        *flag = true;
                    }
                }
            });
    }

    NoDataMask::from_vec(shape, flags).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grid(shape: GridShape2D, values: Vec<f64>) -> Grid2D<f64> {
        Grid2D::from_vec(shape, -9999.0, values).unwrap()
    }

    #[test]
    fn parses_every_table_entry() {
        assert_eq!(
            ConstraintSpec::from_key_value("slope_gt", &json!(10.0)).unwrap(),
            ConstraintSpec::SlopeGt(10.0)
        );
        assert_eq!(
            ConstraintSpec::from_key_value("lulc_exclude", &json!([50, 80])).unwrap(),
            ConstraintSpec::LulcExclude(vec![50, 80])
        );
    }

    #[test]
    fn unknown_key_errors() {
        assert!(ConstraintSpec::from_key_value("elevation_gt", &json!(1.0)).is_err());
    }

    #[test]
    fn slope_gt_excludes_the_left_half() {
        let shape = GridShape2D::new(1, 4);
        let slope = grid(shape, vec![15.0, 15.0, 0.0, 0.0]);
        let mut layers = HashMap::new();
        layers.insert(LayerId::Slope, slope);
        let mask = compile(&[ConstraintSpec::SlopeGt(10.0)], &layers, shape).unwrap();
        assert_eq!(mask.as_slice(), &[true, true, false, false]);
        assert_eq!(mask.count_true(), 2);
    }

    #[test]
    fn no_data_in_a_constraint_input_is_conservatively_excluded() {
        let shape = GridShape2D::new(1, 2);
        let slope = grid(shape, vec![-9999.0, 0.0]);
        let mut layers = HashMap::new();
        layers.insert(LayerId::Slope, slope);
        let mask = compile(&[ConstraintSpec::SlopeGt(10.0)], &layers, shape).unwrap();
        assert_eq!(mask.as_slice(), &[true, false]);
    }

    #[test]
    fn missing_layer_for_a_declared_constraint_errors() {
        let shape = GridShape2D::new(1, 1);
        let layers = HashMap::new();
        assert!(compile(&[ConstraintSpec::SlopeGt(10.0)], &layers, shape).is_err());
    }

    #[test]
    fn lulc_exclude_matches_class_codes() {
        let shape = GridShape2D::new(1, 3);
        let lulc = grid(shape, vec![30.0, 50.0, 80.0]);
        let mut layers = HashMap::new();
        layers.insert(LayerId::Lulc, lulc);
        let mask = compile(
            &[ConstraintSpec::LulcExclude(vec![50, 80])],
            &layers,
            shape,
        )
        .unwrap();
        assert_eq!(mask.as_slice(), &[false, true, true]);
    }
}
