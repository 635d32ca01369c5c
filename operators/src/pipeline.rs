//! Glues every other module in this crate into the single job-scoring
//! run spec.md §2's data-flow paragraph describes: resolve layers, align
//! windows, read, derive, normalize, compile constraints, overlay,
//! summarize. Not a named spec.md component on its own — `JobController`
//! (in `mcda-services`) is the only caller, invoking [`run`] once between
//! `claim` and `complete`/`fail`.

use crate::catalog::{FactorId, LayerId};
use crate::concurrency::ReadConcurrency;
use crate::constraints::ConstraintSpec;
use crate::error::{self, Result};
use crate::source::{LayerRef, RasterSource, RasterSourceCache, Resampling};
use crate::{constraints, derive, normalize, overlay, statistics, window_aligner};
use mcda_datatypes::{AoiPolygon, Grid2D, RasterGrid};
use statistics::Statistics;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, Instrument};

/// Everything a job needs to be scored, already validated by
/// `JobController::admit` — `run` trusts its closure (known factors,
/// known constraint kinds, every constraint's layer present in
/// `weights`' implied layer set) and never re-derives it.
#[derive(Debug, Clone)]
pub struct JobInput {
    pub job_id: i64,
    pub aoi: AoiPolygon,
    pub weights: HashMap<FactorId, f64>,
    pub constraints: Vec<ConstraintSpec>,
}

/// Process-wide resources and per-run cancellation/deadline state,
/// threaded in by `JobController` from its `EngineContext` (spec.md §5's
/// "global singletons become a single context" redesign note).
pub struct PipelineContext {
    pub source_cache: Arc<RasterSourceCache>,
    pub read_concurrency: ReadConcurrency,
    /// Prefix prepended to a `LayerId::object_key()` to form the URI
    /// `GdalCogSource::open` reads, e.g. `/vsis3/data-lake/`.
    pub data_lake_uri_prefix: String,
    pub row_bands: usize,
    pub cancelled: Arc<AtomicBool>,
    pub soft_deadline: Option<Instant>,
}

pub struct PipelineOutput {
    pub score: Grid2D<f32>,
    pub statistics: Statistics,
    pub grid: RasterGrid,
}

/// Runs the full scoring pipeline for `job` against `ctx`'s shared
/// resources, checking cancellation and the soft deadline at every stage
/// boundary (spec.md §5).
pub async fn run(job: &JobInput, ctx: &PipelineContext) -> Result<PipelineOutput> {
    let span = info_span!("mcda_job", job_id = job.job_id);
    run_inner(job, ctx).instrument(span).await
}

async fn run_inner(job: &JobInput, ctx: &PipelineContext) -> Result<PipelineOutput> {
    check_stage_boundary(ctx)?;

    let needed = required_source_layers(job);
    info!(layers = needed.len(), "resolving layers");
    let mut opened = HashMap::with_capacity(needed.len());
    for layer_id in &needed {
        let uri = format!(
            "{}{}",
            ctx.data_lake_uri_prefix,
            layer_id
                .object_key()
                .expect("required_source_layers never returns a derived-only layer")
        );
        let _permit = ctx.read_concurrency.acquire().await;
        let source = ctx.source_cache.get_or_open(&uri).await?;
        opened.insert(*layer_id, source);
    }

    check_stage_boundary(ctx)?;

    let primary = opened
        .get(&LayerId::Ghi)
        .expect("Ghi (the primary solar resource layer) is always in required_source_layers")
        .grid();

    let other_layer_refs: Vec<LayerRef> = opened
        .iter()
        .filter(|&(&id, _)| id != LayerId::Ghi)
        .map(|(&id, source)| LayerRef {
            id,
            source: Arc::clone(source) as Arc<dyn RasterSource>,
        })
        .collect();

    let (analysis_grid, read_plans) = window_aligner::align(&primary, &other_layer_refs, &job.aoi);
    let bbox = job.aoi.bounding_box();

    check_stage_boundary(ctx)?;

    info!(
        rows = analysis_grid.shape.rows,
        cols = analysis_grid.shape.cols,
        "reading aligned layers"
    );
    let ghi_source = Arc::clone(opened.get(&LayerId::Ghi).unwrap());
    let ghi_grid = ghi_source
        .read_warped(&analysis_grid, bbox, Resampling::Bilinear)
        .await?;

    let mut by_layer: HashMap<LayerId, Grid2D<f64>> = HashMap::new();
    by_layer.insert(LayerId::Ghi, ghi_grid);

    for plan in &read_plans {
        let values = plan
            .layer
            .source
            .read_warped(&analysis_grid, bbox, plan.resampling)
            .await?;
        by_layer.insert(plan.layer.id, values);
    }

    check_stage_boundary(ctx)?;

    if needed.contains(&LayerId::Dem) {
        info!("deriving slope from elevation");
        let elevation = by_layer
            .get(&LayerId::Dem)
            .expect("Dem was requested when slope is needed");
        let pixel_size_m = analysis_grid.pixel_size_meters(job.aoi.mid_latitude());
        let slope = derive::slope_degrees(elevation, pixel_size_m);
        by_layer.insert(LayerId::Slope, slope);
    }

    check_stage_boundary(ctx)?;

    let mut normalized = HashMap::with_capacity(job.weights.len());
    for (&factor_id, &weight) in &job.weights {
        if weight <= 0.0 {
            continue;
        }
        let spec = factor_id.spec();
        let raw = by_layer
            .get(&spec.layer)
            .expect("admission guarantees every weighted factor's layer was resolved");
        let values = normalize::normalize(raw, spec.clip_min, spec.clip_max, spec.invert)?;
        normalized.insert(factor_id, values);
    }

    check_stage_boundary(ctx)?;

    info!(constraints = job.constraints.len(), "compiling exclusion mask");
    let mut mask = constraints::compile(&job.constraints, &by_layer, analysis_grid.shape)?;

    // `align` only crops to the AOI's bounding box; pixels inside that
    // box but outside the AOI polygon itself are not "inside the AOI"
    // (spec.md §1) and must not be scored or counted.
    let aoi_mask = window_aligner::rasterize_aoi_mask(&analysis_grid, &job.aoi);
    mask.or_in_place(&aoi_mask)?;

    check_stage_boundary(ctx)?;

    let score = overlay::overlay(&normalized, &job.weights, &mask, analysis_grid.shape);
    let stats = statistics::compute(&score, &mask);

    info!(
        valid_pixels = stats.valid_pixels,
        mean = stats.mean_suitability,
        "job scored"
    );

    Ok(PipelineOutput {
        score,
        statistics: stats,
        grid: analysis_grid,
    })
}

fn check_stage_boundary(ctx: &PipelineContext) -> Result<()> {
    if ctx.cancelled.load(Ordering::Relaxed) {
        return Err(error::Error::Cancelled);
    }
    if let Some(deadline) = ctx.soft_deadline {
        if Instant::now() >= deadline {
            return Err(error::Error::TimedOut);
        }
    }
    Ok(())
}

/// The closed set of source `LayerId`s this job must read, substituting
/// `Dem` for `Slope` (slope is derived, never read directly) and always
/// including `Ghi`, the primary solar resource layer the AnalysisGrid is
/// anchored to (spec.md §4.2).
fn required_source_layers(job: &JobInput) -> Vec<LayerId> {
    let mut layers = vec![LayerId::Ghi];

    let mut push_unique = |layers: &mut Vec<LayerId>, layer: LayerId| {
        let resolved = if layer == LayerId::Slope { LayerId::Dem } else { layer };
        if !layers.contains(&resolved) {
            layers.push(resolved);
        }
    };

    for (&factor_id, &weight) in &job.weights {
        if weight > 0.0 {
            push_unique(&mut layers, factor_id.spec().layer);
        }
    }
    for constraint in &job.constraints {
        push_unique(&mut layers, constraint.layer());
    }

    layers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FactorId;

    #[test]
    fn ghi_is_always_required_even_with_no_weights() {
        let job = JobInput {
            job_id: 1,
            aoi: AoiPolygon::new(vec![
                mcda_datatypes::Coordinate2D::new(0.0, 0.0),
                mcda_datatypes::Coordinate2D::new(1.0, 0.0),
                mcda_datatypes::Coordinate2D::new(1.0, 1.0),
                mcda_datatypes::Coordinate2D::new(0.0, 0.0),
            ])
            .unwrap(),
            weights: HashMap::new(),
            constraints: vec![],
        };
        assert_eq!(required_source_layers(&job), vec![LayerId::Ghi]);
    }

    #[test]
    fn slope_weight_pulls_in_dem_not_slope() {
        let mut weights = HashMap::new();
        weights.insert(FactorId::Slope, 100.0);
        let job = JobInput {
            job_id: 1,
            aoi: AoiPolygon::new(vec![
                mcda_datatypes::Coordinate2D::new(0.0, 0.0),
                mcda_datatypes::Coordinate2D::new(1.0, 0.0),
                mcda_datatypes::Coordinate2D::new(1.0, 1.0),
                mcda_datatypes::Coordinate2D::new(0.0, 0.0),
            ])
            .unwrap(),
            weights,
            constraints: vec![],
        };
        let layers = required_source_layers(&job);
        assert!(layers.contains(&LayerId::Dem));
        assert!(!layers.contains(&LayerId::Slope));
    }

    #[test]
    fn a_zero_weight_factor_does_not_pull_in_its_layer() {
        let mut weights = HashMap::new();
        weights.insert(FactorId::Dni, 0.0);
        let job = JobInput {
            job_id: 1,
            aoi: AoiPolygon::new(vec![
                mcda_datatypes::Coordinate2D::new(0.0, 0.0),
                mcda_datatypes::Coordinate2D::new(1.0, 0.0),
                mcda_datatypes::Coordinate2D::new(1.0, 1.0),
                mcda_datatypes::Coordinate2D::new(0.0, 0.0),
            ])
            .unwrap(),
            weights,
            constraints: vec![],
        };
        assert_eq!(required_source_layers(&job), vec![LayerId::Ghi]);
    }

    #[test]
    fn cancellation_is_observed_before_any_layer_is_opened() {
        let ctx = PipelineContext {
            source_cache: Arc::new(RasterSourceCache::new()),
            read_concurrency: ReadConcurrency::new(1),
            data_lake_uri_prefix: "/vsis3/data-lake/".to_string(),
            row_bands: 4,
            cancelled: Arc::new(AtomicBool::new(true)),
            soft_deadline: None,
        };
        assert!(matches!(check_stage_boundary(&ctx), Err(error::Error::Cancelled)));
    }
}
