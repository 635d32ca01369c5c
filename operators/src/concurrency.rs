//! Bounding the two kinds of parallelism spec.md §5 calls out: bounded
//! concurrent I/O for per-layer reads, and a CPU thread pool for the
//! row-band pixel-wise stages. Grounded in the teacher's
//! `engine::execution_context::ExecutionContext::thread_pool`, generalized
//! from a single `rayon` pool (CPU-bound tiling) to a pair: reads are
//! I/O-bound ranged HTTP, so they are bounded with a `tokio::Semaphore`
//! instead.

use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Bounds the number of concurrent [`RasterSource`](crate::source::RasterSource)
/// reads a single job may have in flight, per spec.md §5 ("per-layer
/// reads may execute in parallel threads bounded by a configured worker
/// count, default 4").
#[derive(Clone)]
pub struct ReadConcurrency {
    semaphore: Arc<Semaphore>,
}

impl ReadConcurrency {
    pub fn new(worker_processes: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(worker_processes.max(1))),
        }
    }

    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        self.semaphore
            .acquire()
            .await
            .expect("semaphore is never closed")
    }
}

/// Splits `rows` into `bands` contiguous, non-overlapping row ranges for
/// the pixel-wise stages that have no cross-pixel dependency
/// (Normalizer, ConstraintCompiler, WeightedOverlay, Statistics).
pub fn row_bands(rows: usize, bands: usize) -> Vec<(usize, usize)> {
    let bands = bands.max(1);
    let band_size = rows.div_ceil(bands);
    (0..rows)
        .step_by(band_size.max(1))
        .map(|start| (start, (start + band_size).min(rows)))
        .collect()
}

/// Like [`row_bands`], but each band additionally overlaps its neighbors
/// by `halo` rows on each side (clamped to the grid extent) — the slope
/// derivation's Horn kernel needs one row of its neighbor band to
/// compute gradients at a band boundary.
pub fn row_bands_with_halo(rows: usize, bands: usize, halo: usize) -> Vec<(usize, usize, usize)> {
    row_bands(rows, bands)
        .into_iter()
        .map(|(start, end)| {
            let halo_start = start.saturating_sub(halo);
            let halo_end = (end + halo).min(rows);
            (halo_start, start, end.min(halo_end))
        })
        .map(|(halo_start, start, end)| (halo_start, start, (end + halo).min(rows)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_bands_cover_the_whole_grid_without_overlap() {
        let bands = row_bands(10, 3);
        let mut covered = 0;
        for (start, end) in &bands {
            covered += end - start;
        }
        assert_eq!(covered, 10);
        assert_eq!(bands.first().unwrap().0, 0);
        assert_eq!(bands.last().unwrap().1, 10);
    }

    #[test]
    fn row_bands_with_halo_extend_but_stay_in_bounds() {
        let bands = row_bands_with_halo(10, 4, 1);
        for (halo_start, start, _halo_end) in &bands {
            assert!(halo_start <= start);
        }
        assert!(bands.iter().all(|&(s, _, e)| s < 10 && e <= 10));
    }

    #[tokio::test]
    async fn read_concurrency_bounds_in_flight_permits() {
        let rc = ReadConcurrency::new(2);
        let _a = rc.acquire().await;
        let _b = rc.acquire().await;
        assert_eq!(rc.semaphore.available_permits(), 0);
    }
}
