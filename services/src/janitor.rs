//! The hard-timeout sweep of spec.md §5: a fixed-schedule task (run
//! inside this same binary rather than a separate process, per
//! spec.md §9 — "kept simple per the system's small scale") that resets
//! any row stuck `RUNNING` past `hard_time_limit_s`.

use crate::context::EngineContext;
use crate::metadata::postgres;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Runs forever, sweeping every `interval` (a fixed fraction of
/// `hard_time_limit_s` so a stuck job is not left running indefinitely
/// past its budget).
pub async fn run(ctx: Arc<EngineContext>) {
    let interval = Duration::from_secs((ctx.config.hard_time_limit_s / 4).max(30));
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        match postgres::sweep_hard_timeouts(&ctx.db_pool, ctx.config.hard_time_limit_s as i64).await {
            Ok(swept) if swept.is_empty() => {}
            Ok(swept) => warn!(count = swept.len(), "janitor swept jobs past hard_time_limit_s"),
            Err(err) => info!(%err, "janitor sweep failed, will retry next tick"),
        }
    }
}
