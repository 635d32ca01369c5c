//! `mcda-worker`: the queue-driven binary spec.md §1 scopes this system
//! down to — no HTTP surface, just `QueueBinding -> JobController` plus
//! the janitor sweep, per spec.md §2's component list.

use mcda_services::config::EngineConfig;
use mcda_services::context::EngineContext;
use mcda_services::metadata::postgres;
use mcda_services::queue::{JobQueue, RedisStreamQueue};
use mcda_services::{janitor, job_controller};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::load()?;
    tracing::info!(worker_processes = config.worker_processes, "loaded configuration");

    let ctx = Arc::new(EngineContext::build(config).await?);
    postgres::migrate(&ctx.db_pool).await?;

    let queue = RedisStreamQueue::connect(
        &ctx.config.broker_url,
        "mcda_jobs",
        "mcda_workers",
        &format!("worker-{}", std::process::id()),
    )
    .await?;

    tokio::spawn(janitor::run(Arc::clone(&ctx)));

    tracing::info!("mcda-worker ready, waiting for jobs");

    let mut shutdown = Box::pin(tokio::signal::ctrl_c());
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received");
                break;
            }
            message = queue.recv() => {
                match message {
                    Ok(Some(msg)) => {
                        if msg.task != "run_mcda_analysis" {
                            tracing::warn!(task = %msg.task, "ignoring unrecognized task");
                            queue.ack(&msg).await.ok();
                            continue;
                        }
                        if let Err(err) = job_controller::run_job(&ctx, msg.job_id).await {
                            tracing::error!(job_id = msg.job_id.get(), %err, "run_job could not reach a terminal commit, leaving unacked");
                            continue;
                        }
                        queue.ack(&msg).await.ok();
                    }
                    Ok(None) => {}
                    Err(err) => {
                        tracing::error!(%err, "queue receive failed, retrying");
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }

    Ok(())
}
