//! The single `EngineContext` spec.md §5/§9 calls for: every process-wide
//! shared resource (DB pool, object-store client, raster source cache)
//! built once at startup and threaded through explicitly, replacing the
//! teacher's and the original system's global singletons.

use crate::config::EngineConfig;
use crate::error::Result;
use crate::metadata::postgres::PgPool;
use bb8_postgres::PostgresConnectionManager;
use mcda_operators::concurrency::ReadConcurrency;
use mcda_operators::source::RasterSourceCache;
use object_store::aws::AmazonS3Builder;
use object_store::ObjectStore;
use std::sync::Arc;
use tokio_postgres::NoTls;

/// Built once in `main` and handed by reference to every job run and to
/// the janitor sweep. Nothing here is mutated in place except through
/// the pool/cache's own interior locking; no other process-global
/// mutable state exists (spec.md §5's "Shared resources").
pub struct EngineContext {
    pub config: EngineConfig,
    pub db_pool: PgPool,
    pub results_store: Arc<dyn ObjectStore>,
    pub source_cache: Arc<RasterSourceCache>,
    pub read_concurrency: ReadConcurrency,
    /// Prefix rewriting a `data-lake` bucket object key into the
    /// `/vsis3/`-style path `GdalCogSource::open` expects.
    pub data_lake_uri_prefix: String,
}

impl EngineContext {
    pub async fn build(config: EngineConfig) -> Result<Self> {
        let manager = PostgresConnectionManager::new_from_stringlike(&config.database_url, NoTls)?;
        let db_pool = bb8::Pool::builder().build(manager).await?;

        let mut builder = AmazonS3Builder::new()
            .with_region(&config.aws_region)
            .with_bucket_name(&config.results_bucket)
            .with_access_key_id(&config.aws_access_key_id)
            .with_secret_access_key(&config.aws_secret_access_key);
        if let Some(endpoint) = &config.aws_endpoint {
            builder = builder.with_endpoint(endpoint).with_allow_http(config.aws_allow_http);
        }
        let results_store: Arc<dyn ObjectStore> = Arc::new(builder.build()?);

        let data_lake_uri_prefix = format!("/vsis3/{}/", config.data_lake_bucket);

        Ok(Self {
            read_concurrency: ReadConcurrency::new(config.worker_processes),
            source_cache: Arc::new(RasterSourceCache::new()),
            results_store,
            db_pool,
            data_lake_uri_prefix,
            config,
        })
    }
}
