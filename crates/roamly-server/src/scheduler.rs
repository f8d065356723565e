//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring taxonomy and destination catalog syncs. Both jobs log and
//! continue on failure — the last-good snapshot keeps serving.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use roamly_provider::MarketplaceClient;
use roamly_search::{sync_destinations, LocationResolver, TaxonomyIndex};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process — dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    client: Arc<MarketplaceClient>,
    taxonomy: Arc<TaxonomyIndex>,
    resolver: Arc<LocationResolver>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_taxonomy_job(
        &scheduler,
        pool.clone(),
        Arc::clone(&client),
        Arc::clone(&taxonomy),
    )
    .await?;
    register_destinations_job(&scheduler, pool, client, resolver).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the weekly taxonomy refresh.
///
/// Runs every Sunday at 03:00 UTC (`0 0 3 * * SUN`); the provider recommends
/// refreshing the tag vocabulary weekly.
async fn register_taxonomy_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    client: Arc<MarketplaceClient>,
    taxonomy: Arc<TaxonomyIndex>,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);

    let job = Job::new_async("0 0 3 * * SUN", move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let client = Arc::clone(&client);
        let taxonomy = Arc::clone(&taxonomy);

        Box::pin(async move {
            tracing::info!("scheduler: starting weekly taxonomy sync");
            match taxonomy.sync(&pool, &client, "en").await {
                Ok(report) => tracing::info!(
                    fetched = report.fetched,
                    updated = report.updated,
                    errored = report.errored,
                    "scheduler: taxonomy sync complete"
                ),
                Err(e) => tracing::error!(error = %e, "scheduler: taxonomy sync failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Register the weekly destination catalog refresh.
///
/// Runs every Sunday at 02:00 UTC (`0 0 2 * * SUN`), before the taxonomy job.
async fn register_destinations_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    client: Arc<MarketplaceClient>,
    resolver: Arc<LocationResolver>,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);

    let job = Job::new_async("0 0 2 * * SUN", move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let client = Arc::clone(&client);
        let resolver = Arc::clone(&resolver);

        Box::pin(async move {
            tracing::info!("scheduler: starting weekly destination sync");
            match sync_destinations(&pool, &client, &resolver).await {
                Ok(report) => tracing::info!(
                    fetched = report.fetched,
                    new = report.new,
                    updated = report.updated,
                    "scheduler: destination sync complete"
                ),
                Err(e) => tracing::error!(error = %e, "scheduler: destination sync failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}
