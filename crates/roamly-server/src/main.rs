mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};
use roamly_provider::{MarketplaceClient, RetryPolicy};
use roamly_search::{LocationResolver, SearchOrchestrator, TaxonomyIndex};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(roamly_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = roamly_db::PoolConfig::from_app_config(&config);
    let pool = roamly_db::connect_pool(&config.database_url, pool_config).await?;
    roamly_db::run_migrations(&pool).await?;

    let client = match &config.marketplace_base_url {
        Some(base_url) => MarketplaceClient::with_base_url(
            &config.marketplace_api_key,
            config.marketplace_timeout_secs,
            base_url,
        ),
        None => MarketplaceClient::new(
            &config.marketplace_api_key,
            config.marketplace_timeout_secs,
        ),
    }
    .map_err(|e| anyhow::anyhow!("failed to build marketplace client: {e}"))?
    .with_retry_policy(RetryPolicy {
        max_retries: config.marketplace_max_retries,
        backoff_base_ms: config.marketplace_backoff_base_ms,
    });
    let client = Arc::new(client);

    let resolver = Arc::new(LocationResolver::new(
        pool.clone(),
        config.resolver_min_confidence,
        config.resolver_candidate_limit,
    ));

    let taxonomy = Arc::new(TaxonomyIndex::new());
    match taxonomy.hydrate(&pool).await {
        Ok(count) if count == 0 => {
            tracing::warn!("taxonomy index is empty; run a taxonomy sync to enable category filters");
        }
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "failed to hydrate taxonomy index"),
    }

    let orchestrator = Arc::new(SearchOrchestrator::new(
        pool.clone(),
        Arc::clone(&client),
        Arc::clone(&resolver),
        Arc::clone(&taxonomy),
        config.search_cache_ttl_secs,
        config.marketplace_overall_timeout_secs,
    ));

    let _scheduler = scheduler::build_scheduler(
        pool.clone(),
        Arc::clone(&client),
        Arc::clone(&taxonomy),
        Arc::clone(&resolver),
    )
    .await?;

    let app = build_app(AppState {
        pool,
        client,
        resolver,
        taxonomy,
        orchestrator,
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
