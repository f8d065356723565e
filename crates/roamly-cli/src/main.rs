//! Operator CLI for roamly maintenance tasks.

use clap::{Parser, Subcommand};

use roamly_provider::{MarketplaceClient, RetryPolicy};
use roamly_search::{sync_destinations, LocationResolver, TaxonomyIndex};

#[derive(Debug, Parser)]
#[command(name = "roamly-cli")]
#[command(about = "roamly command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch the provider taxonomy and replace the persisted generation.
    SyncTaxonomy {
        /// Language for canonical tag names.
        #[arg(long, default_value = "en")]
        language: String,
    },
    /// Fetch the provider destination listing and refresh the place catalog.
    SyncDestinations,
    /// Drop cached search results, optionally for a single destination.
    ClearCache {
        #[arg(long)]
        destination_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = roamly_core::load_app_config()?;

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

    match cli.command {
        Commands::SyncTaxonomy { language } => {
            let taxonomy = TaxonomyIndex::new();
            let report = taxonomy
                .sync(&pool, &client, &language)
                .await
                .map_err(|e| anyhow::anyhow!("taxonomy sync failed: {e}"))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::SyncDestinations => {
            let resolver = LocationResolver::new(
                pool.clone(),
                config.resolver_min_confidence,
                config.resolver_candidate_limit,
            );
            let report = sync_destinations(&pool, &client, &resolver)
                .await
                .map_err(|e| anyhow::anyhow!("destination sync failed: {e}"))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::ClearCache { destination_id } => {
            let prefix = destination_id.as_deref().map(|id| format!("{id}:"));
            let removed = roamly_db::cache_clear(&pool, prefix.as_deref()).await?;
            println!("removed {removed} cache entries");
        }
    }

    Ok(())
}
