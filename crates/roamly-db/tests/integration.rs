//! Offline unit tests for roamly-db pool configuration and row types.
//! These tests do not require a live database connection.

use roamly_core::{AppConfig, Environment};
use roamly_db::{DestinationRow, PoolConfig};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let app_config = AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        marketplace_api_key: "key".to_string(),
        marketplace_base_url: None,
        marketplace_timeout_secs: 30,
        marketplace_overall_timeout_secs: 90,
        marketplace_max_retries: 3,
        marketplace_backoff_base_ms: 1000,
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        search_cache_ttl_secs: 604_800,
        resolver_min_confidence: 80.0,
        resolver_candidate_limit: 1000,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

/// Compile-time smoke test: confirm that [`DestinationRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn destination_row_has_expected_fields() {
    use chrono::Utc;

    let row = DestinationRow {
        id: 1_i64,
        destination_id: "77".to_string(),
        name: "Paris".to_string(),
        kind: "city".to_string(),
        country_code: Some("FR".to_string()),
        latitude: Some(48.8566),
        longitude: Some(2.3522),
        lookup_rank: 10.0,
        synced_at: Utc::now(),
    };

    assert_eq!(row.destination_id, "77");
    assert_eq!(row.kind, "city");
    assert_eq!(row.country_code.as_deref(), Some("FR"));
}
