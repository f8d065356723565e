use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub marketplace_api_key: String,
    pub marketplace_base_url: Option<String>,
    pub marketplace_timeout_secs: u64,
    pub marketplace_overall_timeout_secs: u64,
    pub marketplace_max_retries: u32,
    pub marketplace_backoff_base_ms: u64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub search_cache_ttl_secs: u64,
    pub resolver_min_confidence: f64,
    pub resolver_candidate_limit: i64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("marketplace_api_key", &"[redacted]")
            .field("marketplace_base_url", &self.marketplace_base_url)
            .field("marketplace_timeout_secs", &self.marketplace_timeout_secs)
            .field(
                "marketplace_overall_timeout_secs",
                &self.marketplace_overall_timeout_secs,
            )
            .field("marketplace_max_retries", &self.marketplace_max_retries)
            .field(
                "marketplace_backoff_base_ms",
                &self.marketplace_backoff_base_ms,
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("search_cache_ttl_secs", &self.search_cache_ttl_secs)
            .field("resolver_min_confidence", &self.resolver_min_confidence)
            .field("resolver_candidate_limit", &self.resolver_candidate_limit)
            .finish()
    }
}
