use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // AI provider
    pub openai_api_key: String,
    pub query_model: String,
    pub extraction_model: String,

    // Search
    pub serper_api_key: String,

    // Web server
    pub web_host: String,
    pub web_port: u16,

    // Collection knobs
    pub queries_per_subsection: usize,
    pub results_per_query: usize,
    pub max_sources_per_subsection: usize,
    pub scrape_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            openai_api_key: required_env("OPENAI_API_KEY"),
            query_model: env_or("QUERY_MODEL", "gpt-4o-mini"),
            extraction_model: env_or("EXTRACTION_MODEL", "gpt-4o-mini"),
            serper_api_key: required_env("SERPER_API_KEY"),
            web_host: env_or("WEB_HOST", "0.0.0.0"),
            web_port: parsed_env("WEB_PORT", 3000),
            queries_per_subsection: parsed_env("QUERIES_PER_SUBSECTION", 5),
            results_per_query: parsed_env("RESULTS_PER_QUERY", 2),
            max_sources_per_subsection: parsed_env("MAX_SOURCES_PER_SUBSECTION", 10),
            scrape_timeout_secs: parsed_env("SCRAPE_TIMEOUT_SECS", 20),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a number")),
        Err(_) => default,
    }
}
