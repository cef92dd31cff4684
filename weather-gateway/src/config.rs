use std::env;

pub struct Config {
    pub port: u16,
    pub geocoding_url: String,
    pub forecast_url: String,
    pub api_key: Option<String>,
    pub cache_ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub upstream_timeout_seconds: u64,
    pub max_date_offset_days: Option<u32>,
    pub json_logs: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: parsed("PORT").unwrap_or(3000),
            geocoding_url: env::var("GEOCODING_URL")
                .unwrap_or_else(|_| "https://geocoding-api.open-meteo.com/v1/search".to_string()),
            forecast_url: env::var("FORECAST_URL")
                .unwrap_or_else(|_| "https://api.open-meteo.com/v1/forecast".to_string()),
            api_key: env::var("OPEN_METEO_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            cache_ttl_seconds: parsed("CACHE_TTL_SECONDS").unwrap_or(3600), // 1 hour default
            sweep_interval_seconds: parsed("CACHE_SWEEP_INTERVAL_SECONDS").unwrap_or(300),
            upstream_timeout_seconds: parsed("UPSTREAM_TIMEOUT_SECONDS").unwrap_or(10),
            max_date_offset_days: parsed("MAX_DATE_OFFSET_DAYS"),
            json_logs: env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")),
        }
    }
}

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|value| value.trim().parse().ok())
}
