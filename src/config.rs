use std::env;
use std::fmt::Display;
use std::str::FromStr;

use tracing::{info, warn};

/// Public key shipped with the official frontend; the API rejects calls
/// without one.
const DEFAULT_API_KEY: &str = "tYTy5eEhlu9rFjyxuCr7ra7ACp4dv1RH8gWuHTDc";
const DEFAULT_SCHEME_API: &str = "https://api.myscheme.gov.in/schemes/v5/public/schemes";
const DEFAULT_SEARCH_API: &str = "https://api.myscheme.gov.in/search/v5/schemes";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub api_key: String,
    pub scheme_api: String,
    pub search_api: String,
    pub debug: bool,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: parse_var("PORT", "5000"),
            api_key: load_var("MYSCHEME_API_KEY", DEFAULT_API_KEY),
            scheme_api: load_var("MYSCHEME_SCHEME_API", DEFAULT_SCHEME_API),
            search_api: load_var("MYSCHEME_SEARCH_API", DEFAULT_SEARCH_API),
            debug: is_development(),
        }
    }
}

/// `ENVIRONMENT` defaults to development; anything else is treated as
/// production.
pub fn is_development() -> bool {
    env::var("ENVIRONMENT").map(|v| v == "development").unwrap_or(true)
}

fn load_var(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{} not set, using default", key);
        default.to_string()
    })
}

fn parse_var<T>(key: &str, default: &str) -> T
where
    T: FromStr,
    T::Err: Display,
{
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|e| warn!("Invalid {} value: {}", key, e))
        .expect("Environment misconfigured")
}
