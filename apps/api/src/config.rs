use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or out of range.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub listing_cache_ttl_secs: u64,
    /// Bound on each Redis read/write; past it the cache is skipped for that call.
    pub cache_op_timeout: Duration,
    /// Search URL with a `{query}` placeholder, used to warm the listing cache.
    pub listing_search_url_template: Option<String>,
    pub enable_llm_fit_scoring: bool,
    pub anthropic_api_key: Option<String>,
    pub min_fit_score: f64,
    pub fetch_timeout: Duration,
    pub scorer_timeout: Duration,
    pub scoring_concurrency: usize,
    pub posting_link_marker: String,
    pub prompt_markers: Vec<String>,
    pub smtp: Option<SmtpConfig>,
    pub port: u16,
    pub rust_log: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub user: String,
    pub pass: String,
    pub from: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let enable_llm_fit_scoring = parse_env("ENABLE_LLM_FIT_SCORING", false)?;
        let anthropic_api_key = optional_env("ANTHROPIC_API_KEY");
        if enable_llm_fit_scoring && anthropic_api_key.is_none() {
            bail!("ANTHROPIC_API_KEY is required when ENABLE_LLM_FIT_SCORING=true");
        }

        let min_fit_score: f64 = parse_env("MIN_FIT_SCORE", 0.45)?;
        if !(0.0..=1.0).contains(&min_fit_score) {
            bail!("MIN_FIT_SCORE must be within [0, 1], got {min_fit_score}");
        }

        let scoring_concurrency: usize = parse_env("SCORING_CONCURRENCY", 1)?;
        if scoring_concurrency == 0 {
            bail!("SCORING_CONCURRENCY must be at least 1");
        }

        let smtp = optional_env("SMTP_HOST")
            .map(|host| -> Result<SmtpConfig> {
                Ok(SmtpConfig {
                    host,
                    user: require_env("SMTP_USER")?,
                    pass: require_env("SMTP_PASS")?,
                    from: require_env("SMTP_FROM")?,
                })
            })
            .transpose()?;

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: optional_env("REDIS_URL"),
            listing_cache_ttl_secs: parse_env("LISTING_CACHE_TTL_SECS", 900)?,
            cache_op_timeout: positive_millis("CACHE_OP_TIMEOUT_MS", 500)?,
            listing_search_url_template: optional_env("LISTING_SEARCH_URL_TEMPLATE"),
            enable_llm_fit_scoring,
            anthropic_api_key,
            min_fit_score,
            fetch_timeout: positive_secs("FETCH_TIMEOUT_SECS", 15)?,
            scorer_timeout: positive_secs("SCORER_TIMEOUT_SECS", 30)?,
            scoring_concurrency,
            posting_link_marker: optional_env("POSTING_LINK_MARKER")
                .unwrap_or_else(|| "/jobs/view/".to_string()),
            prompt_markers: optional_env("PROMPT_MARKERS")
                .map(|raw| split_list(&raw))
                .unwrap_or_else(|| vec!["assessment".to_string()]),
            smtp,
            port: parse_env("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key} has an invalid value '{raw}': {e}")),
        None => Ok(default),
    }
}

fn positive_secs(key: &str, default: u64) -> Result<Duration> {
    let secs: u64 = parse_env(key, default)?;
    if secs == 0 {
        bail!("{key} must be greater than zero");
    }
    Ok(Duration::from_secs(secs))
}

fn positive_millis(key: &str, default: u64) -> Result<Duration> {
    let millis: u64 = parse_env(key, default)?;
    if millis == 0 {
        bail!("{key} must be greater than zero");
    }
    Ok(Duration::from_millis(millis))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
