mod apply;
mod auth;
mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::apply::cache::{warm_listing_cache, CachedFetcher, RedisPageCache};
use crate::apply::extractor::PostingExtractor;
use crate::apply::fetcher::{Fetcher, HttpFetcher};
use crate::apply::fit_scoring::{FitScorer, KeywordFitScorer, LlmFitScorer};
use crate::apply::history::PgHistoryStore;
use crate::apply::notifier::{LogNotifier, Notifier, SmtpNotifier};
use crate::apply::orchestrator::{ApplicationOrchestrator, PipelineConfig};
use crate::apply::prompt_detector::UrlMarkerPromptDetector;
use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

/// Pause between warm-up searches so the job board isn't hammered at startup.
const WARM_UP_PAUSE: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting auto-apply API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Listing fetcher, optionally behind the Redis cache
    let http_fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(config.fetch_timeout)?);
    let fetcher: Arc<dyn Fetcher> = match &config.redis_url {
        Some(url) => {
            let redis = redis::Client::open(url.clone())?;
            info!(
                "Listing cache enabled (ttl {}s, op timeout {:?})",
                config.listing_cache_ttl_secs, config.cache_op_timeout
            );
            Arc::new(CachedFetcher::new(
                http_fetcher,
                Arc::new(RedisPageCache::new(redis, config.listing_cache_ttl_secs)),
                config.cache_op_timeout,
            ))
        }
        None => http_fetcher,
    };

    // Initialize fit scorer (KeywordFitScorer by default; swap via ENABLE_LLM_FIT_SCORING)
    let fit_scorer: Arc<dyn FitScorer> = match &config.anthropic_api_key {
        Some(key) if config.enable_llm_fit_scoring => {
            let llm = LlmClient::new(key.clone(), config.scorer_timeout)?;
            info!("LLM fit scoring enabled (model: {})", llm_client::MODEL);
            Arc::new(LlmFitScorer(llm))
        }
        _ => {
            info!("Using keyword fit scorer");
            Arc::new(KeywordFitScorer)
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => {
            info!("SMTP escalation notifier configured ({})", smtp.host);
            Arc::new(SmtpNotifier::new(smtp)?)
        }
        None => {
            warn!("SMTP not configured; writing-prompt escalations will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let orchestrator = ApplicationOrchestrator::new(
        PipelineConfig {
            min_score: config.min_fit_score,
            scorer_timeout: config.scorer_timeout,
            scoring_concurrency: config.scoring_concurrency,
        },
        fetcher.clone(),
        fit_scorer,
        notifier,
    )
    .with_extractor(PostingExtractor::new(config.posting_link_marker.clone()))
    .with_detector(Arc::new(UrlMarkerPromptDetector::new(
        config.prompt_markers.clone(),
    )));
    info!(
        "Pipeline: min score {}, concurrency {}, fetch timeout {:?}, scorer timeout {:?}",
        config.min_fit_score,
        config.scoring_concurrency,
        config.fetch_timeout,
        config.scorer_timeout
    );

    // Warm the listing cache in the background; never blocks startup
    match (&config.redis_url, &config.listing_search_url_template) {
        (Some(_), Some(template)) => {
            tokio::spawn(warm_listing_cache(
                fetcher,
                template.clone(),
                WARM_UP_PAUSE,
            ));
        }
        (Some(_), None) => info!("LISTING_SEARCH_URL_TEMPLATE not set; skipping cache warm-up"),
        _ => {}
    }

    // Build app state
    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        history: Arc::new(PgHistoryStore::new(db)),
    };

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()), // TODO: restrict CORS to the dashboard origin
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
