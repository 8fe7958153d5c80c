use std::sync::Arc;

use crate::apply::history::HistoryStore;
use crate::apply::orchestrator::ApplicationOrchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Built once at startup with the configured fetcher, scorer and notifier.
    pub orchestrator: Arc<ApplicationOrchestrator>,
    pub history: Arc<dyn HistoryStore>,
}
