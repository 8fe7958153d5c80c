// Auto-apply pipeline: listing fetch, posting extraction, relevance filter,
// fit scoring, prompt escalation, orchestration and history recording.
// LLM calls go through llm_client only.

pub mod cache;
pub mod extractor;
pub mod fetcher;
pub mod fit_scoring;
pub mod handlers;
pub mod history;
pub mod notifier;
pub mod orchestrator;
pub mod outcome;
pub mod prompt_detector;
pub mod prompts;
pub mod relevance;
