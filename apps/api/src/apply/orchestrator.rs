//! Application Orchestrator: drives one run end to end.
//!
//! Flow: fetch → extract → per posting: relevance filter → fit score → threshold →
//!       prompt check (escalate) → classify → append, stopping at the application cap.
//!
//! Postings are handled in windows of at most `scoring_concurrency` items, and never more
//! than the applications still allowed by the cap. Scoring inside a window runs
//! concurrently; classification and the applied counter are updated afterwards in
//! extraction order, so a window can't push the run past the cap and nothing after the
//! cap is scored.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, error, info, warn};

use crate::apply::extractor::{Posting, PostingExtractor};
use crate::apply::fetcher::Fetcher;
use crate::apply::fit_scoring::{FitScore, FitScorer, ScoreError};
use crate::apply::notifier::{EscalationNotice, Notifier};
use crate::apply::outcome::{ApplicationResult, MatchOutcome, MatchStatus};
use crate::apply::prompt_detector::{PromptDetector, UrlMarkerPromptDetector};
use crate::apply::relevance::{KeywordRelevanceFilter, RelevanceFilter};
use crate::models::application::ApplicationRequest;

const UNRELATED_REASON: &str = "Did not match job title keywords";
const PROMPT_REASON: &str = "Writing prompt detected; escalated to user";

/// Runtime knobs for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Postings scoring below this are skipped.
    pub min_score: f64,
    pub scorer_timeout: Duration,
    /// Max postings scored at once. 1 = strictly sequential.
    pub scoring_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_score: 0.45,
            scorer_timeout: Duration::from_secs(30),
            scoring_concurrency: 1,
        }
    }
}

pub struct ApplicationOrchestrator {
    config: PipelineConfig,
    fetcher: Arc<dyn Fetcher>,
    extractor: PostingExtractor,
    filter: Arc<dyn RelevanceFilter>,
    scorer: Arc<dyn FitScorer>,
    detector: Arc<dyn PromptDetector>,
    notifier: Arc<dyn Notifier>,
}

impl ApplicationOrchestrator {
    /// Uses the keyword relevance filter, the `assessment` URL detector and the
    /// LinkedIn `/jobs/view/` link marker unless overridden with the `with_*` methods.
    pub fn new(
        config: PipelineConfig,
        fetcher: Arc<dyn Fetcher>,
        scorer: Arc<dyn FitScorer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            fetcher,
            extractor: PostingExtractor::new("/jobs/view/"),
            filter: Arc::new(KeywordRelevanceFilter),
            scorer,
            detector: Arc::new(UrlMarkerPromptDetector::default()),
            notifier,
        }
    }

    pub fn with_extractor(mut self, extractor: PostingExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn RelevanceFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_detector(mut self, detector: Arc<dyn PromptDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Runs the pipeline for one request. Every path yields a well-formed result;
    /// failures are recorded as `Error` outcomes.
    pub async fn run(&self, request: &ApplicationRequest) -> ApplicationResult {
        let board_url = request.job_board_url.trim();
        if board_url.is_empty() {
            warn!("Job board URL missing, skipping job application automation");
            return ApplicationResult::empty(
                &request.job_board_url,
                &request.job_title,
                request.application_count,
            );
        }

        let profile = &request.candidate_profile;
        info!(
            "Starting application run for title '{}' against '{}' (cap {})",
            request.job_title, board_url, request.application_count
        );
        debug!(
            "Profile: summary {} chars, resume file {}, {} preferred companies, preference '{}', salary '{}', internships {}",
            profile.resume_summary.len(),
            profile
                .resume_file
                .as_ref()
                .map(|f| format!("'{}' ({} encoded bytes)", f.name, f.data.len()))
                .unwrap_or_else(|| "none".to_string()),
            profile.preferred_companies.len(),
            profile.job_preference,
            profile.salary_range,
            profile.looking_for_internships
        );

        let html = match self.fetcher.fetch(board_url).await {
            Ok(html) => html,
            Err(e) => {
                error!("Failed to fetch job board {board_url}: {e}");
                let outcome = MatchOutcome::new(
                    board_url,
                    &request.job_title,
                    MatchStatus::Error {
                        reason: e.to_string(),
                    },
                );
                return ApplicationResult::new(
                    &request.job_board_url,
                    &request.job_title,
                    request.application_count,
                    vec![outcome],
                );
            }
        };

        let postings = self.extractor.extract(&html, board_url);
        info!("Extracted {} candidate postings", postings.len());

        let matches = self.classify_postings(request, postings).await;
        let result = ApplicationResult::new(
            &request.job_board_url,
            &request.job_title,
            request.application_count,
            matches,
        );

        info!(
            "Run finished: applied={} low_score={} prompts={} unrelated={} errors={}",
            result.applied_count,
            result.skipped_low_score,
            result.skipped_prompts,
            result.skipped_unrelated,
            result.errors
        );
        result
    }

    async fn classify_postings(
        &self,
        request: &ApplicationRequest,
        postings: Vec<Posting>,
    ) -> Vec<MatchOutcome> {
        let cap = request.application_count;
        let mut applied = 0u32;
        let mut matches = Vec::with_capacity(postings.len());
        let mut pending = postings.into_iter();

        while applied < cap {
            let window_size = self
                .config
                .scoring_concurrency
                .max(1)
                .min((cap - applied) as usize);
            let window: Vec<(Posting, String)> = pending
                .by_ref()
                .take(window_size)
                .map(|posting| {
                    let text = display_text(&posting, request);
                    (posting, text)
                })
                .collect();
            if window.is_empty() {
                break;
            }

            let relevant: Vec<bool> = window
                .iter()
                .map(|(posting, _)| self.filter.is_relevant(posting, &request.job_title))
                .collect();

            let scores = join_all(window.iter().zip(&relevant).map(
                |((_, text), &is_relevant)| async move {
                    if is_relevant {
                        Some(self.score_with_timeout(request, text).await)
                    } else {
                        None
                    }
                },
            ))
            .await;

            for ((posting, text), score) in window.into_iter().zip(scores) {
                let status = match score {
                    None => {
                        debug!("Skipping unrelated posting {}", posting.url);
                        MatchStatus::SkippedUnrelated {
                            reason: UNRELATED_REASON.to_string(),
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Scoring failed for {}: {e}", posting.url);
                        MatchStatus::Error {
                            reason: format!("AI scoring failed: {e}"),
                        }
                    }
                    Some(Ok(fit)) => {
                        info!("AI score for '{}': {} ({})", text, fit.score, fit.reasoning);
                        self.decide(request, &posting, fit, &mut applied).await
                    }
                };
                matches.push(MatchOutcome::new(posting.url, text, status));
            }
        }

        matches
    }

    /// Threshold, prompt check and the single place `applied` is incremented.
    async fn decide(
        &self,
        request: &ApplicationRequest,
        posting: &Posting,
        fit: FitScore,
        applied: &mut u32,
    ) -> MatchStatus {
        if fit.score < self.config.min_score {
            info!("Skipping {} due to low AI score", posting.url);
            return MatchStatus::SkippedLowScore {
                score: fit.score,
                reason: fit.reasoning,
            };
        }

        if self.detector.requires_human(posting) {
            self.escalate(request, posting).await;
            return MatchStatus::SkippedPrompt {
                score: fit.score,
                reason: PROMPT_REASON.to_string(),
            };
        }

        info!("Applying to {}", posting.url);
        *applied += 1;
        MatchStatus::Applied {
            score: fit.score,
            reason: fit.reasoning,
        }
    }

    async fn score_with_timeout(
        &self,
        request: &ApplicationRequest,
        posting_text: &str,
    ) -> Result<FitScore, ScoreError> {
        let limit = self.config.scorer_timeout;
        match tokio::time::timeout(limit, self.scorer.score(request, posting_text)).await {
            Ok(result) => result.and_then(FitScore::validated),
            Err(_) => Err(ScoreError::Timeout(limit)),
        }
    }

    async fn escalate(&self, request: &ApplicationRequest, posting: &Posting) {
        let notice = EscalationNotice {
            recipient: request.requester_identity.clone(),
            posting_url: posting.url.clone(),
            job_title: request.job_title.clone(),
        };
        match self.notifier.notify(&notice).await {
            Ok(()) => info!("Escalated writing prompt for {}", posting.url),
            Err(e) => warn!("Failed to escalate writing prompt for {}: {e}", posting.url),
        }
    }
}

/// Blank link text falls back to the requested job title.
fn display_text(posting: &Posting, request: &ApplicationRequest) -> String {
    if posting.display_text.trim().is_empty() {
        request.job_title.clone()
    } else {
        posting.display_text.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::apply::fetcher::FetchError;
    use crate::apply::notifier::NotifyError;
    use crate::models::application::CandidateProfile;

    // ── stubs ──────────────────────────────────────────────────────────────

    struct StubFetcher {
        response: Result<String, FetchError>,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn ok(html: String) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(html),
                calls: AtomicUsize::new(0),
            })
        }

        fn err(e: FetchError) -> Arc<Self> {
            Arc::new(Self {
                response: Err(e),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }
    }

    /// Scores by posting text; `None` means the call fails. Optional per-text delay.
    struct TableScorer {
        table: HashMap<String, (Option<f64>, u64)>,
        seen: Mutex<Vec<String>>,
    }

    impl TableScorer {
        fn new(entries: &[(&str, Option<f64>)]) -> Arc<Self> {
            Self::with_delays(&entries.iter().map(|(t, s)| (*t, *s, 0)).collect::<Vec<_>>())
        }

        fn with_delays(entries: &[(&str, Option<f64>, u64)]) -> Arc<Self> {
            Arc::new(Self {
                table: entries
                    .iter()
                    .map(|(t, s, d)| (t.to_string(), (*s, *d)))
                    .collect(),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FitScorer for TableScorer {
        async fn score(
            &self,
            _request: &ApplicationRequest,
            posting_text: &str,
        ) -> Result<FitScore, ScoreError> {
            self.seen.lock().unwrap().push(posting_text.to_string());
            let (score, delay) = self
                .table
                .get(posting_text)
                .copied()
                .unwrap_or((Some(0.0), 0));
            if delay > 0 {
                tokio::time::sleep(Duration::from_secs(delay)).await;
            }
            match score {
                Some(score) => Ok(FitScore {
                    score,
                    reasoning: format!("reason for {posting_text}"),
                }),
                None => Err(ScoreError::Service("upstream 503".to_string())),
            }
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        fail: bool,
        sent: Mutex<Vec<EscalationNotice>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notice: &EscalationNotice) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(notice.clone());
            if self.fail {
                Err(NotifyError::Transport("smtp down".to_string()))
            } else {
                Ok(())
            }
        }
    }

    // ── fixtures ───────────────────────────────────────────────────────────

    const BOARD: &str = "https://www.linkedin.com/jobs/search?keywords=software";

    fn listing(links: &[(&str, &str)]) -> String {
        let items: String = links
            .iter()
            .map(|(href, text)| format!("<li><a href=\"{href}\">{text}</a></li>"))
            .collect();
        format!("<html><body><a href=\"/feed\">Feed</a><ul>{items}</ul></body></html>")
    }

    fn request(title: &str, cap: u32) -> ApplicationRequest {
        ApplicationRequest {
            job_title: title.to_string(),
            job_board_url: BOARD.to_string(),
            application_count: cap,
            candidate_profile: CandidateProfile {
                resume_summary: "Backend developer, 6 years of Rust and Go".to_string(),
                ..Default::default()
            },
            requester_identity: "candidate@example.com".to_string(),
        }
    }

    fn orchestrator(
        fetcher: Arc<StubFetcher>,
        scorer: Arc<TableScorer>,
        notifier: Arc<RecordingNotifier>,
        concurrency: usize,
    ) -> ApplicationOrchestrator {
        ApplicationOrchestrator::new(
            PipelineConfig {
                scoring_concurrency: concurrency,
                ..Default::default()
            },
            fetcher,
            scorer,
            notifier,
        )
    }

    fn scenario_a_listing() -> String {
        listing(&[
            ("/jobs/view/senior-engineer-1", "Posting One"),
            ("/jobs/view/registered-nurse-2", "Posting Two"),
            ("/jobs/view/software-tester-3", "Posting Three"),
            ("/jobs/view/engineer-assessment-4", "Posting Four"),
            ("/jobs/view/staff-engineer-5", "Posting Five"),
            ("/jobs/view/backend-engineer-6", "Posting Six"),
        ])
    }

    fn scenario_a_scorer() -> Arc<TableScorer> {
        TableScorer::new(&[
            ("Posting One", Some(0.9)),
            ("Posting Two", Some(0.99)),
            ("Posting Three", Some(0.3)),
            ("Posting Four", Some(0.8)),
            ("Posting Five", Some(0.95)),
            ("Posting Six", Some(0.99)),
        ])
    }

    fn labels(result: &ApplicationResult) -> Vec<&'static str> {
        result.matches.iter().map(|m| m.status.label()).collect()
    }

    // ── tests ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_scenario_a_classifies_in_order_and_stops_at_cap() {
        let scorer = scenario_a_scorer();
        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline = orchestrator(
            StubFetcher::ok(scenario_a_listing()),
            scorer.clone(),
            notifier.clone(),
            1,
        );

        let result = pipeline.run(&request("software engineer", 2)).await;

        assert_eq!(
            labels(&result),
            vec![
                "APPLIED",
                "SKIPPED_UNRELATED",
                "SKIPPED_LOW_SCORE",
                "SKIPPED_PROMPT",
                "APPLIED"
            ]
        );
        assert_eq!(result.applied_count, 2);
        assert_eq!(result.skipped_unrelated, 1);
        assert_eq!(result.skipped_low_score, 1);
        assert_eq!(result.skipped_prompts, 1);
        assert_eq!(
            result.matches[0].url,
            "https://www.linkedin.com/jobs/view/senior-engineer-1"
        );
        assert_eq!(result.matches[2].status.reason(), "reason for Posting Three");
        assert_eq!(result.matches[4].status.reason(), "reason for Posting Five");

        // unrelated posting and the posting past the cap are never scored
        assert_eq!(
            scorer.seen(),
            vec!["Posting One", "Posting Three", "Posting Four", "Posting Five"]
        );

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].posting_url,
            "https://www.linkedin.com/jobs/view/engineer-assessment-4"
        );
        assert_eq!(sent[0].recipient, "candidate@example.com");
    }

    #[tokio::test]
    async fn test_scenario_a_with_concurrent_scoring_matches_sequential() {
        let sequential = orchestrator(
            StubFetcher::ok(scenario_a_listing()),
            scenario_a_scorer(),
            Arc::new(RecordingNotifier::default()),
            1,
        )
        .run(&request("software engineer", 2))
        .await;

        let scorer = scenario_a_scorer();
        let concurrent = orchestrator(
            StubFetcher::ok(scenario_a_listing()),
            scorer.clone(),
            Arc::new(RecordingNotifier::default()),
            4,
        )
        .run(&request("software engineer", 2))
        .await;

        assert_eq!(labels(&sequential), labels(&concurrent));
        assert_eq!(concurrent.applied_count, 2);
        assert!(!scorer.seen().contains(&"Posting Six".to_string()));
    }

    #[tokio::test]
    async fn test_scenario_b_http_403_records_single_error() {
        let fetcher = StubFetcher::err(FetchError::Status {
            status: 403,
            url: BOARD.to_string(),
        });
        let scorer = TableScorer::new(&[]);
        let pipeline = orchestrator(
            fetcher,
            scorer.clone(),
            Arc::new(RecordingNotifier::default()),
            1,
        );

        let result = pipeline.run(&request("software engineer", 3)).await;

        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.errors, 1);
        assert_eq!(result.applied_count, 0);
        let outcome = &result.matches[0];
        assert_eq!(outcome.url, BOARD);
        assert_eq!(outcome.display_text, "software engineer");
        assert!(outcome.status.reason().contains("403"));
        assert!(outcome.status.reason().contains(BOARD));
        assert!(scorer.seen().is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_records_reason() {
        let fetcher = StubFetcher::err(FetchError::Transport("connection refused".to_string()));
        let result = orchestrator(
            fetcher,
            TableScorer::new(&[]),
            Arc::new(RecordingNotifier::default()),
            1,
        )
        .run(&request("software engineer", 3))
        .await;

        assert_eq!(labels(&result), vec!["ERROR"]);
        assert!(result.matches[0].status.reason().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_scenario_c_scoring_failure_is_isolated() {
        let html = listing(&[
            ("/jobs/view/engineer-1", "Broken Posting"),
            ("/jobs/view/engineer-2", "Good Posting"),
        ]);
        let scorer = TableScorer::new(&[("Broken Posting", None), ("Good Posting", Some(0.9))]);
        let result = orchestrator(
            StubFetcher::ok(html),
            scorer,
            Arc::new(RecordingNotifier::default()),
            1,
        )
        .run(&request("engineer", 5))
        .await;

        assert_eq!(labels(&result), vec!["ERROR", "APPLIED"]);
        assert!(result.matches[0]
            .status
            .reason()
            .starts_with("AI scoring failed:"));
        assert_eq!(result.applied_count, 1);
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_an_error() {
        let html = listing(&[("/jobs/view/engineer-1", "Overconfident Posting")]);
        let scorer = TableScorer::new(&[("Overconfident Posting", Some(1.7))]);
        let result = orchestrator(
            StubFetcher::ok(html),
            scorer,
            Arc::new(RecordingNotifier::default()),
            1,
        )
        .run(&request("engineer", 1))
        .await;

        assert_eq!(labels(&result), vec!["ERROR"]);
        assert_eq!(result.applied_count, 0);
    }

    struct AcceptAll;

    impl RelevanceFilter for AcceptAll {
        fn is_relevant(&self, _posting: &Posting, _job_title: &str) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_custom_relevance_filter_replaces_keyword_gate() {
        let html = listing(&[("/jobs/view/barista-1", "Barista")]);
        let scorer = TableScorer::new(&[("Barista", Some(0.8))]);
        let result = orchestrator(
            StubFetcher::ok(html),
            scorer,
            Arc::new(RecordingNotifier::default()),
            1,
        )
        .with_filter(Arc::new(AcceptAll))
        .run(&request("software engineer", 1))
        .await;

        assert_eq!(labels(&result), vec!["APPLIED"]);
    }

    #[tokio::test]
    async fn test_blank_board_url_is_a_no_op() {
        let fetcher = StubFetcher::ok(scenario_a_listing());
        let pipeline = orchestrator(
            fetcher.clone(),
            TableScorer::new(&[]),
            Arc::new(RecordingNotifier::default()),
            1,
        );
        let mut req = request("software engineer", 3);
        req.job_board_url = "   ".to_string();

        let result = pipeline.run(&req).await;

        assert!(result.matches.is_empty());
        assert_eq!(result.total_classified(), 0);
        assert_eq!(result.requested_applications, 3);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_cap_records_nothing() {
        let scorer = scenario_a_scorer();
        let result = orchestrator(
            StubFetcher::ok(scenario_a_listing()),
            scorer.clone(),
            Arc::new(RecordingNotifier::default()),
            1,
        )
        .run(&request("software engineer", 0))
        .await;

        assert!(result.matches.is_empty());
        assert!(scorer.seen().is_empty());
    }

    #[tokio::test]
    async fn test_cap_stops_at_exact_applied_count() {
        let links: Vec<(String, String)> = (1..=10)
            .map(|i| (format!("/jobs/view/engineer-{i}"), format!("Engineer {i}")))
            .collect();
        let refs: Vec<(&str, &str)> = links.iter().map(|(h, t)| (h.as_str(), t.as_str())).collect();
        let scores: Vec<(String, Option<f64>)> =
            (1..=10).map(|i| (format!("Engineer {i}"), Some(0.8))).collect();
        let score_refs: Vec<(&str, Option<f64>)> =
            scores.iter().map(|(t, s)| (t.as_str(), *s)).collect();

        for concurrency in [1, 3, 16] {
            let result = orchestrator(
                StubFetcher::ok(listing(&refs)),
                TableScorer::new(&score_refs),
                Arc::new(RecordingNotifier::default()),
                concurrency,
            )
            .run(&request("engineer", 4))
            .await;

            assert_eq!(result.applied_count, 4, "concurrency {concurrency}");
            assert_eq!(result.matches.len(), 4, "concurrency {concurrency}");
            assert_eq!(
                result.matches.last().unwrap().url,
                "https://www.linkedin.com/jobs/view/engineer-4"
            );
        }
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_change_classification() {
        let html = listing(&[("/jobs/view/engineer-assessment-1", "Needs Essay")]);
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let result = orchestrator(
            StubFetcher::ok(html),
            TableScorer::new(&[("Needs Essay", Some(0.9))]),
            notifier.clone(),
            1,
        )
        .run(&request("engineer", 2))
        .await;

        assert_eq!(labels(&result), vec!["SKIPPED_PROMPT"]);
        assert_eq!(result.skipped_prompts, 1);
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_low_score_postings_are_not_escalated() {
        let html = listing(&[("/jobs/view/engineer-assessment-1", "Weak Essay Job")]);
        let notifier = Arc::new(RecordingNotifier::default());
        let result = orchestrator(
            StubFetcher::ok(html),
            TableScorer::new(&[("Weak Essay Job", Some(0.2))]),
            notifier.clone(),
            1,
        )
        .run(&request("engineer", 2))
        .await;

        assert_eq!(labels(&result), vec!["SKIPPED_LOW_SCORE"]);
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_score_exactly_at_threshold_is_applied() {
        let html = listing(&[("/jobs/view/engineer-1", "Borderline")]);
        let result = orchestrator(
            StubFetcher::ok(html),
            TableScorer::new(&[("Borderline", Some(0.45))]),
            Arc::new(RecordingNotifier::default()),
            1,
        )
        .run(&request("engineer", 1))
        .await;

        assert_eq!(labels(&result), vec!["APPLIED"]);
    }

    #[tokio::test]
    async fn test_custom_threshold_from_config() {
        let html = listing(&[("/jobs/view/engineer-1", "Decent")]);
        let pipeline = ApplicationOrchestrator::new(
            PipelineConfig {
                min_score: 0.9,
                ..Default::default()
            },
            StubFetcher::ok(html),
            TableScorer::new(&[("Decent", Some(0.8))]),
            Arc::new(RecordingNotifier::default()),
        );

        let result = pipeline.run(&request("engineer", 1)).await;
        assert_eq!(labels(&result), vec!["SKIPPED_LOW_SCORE"]);
    }

    #[tokio::test]
    async fn test_blank_link_text_falls_back_to_job_title() {
        let html = listing(&[("/jobs/view/engineer-1", "  ")]);
        let scorer = TableScorer::new(&[("engineer", Some(0.9))]);
        let result = orchestrator(
            StubFetcher::ok(html),
            scorer.clone(),
            Arc::new(RecordingNotifier::default()),
            1,
        )
        .run(&request("engineer", 1))
        .await;

        assert_eq!(result.matches[0].display_text, "engineer");
        assert_eq!(scorer.seen(), vec!["engineer"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_scorer_times_out_per_posting() {
        let html = listing(&[
            ("/jobs/view/engineer-1", "Slow"),
            ("/jobs/view/engineer-2", "Fast"),
        ]);
        let scorer = TableScorer::with_delays(&[("Slow", Some(0.9), 120), ("Fast", Some(0.9), 0)]);
        let pipeline = ApplicationOrchestrator::new(
            PipelineConfig {
                scorer_timeout: Duration::from_secs(5),
                ..Default::default()
            },
            StubFetcher::ok(html),
            scorer,
            Arc::new(RecordingNotifier::default()),
        );

        let result = pipeline.run(&request("engineer", 2)).await;

        assert_eq!(labels(&result), vec!["ERROR", "APPLIED"]);
        assert!(result.matches[0].status.reason().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_scoring_preserves_extraction_order() {
        let html = listing(&[
            ("/jobs/view/engineer-1", "First"),
            ("/jobs/view/engineer-2", "Second"),
            ("/jobs/view/engineer-3", "Third"),
        ]);
        // first posting finishes last
        let scorer = TableScorer::with_delays(&[
            ("First", Some(0.9), 3),
            ("Second", Some(0.2), 2),
            ("Third", Some(0.9), 1),
        ]);
        let result = orchestrator(
            StubFetcher::ok(html),
            scorer,
            Arc::new(RecordingNotifier::default()),
            3,
        )
        .run(&request("engineer", 5))
        .await;

        let texts: Vec<&str> = result.matches.iter().map(|m| m.display_text.as_str()).collect();
        assert_eq!(texts, vec!["First", "Second", "Third"]);
        assert_eq!(labels(&result), vec!["APPLIED", "SKIPPED_LOW_SCORE", "APPLIED"]);
    }

    #[tokio::test]
    async fn test_counts_always_sum_to_match_count() {
        let html = listing(&[
            ("/jobs/view/engineer-1", "A"),
            ("/jobs/view/nurse-2", "B"),
            ("/jobs/view/engineer-3", "C"),
            ("/jobs/view/engineer-assessment-4", "D"),
            ("/jobs/view/engineer-5", "E"),
        ]);
        let scorer = TableScorer::new(&[
            ("A", None),
            ("C", Some(0.1)),
            ("D", Some(0.7)),
            ("E", Some(0.7)),
        ]);
        for cap in 0..4 {
            let result = orchestrator(
                StubFetcher::ok(html.clone()),
                scorer.clone(),
                Arc::new(RecordingNotifier::default()),
                2,
            )
            .run(&request("engineer", cap))
            .await;

            assert_eq!(result.total_classified() as usize, result.matches.len());
            assert!(result.applied_count <= result.requested_applications);
        }
    }
}
