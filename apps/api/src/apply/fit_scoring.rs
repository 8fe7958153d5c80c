//! Fit Scoring: pluggable, trait-based scorer that judges a candidate against one posting.
//!
//! Default: `KeywordFitScorer` (pure-Rust, fast, deterministic, fully testable).
//! `LlmFitScorer` asks Claude through `LlmClient`; enable with ENABLE_LLM_FIT_SCORING.
//!
//! `AppState` holds an `Arc<dyn FitScorer>`, swapped at startup via config.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::apply::prompts::{FIT_SCORE_PROMPT_TEMPLATE, FIT_SCORE_SYSTEM};
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{LlmClient, LlmError};
use crate::models::application::ApplicationRequest;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Verdict for one posting. `score` is within [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitScore {
    pub score: f64,
    pub reasoning: String,
}

/// Scoring failures stay distinguishable from a legitimately low score.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("scoring service error: {0}")]
    Service(String),

    #[error("malformed scoring response: {0}")]
    Malformed(String),

    #[error("score {0} is outside [0, 1]")]
    OutOfRange(f64),

    #[error("scoring timed out after {0:?}")]
    Timeout(Duration),
}

impl From<LlmError> for ScoreError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Timeout(after) => ScoreError::Timeout(after),
            malformed @ (LlmError::Parse(_) | LlmError::EmptyContent) => {
                ScoreError::Malformed(malformed.to_string())
            }
            other => ScoreError::Service(other.to_string()),
        }
    }
}

impl FitScore {
    /// Rejects NaN and out-of-range scores instead of clamping them.
    pub fn validated(self) -> Result<Self, ScoreError> {
        if self.score.is_finite() && (0.0..=1.0).contains(&self.score) {
            Ok(self)
        } else {
            Err(ScoreError::OutOfRange(self.score))
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Implement this to swap backends without touching the orchestrator.
#[async_trait]
pub trait FitScorer: Send + Sync {
    async fn score(
        &self,
        request: &ApplicationRequest,
        posting_text: &str,
    ) -> Result<FitScore, ScoreError>;
}

// ────────────────────────────────────────────────────────────────────────────
// LlmFitScorer
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmFitScorer(pub LlmClient);

#[async_trait]
impl FitScorer for LlmFitScorer {
    async fn score(
        &self,
        request: &ApplicationRequest,
        posting_text: &str,
    ) -> Result<FitScore, ScoreError> {
        let prompt = build_fit_prompt(request, posting_text);
        let system = format!("{FIT_SCORE_SYSTEM} {JSON_ONLY_SYSTEM}");
        let verdict = self.0.call_json::<FitScore>(&prompt, &system).await?;
        verdict.validated()
    }
}

fn build_fit_prompt(request: &ApplicationRequest, posting_text: &str) -> String {
    let profile = &request.candidate_profile;
    let preferred = if profile.preferred_companies.is_empty() {
        "none".to_string()
    } else {
        profile.preferred_companies.join(", ")
    };
    fill_template(
        FIT_SCORE_PROMPT_TEMPLATE,
        &[
            ("job_title", request.job_title.as_str()),
            ("job_preference", or_unspecified(&profile.job_preference)),
            ("salary_range", or_unspecified(&profile.salary_range)),
            (
                "looking_for_internships",
                if profile.looking_for_internships { "yes" } else { "no" },
            ),
            ("preferred_companies", preferred.as_str()),
            ("resume_summary", or_unspecified(&profile.resume_summary)),
            ("posting_text", posting_text),
        ],
    )
}

/// Substitutes `{name}` placeholders in one pass. Inserted values are never rescanned,
/// and braces that don't name a known placeholder are kept as-is.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let hit = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });
        match hit {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn or_unspecified(value: &str) -> &str {
    if value.trim().is_empty() {
        "unspecified"
    } else {
        value
    }
}

// ────────────────────────────────────────────────────────────────────────────
// KeywordFitScorer: offline default
// ────────────────────────────────────────────────────────────────────────────

const PREFERRED_COMPANY_BONUS: f64 = 0.2;
const INTERNSHIP_BONUS: f64 = 0.1;
const UNWANTED_INTERNSHIP_FACTOR: f64 = 0.5;
const STOPWORDS: &[&str] = &["and", "the", "for", "with", "you", "our", "are", "job"];

/// Pure-Rust keyword scorer. No network call, same answer for the same inputs.
///
/// Algorithm:
/// 1. base = share of posting keywords found in resume summary + requested title
/// 2. +0.2 when the posting names one of the preferred companies
/// 3. internship postings: ×0.5 when the candidate doesn't want one, +0.1 when they do
/// 4. clamp to [0, 1], rounded to two decimals
pub struct KeywordFitScorer;

#[async_trait]
impl FitScorer for KeywordFitScorer {
    async fn score(
        &self,
        request: &ApplicationRequest,
        posting_text: &str,
    ) -> Result<FitScore, ScoreError> {
        Ok(compute_keyword_fit(request, posting_text))
    }
}

fn compute_keyword_fit(request: &ApplicationRequest, posting_text: &str) -> FitScore {
    let profile = &request.candidate_profile;
    let posting_keywords = keywords(posting_text);

    if posting_keywords.is_empty() {
        return FitScore {
            score: 0.0,
            reasoning: "Posting text has no scorable keywords.".to_string(),
        };
    }

    let profile_keywords = keywords(&format!("{} {}", profile.resume_summary, request.job_title));
    let mut matched: Vec<&str> = posting_keywords
        .iter()
        .filter(|k| profile_keywords.contains(*k))
        .map(String::as_str)
        .collect();
    matched.sort_unstable();

    let mut score = matched.len() as f64 / posting_keywords.len() as f64;
    let mut notes = vec![format!(
        "Matched {}/{} posting keywords{}",
        matched.len(),
        posting_keywords.len(),
        if matched.is_empty() {
            String::new()
        } else {
            format!(" ({})", matched.join(", "))
        }
    )];

    let posting_lower = posting_text.to_lowercase();
    if let Some(company) = profile
        .preferred_companies
        .iter()
        .find(|c| !c.trim().is_empty() && posting_lower.contains(&c.trim().to_lowercase()))
    {
        score += PREFERRED_COMPANY_BONUS;
        notes.push(format!("preferred company {}", company.trim()));
    }

    let is_internship = posting_keywords
        .iter()
        .any(|k| k == "intern" || k == "internship");
    if is_internship {
        if profile.looking_for_internships {
            score += INTERNSHIP_BONUS;
            notes.push("internship wanted".to_string());
        } else {
            score *= UNWANTED_INTERNSHIP_FACTOR;
            notes.push("internship not wanted".to_string());
        }
    }

    FitScore {
        score: (score.clamp(0.0, 1.0) * 100.0).round() / 100.0,
        reasoning: format!("{}.", notes.join("; ")),
    }
}

/// Lowercase alphanumeric words of three or more characters, minus stopwords.
fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
