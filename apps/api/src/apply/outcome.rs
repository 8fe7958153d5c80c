//! Match outcomes and the aggregated result of one application run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal classification of a single posting. Every variant carries a reason;
/// only the variants reached after scoring carry the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Applied { score: f64, reason: String },
    SkippedLowScore { score: f64, reason: String },
    SkippedUnrelated { reason: String },
    SkippedPrompt { score: f64, reason: String },
    Error { reason: String },
}

impl MatchStatus {
    /// Stable label used when persisting history.
    pub fn label(&self) -> &'static str {
        match self {
            MatchStatus::Applied { .. } => "APPLIED",
            MatchStatus::SkippedLowScore { .. } => "SKIPPED_LOW_SCORE",
            MatchStatus::SkippedUnrelated { .. } => "SKIPPED_UNRELATED",
            MatchStatus::SkippedPrompt { .. } => "SKIPPED_PROMPT",
            MatchStatus::Error { .. } => "ERROR",
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            MatchStatus::Applied { reason, .. }
            | MatchStatus::SkippedLowScore { reason, .. }
            | MatchStatus::SkippedUnrelated { reason }
            | MatchStatus::SkippedPrompt { reason, .. }
            | MatchStatus::Error { reason } => reason,
        }
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            MatchStatus::Applied { score, .. }
            | MatchStatus::SkippedLowScore { score, .. }
            | MatchStatus::SkippedPrompt { score, .. } => Some(*score),
            MatchStatus::SkippedUnrelated { .. } | MatchStatus::Error { .. } => None,
        }
    }
}

/// The decision recorded for one posting, in the order it was encountered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub url: String,
    pub display_text: String,
    #[serde(flatten)]
    pub status: MatchStatus,
    pub decided_at: DateTime<Utc>,
}

impl MatchOutcome {
    pub fn new(url: impl Into<String>, display_text: impl Into<String>, status: MatchStatus) -> Self {
        Self {
            url: url.into(),
            display_text: display_text.into(),
            status,
            decided_at: Utc::now(),
        }
    }
}

/// Summary of one run. Counters are tallied from `matches` in [`ApplicationResult::new`]
/// and are never updated on their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationResult {
    pub job_board_url: String,
    pub job_title: String,
    pub requested_applications: u32,
    pub applied_count: u32,
    pub skipped_low_score: u32,
    pub skipped_prompts: u32,
    pub skipped_unrelated: u32,
    pub errors: u32,
    pub matches: Vec<MatchOutcome>,
}

impl ApplicationResult {
    pub fn new(
        job_board_url: impl Into<String>,
        job_title: impl Into<String>,
        requested_applications: u32,
        matches: Vec<MatchOutcome>,
    ) -> Self {
        let mut result = Self {
            job_board_url: job_board_url.into(),
            job_title: job_title.into(),
            requested_applications,
            applied_count: 0,
            skipped_low_score: 0,
            skipped_prompts: 0,
            skipped_unrelated: 0,
            errors: 0,
            matches: Vec::new(),
        };
        for outcome in &matches {
            match outcome.status {
                MatchStatus::Applied { .. } => result.applied_count += 1,
                MatchStatus::SkippedLowScore { .. } => result.skipped_low_score += 1,
                MatchStatus::SkippedPrompt { .. } => result.skipped_prompts += 1,
                MatchStatus::SkippedUnrelated { .. } => result.skipped_unrelated += 1,
                MatchStatus::Error { .. } => result.errors += 1,
            }
        }
        result.matches = matches;
        result
    }

    /// Result with no matches and all counters at zero.
    pub fn empty(
        job_board_url: impl Into<String>,
        job_title: impl Into<String>,
        requested_applications: u32,
    ) -> Self {
        Self::new(job_board_url, job_title, requested_applications, Vec::new())
    }

    #[cfg(test)]
    pub fn total_classified(&self) -> u32 {
        self.applied_count
            + self.skipped_low_score
            + self.skipped_prompts
            + self.skipped_unrelated
            + self.errors
    }
}
