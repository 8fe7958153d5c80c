//! Relevance Filter: cheap local gate run before any scoring call.

use crate::apply::extractor::Posting;

/// Decides whether a posting is related to the requested job title.
/// Implementations must be pure: the same inputs always give the same answer.
pub trait RelevanceFilter: Send + Sync {
    fn is_relevant(&self, posting: &Posting, job_title: &str) -> bool;
}

/// Accepts a posting when its lowercased URL contains at least one lowercase,
/// whitespace-delimited token of the job title as a substring. A blank title accepts
/// everything.
///
/// Coarse: "engineer" also matches "engineering-manager", and a
/// posting whose slug omits the title words is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordRelevanceFilter;

impl RelevanceFilter for KeywordRelevanceFilter {
    fn is_relevant(&self, posting: &Posting, job_title: &str) -> bool {
        if job_title.trim().is_empty() {
            return true;
        }
        let url = posting.url.to_lowercase();
        job_title
            .to_lowercase()
            .split_whitespace()
            .any(|token| url.contains(token))
    }
}
