//! Prompt Detector: flags postings that need a human-written response before applying.

use crate::apply::extractor::Posting;

/// Pure classifier from posting identity to "needs a human".
pub trait PromptDetector: Send + Sync {
    fn requires_human(&self, posting: &Posting) -> bool;
}

/// Flags a posting when its URL contains any of the configured markers
/// (case-sensitive, default `assessment`).
#[derive(Debug, Clone)]
pub struct UrlMarkerPromptDetector {
    markers: Vec<String>,
}

impl UrlMarkerPromptDetector {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }
}

impl Default for UrlMarkerPromptDetector {
    fn default() -> Self {
        Self::new(vec!["assessment".to_string()])
    }
}

impl PromptDetector for UrlMarkerPromptDetector {
    fn requires_human(&self, posting: &Posting) -> bool {
        self.markers
            .iter()
            .any(|marker| posting.url.contains(marker.as_str()))
    }
}
