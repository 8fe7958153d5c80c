//! Posting Extractor: finds job-detail links on an already-fetched listing page.

use reqwest::Url;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A candidate posting found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub url: String,
    pub display_text: String,
}

/// Extracts `<a href>` elements whose raw href contains the site's job-detail marker
/// (for LinkedIn, `/jobs/view/`). Output is in document order; duplicates are kept.
#[derive(Debug, Clone)]
pub struct PostingExtractor {
    link_marker: String,
}

impl PostingExtractor {
    pub fn new(link_marker: impl Into<String>) -> Self {
        Self {
            link_marker: link_marker.into(),
        }
    }

    pub fn extract(&self, html: &str, source_url: &str) -> Vec<Posting> {
        let document = Html::parse_document(html);
        let base = Url::parse(source_url).ok();

        let postings: Vec<Posting> = document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "a")
            .filter_map(|el| {
                let href = el.value().attr("href")?;
                if !href.contains(&self.link_marker) {
                    return None;
                }
                let url = resolve(base.as_ref(), href)?;
                Some(Posting {
                    url,
                    display_text: normalize_text(el),
                })
            })
            .collect();

        debug!(
            "Extracted {} postings from {} ({} bytes)",
            postings.len(),
            source_url,
            html.len()
        );
        postings
    }
}

fn resolve(base: Option<&Url>, href: &str) -> Option<String> {
    let resolved = match base {
        Some(base) => base.join(href),
        None => Url::parse(href),
    };
    resolved.ok().map(String::from)
}

fn normalize_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
