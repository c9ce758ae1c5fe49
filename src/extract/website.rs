//! Web page extraction: heading-delimited sections from fetched HTML.
//!
//! Block-level text (headings, paragraphs, list items, preformatted text)
//! is collected in document order; each heading starts a new section. The
//! section index is the chunk locator for long-form web content.

use scraper::{Html, Selector};
use url::Url;

use crate::error::ExtractError;
use crate::models::{DocumentDetails, DocumentKind, Locator};

use super::{ContentExtractor, Extraction, Segment};

const BLOCK_SELECTOR: &str = "h1, h2, h3, h4, h5, h6, p, li, pre";
const HEADINGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];

pub struct WebsiteExtractor {
    url: String,
}

impl WebsiteExtractor {
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

impl ContentExtractor for WebsiteExtractor {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Website
    }

    fn extract(&self, bytes: &[u8]) -> Result<Extraction, ExtractError> {
        let html = String::from_utf8_lossy(bytes);
        let document = Html::parse_document(&html);

        let title_selector =
            Selector::parse("title").map_err(|e| ExtractError::Html(e.to_string()))?;
        let title = document
            .select(&title_selector)
            .next()
            .map(|el| normalize_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
            .filter(|t| !t.is_empty());

        let block_selector =
            Selector::parse(BLOCK_SELECTOR).map_err(|e| ExtractError::Html(e.to_string()))?;

        let mut sections: Vec<String> = Vec::new();
        let mut current: Vec<String> = Vec::new();

        for element in document.select(&block_selector) {
            let text = normalize_whitespace(&element.text().collect::<Vec<_>>().join(" "));
            if text.is_empty() {
                continue;
            }
            let tag = element.value().name();
            if HEADINGS.contains(&tag) && !current.is_empty() {
                sections.push(current.join("\n\n"));
                current.clear();
            }
            current.push(text);
        }
        if !current.is_empty() {
            sections.push(current.join("\n\n"));
        }

        if sections.is_empty() {
            return Err(ExtractError::Empty);
        }

        let domain = Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_else(|| self.url.clone());

        let segments = sections
            .into_iter()
            .enumerate()
            .map(|(i, text)| Segment {
                locator: Locator::Section { section: i as u32 },
                text,
            })
            .collect();

        Ok(Extraction {
            details: DocumentDetails::Website {
                url: self.url.clone(),
                domain,
                title,
            },
            segments,
        })
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
