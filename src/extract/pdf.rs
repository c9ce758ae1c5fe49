//! PDF extraction: one segment per non-empty page.

use crate::error::ExtractError;
use crate::models::{DocumentDetails, DocumentKind, Locator};

use super::{ContentExtractor, Extraction, Segment};

pub struct PdfExtractor;

impl ContentExtractor for PdfExtractor {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Pdf
    }

    fn extract(&self, bytes: &[u8]) -> Result<Extraction, ExtractError> {
        let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
            .map_err(|e| ExtractError::Pdf(e.to_string()))?;

        let page_count = pages.len() as u32;
        let (title, author) = document_info(bytes);

        let segments: Vec<Segment> = pages
            .iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, text)| Segment {
                locator: Locator::Page {
                    page: i as u32 + 1,
                },
                text: text.trim().to_string(),
            })
            .collect();

        Ok(Extraction {
            details: DocumentDetails::Pdf {
                page_count,
                title,
                author,
            },
            segments,
        })
    }
}

/// Best-effort Title/Author from the PDF Info dictionary. Anything
/// unreadable simply yields `None`, matching how little we rely on it.
fn document_info(bytes: &[u8]) -> (Option<String>, Option<String>) {
    let doc = match lopdf::Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(_) => return (None, None),
    };

    let info = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| match obj {
            lopdf::Object::Reference(id) => doc.get_object(*id).ok(),
            other => Some(other),
        })
        .and_then(|obj| obj.as_dict().ok());

    let info = match info {
        Some(dict) => dict,
        None => return (None, None),
    };

    (info_string(info, b"Title"), info_string(info, b"Author"))
}

fn info_string(dict: &lopdf::Dictionary, key: &[u8]) -> Option<String> {
    let raw = match dict.get(key).ok()? {
        lopdf::Object::String(bytes, _) => bytes.clone(),
        _ => return None,
    };

    // PDF text strings are either UTF-16BE with a BOM or a latin-ish
    // single-byte encoding; lossy decoding covers both well enough here.
    let text = if raw.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = raw[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(&raw).into_owned()
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
