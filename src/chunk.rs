//! Turns extracted segments into ordinally-numbered chunk drafts.
//!
//! Row- and page-oriented formats (CSV, XLSX, PDF) chunk on their natural
//! boundaries: one extractor segment becomes one chunk. Long-form website
//! text is split into fixed-size character windows with a configurable
//! overlap so context survives window boundaries. Window edges are snapped
//! to UTF-8 char boundaries.
//!
//! Chunking is deterministic: identical segments always yield an identical
//! draft sequence, which reprocessing idempotence tests rely on. Ordinals
//! are assigned contiguously from 0 across the whole document.

use crate::error::ChunkError;
use crate::extract::Segment;
use crate::models::{ChunkDraft, DocumentKind};

/// Window/overlap for long-form text, in characters.
#[derive(Debug, Clone, Copy)]
pub struct ChunkSettings {
    pub window_chars: usize,
    pub overlap_chars: usize,
}

impl From<&crate::config::ChunkingConfig> for ChunkSettings {
    fn from(config: &crate::config::ChunkingConfig) -> Self {
        Self {
            window_chars: config.window_chars,
            overlap_chars: config.overlap_chars,
        }
    }
}

/// Produce the chunk drafts for a document from its extracted segments.
///
/// Empty segments are dropped before numbering, so the returned ordinals
/// are always exactly `0..n`.
pub fn chunk_segments(
    kind: DocumentKind,
    segments: &[Segment],
    settings: &ChunkSettings,
) -> Result<Vec<ChunkDraft>, ChunkError> {
    if settings.window_chars == 0 {
        return Err(ChunkError::ZeroWindow);
    }
    if settings.overlap_chars >= settings.window_chars {
        return Err(ChunkError::OverlapTooLarge {
            window: settings.window_chars,
            overlap: settings.overlap_chars,
        });
    }

    let mut drafts = Vec::new();
    let mut ordinal: i64 = 0;

    for segment in segments {
        let trimmed = segment.text.trim();
        if trimmed.is_empty() {
            continue;
        }

        match kind {
            DocumentKind::Website => {
                for piece in window_text(trimmed, settings.window_chars, settings.overlap_chars) {
                    drafts.push(ChunkDraft {
                        ordinal,
                        locator: segment.locator.clone(),
                        text: piece,
                    });
                    ordinal += 1;
                }
            }
            DocumentKind::Pdf | DocumentKind::Csv | DocumentKind::Xlsx => {
                drafts.push(ChunkDraft {
                    ordinal,
                    locator: segment.locator.clone(),
                    text: trimmed.to_string(),
                });
                ordinal += 1;
            }
        }
    }

    Ok(drafts)
}

/// Split `text` into windows of at most `window` bytes, each window sharing
/// its last `overlap` bytes with the start of the next.
fn window_text(text: &str, window: usize, overlap: usize) -> Vec<String> {
    if text.len() <= window {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut start = 0usize;

    loop {
        let mut end = snap_to_char_boundary(text, (start + window).min(text.len()));
        if end <= start {
            end = next_char_boundary(text, start);
        }

        let piece = text[start..end].trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }

        if end >= text.len() {
            break;
        }

        let mut next = snap_to_char_boundary(text, end.saturating_sub(overlap));
        if next <= start {
            next = end;
        }
        start = next;
    }

    pieces
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Byte index just past the char starting at `index`.
fn next_char_boundary(s: &str, index: usize) -> usize {
    s[index..]
        .char_indices()
        .nth(1)
        .map(|(i, _)| index + i)
        .unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Locator;

    fn settings(window: usize, overlap: usize) -> ChunkSettings {
        ChunkSettings {
            window_chars: window,
            overlap_chars: overlap,
        }
    }

    fn page_segment(page: u32, text: &str) -> Segment {
        Segment {
            locator: Locator::Page { page },
            text: text.to_string(),
        }
    }

    fn section_segment(section: u32, text: &str) -> Segment {
        Segment {
            locator: Locator::Section { section },
            text: text.to_string(),
        }
    }

    #[test]
    fn natural_boundary_maps_one_segment_to_one_chunk() {
        let segments = vec![
            page_segment(1, "First page."),
            page_segment(2, "Second page."),
            page_segment(3, "Third page."),
        ];
        let drafts = chunk_segments(DocumentKind::Pdf, &segments, &settings(100, 10)).unwrap();
        assert_eq!(drafts.len(), 3);
        for (i, draft) in drafts.iter().enumerate() {
            assert_eq!(draft.ordinal, i as i64);
        }
        assert_eq!(drafts[2].locator, Locator::Page { page: 3 });
    }

    #[test]
    fn empty_segments_do_not_leave_ordinal_gaps() {
        let segments = vec![
            page_segment(1, "Content."),
            page_segment(2, "   "),
            page_segment(3, "More content."),
        ];
        let drafts = chunk_segments(DocumentKind::Pdf, &segments, &settings(100, 10)).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].ordinal, 0);
        assert_eq!(drafts[1].ordinal, 1);
        assert_eq!(drafts[1].locator, Locator::Page { page: 3 });
    }

    #[test]
    fn website_text_is_windowed_with_overlap() {
        let text = "abcdefghij".repeat(10); // 100 chars
        let segments = vec![section_segment(0, &text)];
        let drafts = chunk_segments(DocumentKind::Website, &segments, &settings(40, 10)).unwrap();
        assert!(drafts.len() > 2);
        for (i, draft) in drafts.iter().enumerate() {
            assert_eq!(draft.ordinal, i as i64);
            assert_eq!(draft.locator, Locator::Section { section: 0 });
            assert!(draft.text.len() <= 40);
        }
        // Consecutive windows share the overlap region.
        let first = &drafts[0].text;
        let second = &drafts[1].text;
        assert!(second.starts_with(&first[first.len() - 10..]));
    }

    #[test]
    fn short_website_section_is_a_single_chunk() {
        let segments = vec![section_segment(0, "short text")];
        let drafts = chunk_segments(DocumentKind::Website, &segments, &settings(400, 40)).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].text, "short text");
    }

    #[test]
    fn windowing_is_deterministic() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(30);
        let segments = vec![section_segment(0, &text), section_segment(1, &text)];
        let a = chunk_segments(DocumentKind::Website, &segments, &settings(120, 20)).unwrap();
        let b = chunk_segments(DocumentKind::Website, &segments, &settings(120, 20)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn multibyte_text_never_splits_inside_a_char() {
        let text = "é".repeat(100);
        let segments = vec![section_segment(0, &text)];
        let drafts = chunk_segments(DocumentKind::Website, &segments, &settings(15, 3)).unwrap();
        assert!(!drafts.is_empty());
        for draft in &drafts {
            assert!(draft.text.chars().all(|c| c == 'é'));
        }
    }

    #[test]
    fn zero_window_rejected() {
        let segments = vec![section_segment(0, "text")];
        assert!(matches!(
            chunk_segments(DocumentKind::Website, &segments, &settings(0, 0)),
            Err(ChunkError::ZeroWindow)
        ));
    }

    #[test]
    fn overlap_at_or_above_window_rejected() {
        let segments = vec![section_segment(0, "text")];
        assert!(matches!(
            chunk_segments(DocumentKind::Website, &segments, &settings(10, 10)),
            Err(ChunkError::OverlapTooLarge { .. })
        ));
    }
}
