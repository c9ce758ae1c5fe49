//! Bounded context assembly with citations.
//!
//! Takes ranked retrieval results and greedily packs the highest-scored
//! chunks into a character-budgeted context string for the language model,
//! with one labelled block per included chunk. A chunk is skipped when a
//! chunk of the same document with an adjacent ordinal is already in; for
//! windowed long-form text those neighbours are mostly overlap. A chunk
//! that does not fit the remaining budget is skipped, and lower-ranked
//! chunks may still fill the gap.

use std::collections::HashSet;

use serde::Serialize;

use crate::models::{Locator, RetrievedChunk};

/// Per-chunk cap inside the context; very long chunks are cut at a word
/// boundary.
const MAX_CHUNK_CHARS: usize = 1500;

const HEADER: &str = "I found the following relevant information in the documents:";
const EMPTY_CONTEXT: &str = "No relevant documents found.";

/// A source attribution, in inclusion order, for the "Sources:" display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    pub document_name: String,
    pub locator: Locator,
}

#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub text: String,
    pub citations: Vec<Citation>,
}

pub struct ContextAssembler {
    budget_chars: usize,
}

impl ContextAssembler {
    pub fn new(budget_chars: usize) -> Self {
        Self { budget_chars }
    }

    pub fn assemble(&self, results: &[RetrievedChunk]) -> AssembledContext {
        let mut included: HashSet<(String, i64)> = HashSet::new();
        let mut seen_citations: HashSet<String> = HashSet::new();
        let mut citations = Vec::new();
        let mut blocks: Vec<String> = Vec::new();
        let mut used = HEADER.len();

        for result in results {
            let key = (result.document_id.clone(), result.ordinal);
            if included.contains(&key)
                || included.contains(&(result.document_id.clone(), result.ordinal - 1))
                || included.contains(&(result.document_id.clone(), result.ordinal + 1))
            {
                continue;
            }

            let content = truncate_at_word(result.text.trim(), MAX_CHUNK_CHARS);
            let block = format!(
                "--- DOCUMENT {} (Relevance: {:.2}) ---\nFile: {}\nLocation: {}\n\n{}",
                blocks.len() + 1,
                result.score,
                result.document_name,
                result.locator,
                content,
            );

            if used + block.len() + 2 > self.budget_chars {
                continue;
            }
            used += block.len() + 2;

            blocks.push(block);
            included.insert(key);

            let citation_key = format!("{} ({})", result.document_name, result.locator);
            if seen_citations.insert(citation_key) {
                citations.push(Citation {
                    document_name: result.document_name.clone(),
                    locator: result.locator.clone(),
                });
            }
        }

        let text = if blocks.is_empty() {
            EMPTY_CONTEXT.to_string()
        } else {
            format!("{HEADER}\n\n{}", blocks.join("\n\n"))
        };

        AssembledContext { text, citations }
    }
}

/// Cut `text` to at most `max_chars` bytes, backing up to the last word
/// boundary and marking the cut.
fn truncate_at_word(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }
    let mut end = max_chars;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    let cut = text[..end].rfind(' ').unwrap_or(end);
    format!("{}... [content truncated]", text[..cut].trim_end())
}
