//! CSV extraction: one segment per data row.
//!
//! Each row is rendered as a JSON-style object keyed by the header row, so
//! the embedded text carries the column names alongside the values.

use csv::ReaderBuilder;

use crate::error::ExtractError;
use crate::models::{DocumentDetails, DocumentKind, Locator};

use super::{ContentExtractor, Extraction, Segment};

pub struct CsvExtractor;

impl ContentExtractor for CsvExtractor {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Csv
    }

    fn extract(&self, bytes: &[u8]) -> Result<Extraction, ExtractError> {
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(bytes);

        let headers = reader
            .headers()
            .map_err(|e| ExtractError::Csv(e.to_string()))?
            .clone();
        let column_count = headers.len() as u32;

        let mut segments = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(|e| ExtractError::Csv(e.to_string()))?;
            let text = render_row(headers.iter(), record.iter());
            segments.push(Segment {
                locator: Locator::Row { row: i as u64 + 1 },
                text,
            });
        }

        Ok(Extraction {
            details: DocumentDetails::Csv {
                row_count: segments.len() as u64,
                column_count,
            },
            segments,
        })
    }
}

/// Render a row as `{"header": "value", ...}`, preserving column order.
fn render_row<'a>(
    headers: impl Iterator<Item = &'a str>,
    values: impl Iterator<Item = &'a str>,
) -> String {
    let parts: Vec<String> = headers
        .zip(values)
        .map(|(header, value)| {
            format!(
                "{}: {}",
                serde_json::to_string(header).unwrap_or_default(),
                serde_json::to_string(value).unwrap_or_default()
            )
        })
        .collect();
    format!("{{{}}}", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_become_segments_with_header_context() {
        let data = b"name,age\nAlice,30\nBob,25\n";
        let extraction = CsvExtractor.extract(data).unwrap();

        assert_eq!(extraction.segments.len(), 2);
        assert_eq!(
            extraction.segments[0].locator,
            Locator::Row { row: 1 }
        );
        assert_eq!(
            extraction.segments[0].text,
            r#"{"name": "Alice", "age": "30"}"#
        );
        assert_eq!(
            extraction.details,
            DocumentDetails::Csv {
                row_count: 2,
                column_count: 2
            }
        );
    }

    #[test]
    fn header_only_file_yields_no_segments() {
        let extraction = CsvExtractor.extract(b"name,age\n").unwrap();
        assert!(extraction.segments.is_empty());
        assert_eq!(
            extraction.details,
            DocumentDetails::Csv {
                row_count: 0,
                column_count: 2
            }
        );
    }

    #[test]
    fn binary_garbage_fails_extraction() {
        let err = CsvExtractor.extract(&[0xFF, 0xFE, 0x00, 0x01]).unwrap_err();
        assert!(matches!(err, ExtractError::Csv(_)));
    }

    #[test]
    fn values_with_quotes_are_escaped() {
        let data = b"quote\n\"she said \"\"hi\"\"\"\n";
        let extraction = CsvExtractor.extract(data).unwrap();
        assert_eq!(
            extraction.segments[0].text,
            r#"{"quote": "she said \"hi\""}"#
        );
    }
}
