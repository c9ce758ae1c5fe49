//! XLSX extraction: one segment per data row, per sheet.
//!
//! Walks the OOXML package directly (ZIP + streaming XML) rather than
//! loading a spreadsheet model: sheet names from `xl/workbook.xml`, shared
//! strings from `xl/sharedStrings.xml`, then a cell scan per worksheet.
//! The first non-empty row of each sheet is treated as the header row and
//! subsequent rows are rendered as JSON-style objects keyed by it.

use std::io::Read;

use crate::error::ExtractError;
use crate::models::{DocumentDetails, DocumentKind, Locator};

use super::{ContentExtractor, Extraction, Segment};

/// Upper bound on sheets processed per workbook.
const MAX_SHEETS: usize = 100;
/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

pub struct XlsxExtractor;

impl ContentExtractor for XlsxExtractor {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Xlsx
    }

    fn extract(&self, bytes: &[u8]) -> Result<Extraction, ExtractError> {
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
            .map_err(|e| ExtractError::Xlsx(e.to_string()))?;

        let shared_strings = read_shared_strings(&mut archive)?;
        let sheet_files = list_worksheet_files(&mut archive);
        let sheet_names = read_sheet_names(&mut archive)?;

        let mut segments = Vec::new();
        let mut total_rows: u64 = 0;
        let mut max_columns: u32 = 0;
        let sheet_count = sheet_files.len().min(MAX_SHEETS) as u32;

        for (sheet_idx, file_name) in sheet_files.into_iter().take(MAX_SHEETS).enumerate() {
            let sheet_name = sheet_names
                .get(sheet_idx)
                .cloned()
                .unwrap_or_else(|| format!("Sheet{}", sheet_idx + 1));

            let xml = read_zip_entry_bounded(&mut archive, &file_name, MAX_XML_ENTRY_BYTES)?;
            let rows = parse_sheet_rows(&xml, &shared_strings)?;
            if rows.is_empty() {
                continue;
            }

            let headers = &rows[0];
            max_columns = max_columns.max(headers.len() as u32);

            for (data_idx, row) in rows[1..].iter().enumerate() {
                let text = render_sheet_row(headers, row);
                if text.is_empty() {
                    continue;
                }
                total_rows += 1;
                segments.push(Segment {
                    locator: Locator::SheetRow {
                        sheet: sheet_name.clone(),
                        row: data_idx as u64 + 1,
                    },
                    text,
                });
            }
        }

        Ok(Extraction {
            details: DocumentDetails::Xlsx {
                sheet_count,
                row_count: total_rows,
                column_count: max_columns,
            },
            segments,
        })
    }
}

/// One parsed worksheet row: `(column index, cell text)` pairs in column order.
type SheetRow = Vec<(usize, String)>;

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Xlsx(e.to_string()))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Xlsx(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Xlsx(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn list_worksheet_files(archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches("xl/worksheets/sheet")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// Sheet display names from `xl/workbook.xml`, in workbook order.
fn read_sheet_names(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<String>, ExtractError> {
    let xml = match read_zip_entry_bounded(archive, "xl/workbook.xml", MAX_XML_ENTRY_BYTES) {
        Ok(xml) => xml,
        Err(_) => return Ok(Vec::new()),
    };

    let mut names = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) | Ok(quick_xml::events::Event::Empty(e)) => {
                if e.local_name().as_ref() == b"sheet" {
                    for attr in e.attributes().flatten() {
                        if attr.key.local_name().as_ref() == b"name" {
                            names.push(String::from_utf8_lossy(&attr.value).into_owned());
                        }
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Xlsx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(names)
}

/// Shared strings table; rich-text runs within one `<si>` are concatenated
/// so the table indexes stay aligned with cell references.
fn read_shared_strings(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<String>, ExtractError> {
    let xml = match read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES) {
        Ok(xml) => xml,
        Err(_) => return Ok(Vec::new()),
    };

    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_si = false;
    let mut in_t = false;
    let mut current = String::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"t" if in_si => in_t = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) if in_t => {
                current.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Xlsx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

#[derive(Clone, Copy, PartialEq)]
enum CellType {
    Shared,
    Inline,
    Other,
}

fn parse_sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<Vec<SheetRow>, ExtractError> {
    let mut rows: Vec<SheetRow> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut current_row: SheetRow = Vec::new();
    let mut cell: Option<(usize, CellType)> = None;
    let mut value = String::new();
    let mut in_v = false;
    let mut in_is_t = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => current_row.clear(),
                b"c" => {
                    let mut col = current_row.len();
                    let mut ty = CellType::Other;
                    for attr in e.attributes().flatten() {
                        match attr.key.local_name().as_ref() {
                            b"r" => {
                                if let Some(parsed) =
                                    column_index(&String::from_utf8_lossy(&attr.value))
                                {
                                    col = parsed;
                                }
                            }
                            b"t" => {
                                ty = match attr.value.as_ref() {
                                    b"s" => CellType::Shared,
                                    b"inlineStr" => CellType::Inline,
                                    _ => CellType::Other,
                                };
                            }
                            _ => {}
                        }
                    }
                    cell = Some((col, ty));
                    value.clear();
                }
                b"v" => in_v = true,
                b"t" => {
                    if matches!(cell, Some((_, CellType::Inline))) {
                        in_is_t = true;
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) if in_v || in_is_t => {
                value.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"v" => in_v = false,
                b"t" => in_is_t = false,
                b"c" => {
                    if let Some((col, ty)) = cell.take() {
                        let resolved = match ty {
                            CellType::Shared => value
                                .trim()
                                .parse::<usize>()
                                .ok()
                                .and_then(|i| shared_strings.get(i).cloned())
                                .unwrap_or_default(),
                            _ => value.trim().to_string(),
                        };
                        if !resolved.is_empty() {
                            current_row.push((col, resolved));
                        }
                    }
                }
                b"row" => {
                    if !current_row.is_empty() {
                        let mut row = std::mem::take(&mut current_row);
                        row.sort_by_key(|(col, _)| *col);
                        rows.push(row);
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Xlsx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(rows)
}

/// `"B12"` → 0-based column index 1.
fn column_index(cell_ref: &str) -> Option<usize> {
    let letters: String = cell_ref
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let mut index = 0usize;
    for c in letters.chars() {
        index = index * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }
    Some(index - 1)
}

/// Render a data row as `{"header": "value", ...}` using the header row's
/// column positions. Cells without a matching header get a positional name.
fn render_sheet_row(headers: &SheetRow, row: &SheetRow) -> String {
    let parts: Vec<String> = row
        .iter()
        .map(|(col, value)| {
            let header = headers
                .iter()
                .find(|(hcol, _)| hcol == col)
                .map(|(_, name)| name.clone())
                .unwrap_or_else(|| format!("column {}", col + 1));
            format!(
                "{}: {}",
                serde_json::to_string(&header).unwrap_or_default(),
                serde_json::to_string(value).unwrap_or_default()
            )
        })
        .collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", parts.join(", "))
    }
}
