//! Record readers for the ingestion boundary.
//!
//! Dump parsing happens upstream; these adapters read the flat files such a
//! parser emits and yield `Result<RawRecord, IngestionError>` lazily, ready
//! for [`crate::IndexBuilder::build`]. Blank lines are ignored. Line numbers
//! in errors are 1-based.
//!
//! Two formats are understood:
//!
//! ```text
//! JSON lines: {"wikipedia_title":"Manatee","wikipedia_id":339,"wikidata_id":"Q132524"}
//! TSV:        Manatee<TAB>339<TAB>Q132524
//! ```
//!
//! In TSV the third column is optional; an empty value or `\N` means null.

use std::io::{BufRead, Lines};

use crate::error::IngestionError;
use crate::record::RawRecord;

/// Reads one JSON object per line.
pub fn json_lines<R: BufRead>(reader: R) -> JsonLines<R> {
    JsonLines {
        lines: reader.lines(),
        line: 0,
    }
}

/// Reads `title<TAB>page_id[<TAB>wikidata_id]` lines.
pub fn tsv<R: BufRead>(reader: R) -> TsvLines<R> {
    TsvLines {
        lines: reader.lines(),
        line: 0,
    }
}

/// Iterator returned by [`json_lines`].
#[derive(Debug)]
pub struct JsonLines<R> {
    lines: Lines<R>,
    line: u64,
}

impl<R: BufRead> Iterator for JsonLines<R> {
    type Item = Result<RawRecord, IngestionError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = self.lines.next()?;
            self.line += 1;
            let text = match text {
                Ok(text) => text,
                Err(e) => return Some(Err(IngestionError::parse(self.line, e.to_string()))),
            };
            if text.trim().is_empty() {
                continue;
            }
            return Some(
                serde_json::from_str::<RawRecord>(&text)
                    .map_err(|e| IngestionError::parse(self.line, e.to_string())),
            );
        }
    }
}

/// Iterator returned by [`tsv`].
#[derive(Debug)]
pub struct TsvLines<R> {
    lines: Lines<R>,
    line: u64,
}

impl<R: BufRead> Iterator for TsvLines<R> {
    type Item = Result<RawRecord, IngestionError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = self.lines.next()?;
            self.line += 1;
            let text = match text {
                Ok(text) => text,
                Err(e) => return Some(Err(IngestionError::parse(self.line, e.to_string()))),
            };
            let text = text.trim_end_matches('\r');
            if text.trim().is_empty() {
                continue;
            }
            return Some(parse_tsv_line(self.line, text));
        }
    }
}

fn parse_tsv_line(line: u64, text: &str) -> Result<RawRecord, IngestionError> {
    let columns: Vec<&str> = text.split('\t').collect();
    if !(2..=3).contains(&columns.len()) {
        return Err(IngestionError::parse(
            line,
            format!("expected 2 or 3 tab-separated columns, found {}", columns.len()),
        ));
    }

    let present = |value: &str| (!value.is_empty() && value != "\\N").then(|| value.to_string());
    Ok(RawRecord {
        wikipedia_title: present(columns[0]),
        wikipedia_id: present(columns[1]),
        wikidata_id: columns.get(2).and_then(|v| present(v)),
    })
}
