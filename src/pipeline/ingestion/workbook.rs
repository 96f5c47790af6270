use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{NavigatorError, Result};

/// One sheet: a header row plus data rows of the same width
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// 1-based sheet line of each entry in `rows`; blank lines still count
    #[serde(default)]
    pub row_lines: Vec<usize>,
}

impl Sheet {
    /// Sheet line of the data row at `index`, assuming no gaps when lines were not tracked
    pub fn line_of(&self, index: usize) -> usize {
        self.row_lines.get(index).copied().unwrap_or(index + 2)
    }
}

/// Structural view of a workbook after decoding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Widest header across sheets
    pub fn column_count(&self) -> usize {
        self.sheets.iter().map(|s| s.headers.len()).max().unwrap_or(0)
    }

    /// Data rows across all sheets, headers excluded
    pub fn row_count(&self) -> usize {
        self.sheets.iter().map(|s| s.rows.len()).sum()
    }

    pub fn primary_sheet(&self) -> Option<&Sheet> {
        self.sheets.first()
    }
}

/// Decodes transferred bytes into a workbook structure
pub trait WorkbookParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<Workbook>;
}

/// Reads the delimited-text rendition of a single-sheet workbook.
///
/// The delimiter is detected from the header line (`;`, tab or `,`), which
/// covers both pt-BR and US spreadsheet exports.
#[derive(Debug, Clone)]
pub struct DelimitedWorkbookParser {
    sheet_name: String,
}

impl Default for DelimitedWorkbookParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DelimitedWorkbookParser {
    pub fn new() -> Self {
        Self {
            sheet_name: "Planilha1".to_string(),
        }
    }

    pub fn with_sheet_name(sheet_name: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
        }
    }

    fn detect_delimiter(header_line: &str) -> u8 {
        let candidates = [b';', b'\t', b','];
        candidates
            .iter()
            .copied()
            .max_by_key(|d| header_line.bytes().filter(|b| b == d).count())
            .filter(|d| header_line.as_bytes().contains(d))
            .unwrap_or(b',')
    }
}

impl WorkbookParser for DelimitedWorkbookParser {
    fn parse(&self, bytes: &[u8]) -> Result<Workbook> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| NavigatorError::Parse(format!("workbook is not readable text: {}", e)))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let header_line = text
            .lines()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| NavigatorError::Parse("workbook has no header row".to_string()))?;
        let delimiter = Self::detect_delimiter(header_line);
        debug!("Detected delimiter '{}'", delimiter as char);

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(false)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(NavigatorError::Parse("header row is empty".to_string()));
        }

        let mut rows = Vec::new();
        let mut row_lines = Vec::new();
        for result in reader.records() {
            let record = result?;
            if record.iter().all(|cell| cell.is_empty()) {
                continue;
            }
            let line = record
                .position()
                .map_or(row_lines.last().map_or(2, |l| l + 1), |pos| record_line(text.as_bytes(), pos));
            row_lines.push(line);
            rows.push(record.iter().map(|cell| cell.to_string()).collect());
        }

        Ok(Workbook {
            sheets: vec![Sheet {
                name: self.sheet_name.clone(),
                headers,
                rows,
                row_lines,
            }],
        })
    }
}

/// Line a record starts on. The reader reports where it began reading, which
/// is before any blank lines it skipped ahead of the record.
fn record_line(text: &[u8], position: &csv::Position) -> usize {
    let start = position.byte() as usize;
    let skipped = text
        .get(start..)
        .unwrap_or(&[])
        .iter()
        .take_while(|b| **b == b'\n' || **b == b'\r')
        .filter(|b| **b == b'\n')
        .count();
    position.line() as usize + skipped
}
