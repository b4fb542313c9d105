use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::NaiveDate;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const CSV_HEADER: [&str; 4] = ["start_time", "end_time", "category", "detail"];
const BOM: &str = "\u{feff}";

/// One classified row: `start,end,category,detail`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    pub start: String,
    pub end: String,
    pub category: String,
    pub detail: String,
}

impl CsvRow {
    fn from_fields(mut fields: Vec<String>) -> Option<Self> {
        match fields.len() {
            0..=2 => return None,
            3 => fields.push(String::new()),
            4 => {}
            _ => {
                let detail = fields.split_off(3).join(",");
                fields.push(detail);
            }
        }
        let mut fields = fields.into_iter();
        Some(Self {
            start: fields.next()?,
            end: fields.next()?,
            category: fields.next()?,
            detail: fields.next()?,
        })
    }

    /// A header line echoed back by the classifier.
    fn is_header(&self) -> bool {
        [&self.start, &self.end, &self.category, &self.detail]
            .iter()
            .zip(CSV_HEADER)
            .all(|(field, name)| field.eq_ignore_ascii_case(name))
    }

    fn to_line(&self) -> String {
        [&self.start, &self.end, &self.category, &self.detail]
            .iter()
            .map(|field| csv_escape(field))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Extract rows from a classifier reply. Markdown fences are stripped and only
/// lines holding a comma are considered. Short rows are dropped with a warning,
/// an echoed header silently.
pub fn parse_response(text: &str) -> Vec<CsvRow> {
    let cleaned = text.replace("```csv", "").replace("```", "");

    cleaned
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.contains(','))
        .filter_map(|line| {
            let row = CsvRow::from_fields(split_fields(line));
            if row.is_none() {
                log_warn!("Dropping malformed classifier line: {line}");
            }
            row.filter(|row| !row.is_header())
        })
        .collect()
}

/// Quote-aware split. Falls back to a plain comma split when quotes are unbalanced.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    if in_quotes {
        return line.split(',').map(|f| f.trim().to_string()).collect();
    }

    fields.push(current);
    fields.into_iter().map(|f| f.trim().to_string()).collect()
}

fn csv_escape(s: &str) -> String {
    let needs_quote = s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r');
    if !needs_quote {
        return s.to_string();
    }
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Per-day CSV files. Clones share one lock so concurrent flush tasks never
/// interleave writes.
#[derive(Clone)]
pub struct CsvSink {
    root: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl CsvSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.root.join(format!("{}.csv", date.format("%Y-%m-%d")))
    }

    /// Append rows to `{date}.csv`; a new file gets the BOM and header first.
    pub fn append(&self, date: NaiveDate, rows: &[CsvRow]) -> Result<usize> {
        let path = self.path_for(date);
        let _guard = match self.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let is_new = !path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        let mut buf = String::new();
        if is_new {
            buf.push_str(BOM);
            buf.push_str(&CSV_HEADER.join(","));
            buf.push_str("\r\n");
        }
        for row in rows {
            buf.push_str(&row.to_line());
            buf.push_str("\r\n");
        }

        file.write_all(buf.as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))?;
        log_info!("Classified {} rows -> {}", rows.len(), file_name(&path));
        Ok(rows.len())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
