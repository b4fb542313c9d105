pub mod classifier;
pub mod csv_sink;
pub mod store;

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tokio::task::JoinHandle;

use crate::models::SessionRecord;

pub use classifier::{Classifier, OpenAiClassifier};
pub use csv_sink::{parse_response, CsvRow, CsvSink};
pub use store::LogStore;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Fixed-delay retry for classifier calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Shared by every background flush task.
pub struct Pipeline {
    store: LogStore,
    csv: CsvSink,
    classifier: Option<Arc<dyn Classifier>>,
    retry: RetryPolicy,
}

impl Pipeline {
    pub fn new(
        store: LogStore,
        csv: CsvSink,
        classifier: Option<Arc<dyn Classifier>>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            csv,
            classifier,
            retry,
        }
    }

    /// Days are classified one after another so each reply is stored in the
    /// file of the day its lines describe.
    async fn classify_days(self: Arc<Self>, days: Vec<(NaiveDate, Vec<String>)>) {
        for (date, lines) in days {
            self.classify_and_store(date, lines).await;
        }
    }

    async fn classify_and_store(&self, date: NaiveDate, lines: Vec<String>) {
        let Some(classifier) = self.classifier.clone() else {
            return;
        };

        log_info!("Classifier request: {} lines", lines.len());
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        let reply = loop {
            match classifier.classify(&lines).await {
                Ok(text) => break Ok(text),
                Err(err) if attempt < attempts => {
                    log_warn!("Classifier retry {attempt}: {err:#}");
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
                Err(err) => break Err(err),
            }
        };

        match reply {
            Ok(text) => self.store_rows(date, &text).await,
            Err(err) => {
                log_error!("Classifier failed after {attempts} attempts: {err:#}");
                match self.store.save_failed(&lines, &format!("{err:#}")) {
                    Ok(path) => log_info!("Saved failed batch to {}", path.display()),
                    Err(save_err) => log_error!("Could not save failed batch: {save_err:#}"),
                }
            }
        }
    }

    async fn store_rows(&self, date: NaiveDate, text: &str) {
        let rows = parse_response(text);
        if rows.is_empty() {
            log_warn!("Classifier reply held no usable rows");
            return;
        }

        let csv = self.csv.clone();
        match tokio::task::spawn_blocking(move || csv.append(date, &rows)).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => log_error!("CSV write failed: {err:#}"),
            Err(err) => log_error!("CSV writer task failed: {err}"),
        }
    }
}

/// Buffers finished records and hands full batches to a detached classifier task.
pub struct BatchDispatcher {
    buffer: Vec<SessionRecord>,
    batch_size: usize,
    pipeline: Arc<Pipeline>,
}

impl BatchDispatcher {
    pub fn new(pipeline: Pipeline, batch_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            batch_size: batch_size.max(1),
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn append(&mut self, record: SessionRecord) -> Option<JoinHandle<()>> {
        self.buffer.push(record);
        if self.buffer.len() >= self.batch_size {
            self.flush()
        } else {
            None
        }
    }

    /// Write the buffered batch to the raw log of each record's day and, when a
    /// classifier is configured, spawn its classification. The returned handle
    /// may be dropped.
    pub fn flush(&mut self) -> Option<JoinHandle<()>> {
        let batch = mem::take(&mut self.buffer);
        if batch.is_empty() {
            return None;
        }
        let days = group_by_date(&batch);

        for (date, lines) in &days {
            if let Err(err) = self.pipeline.store.append_raw(*date, lines) {
                log_error!("Raw log write failed: {err:#}");
            }
        }

        if self.pipeline.classifier.is_none() {
            log_info!("No API key, skipping classification of {} records", batch.len());
            return None;
        }

        Some(tokio::spawn(Arc::clone(&self.pipeline).classify_days(days)))
    }
}

/// Formatted lines grouped by the local date of their record, in first-seen order.
fn group_by_date(batch: &[SessionRecord]) -> Vec<(NaiveDate, Vec<String>)> {
    let mut days: Vec<(NaiveDate, Vec<String>)> = Vec::new();
    for record in batch {
        let date = record.date();
        let line = record.format_line();
        match days.iter_mut().find(|(day, _)| *day == date) {
            Some((_, lines)) => lines.push(line),
            None => days.push((date, vec![line])),
        }
    }
    days
}
