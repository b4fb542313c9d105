use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use uuid::Uuid;

/// Pre-classification archive (`raw/`) and failed batches (`failed/`).
#[derive(Debug, Clone)]
pub struct LogStore {
    raw_dir: PathBuf,
    failed_dir: PathBuf,
}

impl LogStore {
    pub fn new(root: &Path) -> Result<Self> {
        let raw_dir = root.join("raw");
        let failed_dir = root.join("failed");
        for dir in [&raw_dir, &failed_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(Self {
            raw_dir,
            failed_dir,
        })
    }

    pub fn raw_path(&self, date: NaiveDate) -> PathBuf {
        self.raw_dir
            .join(format!("{}_raw.txt", date.format("%Y-%m-%d")))
    }

    pub fn append_raw(&self, date: NaiveDate, lines: &[String]) -> Result<()> {
        let path = self.raw_path(date);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        let mut buf = String::new();
        for line in lines {
            buf.push_str(line);
            buf.push('\n');
        }
        file.write_all(buf.as_bytes())
            .with_context(|| format!("failed to write {}", path.display()))
    }

    /// Persist a batch the classifier could not handle. Returns the file written.
    pub fn save_failed(&self, lines: &[String], error: &str) -> Result<PathBuf> {
        let id = Uuid::new_v4().simple().to_string();
        let name = format!(
            "failed_{}_{}.txt",
            Local::now().format("%Y%m%d_%H%M%S"),
            &id[..8]
        );
        let path = self.failed_dir.join(name);

        let mut content = format!("# Error: {error}\n");
        for line in lines {
            content.push_str(line);
            content.push('\n');
        }
        fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}
