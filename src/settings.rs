use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::dispatch::RetryPolicy;
use crate::segmentation::{BrowserSet, SegmentationConfig};

pub const API_KEY_ENV: &str = "TASKLOG_API_KEY";

const DEFAULT_SYSTEM_PROMPT: &str = "You receive activity log lines of the form \
`[start - end] <process> [activity: level] [URL: url] title`. Group consecutive lines \
that belong to the same piece of work and answer with CSV rows only, no header and no \
commentary: start_time,end_time,category,detail. Use HH:MM for times.";

/// User configuration, stored as JSON. Every field falls back to its default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub system_prompt: String,
    /// Seconds a new task must persist before it replaces the current one.
    pub check_interval: u64,
    pub batch_size: usize,
    pub idle_timeout: u64,
    pub idle_exit_threshold: u64,
    pub sleep_threshold: u64,
    pub ai_retry_times: u32,
    pub ai_retry_delay: u64,
    pub browser_processes: Vec<String>,
    /// Command printing the active browser URL; the process name is appended as last argument.
    pub url_command: Option<String>,
    pub lock_port: u16,
    pub data_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-3.5-turbo".into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            check_interval: 30,
            batch_size: 5,
            idle_timeout: 300,
            idle_exit_threshold: 5,
            sleep_threshold: 120,
            ai_retry_times: 3,
            ai_retry_delay: 5,
            browser_processes: [
                "chrome.exe",
                "msedge.exe",
                "firefox.exe",
                "opera.exe",
                "brave.exe",
                "chrome",
                "chromium",
                "firefox",
                "brave",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            url_command: None,
            lock_port: 47832,
            data_dir: None,
        }
    }
}

impl Settings {
    /// A missing file yields defaults; an unreadable or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid settings in {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tasklog")
            .join("config.json")
    }

    /// A non-empty value replaces the configured key.
    pub fn apply_env_override(&mut self, api_key: Option<String>) {
        if let Some(key) = api_key.filter(|key| !key.trim().is_empty()) {
            self.api_key = key;
        }
    }

    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| dirs::data_local_dir().map(|dir| dir.join("tasklog")))
            .unwrap_or_else(|| PathBuf::from("logs"))
    }

    pub fn segmentation(&self) -> SegmentationConfig {
        SegmentationConfig {
            check_interval_secs: self.check_interval,
            idle_timeout_secs: self.idle_timeout,
            idle_exit_threshold_secs: self.idle_exit_threshold,
            sleep_threshold_secs: self.sleep_threshold,
            ..SegmentationConfig::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.ai_retry_times,
            delay: Duration::from_secs(self.ai_retry_delay),
        }
    }

    pub fn browsers(&self) -> BrowserSet {
        BrowserSet::new(&self.browser_processes)
    }
}
