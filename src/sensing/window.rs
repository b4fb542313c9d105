use std::collections::HashMap;
use std::process::Command;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::segmentation::BrowserSet;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = false;

use crate::log_info;

/// URL lookups are reused for this long to keep the tick cheap.
pub const URL_CACHE_TTL: Duration = Duration::from_secs(2);

/// Raw foreground-window reading. Empty strings mean "unknown".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WindowSample {
    pub title: String,
    pub process: String,
    pub url: String,
}

impl WindowSample {
    pub fn new(
        title: impl Into<String>,
        process: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            process: process.into(),
            url: url.into(),
        }
    }
}

/// Foreground window introspection. Implementations return `None` on any failure
/// instead of erroring into the sampling loop.
pub trait WindowSensor {
    fn active_window(&mut self) -> Option<WindowSample>;
}

impl<T: WindowSensor + ?Sized> WindowSensor for Box<T> {
    fn active_window(&mut self) -> Option<WindowSample> {
        (**self).active_window()
    }
}

/// Reads the address bar of a browser window.
pub trait UrlProbe {
    fn current_url(&mut self, process: &str) -> Result<String>;
}

/// Time-based cache in front of a [`UrlProbe`]. A failed lookup also refreshes the
/// timestamp so a broken probe is not hammered every tick.
pub struct CachedUrl<P> {
    probe: P,
    ttl: Duration,
    last_fetch: Option<Instant>,
    last_url: String,
}

impl<P: UrlProbe> CachedUrl<P> {
    pub fn new(probe: P, ttl: Duration) -> Self {
        Self {
            probe,
            ttl,
            last_fetch: None,
            last_url: String::new(),
        }
    }

    pub fn fetch(&mut self, process: &str, now: Instant) -> String {
        if let Some(last) = self.last_fetch {
            if now.saturating_duration_since(last) < self.ttl {
                return self.last_url.clone();
            }
        }

        self.last_fetch = Some(now);
        match self.probe.current_url(process) {
            Ok(url) if !url.is_empty() => {
                self.last_url = url.clone();
                url
            }
            Ok(_) => String::new(),
            Err(err) => {
                log_info!("url probe failed for {process}: {err:#}");
                String::new()
            }
        }
    }
}

/// Runs a user-supplied command with the browser process name as the last
/// argument and reads the URL from its stdout.
#[derive(Debug, Clone)]
pub struct CommandUrlProbe {
    program: String,
    args: Vec<String>,
}

impl CommandUrlProbe {
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(String::from);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl UrlProbe for CommandUrlProbe {
    fn current_url(&mut self, process: &str) -> Result<String> {
        let mut args = self.args.clone();
        args.push(process.to_string());
        run_probe(&self.program, &args)
    }
}

/// X11 sensor built on `xdotool`, with PID to process-name resolution via `sysinfo`.
pub struct X11WindowSensor {
    browsers: BrowserSet,
    system: System,
    process_names: HashMap<u32, String>,
    url: Option<CachedUrl<CommandUrlProbe>>,
}

impl X11WindowSensor {
    pub fn new(browsers: BrowserSet, url_command: Option<&str>) -> Self {
        Self {
            browsers,
            system: System::new(),
            process_names: HashMap::new(),
            url: url_command
                .and_then(CommandUrlProbe::parse)
                .map(|probe| CachedUrl::new(probe, URL_CACHE_TTL)),
        }
    }

    fn process_name(&mut self, pid: u32) -> String {
        if let Some(name) = self.process_names.get(&pid) {
            return name.clone();
        }

        let sys_pid = Pid::from_u32(pid);
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[sys_pid]));
        match self.system.process(sys_pid) {
            Some(process) => {
                let name = process.name().to_string_lossy().to_lowercase();
                self.process_names.insert(pid, name.clone());
                name
            }
            None => "unknown".to_string(),
        }
    }

    fn read(&mut self) -> Result<WindowSample> {
        let title = run_probe("xdotool", &["getactivewindow", "getwindowname"])?;
        let pid: u32 = run_probe("xdotool", &["getactivewindow", "getwindowpid"])?
            .parse()
            .map_err(|err| anyhow!("invalid window pid: {err}"))?;
        let process = self.process_name(pid);

        let mut url = String::new();
        if !title.is_empty() && self.browsers.contains(&process) {
            if let Some(cache) = self.url.as_mut() {
                url = cache.fetch(&process, Instant::now());
            }
        }

        Ok(WindowSample {
            title,
            process,
            url,
        })
    }
}

impl WindowSensor for X11WindowSensor {
    fn active_window(&mut self) -> Option<WindowSample> {
        match self.read() {
            Ok(sample) => Some(sample),
            Err(err) => {
                log_info!("active window lookup failed: {err:#}");
                None
            }
        }
    }
}

fn run_probe<S: AsRef<str>>(program: &str, args: &[S]) -> Result<String> {
    let output = Command::new(program)
        .args(args.iter().map(|arg| arg.as_ref()))
        .output()
        .with_context(|| format!("failed to run {program}"))?;
    if !output.status.success() {
        bail!("{program} exited with {}", output.status);
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingProbe {
        calls: usize,
        answers: Vec<Result<String>>,
    }

    impl UrlProbe for CountingProbe {
        fn current_url(&mut self, _process: &str) -> Result<String> {
            self.calls += 1;
            if self.answers.is_empty() {
                return Ok(String::new());
            }
            self.answers.remove(0)
        }
    }

    #[test]
    fn cached_url_reuses_value_within_ttl() {
        let probe = CountingProbe {
            calls: 0,
            answers: vec![Ok("github.com".into()), Ok("docs.rs".into())],
        };
        let mut cache = CachedUrl::new(probe, URL_CACHE_TTL);
        let start = Instant::now();

        assert_eq!(cache.fetch("chrome.exe", start), "github.com");
        assert_eq!(
            cache.fetch("chrome.exe", start + Duration::from_millis(1_500)),
            "github.com"
        );
        assert_eq!(cache.probe.calls, 1);

        assert_eq!(
            cache.fetch("chrome.exe", start + Duration::from_secs(3)),
            "docs.rs"
        );
        assert_eq!(cache.probe.calls, 2);
    }

    #[test]
    fn failed_lookup_returns_empty_and_backs_off() {
        let probe = CountingProbe {
            calls: 0,
            answers: vec![Err(anyhow!("no address bar"))],
        };
        let mut cache = CachedUrl::new(probe, URL_CACHE_TTL);
        let start = Instant::now();

        assert_eq!(cache.fetch("firefox.exe", start), "");
        assert_eq!(cache.fetch("firefox.exe", start + Duration::from_secs(1)), "");
        assert_eq!(cache.probe.calls, 1);
    }

    #[test]
    fn command_probe_parses_program_and_args() {
        let probe = CommandUrlProbe::parse("  browser-url --plain ").unwrap();
        assert_eq!(probe.program, "browser-url");
        assert_eq!(probe.args, vec!["--plain".to_string()]);
        assert!(CommandUrlProbe::parse("   ").is_none());
    }
}
