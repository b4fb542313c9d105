use std::collections::HashSet;

/// Process names whose URL participates in task identity. Matching is case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct BrowserSet {
    names: HashSet<String>,
}

impl BrowserSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|name| name.as_ref().trim().to_lowercase())
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, process: &str) -> bool {
        self.names.contains(&process.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// What makes two observations "the same task": the process, plus the URL for browsers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskIdentity {
    pub process: String,
    pub url: String,
}

impl TaskIdentity {
    pub fn new(process: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            process: process.into(),
            url: url.into(),
        }
    }

    /// Processes must match exactly. For browsers, two known URLs that differ mean a
    /// different task; an empty URL on either side is treated as unchanged.
    /// Titles never matter.
    pub fn same_task(&self, other: &TaskIdentity, browsers: &BrowserSet) -> bool {
        if self.process != other.process {
            return false;
        }
        if browsers.contains(&self.process)
            && !self.url.is_empty()
            && !other.url.is_empty()
            && self.url != other.url
        {
            return false;
        }
        true
    }
}
