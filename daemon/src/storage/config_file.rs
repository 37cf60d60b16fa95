//! Line-oriented `key value` configuration files
//!
//! Blank lines and lines starting with `#` are ignored. The key is the
//! first whitespace-separated token, the value is the remaining tokens
//! joined by single spaces.

use std::path::Path;

use crate::errors::CamError;
use crate::filesys::file::File;

/// Ordered `key value` entries, later keys override earlier ones
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigEntries(Vec<(String, String)>);

impl ConfigEntries {
    pub fn parse(contents: &str) -> Self {
        let mut entries = Self::default();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut tokens = line.split_whitespace();
            if let Some(key) = tokens.next() {
                let value = tokens.collect::<Vec<_>>().join(" ");
                entries.set(key, &value);
            }
        }
        entries
    }

    /// Load entries from `path`; a missing file yields no entries
    pub async fn load(path: &Path) -> Result<Self, CamError> {
        let file = File::new(path);
        if !file.exists().await {
            return Ok(Self::default());
        }
        Ok(Self::parse(&file.read_string().await?))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Insert or replace `key`, keeping the original position of existing keys
    pub fn set(&mut self, key: &str, value: &str) {
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.0.push((key.to_string(), value.to_string())),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.0 {
            out.push_str(key);
            out.push(' ');
            out.push_str(value);
            out.push('\n');
        }
        out
    }
}
