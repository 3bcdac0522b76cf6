//! The slice of the market-report contract the exporter depends on.
//!
//! Reports arrive as JSON from the upstream generator. Only the display name
//! is read (to name the output file); everything else is carried through
//! unvalidated. Optional sections that are absent are simply not rendered
//! upstream, so nothing here fills them in.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

const FILE_SUFFIX: &str = "_Market_Report";
const FALLBACK_NAME: &str = "Untitled";

/// Keys that may carry the display name, highest precedence first.
const NAME_KEYS: &[&str] = &["name", "companyName", "company_name", "company"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct ReportMeta {
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TryFrom<Map<String, Value>> for ReportMeta {
    type Error = String;

    /// The first present name key wins; the others stay in `extra`.
    fn try_from(mut extra: Map<String, Value>) -> std::result::Result<Self, String> {
        let key = NAME_KEYS
            .iter()
            .find(|k| extra.contains_key(**k))
            .ok_or_else(|| format!("missing field `name` (or one of {:?})", &NAME_KEYS[1..]))?;
        match extra.remove(*key) {
            Some(Value::String(name)) => Ok(Self { name, extra }),
            Some(other) => Err(format!("field `{}` must be a string, got {}", key, other)),
            None => Err(format!("missing field `{}`", key)),
        }
    }
}

impl ReportMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: Map::new(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::ConfigError(format!("invalid report JSON: {}", e)))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("cannot read report {}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// `"<name>_Market_Report.<ext>"`, with the name made safe for a file name.
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}{}.{}", sanitize(&self.name), FILE_SUFFIX, extension)
    }
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_whitespace() || c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}
