use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    GitHub,
    ClickUp,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::GitHub => "github",
            Platform::ClickUp => "clickup",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "github" => Ok(Platform::GitHub),
            "clickup" => Ok(Platform::ClickUp),
            other => Err(format!("unsupported platform: {other} (expected github or clickup)")),
        }
    }
}

/// A GitHub issue or ClickUp task, normalised for the workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// Platform-native identifier. Unique within a platform only.
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub platform: Platform,
    /// The payload exactly as the platform returned it.
    #[serde(default)]
    pub raw_data: serde_json::Value,
}

impl WorkItem {
    /// Look up a string inside the raw payload by JSON pointer, e.g. `/list/id`.
    pub fn raw_str(&self, pointer: &str) -> Option<&str> {
        self.raw_data.pointer(pointer).and_then(|v| v.as_str())
    }
}
