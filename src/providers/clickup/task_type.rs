use serde::{Deserialize, Serialize};
use std::fmt;

use super::client::ClickUpTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Bug,
    Feature,
    Chore,
    Update,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Bug => "bug",
            TaskType::Feature => "feature",
            TaskType::Chore => "chore",
            TaskType::Update => "update",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Matching rule shared by tags and the "Type" custom field.
fn match_label(value: &str) -> Option<TaskType> {
    let value = value.to_lowercase();
    if value.contains("bug") || value.contains("fix") {
        Some(TaskType::Bug)
    } else if value.contains("feature") {
        Some(TaskType::Feature)
    } else if value.contains("chore") {
        Some(TaskType::Chore)
    } else if value.contains("update") || value.contains("enhance") {
        Some(TaskType::Update)
    } else {
        None
    }
}

const BUG_WORDS: &[&str] = &["fix", "bug", "error", "broken"];
const CHORE_WORDS: &[&str] = &["chore", "refactor", "cleanup", "maintenance"];
const UPDATE_WORDS: &[&str] = &["update", "enhance", "improve", "optimize"];

fn match_text(text: &str) -> Option<TaskType> {
    let text = text.to_lowercase();
    let any = |words: &[&str]| words.iter().any(|w| text.contains(w));
    if any(BUG_WORDS) {
        Some(TaskType::Bug)
    } else if any(CHORE_WORDS) {
        Some(TaskType::Chore)
    } else if any(UPDATE_WORDS) {
        Some(TaskType::Update)
    } else {
        None
    }
}

fn field_value_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(false) => None,
        serde_json::Value::String(s) if s.is_empty() => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Infer a task's type.
///
/// Tags are consulted first (the first matching tag wins), then a custom field
/// named "Type", then the name and description. Anything left over is a feature.
pub fn extract_task_type(task: &ClickUpTask) -> TaskType {
    if let Some(kind) = task.tags.iter().find_map(|t| match_label(&t.name)) {
        return kind;
    }

    let type_field = task
        .custom_fields
        .iter()
        .filter(|f| f.name.eq_ignore_ascii_case("type"))
        .filter_map(|f| f.value.as_ref().and_then(field_value_text))
        .find_map(|v| match_label(&v));
    if let Some(kind) = type_field {
        return kind;
    }

    let text = format!("{} {}", task.name, task.body());
    match_text(&text).unwrap_or(TaskType::Feature)
}
