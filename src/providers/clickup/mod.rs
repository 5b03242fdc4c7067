pub mod client;
pub mod task_type;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::info;

use super::{PlatformAdapter, PlatformError};
use crate::model::work_item::{Platform, WorkItem};
pub use client::{ClickUpClient, ClickUpError, ClickUpTask};
pub use task_type::extract_task_type;

pub struct ClickUpAdapter {
    client: ClickUpClient,
    list_id: Option<String>,
    /// List ids of tasks fetched through this adapter, so custom fields can be
    /// set without fetching the task again.
    task_lists: Mutex<HashMap<String, String>>,
}

impl ClickUpAdapter {
    pub fn new(client: ClickUpClient, list_id: Option<String>) -> Self {
        Self {
            client,
            list_id,
            task_lists: Mutex::new(HashMap::new()),
        }
    }

    fn remember_list(&self, task_id: &str, list_id: &str) {
        if let Ok(mut lists) = self.task_lists.lock() {
            lists.insert(task_id.to_string(), list_id.to_string());
        }
    }

    fn known_list(&self, task_id: &str) -> Option<String> {
        self.task_lists
            .lock()
            .ok()
            .and_then(|lists| lists.get(task_id).cloned())
    }

    async fn resolve_list_id(&self, task_id: &str) -> Result<String, ClickUpError> {
        if let Some(id) = self.list_id.clone().or_else(|| self.known_list(task_id)) {
            return Ok(id);
        }
        let id = self.client.list_id_of_task(task_id).await?;
        self.remember_list(task_id, &id);
        Ok(id)
    }
}

pub fn task_to_work_item(task: &ClickUpTask, raw: serde_json::Value) -> WorkItem {
    WorkItem {
        id: task.id.clone(),
        title: task.name.clone(),
        description: task.body().to_string(),
        status: task.status.status.clone(),
        platform: Platform::ClickUp,
        raw_data: raw,
    }
}

#[async_trait]
impl PlatformAdapter for ClickUpAdapter {
    fn platform_name(&self) -> &str {
        "clickup"
    }

    async fn get_work_item(&self, item_id: &str) -> Result<WorkItem, PlatformError> {
        let (task, raw) = self.client.get_task(item_id.trim()).await?;
        if let Some(list) = &task.list {
            self.remember_list(&task.id, &list.id);
        }
        info!(
            task = %task.id,
            status = %task.status.status,
            inferred_type = %extract_task_type(&task),
            "Fetched ClickUp task"
        );
        Ok(task_to_work_item(&task, raw))
    }

    async fn add_comment(&self, item_id: &str, text: &str) -> Result<(), PlatformError> {
        Ok(self.client.add_comment(item_id.trim(), text).await?)
    }

    async fn update_status(&self, item_id: &str, status: &str) -> Result<(), PlatformError> {
        Ok(self.client.update_status(item_id.trim(), status).await?)
    }

    async fn set_custom_field(
        &self,
        item_id: &str,
        field_name: &str,
        value: &str,
    ) -> Result<(), PlatformError> {
        let item_id = item_id.trim();
        let list_id = self.resolve_list_id(item_id).await?;
        Ok(self
            .client
            .set_custom_field(item_id, &list_id, field_name, value)
            .await?)
    }
}
