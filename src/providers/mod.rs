pub mod clickup;
pub mod github;

use anyhow::{Context, Result};
use async_trait::async_trait;
use thiserror::Error;

use crate::config::AppConfig;
use crate::model::work_item::{Platform, WorkItem};

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{platform} item {id} not found")]
    NotFound { platform: Platform, id: String },

    #[error("{platform} API error: {message}")]
    Upstream {
        platform: Platform,
        status: Option<u16>,
        message: String,
    },
}

impl PlatformError {
    pub fn upstream(platform: Platform, message: impl Into<String>) -> Self {
        PlatformError::Upstream {
            platform,
            status: None,
            message: message.into(),
        }
    }
}

/// The work-item operations the workflow needs, one implementation per platform.
///
/// The workflow only ever sees this trait; all platform differences (id
/// formats, status vocabularies, custom fields) are absorbed by the
/// implementations.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Stable lowercase identifier used in logs and comment tags.
    fn platform_name(&self) -> &str;

    async fn get_work_item(&self, item_id: &str) -> Result<WorkItem, PlatformError>;

    async fn add_comment(&self, item_id: &str, text: &str) -> Result<(), PlatformError>;

    /// Move the item to `status`, spelled in the platform's own vocabulary.
    async fn update_status(&self, item_id: &str, status: &str) -> Result<(), PlatformError>;

    /// Best-effort. Platforms without custom fields succeed without doing anything.
    async fn set_custom_field(
        &self,
        _item_id: &str,
        _field_name: &str,
        _value: &str,
    ) -> Result<(), PlatformError> {
        Ok(())
    }
}

/// Construction parameters for [`create_adapter`].
#[derive(Debug, Default, Clone)]
pub struct AdapterOptions {
    /// GitHub `owner/repo`. Detected from the origin remote when unset.
    pub repo_path: Option<String>,
    /// ClickUp list holding the custom fields. Resolved per task when unset.
    pub list_id: Option<String>,
}

pub async fn create_adapter(
    platform: Platform,
    config: &AppConfig,
    options: AdapterOptions,
) -> Result<Box<dyn PlatformAdapter>> {
    match platform {
        Platform::GitHub => {
            let repo_path = match options.repo_path.or_else(|| config.github.repo.clone()) {
                Some(path) => path,
                None => {
                    let url = crate::git::repo_url().await?;
                    crate::git::extract_repo_path(&url)?
                }
            };
            Ok(Box::new(github::GitHubAdapter::new(
                repo_path,
                config.github.pat.clone(),
            )))
        }
        Platform::ClickUp => {
            let api_key = config
                .clickup
                .api_key
                .clone()
                .context("CLICKUP_API_KEY not set in environment")?;
            let client = clickup::ClickUpClient::new(api_key, config.clickup.api_url.clone());
            let list_id = options.list_id.or_else(|| config.clickup.list_id.clone());
            Ok(Box::new(clickup::ClickUpAdapter::new(client, list_id)))
        }
    }
}
