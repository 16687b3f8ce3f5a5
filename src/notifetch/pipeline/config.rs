use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::notifetch::pipeline::error::{Result, ToolError};
use crate::notifetch::pipeline::fetch::{FetchOptions, MAX_PAGE_SIZE, RetryPolicy};
use crate::notifetch::pipeline::flatten::FlattenOptions;
use crate::notifetch::pipeline::normalize::DEFAULT_LIST_DELIMITER;

/// Connection settings for the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub notion_version: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.notion.com/v1".to_string(),
            notion_version: "2022-06-28".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Settings for one pipeline run. Every field has a default, so a config
/// file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub api: ApiConfig,
    pub page_size: u32,
    pub page_pause_ms: u64,
    pub retry: RetryPolicy,
    pub flatten: FlattenOptions,
    pub include_page_content: bool,
    pub max_block_depth: usize,
    pub list_delimiter: String,
    /// Name of the secret holding the bearer token.
    pub secret_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            page_size: MAX_PAGE_SIZE,
            page_pause_ms: 100,
            retry: RetryPolicy::default(),
            flatten: FlattenOptions::default(),
            include_page_content: false,
            max_block_depth: 2,
            list_delimiter: DEFAULT_LIST_DELIMITER.to_string(),
            secret_name: "notion_token".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Loads a JSON config file and validates it.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ToolError::MissingInput(path.to_path_buf()));
        }
        let data = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ToolError::Config(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(ToolError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ToolError::Config(
                "retry.base_delay_ms exceeds retry.max_delay_ms".to_string(),
            ));
        }
        if self.list_delimiter.is_empty() {
            return Err(ToolError::Config("list_delimiter is empty".to_string()));
        }
        Ok(())
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            page_size: self.page_size,
            page_pause: Duration::from_millis(self.page_pause_ms),
            retry: self.retry.clone(),
            include_page_content: self.include_page_content,
            max_block_depth: self.max_block_depth,
        }
    }
}
