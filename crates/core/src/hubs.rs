//! Providers of the configured hub list.
//!
//! Discovery asks for the list on every cycle, so file-backed lists pick up
//! edits without a restart. An empty list is a valid answer.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{LabError, Result};

/// Read-only source of hub base URLs. Duplicates are allowed.
#[async_trait]
pub trait HubSource: Send + Sync {
	async fn list_hub_urls(&self) -> Result<Vec<String>>;
}

/// Fixed list, typically from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticHubs {
	urls: Vec<String>,
}

impl StaticHubs {
	pub fn new<I, S>(urls: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			urls: urls.into_iter().map(Into::into).collect(),
		}
	}
}

#[async_trait]
impl HubSource for StaticHubs {
	async fn list_hub_urls(&self) -> Result<Vec<String>> {
		Ok(self.urls.clone())
	}
}

/// Hub list stored in a file: either a JSON array of strings or one URL per
/// line with `#` comments.
#[derive(Debug, Clone)]
pub struct FileHubs {
	path: PathBuf,
}

impl FileHubs {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

#[async_trait]
impl HubSource for FileHubs {
	async fn list_hub_urls(&self) -> Result<Vec<String>> {
		let content = match tokio::fs::read_to_string(&self.path).await {
			Ok(content) => content,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(err) => return Err(err.into()),
		};
		parse_hub_list(&content)
	}
}

/// Concatenation of several sources. Any failing source fails the whole list,
/// so discovery keeps the previous snapshot instead of publishing a partial one.
#[derive(Clone, Default)]
pub struct ChainedHubs {
	sources: Vec<Arc<dyn HubSource>>,
}

impl ChainedHubs {
	pub fn new(sources: Vec<Arc<dyn HubSource>>) -> Self {
		Self { sources }
	}
}

#[async_trait]
impl HubSource for ChainedHubs {
	async fn list_hub_urls(&self) -> Result<Vec<String>> {
		let mut urls = Vec::new();
		for source in &self.sources {
			urls.extend(source.list_hub_urls().await?);
		}
		Ok(urls)
	}
}

fn parse_hub_list(content: &str) -> Result<Vec<String>> {
	let trimmed = content.trim_start();
	if trimmed.starts_with('[') {
		return serde_json::from_str(trimmed).map_err(|e| LabError::InvalidInput(format!("hub list is not a JSON array of strings: {e}")));
	}

	Ok(content
		.lines()
		.map(|line| line.split('#').next().unwrap_or_default().trim())
		.filter(|line| !line.is_empty())
		.map(str::to_string)
		.collect())
}
