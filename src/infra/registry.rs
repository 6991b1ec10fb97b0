use crate::app::ports::RegistryPort;
use crate::error::{Result, ScraperError, SinkError};
use crate::infra::http_client::describe_failure;
use crate::types::SourceItem;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

/// REST client for the registry that owns the tracked post URLs.
pub struct HttpRegistry {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpRegistry {
    /// `api_url` is used verbatim as the prefix of `posts/`.
    pub fn new(client: Client, api_url: &str, api_key: &str) -> Self {
        Self {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn list_url(&self) -> String {
        format!("{}posts/?key={}", self.api_url, self.api_key)
    }
}

#[async_trait]
impl RegistryPort for HttpRegistry {
    #[instrument(skip(self))]
    async fn list_items(&self) -> Result<Vec<SourceItem>> {
        let resp = self.client.get(self.list_url()).send().await?;
        if !resp.status().is_success() {
            return Err(ScraperError::Api {
                message: format!("listing registry items failed: {}", describe_failure(resp).await),
            });
        }
        let bytes = resp.bytes().await?;
        let entries: Vec<Value> = serde_json::from_slice(&bytes)?;
        let total = entries.len();

        // A malformed entry must not sink the listing
        let items: Vec<SourceItem> = entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match SourceItem::deserialize(entry) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(index, "Skipping malformed registry entry: {}", e);
                    None
                }
            })
            .collect();
        info!(count = items.len(), skipped = total - items.len(), "Loaded registry items");
        Ok(items)
    }

    fn item_url(&self, id: &str) -> String {
        format!("{}posts/{}?key={}", self.api_url, id, self.api_key)
    }

    async fn deactivate(&self, item_url: &str) -> std::result::Result<(), SinkError> {
        // Keep the API key out of error messages
        let target = item_url.split('?').next().unwrap_or(item_url).to_string();
        let failed = |message: String| SinkError::Deactivate {
            target: target.clone(),
            message,
        };

        let resp = self
            .client
            .patch(item_url)
            .json(&json!({ "active": false }))
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(failed(describe_failure(resp).await));
        }
        debug!("Deactivated registry item");
        Ok(())
    }
}
