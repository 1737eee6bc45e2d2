use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;

use crate::constants::constants;

/// Build the shared HTTP client used for catalog and statistics requests.
pub fn build_client() -> Result<Client> {
  let c = constants();
  Client::builder()
    .timeout(Duration::from_secs(c.http_timeout_secs))
    .user_agent(c.user_agent.as_str())
    .build()
    .context("Failed to build HTTP client")
}

/// GET `url` with the given query parameters and decode the body as JSON.
/// Non-success statuses are errors.
pub async fn get_json(client: &Client, url: &str, query: &[(&str, &str)]) -> Result<Value> {
  let response = client.get(url).query(query).send().await.with_context(|| format!("Request to {} failed", url))?;
  let response = response.error_for_status().with_context(|| format!("{} returned an error status", url))?;
  response.json::<Value>().await.with_context(|| format!("Failed to decode JSON from {}", url))
}
