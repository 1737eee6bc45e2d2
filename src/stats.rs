use std::collections::{HashMap, HashSet};
use std::time::Duration;

use anyhow::{Result, anyhow};
use reqwest::Client;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::http::get_json;
use crate::video::{Video, coerce_count};

/// Identifier → raw count value as returned by the statistics endpoint.
/// `null` entries are kept so the merge can tell "unknown" from "zero".
pub type ViewCounts = HashMap<String, Value>;

/// Unique, non-empty external ids in order of first occurrence.
pub fn unique_external_ids(videos: &[Video]) -> Vec<String> {
  let mut seen = HashSet::new();
  videos.iter().map(Video::external_id).filter(|id| !id.is_empty() && seen.insert(id.clone())).collect()
}

/// One request for the given ids. The body must be a flat JSON object.
pub async fn fetch_view_counts(client: &Client, stats_url: &str, ids: &[String]) -> Result<ViewCounts> {
  let joined = ids.join(",");
  match get_json(client, stats_url, &[("ids", joined.as_str())]).await? {
    Value::Object(map) => Ok(map.into_iter().collect()),
    other => Err(anyhow!("Statistics body is not an object (got {})", json_kind(&other))),
  }
}

fn json_kind(v: &Value) -> &'static str {
  match v {
    Value::Null => "null",
    Value::Bool(_) => "bool",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

/// Build a new collection with `view_count` replaced wherever the map has a
/// present, non-null entry for the video's external id. Every other field,
/// and the order, is carried over unchanged.
pub fn merge_view_counts(videos: &[Video], counts: &ViewCounts) -> Vec<Video> {
  videos
    .iter()
    .map(|video| {
      let fresh = counts.get(&video.external_id()).filter(|v| !v.is_null());
      match fresh {
        Some(value) => Video { view_count: coerce_count(value), ..video.clone() },
        None => video.clone(),
      }
    })
    .collect()
}

/// Best-effort enrichment. Skips the request when no video has an external
/// id; on any failure the input collection is returned unchanged.
pub async fn enrich(client: &Client, stats_url: &str, videos: Vec<Video>) -> Vec<Video> {
  let ids = unique_external_ids(&videos);
  if ids.is_empty() {
    debug!("stats: no external ids, skipping request");
    return videos;
  }
  match fetch_view_counts(client, stats_url, &ids).await {
    Ok(counts) => {
      info!(requested = ids.len(), returned = counts.len(), "stats: view counts merged");
      merge_view_counts(&videos, &counts)
    }
    Err(e) => {
      warn!(err = %format!("{:#}", e), "stats: enrichment failed, keeping previous counts");
      videos
    }
  }
}

/// Spawn the periodic refresh. Every `period` (first tick skipped, the
/// initial load already enriched) the counts for `ids` are fetched and sent
/// through `tx`; failures are logged and the timer keeps running. The task
/// ends when the receiver is dropped or the handle is aborted.
pub fn spawn_refresh(
  client: Client,
  stats_url: String,
  ids: Vec<String>,
  period: Duration,
  tx: mpsc::Sender<ViewCounts>,
) -> JoinHandle<()> {
  tokio::spawn(async move {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await;
    loop {
      interval.tick().await;
      match fetch_view_counts(&client, &stats_url, &ids).await {
        Ok(counts) => {
          debug!(returned = counts.len(), "stats: refresh fetched");
          if tx.send(counts).await.is_err() {
            break;
          }
        }
        Err(e) => {
          warn!(err = %format!("{:#}", e), "stats: refresh failed, keeping previous counts");
        }
      }
    }
  })
}
