use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::http::get_json;
use crate::video::Video;

/// Where the video catalog comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
  /// Static catalog file on disk.
  File(PathBuf),
  /// Static catalog served over HTTP.
  Catalog(String),
  /// Playlist-backed function endpoint, called with `?playlistId=<id>`.
  Playlist { endpoint: String, playlist_id: String },
}

impl Source {
  /// Interpret a `--source` value. URLs become remote sources (playlist-backed
  /// when a playlist id is given), anything else is a file path.
  pub fn resolve(location: &str, playlist_id: Option<&str>) -> Source {
    let location = location.trim();
    let is_url = location.starts_with("http://") || location.starts_with("https://");
    match (is_url, playlist_id.map(str::trim).filter(|id| !id.is_empty())) {
      (true, Some(id)) => Source::Playlist { endpoint: location.to_string(), playlist_id: id.to_string() },
      (true, None) => Source::Catalog(location.to_string()),
      (false, id) => {
        if id.is_some() {
          warn!(path = %location, "source: playlist id ignored for a local catalog file");
        }
        Source::File(PathBuf::from(location))
      }
    }
  }

  pub fn label(&self) -> String {
    match self {
      Source::File(path) => path.display().to_string(),
      Source::Catalog(url) => url.clone(),
      Source::Playlist { playlist_id, .. } => format!("playlist {}", playlist_id),
    }
  }
}

/// Pull the record array out of a catalog body: either a bare array or an
/// object wrapping it under `videos` or `items`.
fn records(body: &Value) -> Result<&Vec<Value>> {
  match body {
    Value::Array(items) => Ok(items),
    Value::Object(obj) => ["videos", "items"]
      .iter()
      .find_map(|k| obj.get(*k).and_then(Value::as_array))
      .ok_or_else(|| anyhow!("Catalog object has no `videos` or `items` array")),
    _ => Err(anyhow!("Catalog body is not an array")),
  }
}

/// Newest first. `sort_by` is stable, so equal dates keep upstream order.
pub fn sort_newest_first(videos: &mut [Video]) {
  videos.sort_by(|a, b| b.date_key().cmp(&a.date_key()));
}

/// Suffix repeated ids with the record position so every id in the catalog is
/// unique. Id-less records sharing a link otherwise collide.
fn dedupe_ids(videos: &mut [Video], positions: &[usize]) {
  let mut taken: HashSet<String> = videos.iter().map(|v| v.id.clone()).collect();
  let mut seen = HashSet::new();
  for (video, &pos) in videos.iter_mut().zip(positions) {
    if !seen.insert(video.id.clone()) {
      let mut id = format!("{}-{}", video.id, pos);
      while taken.contains(&id) {
        id.push('_');
      }
      taken.insert(id.clone());
      seen.insert(id.clone());
      video.id = id;
    }
  }
}

/// Normalize a decoded catalog body into videos sorted newest first.
pub fn parse_catalog(body: &Value) -> Result<Vec<Video>> {
  let (positions, mut videos): (Vec<usize>, Vec<Video>) =
    records(body)?.iter().enumerate().filter_map(|(i, raw)| Video::from_raw(raw, i).map(|v| (i, v))).unzip();
  dedupe_ids(&mut videos, &positions);
  sort_newest_first(&mut videos);
  Ok(videos)
}

/// Fetch and normalize the catalog. One attempt, no retry.
pub async fn fetch_videos(client: &Client, source: &Source) -> Result<Vec<Video>> {
  let body: Value = match source {
    Source::File(path) => {
      let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
      serde_json::from_str(&content).with_context(|| format!("Catalog file {} is not valid JSON", path.display()))?
    }
    Source::Catalog(url) => get_json(client, url, &[]).await?,
    Source::Playlist { endpoint, playlist_id } => {
      get_json(client, endpoint, &[("playlistId", playlist_id.as_str())]).await?
    }
  };
  parse_catalog(&body)
}

/// Best-effort load: any failure is logged and yields an empty catalog.
pub async fn load_videos(client: &Client, source: &Source) -> Vec<Video> {
  match fetch_videos(client, source).await {
    Ok(videos) => {
      info!(count = videos.len(), source = %source.label(), "source: catalog loaded");
      videos
    }
    Err(e) => {
      error!(err = %format!("{:#}", e), source = %source.label(), "source: catalog load failed");
      Vec::new()
    }
  }
}
