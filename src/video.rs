use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use url::Url;

/// A single catalog entry after normalization.
///
/// Collections of `Video` are never mutated in place: enrichment builds a new
/// `Vec<Video>` so the UI always renders a consistent snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Video {
  pub id: String,
  pub title: String,
  pub date: Option<DateTime<Utc>>,
  pub opponent: String,
  pub season: String,
  pub notes: String,
  pub tags: Vec<String>,
  pub video_url: String,
  pub view_count: u64,
}

// Upstream catalogs disagree on field names; first present, non-null key wins.
const ID_KEYS: &[&str] = &["id", "_id", "videoId", "video_id"];
const TITLE_KEYS: &[&str] = &["title", "name"];
const DATE_KEYS: &[&str] = &["date", "publishedAt", "published_at", "gameDate"];
const OPPONENT_KEYS: &[&str] = &["opponent", "Opponent", "vs"];
const SEASON_KEYS: &[&str] = &["season", "Season"];
const NOTES_KEYS: &[&str] = &["notes", "description"];
const TAGS_KEYS: &[&str] = &["tags", "Tags"];
const URL_KEYS: &[&str] = &["videoUrl", "video_url", "url", "link"];
const VIEWS_KEYS: &[&str] = &["viewCount", "view_count", "views"];

impl Video {
  /// Normalize one raw upstream record. `position` is the record's index in
  /// the upstream array and only feeds the last-resort id.
  ///
  /// Returns `None` for records that are not JSON objects.
  pub fn from_raw(raw: &Value, position: usize) -> Option<Video> {
    let obj = raw.as_object()?;

    let video_url = field(obj, URL_KEYS).and_then(Value::as_str).unwrap_or_default().to_string();
    let id = field(obj, ID_KEYS).and_then(text).filter(|s| !s.is_empty()).unwrap_or_else(|| {
      let external = external_video_id(&video_url);
      if !external.is_empty() {
        external
      } else if !video_url.is_empty() {
        video_url.clone()
      } else {
        format!("video-{}", position)
      }
    });

    Some(Video {
      id,
      title: field(obj, TITLE_KEYS).and_then(text).unwrap_or_default(),
      date: field(obj, DATE_KEYS).and_then(Value::as_str).and_then(parse_date),
      opponent: field(obj, OPPONENT_KEYS).and_then(text).unwrap_or_default(),
      season: field(obj, SEASON_KEYS).and_then(text).unwrap_or_default(),
      notes: field(obj, NOTES_KEYS).and_then(Value::as_str).unwrap_or_default().to_string(),
      tags: field(obj, TAGS_KEYS).map(parse_tags).unwrap_or_default(),
      video_url,
      view_count: field(obj, VIEWS_KEYS).map(coerce_count).unwrap_or(0),
    })
  }

  /// Milliseconds since the epoch; missing or invalid dates sort as 0.
  pub fn date_key(&self) -> i64 {
    self.date.map_or(0, |d| d.timestamp_millis())
  }

  pub fn external_id(&self) -> String {
    external_video_id(&self.video_url)
  }

  /// Case-insensitive exact tag match.
  pub fn has_tag(&self, tag: &str) -> bool {
    let needle = tag.to_lowercase();
    self.tags.iter().any(|t| t.to_lowercase() == needle)
  }

  /// `YYYY-MM-DD`, or empty when the date is unknown.
  pub fn display_date(&self) -> String {
    self.date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
  }
}

fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
  keys.iter().filter_map(|k| obj.get(*k)).find(|v| !v.is_null())
}

/// Strings pass through; numbers are rendered (seasons are often `2024`).
fn text(v: &Value) -> Option<String> {
  match v {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

/// Accept either a JSON array of labels or a comma-separated string.
fn parse_tags(v: &Value) -> Vec<String> {
  match v {
    Value::Array(items) => {
      items.iter().filter_map(text).map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect()
    }
    Value::String(s) => s.split(',').map(str::trim).filter(|t| !t.is_empty()).map(str::to_string).collect(),
    _ => Vec::new(),
  }
}

/// Coerce a loosely typed view count to a non-negative integer.
///
/// Numbers are truncated, numeric strings are parsed, booleans count as 1/0,
/// and anything that is not a finite non-negative number becomes 0.
pub fn coerce_count(v: &Value) -> u64 {
  let n = match v {
    Value::Number(n) => {
      if let Some(u) = n.as_u64() {
        return u;
      }
      n.as_f64().unwrap_or(f64::NAN)
    }
    Value::String(s) => {
      let s = s.trim();
      if s.is_empty() { 0.0 } else { s.parse::<f64>().unwrap_or(f64::NAN) }
    }
    Value::Bool(b) => u8::from(*b) as f64,
    _ => f64::NAN,
  };
  if n.is_finite() && n >= 0.0 { n.trunc() as u64 } else { 0 }
}

/// Parse the date formats seen in team catalogs: RFC 3339 timestamps,
/// `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`, and bare `YYYY-MM-DD`.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
  let s = s.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc));
  }
  for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
      return Some(dt.and_utc());
    }
  }
  NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().and_then(|d| d.and_hms_opt(0, 0, 0)).map(|dt| dt.and_utc())
}

/// Extract the YouTube video id from a watch link.
///
/// `youtu.be/<id>` short links take the text after the marker up to the first
/// `?`, `&` or `#`. Otherwise a parsable URL whose host contains `youtube.com`
/// yields its `v` query parameter. Everything else yields an empty string.
pub fn external_video_id(video_url: &str) -> String {
  if let Some((_, rest)) = video_url.split_once("youtu.be/") {
    let end = rest.find(['?', '&', '#']).unwrap_or(rest.len());
    return rest[..end].to_string();
  }
  match Url::parse(video_url) {
    Ok(url) if url.host_str().is_some_and(|h| h.contains("youtube.com")) => {
      url.query_pairs().find(|(k, _)| k == "v").map(|(_, v)| v.into_owned()).unwrap_or_default()
    }
    _ => String::new(),
  }
}
