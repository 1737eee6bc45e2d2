//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available,
//! with no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  pub default_source: String,
  pub default_stats_url: String,

  // Statistics refresh
  pub refresh_interval_secs: u64,

  // HTTP
  pub http_timeout_secs: u64,
  pub user_agent: String,

  // UI
  pub error_dismiss_secs: u64,
  pub tick_millis: u64,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn embedded_constants_parse() {
    let c = constants();
    assert_eq!(c.refresh_interval_secs, 600);
    assert!(!c.default_stats_url.is_empty());
    assert!(c.http_timeout_secs > 0);
  }
}
