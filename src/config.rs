use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;

use crate::constants::constants;
use crate::source::Source;
use crate::view::SortMode;

/// Optional settings from `prefs.toml`. Command-line flags are folded into the
/// same shape so both layers merge the same way.
#[derive(Deserialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct Config {
  pub source: Option<String>,
  pub playlist_id: Option<String>,
  pub stats_url: Option<String>,
  /// Seconds between statistics refreshes; 0 disables the timer.
  pub refresh_secs: Option<u64>,
  pub default_sort: Option<SortMode>,
}

impl Config {
  pub fn load() -> Self {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "gamefilm") {
      let config_file = proj_dirs.config_dir().join("prefs.toml");
      if let Ok(content) = std::fs::read_to_string(config_file) {
        return Self::parse(&content);
      }
    }
    Self::default()
  }

  /// Malformed files fall back to defaults.
  pub fn parse(content: &str) -> Self {
    match toml::from_str(content) {
      Ok(config) => config,
      Err(e) => {
        tracing::warn!(err = %e, "config: prefs.toml is malformed, using defaults");
        Self::default()
      }
    }
  }

  /// Fill unset fields from `fallback`.
  pub fn or(self, fallback: Config) -> Config {
    Config {
      source: self.source.or(fallback.source),
      playlist_id: self.playlist_id.or(fallback.playlist_id),
      stats_url: self.stats_url.or(fallback.stats_url),
      refresh_secs: self.refresh_secs.or(fallback.refresh_secs),
      default_sort: self.default_sort.or(fallback.default_sort),
    }
  }
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
  pub source: Source,
  pub stats_url: String,
  /// `None` when periodic refresh is disabled.
  pub refresh: Option<Duration>,
  pub sort: SortMode,
}

impl Settings {
  /// Apply compiled-in defaults to whatever the config layers left unset.
  pub fn from_config(config: &Config) -> Self {
    let c = constants();
    let location = config.source.as_deref().unwrap_or(&c.default_source);
    let refresh_secs = config.refresh_secs.unwrap_or(c.refresh_interval_secs);
    Settings {
      source: Source::resolve(location, config.playlist_id.as_deref()),
      stats_url: config.stats_url.clone().unwrap_or_else(|| c.default_stats_url.clone()),
      refresh: (refresh_secs > 0).then(|| Duration::from_secs(refresh_secs)),
      sort: config.default_sort.unwrap_or_default(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::PathBuf;

  #[test]
  fn parse_full_file() {
    let config = Config::parse(
      r#"
source = "https://team.test/fn/videos"
playlist_id = "PLxyz"
stats_url = "https://team.test/fn/stats"
refresh_secs = 120
default_sort = "viewsDesc"
"#,
    );
    assert_eq!(config.source.as_deref(), Some("https://team.test/fn/videos"));
    assert_eq!(config.playlist_id.as_deref(), Some("PLxyz"));
    assert_eq!(config.refresh_secs, Some(120));
    assert_eq!(config.default_sort, Some(SortMode::ViewsDesc));
  }

  #[test]
  fn parse_malformed_is_default() {
    assert_eq!(Config::parse("refresh_secs = \"soon\""), Config::default());
    assert_eq!(Config::parse("not toml at all ["), Config::default());
  }

  #[test]
  fn cli_layer_wins_over_file() {
    let cli = Config { source: Some("local.json".to_string()), ..Config::default() };
    let file = Config {
      source: Some("https://team.test/videos.json".to_string()),
      refresh_secs: Some(60),
      ..Config::default()
    };
    let merged = cli.or(file);
    assert_eq!(merged.source.as_deref(), Some("local.json"));
    assert_eq!(merged.refresh_secs, Some(60));
  }

  #[test]
  fn settings_defaults_from_constants() {
    let settings = Settings::from_config(&Config::default());
    assert_eq!(settings.stats_url, constants().default_stats_url);
    assert_eq!(settings.refresh, Some(Duration::from_secs(600)));
    assert_eq!(settings.sort, SortMode::DateDesc);
  }

  #[test]
  fn settings_zero_refresh_disables_timer() {
    let settings = Settings::from_config(&Config { refresh_secs: Some(0), ..Config::default() });
    assert_eq!(settings.refresh, None);
  }

  #[test]
  fn settings_resolve_source() {
    let settings = Settings::from_config(&Config { source: Some("games.json".to_string()), ..Config::default() });
    assert_eq!(settings.source, Source::File(PathBuf::from("games.json")));
  }
}
