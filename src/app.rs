use chrono::{DateTime, Local};
use ratatui::widgets::ListState;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::Settings;
use crate::constants::constants;
use crate::player::{Player, open_in_browser};
use crate::source::load_videos;
use crate::stats::{ViewCounts, enrich, merge_view_counts, spawn_refresh, unique_external_ids};
use crate::video::Video;
use crate::view::{DerivedView, ViewState, build_view, cycle_facet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  /// Navigate the gallery, change facets and sort, play.
  Browse,
  /// Editing the free-text query; the list filters live.
  Search,
}

/// In-flight async task receivers and handles.
#[derive(Default)]
pub(crate) struct AsyncTasks {
  pub(crate) load_rx: Option<oneshot::Receiver<Vec<Video>>>,
  pub(crate) refresh_rx: Option<mpsc::Receiver<ViewCounts>>,
  pub(crate) refresh_handle: Option<JoinHandle<()>>,
}

pub struct App {
  pub settings: Settings,
  client: Client,
  /// Current catalog snapshot, replaced wholesale on every merge.
  pub videos: Vec<Video>,
  pub state: ViewState,
  pub view: DerivedView,
  pub mode: AppMode,
  /// Cursor position within the query (char index).
  pub query_cursor: usize,
  /// Horizontal scroll offset for the query input.
  pub query_scroll: usize,
  pub list_state: ListState,
  pub player: Player,
  /// True until the initial load (catalog + first enrichment) reports back.
  pub loading: bool,
  /// When view counts were last merged.
  pub last_refresh: Option<DateTime<Local>>,
  pub last_error: Option<String>,
  pub should_quit: bool,
  pub(crate) tasks: AsyncTasks,
  /// When the last error was set; used for auto-dismiss.
  error_time: Option<Instant>,
}

impl App {
  pub fn new(settings: Settings, client: Client) -> Self {
    let state = ViewState::with_sort(settings.sort);
    Self {
      settings,
      client,
      videos: Vec::new(),
      state,
      view: DerivedView::default(),
      mode: AppMode::Browse,
      query_cursor: 0,
      query_scroll: 0,
      list_state: ListState::default(),
      player: Player::new(),
      loading: false,
      last_refresh: None,
      last_error: None,
      should_quit: false,
      tasks: AsyncTasks::default(),
      error_time: None,
    }
  }

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(constants().error_dismiss_secs)
    {
      self.clear_error();
    }
  }

  // --- Loading and refresh ---

  /// Spawn the initial load: catalog fetch, then enrichment of the result.
  /// The two steps run strictly in sequence in one task.
  pub fn start_loading(&mut self) {
    let client = self.client.clone();
    let source = self.settings.source.clone();
    let stats_url = self.settings.stats_url.clone();
    info!(source = %source.label(), "load: starting");

    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let videos = load_videos(&client, &source).await;
      let videos = if videos.is_empty() { videos } else { enrich(&client, &stats_url, videos).await };
      let _ = tx.send(videos);
    });
    self.tasks.load_rx = Some(rx);
    self.loading = true;
  }

  /// Poll background tasks and fold their results into the app state.
  pub fn check_pending(&mut self) {
    if let Some(mut rx) = self.tasks.load_rx.take() {
      match rx.try_recv() {
        Ok(videos) => {
          self.loading = false;
          if !videos.is_empty() {
            self.last_refresh = Some(Local::now());
          }
          self.set_videos(videos);
          self.start_refresh();
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.load_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          error!("load: task ended without a result");
          self.loading = false;
        }
      }
    }

    if let Some(ref mut rx) = self.tasks.refresh_rx {
      let mut latest = None;
      while let Ok(counts) = rx.try_recv() {
        latest = Some(counts);
      }
      if let Some(counts) = latest {
        self.apply_view_counts(&counts);
      }
    }

    self.player.check_status();
    self.expire_error();
  }

  /// Replace the catalog and recompute the view. An empty catalog stops the
  /// refresh timer.
  pub fn set_videos(&mut self, videos: Vec<Video>) {
    self.videos = videos;
    if self.videos.is_empty() {
      self.stop_refresh();
    }
    self.recompute();
  }

  /// Merge a statistics response. Only `view_count` changes; filters and the
  /// selection are left alone.
  pub fn apply_view_counts(&mut self, counts: &ViewCounts) {
    let merged = merge_view_counts(&self.videos, counts);
    info!(entries = counts.len(), "stats: refresh applied");
    self.last_refresh = Some(Local::now());
    self.set_videos(merged);
  }

  /// Start the periodic statistics refresh if it is enabled and there is
  /// something to refresh.
  pub fn start_refresh(&mut self) {
    self.stop_refresh();
    let Some(period) = self.settings.refresh else { return };
    let ids = unique_external_ids(&self.videos);
    if ids.is_empty() {
      return;
    }
    info!(ids = ids.len(), period_secs = period.as_secs(), "stats: refresh timer started");
    let (tx, rx) = mpsc::channel(4);
    let handle = spawn_refresh(self.client.clone(), self.settings.stats_url.clone(), ids, period, tx);
    self.tasks.refresh_rx = Some(rx);
    self.tasks.refresh_handle = Some(handle);
  }

  /// Cancel the refresh timer. In-flight requests are dropped with it.
  pub fn stop_refresh(&mut self) {
    if let Some(handle) = self.tasks.refresh_handle.take() {
      handle.abort();
      info!("stats: refresh timer stopped");
    }
    self.tasks.refresh_rx = None;
  }

  pub fn is_refreshing(&self) -> bool {
    self.tasks.refresh_handle.is_some()
  }

  // --- Derived view ---

  /// Rebuild the derived view, then reconcile the selection against it.
  pub fn recompute(&mut self) {
    self.view = build_view(&self.videos, &self.state);
    self.state.reconcile(&self.view, &self.videos);
    self.list_state.select(self.view.selected);
  }

  pub fn selected_video(&self) -> Option<&Video> {
    self.view.selected_video(&self.videos)
  }

  pub fn select_next(&mut self) {
    self.step_selection(1);
  }

  pub fn select_prev(&mut self) {
    self.step_selection(-1);
  }

  fn step_selection(&mut self, step: isize) {
    if let Some(id) = self.view.neighbour_id(&self.videos, step) {
      self.state.selected_id = Some(id);
      self.recompute();
    }
  }

  pub fn cycle_opponent(&mut self, step: isize) {
    self.state.opponent = cycle_facet(&self.view.opponents, &self.state.opponent, step);
    self.recompute();
  }

  pub fn cycle_season(&mut self, step: isize) {
    self.state.season = cycle_facet(&self.view.seasons, &self.state.season, step);
    self.recompute();
  }

  pub fn cycle_tag_filter(&mut self) {
    self.state.tag_filter = self.state.tag_filter.next();
    self.recompute();
  }

  pub fn cycle_sort(&mut self) {
    self.state.sort = self.state.sort.next();
    self.recompute();
  }

  pub fn clear_filters(&mut self) {
    self.state.clear_filters();
    self.query_cursor = 0;
    self.query_scroll = 0;
    self.recompute();
  }

  /// Replace the query and recompute. Used by the search input.
  pub fn set_query(&mut self, query: String) {
    self.state.query = query;
    self.recompute();
  }

  // --- Playback ---

  pub async fn play_selected(&mut self) {
    let Some(video) = self.selected_video().cloned() else { return };
    self.clear_error();
    if let Err(e) = self.player.play(&video).await {
      self.set_error(format!("Playback error: {:#}", e));
    }
  }

  pub fn open_selected(&mut self) {
    let Some(url) = self.selected_video().map(|v| v.video_url.clone()) else { return };
    if let Err(e) = open_in_browser(&url) {
      self.set_error(format!("Failed to open browser: {:#}", e));
    }
  }

  pub async fn stop_playback(&mut self) {
    if let Err(e) = self.player.stop().await {
      self.set_error(format!("Failed to stop playback: {:#}", e));
    }
  }

  /// Tear down background work before exit.
  pub async fn shutdown(&mut self) {
    self.stop_refresh();
    let _ = self.player.stop().await;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source::Source;
  use crate::view::{SortMode, TagFilter};
  use serde_json::json;
  use std::path::PathBuf;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn settings(source: Source, stats_url: &str) -> Settings {
    Settings { source, stats_url: stats_url.to_string(), refresh: None, sort: SortMode::DateDesc }
  }

  fn test_app() -> App {
    App::new(settings(Source::File(PathBuf::from("unused.json")), "http://127.0.0.1:9/stats"), Client::new())
  }

  fn catalog() -> Vec<Video> {
    [
      json!({"id": "a", "title": "Opener", "date": "2024-09-01", "opponent": "Bears", "season": "2024",
             "tags": ["Full Game"], "videoUrl": "https://youtu.be/aaa", "viewCount": 10}),
      json!({"id": "b", "title": "Rivalry", "date": "2024-10-01", "opponent": "Aces", "season": "2024",
             "tags": ["Highlights"], "videoUrl": "https://youtu.be/bbb", "viewCount": 40}),
      json!({"id": "c", "title": "Finals", "date": "2023-11-01", "opponent": "Bears", "season": "2023",
             "tags": ["Full Game"], "videoUrl": "https://www.youtube.com/watch?v=ccc", "viewCount": 25}),
    ]
    .iter()
    .enumerate()
    .filter_map(|(i, raw)| Video::from_raw(raw, i))
    .collect()
  }

  fn visible_ids(app: &App) -> Vec<String> {
    app.view.videos(&app.videos).map(|v| v.id.clone()).collect()
  }

  #[test]
  fn set_videos_selects_first() {
    let mut app = test_app();
    app.set_videos(catalog());
    assert_eq!(visible_ids(&app), vec!["b", "a", "c"]);
    assert_eq!(app.state.selected_id.as_deref(), Some("b"));
    assert_eq!(app.list_state.selected(), Some(0));
  }

  #[test]
  fn navigation_wraps_and_tracks_id() {
    let mut app = test_app();
    app.set_videos(catalog());
    app.select_next();
    assert_eq!(app.state.selected_id.as_deref(), Some("a"));
    app.select_prev();
    app.select_prev();
    assert_eq!(app.state.selected_id.as_deref(), Some("c"));
    assert_eq!(app.list_state.selected(), Some(2));
  }

  #[test]
  fn filtering_out_selection_moves_it_to_first() {
    let mut app = test_app();
    app.set_videos(catalog());
    app.state.selected_id = Some("b".to_string());
    app.cycle_tag_filter();
    assert_eq!(app.state.tag_filter, TagFilter::Full);
    assert_eq!(visible_ids(&app), vec!["a", "c"]);
    assert_eq!(app.state.selected_id.as_deref(), Some("a"));
  }

  #[test]
  fn empty_result_clears_selection() {
    let mut app = test_app();
    app.set_videos(catalog());
    app.set_query("zzz".to_string());
    assert!(app.view.is_empty());
    assert!(app.state.selected_id.is_none());
    assert!(app.selected_video().is_none());
    assert_eq!(app.list_state.selected(), None);
  }

  #[test]
  fn opponent_cycle_walks_facets() {
    let mut app = test_app();
    app.set_videos(catalog());
    app.cycle_opponent(1);
    assert_eq!(app.state.opponent, "Aces");
    assert_eq!(visible_ids(&app), vec!["b"]);
    app.cycle_opponent(1);
    assert_eq!(app.state.opponent, "Bears");
    assert_eq!(visible_ids(&app), vec!["a", "c"]);
    app.cycle_opponent(1);
    assert_eq!(app.state.opponent, "all");
  }

  #[test]
  fn season_cycle_backwards() {
    let mut app = test_app();
    app.set_videos(catalog());
    app.cycle_season(-1);
    assert_eq!(app.state.season, "2024");
    assert_eq!(visible_ids(&app), vec!["b", "a"]);
  }

  #[test]
  fn clear_filters_restores_everything() {
    let mut app = test_app();
    app.set_videos(catalog());
    app.cycle_opponent(1);
    app.set_query("riv".to_string());
    app.query_cursor = 3;
    app.clear_filters();
    assert_eq!(visible_ids(&app).len(), 3);
    assert_eq!(app.query_cursor, 0);
  }

  #[test]
  fn view_count_refresh_keeps_filters_and_selection() {
    let mut app = test_app();
    app.set_videos(catalog());
    app.cycle_sort();
    app.cycle_sort();
    app.cycle_sort();
    assert_eq!(app.state.sort, SortMode::ViewsDesc);
    app.cycle_opponent(2);
    app.state.selected_id = Some("c".to_string());
    app.recompute();

    let counts: ViewCounts = [("aaa".to_string(), json!(5)), ("ccc".to_string(), json!(100))].into_iter().collect();
    app.apply_view_counts(&counts);

    assert_eq!(app.state.opponent, "Bears");
    assert_eq!(app.state.selected_id.as_deref(), Some("c"));
    assert_eq!(visible_ids(&app), vec!["c", "a"]);
    let c = app.selected_video().unwrap();
    assert_eq!(c.view_count, 100);
    assert_eq!(c.title, "Finals");
    assert!(app.last_refresh.is_some());
  }

  #[test]
  fn empty_catalog_never_starts_refresh() {
    let mut app = test_app();
    app.settings.refresh = Some(Duration::from_secs(600));
    app.set_videos(Vec::new());
    app.start_refresh();
    assert!(!app.is_refreshing());
  }

  #[test]
  fn errors_expire() {
    let mut app = test_app();
    app.set_error("boom".to_string());
    app.expire_error();
    assert_eq!(app.last_error.as_deref(), Some("boom"));
    app.error_time = Some(Instant::now() - Duration::from_secs(60));
    app.expire_error();
    assert!(app.last_error.is_none());
  }

  async fn wait_for_load(app: &mut App) {
    for _ in 0..200 {
      app.check_pending();
      if !app.loading {
        return;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("initial load did not finish");
  }

  #[tokio::test]
  async fn initial_load_fetches_then_enriches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/videos.json"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        {"id": "old", "date": "2023-01-01", "videoUrl": "https://youtu.be/o1", "viewCount": 3},
        {"id": "new", "date": "2024-01-01", "videoUrl": "https://youtu.be/n1", "viewCount": "8"}
      ])))
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/stats"))
      .and(query_param("ids", "n1,o1"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"n1": 80, "o1": null})))
      .expect(1)
      .mount(&server)
      .await;

    let mut app = App::new(
      settings(Source::Catalog(format!("{}/videos.json", server.uri())), &format!("{}/stats", server.uri())),
      Client::new(),
    );
    app.start_loading();
    assert!(app.loading);
    wait_for_load(&mut app).await;

    assert_eq!(visible_ids(&app), vec!["new", "old"]);
    assert_eq!(app.videos[0].view_count, 80);
    assert_eq!(app.videos[1].view_count, 3);
    assert_eq!(app.state.selected_id.as_deref(), Some("new"));
    // refresh disabled in these settings
    assert!(!app.is_refreshing());
  }

  #[tokio::test]
  async fn failed_catalog_leaves_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

    let mut app = App::new(
      settings(Source::Catalog(format!("{}/videos.json", server.uri())), &format!("{}/stats", server.uri())),
      Client::new(),
    );
    app.settings.refresh = Some(Duration::from_secs(600));
    app.start_loading();
    wait_for_load(&mut app).await;

    assert!(app.videos.is_empty());
    assert!(app.state.selected_id.is_none());
    assert!(!app.is_refreshing());
    assert!(app.last_refresh.is_none());
  }

  #[tokio::test]
  async fn failed_stats_keeps_catalog_counts_and_starts_timer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/videos.json"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!([
        {"id": "g", "videoUrl": "https://youtu.be/g1", "viewCount": 10}
      ])))
      .mount(&server)
      .await;
    Mock::given(method("GET")).and(path("/stats")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

    let mut app = App::new(
      settings(Source::Catalog(format!("{}/videos.json", server.uri())), &format!("{}/stats", server.uri())),
      Client::new(),
    );
    app.settings.refresh = Some(Duration::from_secs(600));
    app.start_loading();
    wait_for_load(&mut app).await;

    assert_eq!(app.videos[0].view_count, 10);
    assert!(app.is_refreshing());
    app.shutdown().await;
    assert!(!app.is_refreshing());
  }

  #[tokio::test]
  async fn emptying_catalog_aborts_running_refresh() {
    let mut app = test_app();
    app.settings.refresh = Some(Duration::from_secs(600));
    app.set_videos(catalog());
    app.start_refresh();
    assert!(app.is_refreshing());

    app.set_videos(Vec::new());
    assert!(!app.is_refreshing());
    assert!(app.tasks.refresh_rx.is_none());
  }

  #[tokio::test]
  async fn failed_refresh_tick_keeps_timer_running() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/stats"))
      .respond_with(ResponseTemplate::new(503))
      .up_to_n_times(1)
      .expect(1)
      .mount(&server)
      .await;
    Mock::given(method("GET"))
      .and(path("/stats"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"aaa": 777})))
      .mount(&server)
      .await;

    let mut app = App::new(
      settings(Source::File(PathBuf::from("unused.json")), &format!("{}/stats", server.uri())),
      Client::new(),
    );
    app.settings.refresh = Some(Duration::from_millis(20));
    app.set_videos(catalog());
    app.start_refresh();

    for _ in 0..200 {
      app.check_pending();
      if app.videos.iter().any(|v| v.view_count == 777) {
        break;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let opener = app.videos.iter().find(|v| v.id == "a").unwrap();
    assert_eq!(opener.view_count, 777);
    assert!(app.is_refreshing());
    app.shutdown().await;
  }

  #[test]
  fn shared_link_records_are_each_selectable() {
    let body = json!([
      {"title": "First half", "date": "2024-09-01", "videoUrl": "https://youtu.be/abc?t=0"},
      {"title": "Second half", "date": "2024-09-01", "videoUrl": "https://youtu.be/abc?t=1800"}
    ]);
    let mut app = test_app();
    app.set_videos(crate::source::parse_catalog(&body).unwrap());
    assert_eq!(app.selected_video().map(|v| v.title.as_str()), Some("First half"));
    app.select_next();
    assert_eq!(app.selected_video().map(|v| v.title.as_str()), Some("Second half"));
    app.select_next();
    assert_eq!(app.selected_video().map(|v| v.title.as_str()), Some("First half"));
  }
}
