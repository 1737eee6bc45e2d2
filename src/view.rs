//! Derived view over the catalog: filter, sort and select.
//!
//! Everything here is a pure function of the video collection and the
//! [`ViewState`]. The app recomputes the [`DerivedView`] whenever either
//! changes and then reconciles the selection against the result.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use clap::ValueEnum;
use serde::Deserialize;

use crate::video::Video;

/// Facet sentinel that matches every value.
pub const ALL: &str = "all";

/// Tag-class facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagFilter {
  #[default]
  All,
  /// Tagged "full game".
  Full,
  /// Tagged "highlights".
  Highlights,
}

impl TagFilter {
  pub const VARIANTS: [TagFilter; 3] = [TagFilter::All, TagFilter::Full, TagFilter::Highlights];

  pub fn label(self) -> &'static str {
    match self {
      TagFilter::All => "all",
      TagFilter::Full => "full",
      TagFilter::Highlights => "highlights",
    }
  }

  pub fn matches(self, video: &Video) -> bool {
    match self {
      TagFilter::All => true,
      TagFilter::Full => video.has_tag("full game"),
      TagFilter::Highlights => video.has_tag("highlights"),
    }
  }

  pub fn next(self) -> Self {
    cycle(&Self::VARIANTS, self, 1)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "camelCase")]
#[value(rename_all = "camelCase")]
pub enum SortMode {
  /// Newest first.
  #[default]
  DateDesc,
  /// Oldest first.
  DateAsc,
  /// Opponent name, A to Z.
  Opponent,
  /// Most viewed first.
  ViewsDesc,
}

impl SortMode {
  pub const VARIANTS: [SortMode; 4] = [SortMode::DateDesc, SortMode::DateAsc, SortMode::Opponent, SortMode::ViewsDesc];

  pub fn label(self) -> &'static str {
    match self {
      SortMode::DateDesc => "newest",
      SortMode::DateAsc => "oldest",
      SortMode::Opponent => "opponent",
      SortMode::ViewsDesc => "most viewed",
    }
  }

  fn compare(self, a: &Video, b: &Video) -> Ordering {
    match self {
      SortMode::DateDesc => b.date_key().cmp(&a.date_key()),
      SortMode::DateAsc => a.date_key().cmp(&b.date_key()),
      SortMode::Opponent => a.opponent.cmp(&b.opponent),
      SortMode::ViewsDesc => b.view_count.cmp(&a.view_count),
    }
  }

  pub fn next(self) -> Self {
    cycle(&Self::VARIANTS, self, 1)
  }
}

fn cycle<T: Copy + PartialEq>(options: &[T], current: T, step: isize) -> T {
  let len = options.len() as isize;
  let idx = options.iter().position(|o| *o == current).unwrap_or(0) as isize;
  options[(idx + step).rem_euclid(len) as usize]
}

/// User-controlled filter, sort and selection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
  pub query: String,
  /// [`ALL`] or an exact opponent.
  pub opponent: String,
  /// [`ALL`] or an exact season.
  pub season: String,
  pub tag_filter: TagFilter,
  pub sort: SortMode,
  pub selected_id: Option<String>,
}

impl Default for ViewState {
  fn default() -> Self {
    Self {
      query: String::new(),
      opponent: ALL.to_string(),
      season: ALL.to_string(),
      tag_filter: TagFilter::All,
      sort: SortMode::DateDesc,
      selected_id: None,
    }
  }
}

impl ViewState {
  pub fn with_sort(sort: SortMode) -> Self {
    Self { sort, ..Self::default() }
  }

  /// Whether `video` passes every active filter.
  pub fn matches(&self, video: &Video) -> bool {
    let needle = self.query.trim().to_lowercase();
    if !needle.is_empty()
      && ![&video.title, &video.opponent, &video.notes].iter().any(|f| f.to_lowercase().contains(&needle))
    {
      return false;
    }
    (self.opponent == ALL || video.opponent == self.opponent)
      && (self.season == ALL || video.season == self.season)
      && self.tag_filter.matches(video)
  }

  /// Reset query and facets, keeping sort and selection.
  pub fn clear_filters(&mut self) {
    self.query.clear();
    self.opponent = ALL.to_string();
    self.season = ALL.to_string();
    self.tag_filter = TagFilter::All;
  }

  /// Keep `selected_id` pointing into `view`: cleared when the view is empty,
  /// moved to the first entry when the current id is no longer listed.
  pub fn reconcile(&mut self, view: &DerivedView, videos: &[Video]) {
    let first = view.indices.first().map(|&i| videos[i].id.clone());
    match first {
      None => self.selected_id = None,
      Some(first_id) => {
        let listed = self.selected_id.as_ref().is_some_and(|id| view.indices.iter().any(|&i| &videos[i].id == id));
        if !listed {
          self.selected_id = Some(first_id);
        }
      }
    }
  }
}

/// Output of [`build_view`]. Indices refer to the collection it was built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedView {
  /// Filtered and sorted positions into the collection.
  pub indices: Vec<usize>,
  /// `"all"` followed by the distinct opponents, sorted.
  pub opponents: Vec<String>,
  /// `"all"` followed by the distinct seasons, sorted.
  pub seasons: Vec<String>,
  /// Position within `indices` of the active video.
  pub selected: Option<usize>,
}

impl DerivedView {
  pub fn len(&self) -> usize {
    self.indices.len()
  }

  pub fn is_empty(&self) -> bool {
    self.indices.is_empty()
  }

  pub fn videos<'v>(&self, videos: &'v [Video]) -> impl Iterator<Item = &'v Video> {
    self.indices.iter().map(move |&i| &videos[i])
  }

  pub fn selected_video<'a>(&self, videos: &'a [Video]) -> Option<&'a Video> {
    self.selected.and_then(|pos| self.indices.get(pos)).map(|&i| &videos[i])
  }

  /// Id of the entry `step` places away from the active one, wrapping.
  pub fn neighbour_id(&self, videos: &[Video], step: isize) -> Option<String> {
    if self.indices.is_empty() {
      return None;
    }
    let len = self.indices.len() as isize;
    let current = self.selected.unwrap_or(0) as isize;
    let pos = (current + step).rem_euclid(len) as usize;
    Some(videos[self.indices[pos]].id.clone())
  }
}

/// `"all"` followed by the distinct non-empty values, sorted.
pub fn facet_options<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
  let distinct: BTreeSet<&str> = values.filter(|v| !v.is_empty()).collect();
  std::iter::once(ALL).chain(distinct).map(str::to_string).collect()
}

/// Step through a facet's options, wrapping. Unknown current values restart
/// from the sentinel.
pub fn cycle_facet(options: &[String], current: &str, step: isize) -> String {
  if options.is_empty() {
    return ALL.to_string();
  }
  let len = options.len() as isize;
  let idx = options.iter().position(|o| o == current).unwrap_or(0) as isize;
  options[(idx + step).rem_euclid(len) as usize].clone()
}

/// Filter, sort and select.
pub fn build_view(videos: &[Video], state: &ViewState) -> DerivedView {
  let opponents = facet_options(videos.iter().map(|v| v.opponent.as_str()));
  let seasons = facet_options(videos.iter().map(|v| v.season.as_str()));

  let mut indices: Vec<usize> = (0..videos.len()).filter(|&i| state.matches(&videos[i])).collect();
  // Stable: equal keys keep collection order.
  indices.sort_by(|&a, &b| state.sort.compare(&videos[a], &videos[b]));

  let selected = if indices.is_empty() {
    None
  } else {
    let hit = state.selected_id.as_ref().and_then(|id| indices.iter().position(|&i| &videos[i].id == id));
    Some(hit.unwrap_or(0))
  };

  DerivedView { indices, opponents, seasons, selected }
}
