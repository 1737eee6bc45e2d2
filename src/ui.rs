use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Color, Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, BorderType, List, ListItem, Padding, Paragraph, Wrap},
};

use crate::app::{App, AppMode};
use crate::video::Video;

// --- Palette ---

const BG: Color = Color::Rgb(18, 20, 28);
const STRIPE_BG: Color = Color::Rgb(26, 29, 40);
const FG: Color = Color::Rgb(220, 223, 228);
const MUTED: Color = Color::Rgb(120, 128, 145);
const ACCENT: Color = Color::Rgb(255, 176, 59);
const BORDER: Color = Color::Rgb(60, 66, 84);
const HIGHLIGHT_FG: Color = Color::Rgb(18, 20, 28);
const HIGHLIGHT_BG: Color = Color::Rgb(255, 176, 59);
const STATUS: Color = Color::Rgb(125, 207, 255);
const ERROR: Color = Color::Rgb(247, 118, 142);
const KEY_FG: Color = Color::Rgb(18, 20, 28);
const KEY_BG: Color = Color::Rgb(120, 128, 145);

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

/// `1234567` → `1,234,567`.
pub fn format_count(n: u64) -> String {
  let digits = n.to_string();
  let mut out = String::with_capacity(digits.len() + digits.len() / 3);
  for (i, c) in digits.chars().enumerate() {
    if i > 0 && (digits.len() - i) % 3 == 0 {
      out.push(',');
    }
    out.push(c);
  }
  out
}

fn rounded_block<'a>(title: impl Into<Line<'a>>, border: Color) -> Block<'a> {
  Block::bordered()
    .title(title)
    .title_style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(border))
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  frame.render_widget(Block::default().style(Style::default().bg(BG)), frame.area());

  let [header_area, filter_area, main_area, status_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Min(5),
    Constraint::Length(1),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, app, header_area);
  render_filters(frame, app, filter_area);

  let [gallery_area, player_area] =
    Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(main_area);
  render_gallery(frame, app, gallery_area);
  render_player(frame, app, player_area);

  render_status(frame, app, status_area);
  render_footer(frame, app, footer_area);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
  let left = Line::from(Span::styled(" ▶ gamefilm ", Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)));
  frame.render_widget(left, area);

  let mut right = format!("{} videos", app.videos.len());
  if let Some(at) = app.last_refresh {
    right.push_str(&format!(" · views {}", at.format("%H:%M")));
    if app.is_refreshing() {
      right.push_str(" (auto)");
    }
  }
  right.push_str(&format!(" · v{} ", env!("CARGO_PKG_VERSION")));
  let width = right.chars().count() as u16;
  let right_area = Rect { x: area.x + area.width.saturating_sub(width), width: width.min(area.width), ..area };
  frame.render_widget(Line::from(Span::styled(right, Style::default().fg(MUTED))), right_area);
}

fn render_filters(frame: &mut Frame, app: &mut App, area: Rect) {
  let [search_area, facets_area] =
    Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)]).areas(area);

  let border = if app.mode == AppMode::Search { ACCENT } else { BORDER };
  let search_block = rounded_block(" Search ", border).padding(Padding::horizontal(1));

  let inner_w = (search_area.width.saturating_sub(4) as usize).max(1);
  let query = &app.state.query;
  let cursor_col = display_width(query, app.query_cursor);

  if cursor_col < app.query_scroll {
    app.query_scroll = cursor_col;
  } else if cursor_col >= app.query_scroll + inner_w {
    app.query_scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let visible: String = query
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= app.query_scroll)
    .take_while(|(start, _, _)| *start < app.query_scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let paragraph = if visible.is_empty() && app.mode != AppMode::Search {
    Paragraph::new(Span::styled("press / to search", Style::default().fg(MUTED)))
  } else {
    Paragraph::new(visible).style(Style::default().fg(FG))
  };
  frame.render_widget(paragraph.block(search_block), search_area);

  if app.mode == AppMode::Search {
    let cursor_x = search_area.x + 2 + cursor_col.saturating_sub(app.query_scroll) as u16;
    frame.set_cursor_position((cursor_x, search_area.y + 1));
  }

  let facet = |label: &'static str, value: String| {
    let active = value != crate::view::ALL;
    vec![
      Span::styled(format!("{} ", label), Style::default().fg(MUTED)),
      Span::styled(value, Style::default().fg(if active { ACCENT } else { FG })),
      Span::raw("   "),
    ]
  };
  let mut spans = Vec::new();
  spans.extend(facet("opponent", app.state.opponent.clone()));
  spans.extend(facet("season", app.state.season.clone()));
  spans.extend(facet("type", app.state.tag_filter.label().to_string()));
  spans.push(Span::styled("sort ", Style::default().fg(MUTED)));
  spans.push(Span::styled(app.state.sort.label(), Style::default().fg(FG)));

  let facets_block = rounded_block(" Filters ", BORDER).padding(Padding::horizontal(1));
  let facets = Paragraph::new(Line::from(spans)).block(facets_block);
  frame.render_widget(facets, facets_area);
}

fn render_gallery(frame: &mut Frame, app: &mut App, area: Rect) {
  if app.view.is_empty() {
    render_empty(frame, app, area);
    return;
  }

  // Inner width: area minus 2 borders minus 2 chars for highlight symbol ("▶ ")
  let inner_w = area.width.saturating_sub(4) as usize;
  let selected = app.list_state.selected();

  let items: Vec<ListItem> = app
    .view
    .videos(&app.videos)
    .enumerate()
    .map(|(i, video)| {
      let is_selected = Some(i) == selected;
      let fg = if is_selected { HIGHLIGHT_FG } else { FG };
      let bg = if is_selected {
        HIGHLIGHT_BG
      } else if i % 2 == 1 {
        STRIPE_BG
      } else {
        BG
      };
      let playing = if app.player.is_playing_video(&video.id) { "♪ " } else { "" };

      let right = [video.opponent.clone(), video.display_date(), format!("{} views", format_count(video.view_count))]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("  ");
      let right_w = right.chars().count();
      let title_max = inner_w.saturating_sub(right_w + 2 + playing.chars().count());
      let title = truncate_str(if video.title.is_empty() { &video.id } else { &video.title }, title_max);
      let gap = inner_w.saturating_sub(title.chars().count() + playing.chars().count() + right_w);

      let line = Line::from(vec![
        Span::styled(playing, Style::default().fg(if is_selected { fg } else { ACCENT })),
        Span::styled(title, Style::default().fg(fg)),
        Span::raw(" ".repeat(gap)),
        Span::styled(right, Style::default().fg(if is_selected { fg } else { MUTED })),
      ]);
      ListItem::new(line).bg(bg)
    })
    .collect();

  let title = if app.view.len() == app.videos.len() {
    format!(" Videos ({}) ", app.view.len())
  } else {
    format!(" Videos ({} of {}) ", app.view.len(), app.videos.len())
  };

  let list = List::new(items)
    .block(rounded_block(title, BORDER))
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(HIGHLIGHT_FG).bg(HIGHLIGHT_BG).add_modifier(Modifier::BOLD));

  frame.render_stateful_widget(list, area, &mut app.list_state);
}

fn render_empty(frame: &mut Frame, app: &App, area: Rect) {
  let message = if app.loading {
    "Loading videos…"
  } else if app.videos.is_empty() {
    "No videos available."
  } else {
    "No videos match the current filters."
  };
  let mut text = vec![Line::from(""), Line::from(Span::styled(message, Style::default().fg(FG)))];
  if !app.loading && !app.videos.is_empty() {
    text.push(Line::from(""));
    text.push(Line::from(Span::styled("Press c to clear filters.", Style::default().fg(MUTED))));
  }
  let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(rounded_block(" Videos ", BORDER));
  frame.render_widget(paragraph, area);
}

fn detail_line<'a>(label: &'a str, value: String, inner_w: usize) -> Line<'a> {
  let value_w = inner_w.saturating_sub(label.chars().count());
  Line::from(vec![
    Span::styled(label, Style::default().fg(MUTED)),
    Span::styled(truncate_str(&value, value_w), Style::default().fg(FG)),
  ])
}

fn video_details<'a>(video: &'a Video, playing: bool, inner_w: usize) -> Vec<Line<'a>> {
  let title = if video.title.is_empty() { video.id.as_str() } else { video.title.as_str() };
  let mut lines = vec![
    Line::from(""),
    Line::from(Span::styled(truncate_str(title, inner_w), Style::default().fg(FG).add_modifier(Modifier::BOLD))),
    Line::from(""),
  ];
  if playing {
    lines.push(Line::from(Span::styled("♪ Now playing", Style::default().fg(ACCENT))));
    lines.push(Line::from(""));
  }

  let date = video.display_date();
  let fields = [
    ("Date      ", date),
    ("Opponent  ", video.opponent.clone()),
    ("Season    ", video.season.clone()),
    ("Tags      ", video.tags.join(", ")),
  ];
  for (label, value) in fields {
    if !value.is_empty() {
      lines.push(detail_line(label, value, inner_w));
    }
  }
  lines.push(detail_line("Views     ", format_count(video.view_count), inner_w));

  if !video.notes.is_empty() {
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(video.notes.as_str(), Style::default().fg(FG))));
  }
  if !video.video_url.is_empty() {
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
      truncate_str(&video.video_url, inner_w),
      Style::default().fg(ACCENT).add_modifier(Modifier::UNDERLINED),
    )));
  }
  lines
}

fn render_player(frame: &mut Frame, app: &App, area: Rect) {
  let block = rounded_block(" Player ", BORDER).padding(Padding::horizontal(1));
  let Some(video) = app.selected_video() else {
    frame.render_widget(block, area);
    return;
  };
  let inner_w = area.width.saturating_sub(4) as usize;
  let lines = video_details(video, app.player.is_playing_video(&video.id), inner_w);
  frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }).block(block), area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let (text, style) = if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(ERROR))
  } else if app.loading {
    (" ⏳ Loading…".to_string(), Style::default().fg(STATUS))
  } else if let Some(np) = &app.player.now_playing {
    (format!(" ♪ {}", np.title), Style::default().fg(STATUS))
  } else if app.videos.is_empty() {
    (" No videos".to_string(), Style::default().fg(MUTED))
  } else {
    (" Ready".to_string(), Style::default().fg(MUTED))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let is_playing = app.player.is_playing();
  let keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Browse => {
      let mut k = vec![("Enter", "Play"), ("j/k", "Navigate"), ("/", "Search")];
      k.push(("o/s/t", "Filter"));
      k.push(("r", "Sort"));
      k.push(("c", "Clear"));
      k.push(("^o", "Browser"));
      if is_playing {
        k.push(("^s", "Stop"));
      }
      k.push(("q", "Quit"));
      k
    }
    AppMode::Search => vec![("Enter", "Done"), ("↑/↓", "Navigate"), ("Esc", "Clear")],
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(KEY_FG).bg(KEY_BG)),
        Span::styled(format!(" {} ", action), Style::default().fg(MUTED)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);
}
