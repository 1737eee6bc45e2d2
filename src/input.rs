use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};

use crate::app::{App, AppMode};

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

// --- Event Handling ---

pub async fn handle_key_event(app: &mut App, key: event::KeyEvent) {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return;
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('s') {
    if app.player.is_playing() {
      app.stop_playback().await;
    }
    return;
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('o') {
    app.open_selected();
    return;
  }

  match app.mode {
    AppMode::Browse => handle_browse_key(app, key).await,
    AppMode::Search => handle_search_key(app, key),
  }
}

async fn handle_browse_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Enter => app.play_selected().await,
    KeyCode::Down | KeyCode::Char('j') => app.select_next(),
    KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
    KeyCode::Char('/') => {
      app.query_cursor = app.state.query.chars().count();
      app.mode = AppMode::Search;
    }
    KeyCode::Char('o') => app.cycle_opponent(1),
    KeyCode::Char('O') => app.cycle_opponent(-1),
    KeyCode::Char('s') => app.cycle_season(1),
    KeyCode::Char('S') => app.cycle_season(-1),
    KeyCode::Char('t') => app.cycle_tag_filter(),
    KeyCode::Char('r') => app.cycle_sort(),
    KeyCode::Char('c') => app.clear_filters(),
    KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
    _ => {}
  }
}

fn handle_search_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Char(c) => {
      let mut query = app.state.query.clone();
      query.insert(char_to_byte_index(&query, app.query_cursor), c);
      app.query_cursor += 1;
      app.set_query(query);
    }
    KeyCode::Backspace => {
      if app.query_cursor > 0 {
        app.query_cursor -= 1;
        let mut query = app.state.query.clone();
        query.remove(char_to_byte_index(&query, app.query_cursor));
        app.set_query(query);
      }
    }
    KeyCode::Delete => {
      if app.query_cursor < app.state.query.chars().count() {
        let mut query = app.state.query.clone();
        query.remove(char_to_byte_index(&query, app.query_cursor));
        app.set_query(query);
      }
    }
    KeyCode::Left => {
      app.query_cursor = app.query_cursor.saturating_sub(1);
    }
    KeyCode::Right => {
      if app.query_cursor < app.state.query.chars().count() {
        app.query_cursor += 1;
      }
    }
    KeyCode::Home => {
      app.query_cursor = 0;
    }
    KeyCode::End => {
      app.query_cursor = app.state.query.chars().count();
    }
    // Navigate filtered results while typing
    KeyCode::Down => app.select_next(),
    KeyCode::Up => app.select_prev(),
    KeyCode::Enter => {
      app.mode = AppMode::Browse;
    }
    KeyCode::Esc => {
      app.query_cursor = 0;
      app.query_scroll = 0;
      app.set_query(String::new());
      app.mode = AppMode::Browse;
    }
    _ => {}
  }
}
