mod app;
mod config;
mod constants;
mod http;
mod input;
mod logging;
mod player;
mod source;
mod stats;
mod ui;
mod video;
mod view;

use anyhow::Result;
use clap::Parser;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use app::App;
use config::{Config, Settings};
use constants::constants;
use view::SortMode;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Browse and play a team's game film", long_about = None)]
struct Args {
  /// Catalog location: a local JSON file or an http(s) URL
  #[arg(long)]
  source: Option<String>,

  /// Playlist id passed as `?playlistId=` to a remote source
  #[arg(long)]
  playlist_id: Option<String>,

  /// View-count statistics endpoint
  #[arg(long)]
  stats_url: Option<String>,

  /// Seconds between view-count refreshes (0 disables)
  #[arg(long)]
  refresh_secs: Option<u64>,

  /// Initial sort order
  #[arg(long, value_enum)]
  sort: Option<SortMode>,

  /// Log file (default: platform data dir)
  #[arg(long)]
  log_file: Option<PathBuf>,
}

impl Args {
  fn config_layer(&self) -> Config {
    Config {
      source: self.source.clone(),
      playlist_id: self.playlist_id.clone(),
      stats_url: self.stats_url.clone(),
      refresh_secs: self.refresh_secs,
      default_sort: self.sort,
    }
  }
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  let log_path = args.log_file.clone().unwrap_or_else(logging::default_log_path);
  let _log_guard = logging::init_logging(&log_path)?;

  let settings = Settings::from_config(&args.config_layer().or(Config::load()));
  info!(
    source = %settings.source.label(),
    stats_url = %settings.stats_url,
    refresh = ?settings.refresh,
    "gamefilm starting"
  );
  let client = http::build_client()?;

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, App::new(settings, client)).await;
  ratatui::restore();
  result
}

async fn run(terminal: &mut DefaultTerminal, mut app: App) -> Result<()> {
  let tick = Duration::from_millis(constants().tick_millis);
  app.start_loading();

  loop {
    app.check_pending();

    terminal.draw(|frame| ui::ui(frame, &mut app))?;

    if event::poll(tick)? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(&mut app, key).await;
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  app.shutdown().await;
  info!("gamefilm exiting");
  Ok(())
}
