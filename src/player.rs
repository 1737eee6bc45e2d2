use anyhow::{Context, Result, anyhow};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::video::Video;

/// What the external player is currently showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
  pub video_id: String,
  pub title: String,
}

/// Plays catalog videos in an external `mpv` window.
#[derive(Default)]
pub struct Player {
  current_process: Option<Child>,
  pub now_playing: Option<NowPlaying>,
}

impl Player {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_playing(&self) -> bool {
    self.current_process.is_some()
  }

  pub fn is_playing_video(&self, video_id: &str) -> bool {
    self.now_playing.as_ref().is_some_and(|np| np.video_id == video_id)
  }

  /// Start playback of `video`, stopping whatever was playing before.
  pub async fn play(&mut self, video: &Video) -> Result<()> {
    if video.video_url.trim().is_empty() {
      return Err(anyhow!("'{}' has no video link", video.title));
    }
    self.stop().await.context("Failed to stop previous playback")?;

    let mut cmd = Command::new("mpv");
    cmd.args(["--force-window=immediate", &format!("--title={}", video.title), "--", &video.video_url]);
    cmd.stdin(Stdio::null());
    // mpv writes to the terminal otherwise and corrupts the UI.
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());

    let child = cmd.spawn().map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        anyhow!("mpv not found. Install it with: brew install mpv (macOS) or apt install mpv (Linux)")
      } else {
        anyhow!(e).context("Failed to spawn mpv process")
      }
    })?;

    info!(id = %video.id, url = %video.video_url, "player: started");
    self.current_process = Some(child);
    self.now_playing = Some(NowPlaying { video_id: video.id.clone(), title: video.title.clone() });
    Ok(())
  }

  /// Clear state once the player window has been closed. Returns `true` when
  /// playback ended since the last call.
  pub fn check_status(&mut self) -> bool {
    let Some(child) = self.current_process.as_mut() else { return false };
    match child.try_wait() {
      Ok(Some(status)) => {
        info!(%status, "player: exited");
        self.current_process = None;
        self.now_playing = None;
        true
      }
      Ok(None) => false,
      Err(e) => {
        warn!(err = %e, "player: failed to poll mpv");
        false
      }
    }
  }

  pub async fn stop(&mut self) -> Result<()> {
    if let Some(mut child) = self.current_process.take() {
      child.kill().await.context("Failed to kill mpv process")?;
      let _ = child.wait().await;
      info!("player: stopped");
    }
    self.now_playing = None;
    Ok(())
  }
}

/// Open `url` in the default browser.
pub fn open_in_browser(url: &str) -> Result<()> {
  if url.trim().is_empty() {
    return Err(anyhow!("No video link to open"));
  }
  #[cfg(target_os = "macos")]
  let cmd = "open";
  #[cfg(not(target_os = "macos"))]
  let cmd = "xdg-open";
  let mut child = std::process::Command::new(cmd)
    .arg(url)
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .spawn()
    .with_context(|| format!("Failed to launch {}", cmd))?;
  // Reap the child in a background thread to avoid zombie processes.
  std::thread::spawn(move || {
    let _ = child.wait();
  });
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[tokio::test]
  async fn play_without_link_is_an_error() {
    let video = Video::from_raw(&json!({"id": "x", "title": "No link"}), 0).unwrap();
    let mut player = Player::new();
    let err = player.play(&video).await.unwrap_err();
    assert!(err.to_string().contains("No link"));
    assert!(!player.is_playing());
    assert!(player.now_playing.is_none());
  }

  #[tokio::test]
  async fn stop_when_idle_is_noop() {
    let mut player = Player::new();
    player.stop().await.unwrap();
    assert!(!player.check_status());
    assert!(!player.is_playing_video("x"));
  }

  #[test]
  fn open_without_link_is_an_error() {
    assert!(open_in_browser("  ").is_err());
  }
}
