//! The transport interface the session drives. `MpvPlayer` is the production implementation.

use anyhow::Result;
use std::path::Path;
use std::time::Duration;

/// Notifications raised on the engine's own thread/task and delivered to the control loop
/// over a channel. Nothing here touches session state directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
  /// The media reached its end. `generation` is the token passed to the `open` that loaded it.
  EndOfMedia { generation: u64 },
  /// The engine accepted the load but could not decode the file.
  OpenFailed { generation: u64 },
  /// The engine went away (player window closed, process exited).
  Shutdown,
}

#[allow(async_fn_in_trait)]
pub trait MediaEngine {
  /// Load `path` and make it current. `generation` is echoed back on `EndOfMedia` and `OpenFailed`.
  async fn open(&mut self, path: &Path, generation: u64) -> Result<()>;
  async fn play(&mut self) -> Result<()>;
  async fn pause(&mut self) -> Result<()>;
  async fn stop(&mut self) -> Result<()>;
  /// `None` while the length is not known yet.
  async fn length(&mut self) -> Result<Option<Duration>>;
  async fn position(&mut self) -> Result<Duration>;
  async fn set_position(&mut self, position: Duration) -> Result<()>;
  async fn is_playing(&mut self) -> Result<bool>;
  async fn set_volume(&mut self, volume: u8) -> Result<()>;
  async fn set_mute(&mut self, muted: bool) -> Result<()>;
  async fn toggle_fullscreen(&mut self) -> Result<()>;
}

#[cfg(test)]
pub mod fake {
  use super::*;
  use anyhow::bail;
  use std::collections::{HashMap, HashSet};
  use std::path::PathBuf;

  /// In-memory engine. Files listed in `lengths` report that length once opened.
  #[derive(Debug, Default)]
  pub struct FakeEngine {
    pub lengths: HashMap<PathBuf, Duration>,
    pub fail_open: HashSet<PathBuf>,
    pub current: Option<PathBuf>,
    pub generation: u64,
    pub playing: bool,
    pub position: Duration,
    pub opened: Vec<PathBuf>,
    pub seeks: Vec<Duration>,
    pub stops: u32,
    pub volume: u8,
    pub muted: bool,
    pub fullscreen: bool,
  }

  impl MediaEngine for FakeEngine {
    async fn open(&mut self, path: &Path, generation: u64) -> Result<()> {
      self.opened.push(path.to_path_buf());
      if self.fail_open.contains(path) {
        bail!("cannot decode {}", path.display());
      }
      self.current = Some(path.to_path_buf());
      self.generation = generation;
      self.position = Duration::ZERO;
      Ok(())
    }

    async fn play(&mut self) -> Result<()> {
      self.playing = true;
      Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
      self.playing = false;
      Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
      self.current = None;
      self.playing = false;
      self.stops += 1;
      Ok(())
    }

    async fn length(&mut self) -> Result<Option<Duration>> {
      Ok(self.current.as_ref().and_then(|p| self.lengths.get(p).copied()))
    }

    async fn position(&mut self) -> Result<Duration> {
      Ok(self.position)
    }

    async fn set_position(&mut self, position: Duration) -> Result<()> {
      self.seeks.push(position);
      self.position = position;
      Ok(())
    }

    async fn is_playing(&mut self) -> Result<bool> {
      Ok(self.playing)
    }

    async fn set_volume(&mut self, volume: u8) -> Result<()> {
      self.volume = volume;
      Ok(())
    }

    async fn set_mute(&mut self, muted: bool) -> Result<()> {
      self.muted = muted;
      Ok(())
    }

    async fn toggle_fullscreen(&mut self) -> Result<()> {
      self.fullscreen = !self.fullscreen;
      Ok(())
    }
  }
}
