use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::constants;

/// Smallest clip bound the settings editor accepts, in seconds.
pub const CLIP_SECONDS_MIN: u32 = 1;
/// Largest clip bound the settings editor accepts, in seconds.
pub const CLIP_SECONDS_MAX: u32 = 9999;
pub const VOLUME_MAX: u8 = 100;

/// User settings. Missing keys in a saved file fall back to the defaults below.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
  /// Search roots for the library scan.
  pub folders: Vec<PathBuf>,
  pub min_clip_seconds: u32,
  pub max_clip_seconds: u32,
  pub random_start: bool,
  pub random_length: bool,
  pub volume: u8,
  pub muted: bool,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      folders: Vec::new(),
      min_clip_seconds: 25,
      max_clip_seconds: 45,
      random_start: true,
      random_length: true,
      volume: 80,
      muted: false,
    }
  }
}

impl Config {
  /// Check the clip bounds invariant: `1 <= min <= max <= 9999`.
  pub fn validate(&self) -> Result<()> {
    let range = CLIP_SECONDS_MIN..=CLIP_SECONDS_MAX;
    if !range.contains(&self.min_clip_seconds) || !range.contains(&self.max_clip_seconds) {
      bail!("Clip length must be between {} and {} seconds", CLIP_SECONDS_MIN, CLIP_SECONDS_MAX);
    }
    if self.min_clip_seconds > self.max_clip_seconds {
      bail!("Min seconds ({}) must not exceed max seconds ({})", self.min_clip_seconds, self.max_clip_seconds);
    }
    if self.volume > VOLUME_MAX {
      bail!("Volume must be between 0 and {}", VOLUME_MAX);
    }
    Ok(())
  }

  /// Repair values a hand-edited file may carry so the rest of the app can rely on `validate`.
  pub fn sanitized(mut self) -> Self {
    self.min_clip_seconds = self.min_clip_seconds.clamp(CLIP_SECONDS_MIN, CLIP_SECONDS_MAX);
    self.max_clip_seconds = self.max_clip_seconds.clamp(CLIP_SECONDS_MIN, CLIP_SECONDS_MAX);
    if self.min_clip_seconds > self.max_clip_seconds {
      let defaults = Self::default();
      warn!(
        min = self.min_clip_seconds,
        max = self.max_clip_seconds,
        "config: min_clip_seconds exceeds max_clip_seconds, using defaults"
      );
      self.min_clip_seconds = defaults.min_clip_seconds;
      self.max_clip_seconds = defaults.max_clip_seconds;
    }
    self.volume = self.volume.min(VOLUME_MAX);
    self.folders = dedup_folders(std::mem::take(&mut self.folders));
    self
  }

  /// Add a search root. Returns `false` if it was already present.
  pub fn add_folder(&mut self, folder: PathBuf) -> bool {
    if self.folders.contains(&folder) {
      return false;
    }
    self.folders.push(folder);
    true
  }

  /// Read a config file, merging it over the defaults.
  ///
  /// A missing, unreadable or corrupt file yields the defaults; startup is never blocked.
  pub fn load_from(path: &Path) -> Self {
    let content = match std::fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "config: no saved config, using defaults");
        return Self::default();
      }
      Err(e) => {
        warn!(path = %path.display(), err = %e, "config: unreadable, using defaults");
        return Self::default();
      }
    };
    match toml::from_str::<Self>(&content) {
      Ok(config) => config.sanitized(),
      Err(e) => {
        warn!(path = %path.display(), err = %e, "config: corrupt, using defaults");
        Self::default()
      }
    }
  }

  pub fn save_to(&self, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent()
      && !dir.as_os_str().is_empty()
    {
      std::fs::create_dir_all(dir).with_context(|| format!("Failed to create config dir {}", dir.display()))?;
    }
    let content = toml::to_string(self).context("Failed to serialize config")?;
    std::fs::write(path, content).with_context(|| format!("Failed to write config {}", path.display()))?;
    Ok(())
  }
}

fn dedup_folders(folders: Vec<PathBuf>) -> Vec<PathBuf> {
  let mut out: Vec<PathBuf> = Vec::with_capacity(folders.len());
  for folder in folders {
    if !out.contains(&folder) {
      out.push(folder);
    }
  }
  out
}

/// Where the config lives on disk. `None` when no platform config dir could be found,
/// in which case settings only last for the session.
#[derive(Debug, Clone)]
pub struct ConfigStore {
  path: Option<PathBuf>,
}

impl ConfigStore {
  pub fn new(path: Option<PathBuf>) -> Self {
    Self { path }
  }

  /// Use the explicit path if given, otherwise `<config dir>/clipshuffle/prefs.toml`.
  pub fn resolve(explicit: Option<PathBuf>) -> Self {
    let path = explicit.or_else(|| {
      let c = constants();
      ProjectDirs::from("", "", &c.app_name).map(|dirs| dirs.config_dir().join(&c.config_file_name))
    });
    Self { path }
  }

  pub fn path(&self) -> Option<&Path> {
    self.path.as_deref()
  }

  pub fn load(&self) -> Config {
    match &self.path {
      Some(path) => Config::load_from(path),
      None => Config::default(),
    }
  }

  pub fn save(&self, config: &Config) -> Result<()> {
    let Some(path) = &self.path else {
      debug!("config: no config path, not persisting");
      return Ok(());
    };
    config.save_to(path)
  }
}
