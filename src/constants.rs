//! Session and transport tunables from `constants.ron`, embedded with `include_str!` and
//! parsed once on first access.

use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  pub app_name: String,
  pub config_file_name: String,

  // Session timing
  pub tick_interval_ms: u64,
  pub duration_poll_attempts: u32,
  pub duration_poll_delay_ms: u64,
  pub debug_countdown_every_secs: u64,

  // Reselect-on-rejection budget
  pub reselect_factor: usize,
  pub reselect_max_attempts: usize,

  // Seek bar / transport
  pub seek_resolution: u16,
  pub seek_step_ratio: f64,
  pub volume_step: u8,

  // mpv IPC
  pub ipc_timeout_ms: u64,
  pub ipc_connect_attempts: u32,
  pub ipc_connect_delay_ms: u64,
  pub mpv_window_title: String,
}

impl Constants {
  pub fn tick_interval(&self) -> Duration {
    Duration::from_millis(self.tick_interval_ms)
  }

  pub fn ipc_timeout(&self) -> Duration {
    Duration::from_millis(self.ipc_timeout_ms)
  }
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
