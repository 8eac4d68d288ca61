//! Display projection: pure mapping from session state plus live engine position to
//! the strings and flags the UI shows.

use std::time::Duration;

use crate::constants::constants;

/// Which clock the normal-mode time label shows. Toggled by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeDisplayMode {
  #[default]
  Remaining,
  Elapsed,
}

impl TimeDisplayMode {
  pub fn toggled(self) -> Self {
    match self {
      TimeDisplayMode::Remaining => TimeDisplayMode::Elapsed,
      TimeDisplayMode::Elapsed => TimeDisplayMode::Remaining,
    }
  }
}

/// The icon the play/pause button shows: the action it would perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayIcon {
  Play,
  Pause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banner {
  NoMedia,
  NoPlayableClip,
}

impl Banner {
  pub fn message(self) -> &'static str {
    match self {
      Banner::NoMedia => "No media configured. Press s to add folders.",
      Banner::NoPlayableClip => "No file is long enough for the minimum clip length.",
    }
  }
}

/// Session facts the projection needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionView {
  pub random_length: bool,
  pub playing: bool,
  pub countdown_remaining: Duration,
  pub time_mode: TimeDisplayMode,
  pub user_seeking: bool,
  pub banner: Option<Banner>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
  /// Left label: countdown to the next clip (random-length mode only).
  pub countdown_label: Option<String>,
  /// Right label: remaining or elapsed time (normal mode only).
  pub time_label: Option<String>,
  /// New seek bar value in `0..=1000`, or `None` to leave the bar where it is.
  pub seek_value: Option<u16>,
  /// `false` when the seek bar is a read-only position indicator.
  pub seek_interactive: bool,
  pub play_icon: PlayIcon,
  pub banner: Option<Banner>,
}

impl Default for DisplayState {
  fn default() -> Self {
    Self {
      countdown_label: None,
      time_label: None,
      seek_value: None,
      seek_interactive: false,
      play_icon: PlayIcon::Play,
      banner: None,
    }
  }
}

/// Format milliseconds as `mm:ss`, or `h:mm:ss` once there is at least one hour.
/// Negative input clamps to zero.
pub fn format_clock(ms: i64) -> String {
  let total = ms.max(0) / 1000;
  let hours = total / 3600;
  let minutes = (total % 3600) / 60;
  let seconds = total % 60;
  if hours > 0 { format!("{}:{:02}:{:02}", hours, minutes, seconds) } else { format!("{:02}:{:02}", minutes, seconds) }
}

pub fn format_duration(d: Duration) -> String {
  format_clock(i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

/// Seek bar value for `position` within `length`, or `None` when the length is unknown.
pub fn seek_value(position: Duration, length: Option<Duration>) -> Option<u16> {
  let length = length.filter(|l| !l.is_zero())?;
  let resolution = f64::from(constants().seek_resolution);
  let ratio = (position.as_secs_f64() / length.as_secs_f64()).clamp(0.0, 1.0);
  Some((ratio * resolution).round() as u16)
}

pub fn project(view: &SessionView, position: Duration, length: Option<Duration>) -> DisplayState {
  let play_icon = if view.playing { PlayIcon::Pause } else { PlayIcon::Play };

  if view.random_length {
    return DisplayState {
      countdown_label: Some(format!("-{}", format_duration(view.countdown_remaining))),
      time_label: None,
      seek_value: seek_value(position, length),
      seek_interactive: false,
      play_icon,
      banner: view.banner,
    };
  }

  let length_ms = length.map_or(0, |l| l.as_millis() as i64);
  let position_ms = position.as_millis() as i64;
  let time_label = match view.time_mode {
    TimeDisplayMode::Remaining => format!("-{}", format_clock(length_ms - position_ms)),
    TimeDisplayMode::Elapsed => format_clock(position_ms),
  };

  DisplayState {
    countdown_label: None,
    time_label: Some(time_label),
    seek_value: if view.user_seeking { None } else { seek_value(position, length) },
    seek_interactive: true,
    play_icon,
    banner: view.banner,
  }
}
