//! Clip planning: acquire the media length, then choose the playback window.
//!
//! The length is usually not known the instant a file is opened, so it is polled with a
//! bounded budget. A file whose length never shows up still plays, just without a random
//! start or the minimum-length check.

use anyhow::Result;
use rand::Rng;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::constants::constants;
use crate::engine::MediaEngine;

/// Outcome of polling for the media length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationProbe {
  Known(Duration),
  /// The source failed while being polled.
  Unknown,
  /// The attempt budget ran out before a positive length appeared.
  TimedOut,
}

impl DurationProbe {
  pub fn known(self) -> Option<Duration> {
    match self {
      DurationProbe::Known(d) => Some(d),
      DurationProbe::Unknown | DurationProbe::TimedOut => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
  pub attempts: u32,
  pub delay: Duration,
}

impl Default for PollPolicy {
  fn default() -> Self {
    let c = constants();
    Self { attempts: c.duration_poll_attempts, delay: Duration::from_millis(c.duration_poll_delay_ms) }
  }
}

/// Anything that can be asked for the current media length.
#[allow(async_fn_in_trait)]
pub trait DurationSource {
  async fn poll_length(&mut self) -> Result<Option<Duration>>;
}

impl<E: MediaEngine> DurationSource for E {
  async fn poll_length(&mut self) -> Result<Option<Duration>> {
    self.length().await
  }
}

/// Poll `source` until it reports a length above zero, waiting `policy.delay` before each poll.
pub async fn acquire_duration<S: DurationSource>(source: &mut S, policy: PollPolicy) -> DurationProbe {
  for attempt in 1..=policy.attempts {
    tokio::time::sleep(policy.delay).await;
    match source.poll_length().await {
      Ok(Some(length)) if !length.is_zero() => {
        debug!(attempt, length_ms = length.as_millis() as u64, "planner: length known");
        return DurationProbe::Known(length);
      }
      Ok(_) => {}
      Err(e) => {
        warn!(attempt, err = %e, "planner: length query failed");
        return DurationProbe::Unknown;
      }
    }
  }
  debug!(attempts = policy.attempts, "planner: length still unknown, giving up");
  DurationProbe::TimedOut
}

/// The playback window chosen for one clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipPlan {
  pub source_path: PathBuf,
  /// `None` when the length could not be acquired.
  pub total_duration: Option<Duration>,
  pub start_offset: Duration,
  /// Drawn length in random-length mode, otherwise the rest of the file (`None` if unknown).
  pub planned_clip_duration: Option<Duration>,
  /// What will actually be armed on the auto-advance timer. `None` means play until the
  /// engine reports end of media.
  pub effective_clip_duration: Option<Duration>,
}

/// Not enough media left after the start offset to satisfy the minimum clip length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
  pub remaining: Duration,
  pub min_clip: Duration,
}

impl fmt::Display for Rejection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "only {}s remaining, need at least {}s", self.remaining.as_secs(), self.min_clip.as_secs())
  }
}

/// Compute the playback window for `source_path`.
///
/// Draw order is start offset, then clip length. A zero or missing `total` is treated as unknown.
pub fn plan_clip<R: Rng + ?Sized>(
  source_path: &Path,
  total: Option<Duration>,
  config: &Config,
  rng: &mut R,
) -> Result<ClipPlan, Rejection> {
  let total = total.filter(|d| !d.is_zero());
  let min_secs = u64::from(config.min_clip_seconds);
  let max_secs = u64::from(config.max_clip_seconds).max(min_secs);
  let min_clip = Duration::from_secs(min_secs);
  let max_clip = Duration::from_secs(max_secs);

  let start_offset = match total {
    Some(total) if config.random_start => {
      let max_start_ms = total.saturating_sub(max_clip).as_millis() as u64;
      Duration::from_millis(rng.gen_range(0..=max_start_ms))
    }
    _ => Duration::ZERO,
  };

  let remaining = total.map(|total| total.saturating_sub(start_offset));

  let planned_clip_duration =
    if config.random_length { Some(Duration::from_secs(rng.gen_range(min_secs..=max_secs))) } else { remaining };

  if config.random_length
    && let Some(remaining) = remaining
    && remaining < min_clip
  {
    return Err(Rejection { remaining, min_clip });
  }

  let effective_clip_duration = match (planned_clip_duration, remaining) {
    (Some(planned), Some(remaining)) => Some(planned.min(remaining)),
    (planned, None) => planned,
    (None, remaining) => remaining,
  };

  Ok(ClipPlan {
    source_path: source_path.to_path_buf(),
    total_duration: total,
    start_offset,
    planned_clip_duration,
    effective_clip_duration,
  })
}
