//! Playback session: picks clips, arms the auto-advance timer, and handles pause, seek,
//! end of media and settings changes.
//!
//! All methods run on the control task. Engine notifications reach the session as plain
//! values (`on_end_of_media`, `on_open_failed`) after crossing a channel, tagged with the generation of the
//! load they belong to so that late events from an abandoned clip are dropped.

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{Config, VOLUME_MAX};
use crate::constants::constants;
use crate::display::{self, Banner, DisplayState, SessionView, TimeDisplayMode, format_duration};
use crate::engine::MediaEngine;
use crate::library::Library;
use crate::planner::{ClipPlan, PollPolicy, acquire_duration, plan_clip};
use crate::settings::{self, SettingsOutcome};
use crate::timer::AdvanceTimer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleReason {
  /// The library is empty.
  NoMedia,
  /// Every attempt in the reselect budget was rejected or failed to open.
  NoPlayableClip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
  Idle(IdleReason),
  Loading,
  Playing,
  Paused,
}

/// Everything tied to the current clip. Replaced wholesale on every advance.
#[derive(Debug, Default)]
struct ClipState {
  plan: Option<ClipPlan>,
  countdown_remaining: Duration,
  timer: AdvanceTimer,
  user_seeking: bool,
  last_countdown_log: Option<u64>,
}

pub struct Session<E: MediaEngine> {
  engine: E,
  config: Config,
  library: Library,
  state: SessionState,
  clip: ClipState,
  time_mode: TimeDisplayMode,
  /// Bumped on every load attempt and on going idle.
  generation: u64,
  /// Files in a row that loaded but then failed to decode.
  failed_opens: usize,
  poll_policy: PollPolicy,
  no_media_banner: bool,
  rng: StdRng,
}

/// How many picks to try before declaring the library unplayable.
pub fn reselect_budget(library_len: usize) -> usize {
  let c = constants();
  library_len.saturating_mul(c.reselect_factor).clamp(1, c.reselect_max_attempts.max(1))
}

impl<E: MediaEngine> Session<E> {
  pub fn new(engine: E, config: Config) -> Self {
    Self::with_rng(engine, config, StdRng::from_entropy())
  }

  pub fn with_rng(engine: E, config: Config, rng: StdRng) -> Self {
    Self {
      engine,
      config,
      library: Library::default(),
      state: SessionState::Idle(IdleReason::NoMedia),
      clip: ClipState::default(),
      time_mode: TimeDisplayMode::default(),
      generation: 0,
      failed_opens: 0,
      poll_policy: PollPolicy::default(),
      no_media_banner: false,
      rng,
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn state(&self) -> SessionState {
    self.state
  }

  pub fn plan(&self) -> Option<&ClipPlan> {
    self.clip.plan.as_ref()
  }

  pub fn library(&self) -> &Library {
    &self.library
  }

  pub fn countdown_remaining(&self) -> Duration {
    self.clip.countdown_remaining
  }

  #[cfg(test)]
  pub(crate) fn generation(&self) -> u64 {
    self.generation
  }

  pub fn advance_deadline(&self) -> Option<Instant> {
    self.clip.timer.deadline()
  }

  pub fn banner(&self) -> Option<Banner> {
    match self.state {
      SessionState::Idle(IdleReason::NoMedia) => Some(Banner::NoMedia),
      SessionState::Idle(IdleReason::NoPlayableClip) => Some(Banner::NoPlayableClip),
      _ if self.no_media_banner => Some(Banner::NoMedia),
      _ => None,
    }
  }

  pub fn view(&self) -> SessionView {
    SessionView {
      random_length: self.config.random_length,
      playing: self.state == SessionState::Playing,
      countdown_remaining: self.clip.countdown_remaining,
      time_mode: self.time_mode,
      user_seeking: self.clip.user_seeking,
      banner: self.banner(),
    }
  }

  /// Push the configured volume and mute state to the engine.
  pub async fn apply_audio_settings(&mut self) -> Result<()> {
    self.engine.set_volume(self.config.volume).await.context("Failed to set volume")?;
    self.engine.set_mute(self.config.muted).await.context("Failed to set mute")?;
    Ok(())
  }

  /// Rescan the configured folders and start a fresh playlist.
  pub async fn restart(&mut self) -> Result<()> {
    let folders = self.config.folders.clone();
    let library =
      tokio::task::spawn_blocking(move || Library::scan(&folders)).await.context("Library scan task failed")?;
    self.start_playlist(library).await;
    Ok(())
  }

  pub async fn start_playlist(&mut self, library: Library) {
    info!(files = library.len(), "session: starting playlist");
    self.library = library;
    self.no_media_banner = false;
    self.advance().await;
  }

  /// Drop the current clip and start another one. Used for the auto-advance timer,
  /// end of media and the user's "next".
  pub async fn advance(&mut self) {
    self.failed_opens = 0;
    self.pick_next().await;
  }

  async fn pick_next(&mut self) {
    self.clip = ClipState::default();

    if self.library.is_empty() {
      self.go_idle(IdleReason::NoMedia).await;
      return;
    }

    self.state = SessionState::Loading;
    let budget = reselect_budget(self.library.len());
    for attempt in 1..=budget {
      let Some(path) = self.library.choose(&mut self.rng).map(Path::to_path_buf) else { break };
      match self.load(&path).await {
        Ok(Some(plan)) => {
          self.begin(plan);
          return;
        }
        Ok(None) => {}
        Err(e) => {
          warn!(attempt, path = %path.display(), err = %format!("{:#}", e), "session: skipping file");
        }
      }
    }

    warn!(attempts = budget, "session: no playable clip in library");
    self.go_idle(IdleReason::NoPlayableClip).await;
  }

  /// Open `path`, wait for its length and plan a window. `Ok(None)` means the plan was rejected.
  async fn load(&mut self, path: &Path) -> Result<Option<ClipPlan>> {
    self.generation += 1;
    self.engine.open(path, self.generation).await.with_context(|| format!("Failed to open {}", path.display()))?;
    self.engine.play().await.context("Failed to start playback")?;

    let probe = acquire_duration(&mut self.engine, self.poll_policy).await;
    match plan_clip(path, probe.known(), &self.config, &mut self.rng) {
      Ok(plan) => {
        if !plan.start_offset.is_zero() {
          self.engine.set_position(plan.start_offset).await.context("Failed to seek to clip start")?;
        }
        Ok(Some(plan))
      }
      Err(rejection) => {
        debug!(path = %path.display(), reason = %rejection, "session: clip rejected");
        Ok(None)
      }
    }
  }

  fn begin(&mut self, plan: ClipPlan) {
    self.state = SessionState::Playing;
    if let Some(clip) = plan.effective_clip_duration {
      self.clip.timer.start(clip);
      if self.config.random_length {
        self.clip.countdown_remaining = clip;
      }
    }
    info!(
      path = %plan.source_path.display(),
      start = %format_duration(plan.start_offset),
      clip_secs = ?plan.effective_clip_duration.map(|d| d.as_secs()),
      "session: playing clip"
    );
    self.clip.plan = Some(plan);
  }

  async fn go_idle(&mut self, reason: IdleReason) {
    self.clip = ClipState::default();
    self.state = SessionState::Idle(reason);
    self.generation += 1;
    if let Err(e) = self.engine.stop().await {
      warn!(err = %format!("{:#}", e), "session: failed to stop engine");
    }
    info!(?reason, "session: idle");
  }

  /// Pause or resume. Pausing freezes the auto-advance timer; resuming re-arms it with the
  /// retained budget (the countdown in random-length mode).
  pub async fn toggle_pause(&mut self) -> Result<()> {
    match self.state {
      SessionState::Playing => {
        self.engine.pause().await.context("Failed to pause")?;
        self.state = SessionState::Paused;
        self.clip.timer.freeze();
        debug!(countdown_ms = self.clip.countdown_remaining.as_millis() as u64, "session: paused");
      }
      SessionState::Paused => {
        self.engine.play().await.context("Failed to resume")?;
        self.state = SessionState::Playing;
        if self.config.random_length && !self.clip.countdown_remaining.is_zero() {
          self.clip.timer.start(self.clip.countdown_remaining);
        } else {
          self.clip.timer.thaw();
        }
        debug!("session: resumed");
      }
      SessionState::Idle(_) | SessionState::Loading => {}
    }
    Ok(())
  }

  pub fn set_user_seeking(&mut self, seeking: bool) {
    self.clip.user_seeking = seeking && !self.config.random_length;
  }

  /// Seek to `ratio` of the media length and re-arm the timer with what is left.
  /// Ignored in random-length mode, where the seek bar is only an indicator.
  pub async fn seek_to_ratio(&mut self, ratio: f64) -> Result<()> {
    if self.config.random_length {
      debug!("session: seek ignored in random-length mode");
      return Ok(());
    }
    if !matches!(self.state, SessionState::Playing | SessionState::Paused) || !ratio.is_finite() {
      return Ok(());
    }
    let Some(length) = self.engine.length().await.context("Failed to query length")?.filter(|l| !l.is_zero()) else {
      return Ok(());
    };

    let target = length.mul_f64(ratio.clamp(0.0, 1.0));
    self.engine.set_position(target).await.context("Failed to seek")?;

    let remaining = length.saturating_sub(target);
    if remaining.is_zero() {
      self.advance().await;
      return Ok(());
    }
    if self.state == SessionState::Paused {
      self.clip.timer.set_frozen(remaining);
    } else {
      self.clip.timer.start(remaining);
    }
    Ok(())
  }

  /// Periodic refresh. Counts the clip countdown down while the engine is actually playing.
  pub async fn tick(&mut self, interval: Duration) -> Result<DisplayState> {
    if !matches!(self.state, SessionState::Playing | SessionState::Paused) {
      return Ok(display::project(&self.view(), Duration::ZERO, None));
    }

    let playing = self.engine.is_playing().await.context("Failed to query playback state")?;
    if playing && self.state == SessionState::Playing && self.config.random_length {
      self.clip.countdown_remaining = self.clip.countdown_remaining.saturating_sub(interval);
      self.log_countdown();
    }

    let length = self.engine.length().await.context("Failed to query length")?;
    let position = self.engine.position().await.context("Failed to query position")?;
    Ok(display::project(&self.view(), position, length))
  }

  fn log_countdown(&mut self) {
    let every = constants().debug_countdown_every_secs.max(1);
    let secs = self.clip.countdown_remaining.as_secs();
    if secs > 0 && secs % every == 0 && self.clip.last_countdown_log != Some(secs) {
      self.clip.last_countdown_log = Some(secs);
      debug!(seconds = secs, "session: switching in {} seconds", secs);
    }
  }

  /// Called when the control loop's sleep on `advance_deadline` completes.
  pub async fn on_advance_timer(&mut self) {
    if self.clip.timer.is_due(Instant::now()) {
      debug!("session: clip time is up");
      self.advance().await;
    }
  }

  pub async fn on_end_of_media(&mut self, generation: u64) {
    if generation != self.generation || !matches!(self.state, SessionState::Playing | SessionState::Paused) {
      debug!(generation, current = self.generation, "session: discarding stale end of media");
      return;
    }
    debug!("session: end of media");
    self.advance().await;
  }

  /// The engine could not decode the current file after accepting it. Counts against the
  /// same budget as failed picks, so a folder of broken files ends idle instead of cycling.
  pub async fn on_open_failed(&mut self, generation: u64) {
    if generation != self.generation || !matches!(self.state, SessionState::Playing | SessionState::Paused) {
      debug!(generation, current = self.generation, "session: discarding stale load failure");
      return;
    }
    self.failed_opens += 1;
    let path = self.clip.plan.as_ref().map(|p| p.source_path.display().to_string()).unwrap_or_default();
    warn!(path = %path, failures = self.failed_opens, "session: file failed to decode, skipping");
    if self.failed_opens >= reselect_budget(self.library.len()) {
      warn!(failures = self.failed_opens, "session: no decodable file in library");
      self.failed_opens = 0;
      self.go_idle(IdleReason::NoPlayableClip).await;
      return;
    }
    self.pick_next().await;
  }

  /// Take a config accepted by the settings editor.
  pub async fn apply_settings(&mut self, new: Config) -> Result<SettingsOutcome> {
    let outcome = settings::reconcile(&self.config, &new);
    self.config = new;
    match outcome {
      SettingsOutcome::Restart => {
        info!("session: settings changed, restarting playlist");
        self.restart().await?;
      }
      SettingsOutcome::Unchanged { show_no_media } => {
        self.no_media_banner = show_no_media;
      }
    }
    Ok(outcome)
  }

  /// Mark the empty-folders banner visible without touching playback.
  pub fn show_no_media_banner(&mut self) {
    self.no_media_banner = true;
  }

  pub async fn set_volume(&mut self, volume: u8) -> Result<u8> {
    let volume = volume.min(VOLUME_MAX);
    self.engine.set_volume(volume).await.context("Failed to set volume")?;
    self.config.volume = volume;
    Ok(volume)
  }

  pub async fn toggle_mute(&mut self) -> Result<bool> {
    let muted = !self.config.muted;
    self.engine.set_mute(muted).await.context("Failed to toggle mute")?;
    self.config.muted = muted;
    Ok(muted)
  }

  pub async fn toggle_fullscreen(&mut self) -> Result<()> {
    self.engine.toggle_fullscreen().await.context("Failed to toggle fullscreen")
  }

  /// Switch the normal-mode clock between remaining and elapsed.
  pub fn toggle_time_mode(&mut self) {
    if !self.config.random_length {
      self.time_mode = self.time_mode.toggled();
    }
  }

  pub fn engine_mut(&mut self) -> &mut E {
    &mut self.engine
  }

  #[cfg(test)]
  pub(crate) fn engine(&self) -> &E {
    &self.engine
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::engine::fake::FakeEngine;
  use std::path::PathBuf;

  fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
  }

  fn random_clips() -> Config {
    Config { folders: vec![PathBuf::from("/videos")], ..Config::default() }
  }

  fn normal_mode() -> Config {
    Config { random_start: false, random_length: false, ..random_clips() }
  }

  /// Build a session over `files` (name, length in seconds). Lengths of `None` never resolve.
  fn session(config: Config, files: &[(&str, Option<u64>)]) -> (Session<FakeEngine>, Library) {
    let mut engine = FakeEngine::default();
    let mut paths = Vec::new();
    for (name, length) in files {
      let path = PathBuf::from(format!("/videos/{}", name));
      if let Some(length) = length {
        engine.lengths.insert(path.clone(), secs(*length));
      }
      paths.push(path);
    }
    (Session::with_rng(engine, config, StdRng::seed_from_u64(42)), Library::from_paths(paths))
  }

  #[test]
  fn reselect_budget_is_bounded() {
    assert_eq!(reselect_budget(0), 1);
    assert_eq!(reselect_budget(3), 6);
    assert_eq!(reselect_budget(1_000_000), constants().reselect_max_attempts);
  }

  #[tokio::test(start_paused = true)]
  async fn empty_library_goes_idle() {
    let (mut s, _) = session(random_clips(), &[]);
    s.start_playlist(Library::default()).await;

    assert_eq!(s.state(), SessionState::Idle(IdleReason::NoMedia));
    assert_eq!(s.banner(), Some(Banner::NoMedia));
    assert!(s.advance_deadline().is_none());
    assert_eq!(s.engine().stops, 1);
    assert!(s.engine().opened.is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn start_arms_timer_with_clip_length() {
    let (mut s, lib) = session(random_clips(), &[("long.mp4", Some(1000))]);
    s.start_playlist(lib).await;

    assert_eq!(s.state(), SessionState::Playing);
    let plan = s.plan().unwrap().clone();
    let countdown = s.countdown_remaining();
    assert!(countdown >= secs(25) && countdown <= secs(45));
    assert_eq!(plan.effective_clip_duration, Some(countdown));
    assert_eq!(s.advance_deadline(), Some(Instant::now() + countdown));
    assert!(plan.start_offset <= secs(955));
    if plan.start_offset.is_zero() {
      assert!(s.engine().seeks.is_empty());
    } else {
      assert_eq!(s.engine().seeks, vec![plan.start_offset]);
    }
    assert_eq!(s.engine().generation, s.generation());
  }

  #[tokio::test(start_paused = true)]
  async fn pause_then_resume_preserves_countdown() {
    let (mut s, lib) = session(random_clips(), &[("long.mp4", Some(1000))]);
    s.start_playlist(lib).await;
    s.tick(Duration::from_millis(250)).await.unwrap();
    let before = s.countdown_remaining();

    s.toggle_pause().await.unwrap();
    assert_eq!(s.state(), SessionState::Paused);
    assert!(s.advance_deadline().is_none());
    assert!(!s.engine().playing);

    s.toggle_pause().await.unwrap();
    assert_eq!(s.state(), SessionState::Playing);
    assert_eq!(s.countdown_remaining(), before);
    assert_eq!(s.advance_deadline(), Some(Instant::now() + before));
  }

  #[tokio::test(start_paused = true)]
  async fn pause_freezes_timer_in_normal_mode() {
    let (mut s, lib) = session(normal_mode(), &[("film.mkv", Some(100))]);
    s.start_playlist(lib).await;
    assert_eq!(s.advance_deadline(), Some(Instant::now() + secs(100)));

    tokio::time::advance(secs(30)).await;
    s.toggle_pause().await.unwrap();
    tokio::time::advance(secs(500)).await;
    s.on_advance_timer().await;
    assert_eq!(s.state(), SessionState::Paused);

    s.toggle_pause().await.unwrap();
    assert_eq!(s.advance_deadline(), Some(Instant::now() + secs(70)));
  }

  #[tokio::test(start_paused = true)]
  async fn countdown_only_runs_while_playing() {
    let (mut s, lib) = session(random_clips(), &[("long.mp4", Some(1000))]);
    s.start_playlist(lib).await;
    let start = s.countdown_remaining();

    let display = s.tick(Duration::from_millis(250)).await.unwrap();
    assert_eq!(s.countdown_remaining(), start - Duration::from_millis(250));
    assert!(display.countdown_label.is_some());
    assert!(!display.seek_interactive);

    s.toggle_pause().await.unwrap();
    s.tick(Duration::from_millis(250)).await.unwrap();
    assert_eq!(s.countdown_remaining(), start - Duration::from_millis(250));
  }

  #[tokio::test(start_paused = true)]
  async fn countdown_floors_at_zero() {
    let (mut s, lib) = session(random_clips(), &[("long.mp4", Some(1000))]);
    s.start_playlist(lib).await;
    for _ in 0..400 {
      s.tick(Duration::from_millis(250)).await.unwrap();
    }
    assert_eq!(s.countdown_remaining(), Duration::ZERO);
  }

  #[tokio::test(start_paused = true)]
  async fn seek_is_ignored_in_random_length_mode() {
    let (mut s, lib) = session(random_clips(), &[("long.mp4", Some(1000))]);
    s.start_playlist(lib).await;
    let seeks = s.engine().seeks.clone();
    let position = s.engine().position;
    let deadline = s.advance_deadline();

    s.set_user_seeking(true);
    s.seek_to_ratio(0.5).await.unwrap();
    assert_eq!(s.engine().seeks, seeks);
    assert_eq!(s.engine().position, position);
    assert_eq!(s.advance_deadline(), deadline);
    assert!(!s.view().user_seeking);
  }

  #[tokio::test(start_paused = true)]
  async fn seek_rearms_timer_with_remaining_time() {
    let (mut s, lib) = session(normal_mode(), &[("film.mkv", Some(200))]);
    s.start_playlist(lib).await;

    s.seek_to_ratio(0.25).await.unwrap();
    assert_eq!(s.engine().position, secs(50));
    assert_eq!(s.advance_deadline(), Some(Instant::now() + secs(150)));
  }

  #[tokio::test(start_paused = true)]
  async fn seek_to_end_advances() {
    let (mut s, lib) = session(normal_mode(), &[("a.mkv", Some(200)), ("b.mkv", Some(300))]);
    s.start_playlist(lib).await;
    let generation = s.generation();

    s.seek_to_ratio(1.0).await.unwrap();
    assert_eq!(s.engine().opened.len(), 2);
    assert!(s.generation() > generation);
    assert_eq!(s.state(), SessionState::Playing);
  }

  #[tokio::test(start_paused = true)]
  async fn seek_while_paused_updates_frozen_budget() {
    let (mut s, lib) = session(normal_mode(), &[("film.mkv", Some(200))]);
    s.start_playlist(lib).await;
    s.toggle_pause().await.unwrap();

    s.seek_to_ratio(0.5).await.unwrap();
    assert!(s.advance_deadline().is_none());

    s.toggle_pause().await.unwrap();
    assert_eq!(s.advance_deadline(), Some(Instant::now() + secs(100)));
  }

  #[tokio::test(start_paused = true)]
  async fn timer_expiry_advances_to_next_clip() {
    let (mut s, lib) = session(random_clips(), &[("long.mp4", Some(1000))]);
    s.start_playlist(lib).await;

    s.on_advance_timer().await;
    assert_eq!(s.engine().opened.len(), 1);

    let deadline = s.advance_deadline().unwrap();
    tokio::time::advance(deadline - Instant::now()).await;
    s.on_advance_timer().await;
    assert_eq!(s.engine().opened.len(), 2);
    assert_eq!(s.state(), SessionState::Playing);
  }

  #[tokio::test(start_paused = true)]
  async fn stale_end_of_media_is_discarded() {
    let (mut s, lib) = session(random_clips(), &[("a.mp4", Some(1000)), ("b.mp4", Some(1000))]);
    s.start_playlist(lib).await;
    let old = s.generation();

    s.advance().await;
    assert_eq!(s.engine().opened.len(), 2);

    s.on_end_of_media(old).await;
    assert_eq!(s.engine().opened.len(), 2);

    s.on_end_of_media(s.generation()).await;
    assert_eq!(s.engine().opened.len(), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn end_of_media_while_idle_is_ignored() {
    let (mut s, _) = session(random_clips(), &[]);
    s.start_playlist(Library::default()).await;
    s.on_end_of_media(s.generation()).await;
    assert_eq!(s.state(), SessionState::Idle(IdleReason::NoMedia));
    assert!(s.engine().opened.is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn all_files_too_short_ends_in_explicit_idle() {
    let (mut s, lib) = session(random_clips(), &[("a.mp4", Some(10)), ("b.mp4", Some(10))]);
    s.start_playlist(lib).await;

    assert_eq!(s.state(), SessionState::Idle(IdleReason::NoPlayableClip));
    assert_eq!(s.banner(), Some(Banner::NoPlayableClip));
    assert_eq!(s.engine().opened.len(), reselect_budget(2));
    assert!(s.plan().is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn unopenable_file_is_skipped() {
    let (mut s, lib) = session(
      random_clips(),
      &[("bad.mp4", Some(1000)), ("good1.mp4", Some(1000)), ("good2.mp4", Some(1000)), ("good3.mp4", Some(1000))],
    );
    s.engine_mut().fail_open.insert(PathBuf::from("/videos/bad.mp4"));
    s.start_playlist(lib).await;

    assert_eq!(s.state(), SessionState::Playing);
    assert_ne!(s.plan().unwrap().source_path, PathBuf::from("/videos/bad.mp4"));
  }

  #[tokio::test(start_paused = true)]
  async fn single_unopenable_file_goes_idle() {
    let (mut s, lib) = session(random_clips(), &[("bad.mp4", Some(1000))]);
    s.engine_mut().fail_open.insert(PathBuf::from("/videos/bad.mp4"));
    s.start_playlist(lib).await;

    assert_eq!(s.state(), SessionState::Idle(IdleReason::NoPlayableClip));
    assert_eq!(s.engine().opened.len(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn unknown_length_still_plays_random_clip() {
    let (mut s, lib) = session(random_clips(), &[("stream.ts", None)]);
    let started = Instant::now();
    s.start_playlist(lib).await;

    assert_eq!(started.elapsed(), secs(2));
    assert_eq!(s.state(), SessionState::Playing);
    assert!(s.engine().seeks.is_empty());
    let countdown = s.countdown_remaining();
    assert!(countdown >= secs(25) && countdown <= secs(45));
  }

  #[tokio::test(start_paused = true)]
  async fn unknown_length_in_normal_mode_waits_for_end_of_media() {
    let (mut s, lib) = session(normal_mode(), &[("stream.ts", None)]);
    s.start_playlist(lib).await;

    assert_eq!(s.state(), SessionState::Playing);
    assert!(s.advance_deadline().is_none());

    s.on_end_of_media(s.generation()).await;
    assert_eq!(s.engine().opened.len(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn undecodable_file_in_normal_mode_is_skipped() {
    let (mut s, lib) = session(normal_mode(), &[("broken.mkv", None), ("film.mkv", Some(200))]);
    s.start_playlist(lib).await;

    // Keep failing until a decodable file is current; the broken one never arms a timer.
    for _ in 0..reselect_budget(2) {
      if s.plan().is_some_and(|p| p.source_path == Path::new("/videos/film.mkv")) {
        break;
      }
      assert!(s.advance_deadline().is_none());
      let opened = s.engine().opened.len();
      s.on_open_failed(s.generation()).await;
      if s.state() != SessionState::Playing {
        break;
      }
      assert_eq!(s.engine().opened.len(), opened + 1);
    }
    if s.state() == SessionState::Playing {
      assert_eq!(s.plan().unwrap().source_path, PathBuf::from("/videos/film.mkv"));
      assert_eq!(s.advance_deadline(), Some(Instant::now() + secs(200)));
    } else {
      assert_eq!(s.state(), SessionState::Idle(IdleReason::NoPlayableClip));
    }
  }

  #[tokio::test(start_paused = true)]
  async fn only_undecodable_files_end_idle() {
    let (mut s, lib) = session(normal_mode(), &[("broken.mkv", None)]);
    s.start_playlist(lib).await;
    assert_eq!(s.state(), SessionState::Playing);

    s.on_open_failed(s.generation()).await;
    assert_eq!(s.state(), SessionState::Playing);
    assert_eq!(s.engine().opened.len(), 2);

    s.on_open_failed(s.generation()).await;
    assert_eq!(s.state(), SessionState::Idle(IdleReason::NoPlayableClip));
    assert_eq!(s.banner(), Some(Banner::NoPlayableClip));
    assert_eq!(s.engine().opened.len(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn stale_load_failure_is_discarded() {
    let (mut s, lib) = session(random_clips(), &[("a.mp4", Some(1000)), ("b.mp4", Some(1000))]);
    s.start_playlist(lib).await;
    let old = s.generation();
    s.advance().await;

    s.on_open_failed(old).await;
    assert_eq!(s.engine().opened.len(), 2);
    assert_eq!(s.state(), SessionState::Playing);
  }

  #[tokio::test(start_paused = true)]
  async fn removing_all_folders_stops_playback() {
    let (mut s, lib) = session(Config { folders: vec![PathBuf::from("/a")], ..random_clips() }, &[("x.mp4", Some(1000))]);
    s.start_playlist(lib).await;
    assert_eq!(s.state(), SessionState::Playing);

    let new = Config { folders: Vec::new(), ..s.config().clone() };
    let outcome = s.apply_settings(new).await.unwrap();

    assert_eq!(outcome, SettingsOutcome::Restart);
    assert_eq!(s.state(), SessionState::Idle(IdleReason::NoMedia));
    assert!(s.library().is_empty());
    assert!(s.advance_deadline().is_none());
  }

  #[tokio::test(start_paused = true)]
  async fn unchanged_empty_settings_show_banner_without_touching_playback() {
    let (mut s, lib) = session(Config { folders: Vec::new(), ..random_clips() }, &[("x.mp4", Some(1000))]);
    s.start_playlist(lib).await;
    let opened = s.engine().opened.len();

    let outcome = s.apply_settings(s.config().clone()).await.unwrap();
    assert_eq!(outcome, SettingsOutcome::Unchanged { show_no_media: true });
    assert_eq!(s.state(), SessionState::Playing);
    assert_eq!(s.banner(), Some(Banner::NoMedia));
    assert_eq!(s.engine().opened.len(), opened);
  }

  #[tokio::test(start_paused = true)]
  async fn volume_is_clamped_and_mute_toggles() {
    let (mut s, _) = session(random_clips(), &[]);
    assert_eq!(s.set_volume(150).await.unwrap(), 100);
    assert_eq!(s.engine().volume, 100);
    assert_eq!(s.config().volume, 100);

    assert!(s.toggle_mute().await.unwrap());
    assert!(s.engine().muted);
    assert!(s.config().muted);
    assert!(!s.toggle_mute().await.unwrap());
  }

  #[tokio::test(start_paused = true)]
  async fn time_mode_only_toggles_in_normal_mode() {
    let (mut s, _) = session(random_clips(), &[]);
    s.toggle_time_mode();
    assert_eq!(s.view().time_mode, TimeDisplayMode::Remaining);

    let (mut s, _) = session(normal_mode(), &[]);
    s.toggle_time_mode();
    assert_eq!(s.view().time_mode, TimeDisplayMode::Elapsed);
  }

  #[tokio::test(start_paused = true)]
  async fn fullscreen_has_no_playback_effect() {
    let (mut s, lib) = session(random_clips(), &[("long.mp4", Some(1000))]);
    s.start_playlist(lib).await;
    let deadline = s.advance_deadline();

    s.toggle_fullscreen().await.unwrap();
    assert!(s.engine().fullscreen);
    assert_eq!(s.state(), SessionState::Playing);
    assert_eq!(s.advance_deadline(), deadline);
  }
}
