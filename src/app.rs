use ratatui::layout::Rect;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{ConfigStore, VOLUME_MAX};
use crate::constants::constants;
use crate::display::DisplayState;
use crate::engine::{EngineEvent, MediaEngine};
use crate::form::SettingsForm;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  Playback,
  Settings,
}

pub struct App<E: MediaEngine> {
  pub session: Session<E>,
  store: ConfigStore,
  pub mode: AppMode,
  /// The open settings editor. `Some` exactly while `mode == Settings`.
  pub settings: Option<SettingsForm>,
  pub display: DisplayState,
  /// Last seek bar value, kept while the session leaves the bar alone.
  pub seek_value: u16,
  /// Ratio under the mouse while the user drags the seek bar.
  pub drag_ratio: Option<f64>,
  /// Where the seek bar was last drawn, for mouse hit-testing.
  pub seek_area: Option<Rect>,
  /// Where the clock label was last drawn; a click there flips remaining/elapsed.
  pub time_label_area: Option<Rect>,
  pub last_error: Option<String>,
  pub status_message: Option<String>,
  pub should_quit: bool,
  /// When the last error was set, used for auto-dismiss after 5 seconds.
  error_time: Option<Instant>,
}

impl<E: MediaEngine> App<E> {
  pub fn new(session: Session<E>, store: ConfigStore) -> Self {
    Self {
      session,
      store,
      mode: AppMode::Playback,
      settings: None,
      display: DisplayState::default(),
      seek_value: 0,
      drag_ratio: None,
      seek_area: None,
      time_label_area: None,
      last_error: None,
      status_message: None,
      should_quit: false,
      error_time: None,
    }
  }

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages after 5 seconds.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(5)
    {
      self.last_error = None;
      self.error_time = None;
    }
  }

  /// Seek bar position in `0.0..=1.0`, preferring an in-progress drag.
  pub fn seek_ratio(&self) -> f64 {
    self.drag_ratio.unwrap_or_else(|| f64::from(self.seek_value) / f64::from(constants().seek_resolution.max(1)))
  }

  /// Write the current config to disk, surfacing failures in the status line.
  fn persist(&mut self) {
    if let Err(e) = self.store.save(self.session.config()) {
      warn!(err = %format!("{:#}", e), "app: failed to save config");
      self.set_error(format!("Failed to save settings: {:#}", e));
    }
  }

  // --- Control loop events ---

  pub async fn on_tick(&mut self) {
    self.expire_error();
    match self.session.tick(constants().tick_interval()).await {
      Ok(display) => {
        if let Some(value) = display.seek_value {
          self.seek_value = value;
        }
        self.display = display;
      }
      Err(e) => {
        debug!(err = %format!("{:#}", e), "app: tick failed");
      }
    }
  }

  pub async fn on_engine_event(&mut self, event: EngineEvent) {
    match event {
      EngineEvent::EndOfMedia { generation } => self.session.on_end_of_media(generation).await,
      EngineEvent::OpenFailed { generation } => self.session.on_open_failed(generation).await,
      EngineEvent::Shutdown => {
        info!("app: player window closed, quitting");
        self.should_quit = true;
      }
    }
  }

  pub async fn on_advance_timer(&mut self) {
    self.session.on_advance_timer().await;
  }

  // --- Playback intents ---

  pub async fn toggle_pause(&mut self) {
    if let Err(e) = self.session.toggle_pause().await {
      self.set_error(format!("Pause error: {:#}", e));
    }
  }

  pub async fn next_clip(&mut self) {
    self.clear_error();
    self.session.advance().await;
  }

  pub async fn seek_to(&mut self, ratio: f64) {
    let ratio = ratio.clamp(0.0, 1.0);
    if self.session.config().random_length {
      self.status_message = Some("Seeking is off while clip length is random.".to_string());
      return;
    }
    match self.session.seek_to_ratio(ratio).await {
      Ok(()) => self.seek_value = (ratio * f64::from(constants().seek_resolution)).round() as u16,
      Err(e) => self.set_error(format!("Seek failed: {:#}", e)),
    }
  }

  pub async fn seek_by(&mut self, delta: f64) {
    let target = self.seek_ratio() + delta;
    self.seek_to(target).await;
  }

  /// Mouse press on the seek bar. The bar is only an indicator in random-length mode.
  pub fn begin_drag(&mut self, ratio: f64) {
    if self.session.config().random_length {
      return;
    }
    self.session.set_user_seeking(true);
    self.drag_ratio = Some(ratio.clamp(0.0, 1.0));
  }

  pub fn drag_to(&mut self, ratio: f64) {
    if self.drag_ratio.is_some() {
      self.drag_ratio = Some(ratio.clamp(0.0, 1.0));
    }
  }

  pub async fn end_drag(&mut self) {
    let Some(ratio) = self.drag_ratio.take() else { return };
    self.session.set_user_seeking(false);
    self.seek_to(ratio).await;
  }

  pub async fn change_volume(&mut self, delta: i16) {
    let target = (i16::from(self.session.config().volume) + delta).clamp(0, i16::from(VOLUME_MAX)) as u8;
    match self.session.set_volume(target).await {
      Ok(volume) => {
        self.status_message = Some(format!("Volume {}%", volume));
        self.persist();
      }
      Err(e) => self.set_error(format!("{:#}", e)),
    }
  }

  pub async fn toggle_mute(&mut self) {
    match self.session.toggle_mute().await {
      Ok(muted) => {
        self.status_message = Some(if muted { "Muted".to_string() } else { "Unmuted".to_string() });
        self.persist();
      }
      Err(e) => self.set_error(format!("{:#}", e)),
    }
  }

  pub async fn toggle_fullscreen(&mut self) {
    if let Err(e) = self.session.toggle_fullscreen().await {
      self.set_error(format!("{:#}", e));
    }
  }

  pub fn toggle_time_mode(&mut self) {
    self.session.toggle_time_mode();
  }

  // --- Settings editor ---

  pub fn open_settings(&mut self) {
    self.clear_error();
    self.status_message = None;
    self.settings = Some(SettingsForm::new(self.session.config().clone()));
    self.mode = AppMode::Settings;
  }

  /// Validate the draft, persist it and hand it to the session. The editor stays open on
  /// validation errors.
  pub async fn save_settings(&mut self) {
    let Some(form) = &self.settings else { return };
    let config = match form.finish() {
      Ok(config) => config,
      Err(e) => {
        self.set_error(format!("{:#}", e));
        return;
      }
    };

    self.settings = None;
    self.mode = AppMode::Playback;
    self.clear_error();

    if let Err(e) = self.store.save(&config) {
      warn!(err = %format!("{:#}", e), "app: failed to save config");
      self.set_error(format!("Failed to save settings: {:#}", e));
    }
    match self.session.apply_settings(config).await {
      Ok(outcome) => {
        debug!(?outcome, "app: settings applied");
        self.status_message = Some("Settings saved.".to_string());
      }
      Err(e) => self.set_error(format!("Failed to apply settings: {:#}", e)),
    }
  }

  pub fn cancel_settings(&mut self) {
    self.settings = None;
    self.mode = AppMode::Playback;
    if self.session.config().folders.is_empty() || self.session.library().is_empty() {
      self.session.show_no_media_banner();
    }
  }
}
