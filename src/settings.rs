use crate::config::Config;

/// What the session must do after the settings editor saved a new config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsOutcome {
  /// Rescan and restart the playlist.
  Restart,
  /// Leave playback alone. `show_no_media` asks the UI to surface the empty-folders banner.
  Unchanged { show_no_media: bool },
}

pub fn reconcile(old: &Config, new: &Config) -> SettingsOutcome {
  // Removing every folder always restarts so that playback stops.
  if !old.folders.is_empty() && new.folders.is_empty() {
    return SettingsOutcome::Restart;
  }
  if old != new {
    return SettingsOutcome::Restart;
  }
  SettingsOutcome::Unchanged { show_no_media: new.folders.is_empty() }
}
