//! Settings editor model: a draft `Config` plus cursor state. Key handling lives in `input.rs`.

use anyhow::{Result, bail};
use directories::BaseDirs;
use std::path::PathBuf;

use crate::config::{CLIP_SECONDS_MAX, CLIP_SECONDS_MIN, Config};
use crate::input::char_to_byte_index;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormRow {
  Folder(usize),
  AddFolder,
  MinSeconds,
  MaxSeconds,
  RandomStart,
  RandomLength,
}

/// Single-line text input with a char-indexed cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
  pub text: String,
  pub cursor: usize,
}

impl TextInput {
  pub fn insert(&mut self, c: char) {
    let byte_idx = char_to_byte_index(&self.text, self.cursor);
    self.text.insert(byte_idx, c);
    self.cursor += 1;
  }

  pub fn backspace(&mut self) {
    if self.cursor > 0 {
      self.cursor -= 1;
      let byte_idx = char_to_byte_index(&self.text, self.cursor);
      self.text.remove(byte_idx);
    }
  }

  pub fn delete(&mut self) {
    if self.cursor < self.text.chars().count() {
      let byte_idx = char_to_byte_index(&self.text, self.cursor);
      self.text.remove(byte_idx);
    }
  }

  pub fn left(&mut self) {
    self.cursor = self.cursor.saturating_sub(1);
  }

  pub fn right(&mut self) {
    if self.cursor < self.text.chars().count() {
      self.cursor += 1;
    }
  }

  pub fn home(&mut self) {
    self.cursor = 0;
  }

  pub fn end(&mut self) {
    self.cursor = self.text.chars().count();
  }
}

/// Expand a leading `~` to the home directory.
fn expand_home(raw: &str) -> PathBuf {
  if let Some(rest) = raw.strip_prefix("~")
    && (rest.is_empty() || rest.starts_with('/'))
    && let Some(dirs) = BaseDirs::new()
  {
    return dirs.home_dir().join(rest.trim_start_matches('/'));
  }
  PathBuf::from(raw)
}

#[derive(Debug, Clone)]
pub struct SettingsForm {
  pub draft: Config,
  pub selected: usize,
  /// Present while the user is typing a new folder path.
  pub folder_input: Option<TextInput>,
}

impl SettingsForm {
  pub fn new(draft: Config) -> Self {
    Self { draft, selected: 0, folder_input: None }
  }

  pub fn rows(&self) -> Vec<FormRow> {
    let mut rows: Vec<FormRow> = (0..self.draft.folders.len()).map(FormRow::Folder).collect();
    rows.extend([
      FormRow::AddFolder,
      FormRow::MinSeconds,
      FormRow::MaxSeconds,
      FormRow::RandomStart,
      FormRow::RandomLength,
    ]);
    rows
  }

  pub fn selected_row(&self) -> FormRow {
    let rows = self.rows();
    rows.get(self.selected).copied().unwrap_or(FormRow::AddFolder)
  }

  pub fn move_down(&mut self) {
    let count = self.rows().len();
    self.selected = (self.selected + 1) % count;
  }

  pub fn move_up(&mut self) {
    let count = self.rows().len();
    self.selected = if self.selected == 0 { count.saturating_sub(1) } else { self.selected - 1 };
  }

  /// Enter on the selected row: start typing a folder, or flip a toggle.
  pub fn activate(&mut self) {
    match self.selected_row() {
      FormRow::AddFolder => self.folder_input = Some(TextInput::default()),
      FormRow::RandomStart => self.draft.random_start = !self.draft.random_start,
      FormRow::RandomLength => self.draft.random_length = !self.draft.random_length,
      FormRow::Folder(_) | FormRow::MinSeconds | FormRow::MaxSeconds => {}
    }
  }

  /// Left/right on the selected row: step a clip bound, or flip a toggle.
  pub fn adjust(&mut self, delta: i64) {
    let step = |value: u32| -> u32 {
      (i64::from(value) + delta).clamp(i64::from(CLIP_SECONDS_MIN), i64::from(CLIP_SECONDS_MAX)) as u32
    };
    match self.selected_row() {
      FormRow::MinSeconds => self.draft.min_clip_seconds = step(self.draft.min_clip_seconds),
      FormRow::MaxSeconds => self.draft.max_clip_seconds = step(self.draft.max_clip_seconds),
      FormRow::RandomStart | FormRow::RandomLength => self.activate(),
      FormRow::Folder(_) | FormRow::AddFolder => {}
    }
  }

  pub fn remove_selected_folder(&mut self) {
    if let FormRow::Folder(idx) = self.selected_row() {
      self.draft.folders.remove(idx);
      let count = self.rows().len();
      self.selected = self.selected.min(count.saturating_sub(1));
    }
  }

  /// Add the typed folder to the draft. The input stays open on error.
  pub fn commit_folder_input(&mut self) -> Result<()> {
    let Some(input) = &self.folder_input else { return Ok(()) };
    let raw = input.text.trim();
    if raw.is_empty() {
      self.folder_input = None;
      return Ok(());
    }
    let folder = expand_home(raw);
    if !folder.is_dir() {
      bail!("Not a directory: {}", folder.display());
    }
    if !self.draft.add_folder(folder.clone()) {
      bail!("Already added: {}", folder.display());
    }
    self.folder_input = None;
    Ok(())
  }

  pub fn cancel_folder_input(&mut self) {
    self.folder_input = None;
  }

  /// The config to save, if it passes validation.
  pub fn finish(&self) -> Result<Config> {
    self.draft.validate()?;
    Ok(self.draft.clone())
  }
}
