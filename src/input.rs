use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, AppMode};
use crate::constants::constants;
use crate::engine::MediaEngine;

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

/// Seek ratio for a mouse column inside the seek bar.
fn column_ratio(column: u16, area: Rect) -> f64 {
  let span = area.width.saturating_sub(1).max(1);
  f64::from(column.saturating_sub(area.x).min(span)) / f64::from(span)
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
  rect.width > 0
    && rect.height > 0
    && x >= rect.x
    && x < rect.x.saturating_add(rect.width)
    && y >= rect.y
    && y < rect.y.saturating_add(rect.height)
}

// --- Event Handling ---

pub async fn handle_key_event<E: MediaEngine>(app: &mut App<E>, key: KeyEvent) {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return;
  }

  match app.mode {
    AppMode::Playback => handle_playback_key(app, key).await,
    AppMode::Settings => handle_settings_key(app, key).await,
  }
}

async fn handle_playback_key<E: MediaEngine>(app: &mut App<E>, key: KeyEvent) {
  let step = constants().seek_step_ratio;
  let volume_step = i16::from(constants().volume_step);
  match key.code {
    KeyCode::Char(' ') | KeyCode::Char('n') => app.next_clip().await,
    KeyCode::Char('p') | KeyCode::Enter => app.toggle_pause().await,
    KeyCode::Left => app.seek_by(-step).await,
    KeyCode::Right => app.seek_by(step).await,
    KeyCode::Char(c @ '0'..='9') => {
      let tenth = f64::from(c.to_digit(10).unwrap_or(0));
      app.seek_to(tenth / 10.0).await;
    }
    KeyCode::Char('t') => app.toggle_time_mode(),
    KeyCode::Char('m') => app.toggle_mute().await,
    KeyCode::Char('+') | KeyCode::Char('=') => app.change_volume(volume_step).await,
    KeyCode::Char('-') => app.change_volume(-volume_step).await,
    KeyCode::Char('f') => app.toggle_fullscreen().await,
    KeyCode::Char('s') => app.open_settings(),
    KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
    _ => {}
  }
}

async fn handle_settings_key<E: MediaEngine>(app: &mut App<E>, key: KeyEvent) {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('s') {
    app.save_settings().await;
    return;
  }

  let Some(form) = app.settings.as_mut() else {
    app.mode = AppMode::Playback;
    return;
  };

  if let Some(input) = form.folder_input.as_mut() {
    match key.code {
      KeyCode::Enter => {
        if let Err(e) = form.commit_folder_input() {
          app.set_error(format!("{:#}", e));
        } else {
          app.clear_error();
        }
      }
      KeyCode::Esc => form.cancel_folder_input(),
      KeyCode::Char(c) => input.insert(c),
      KeyCode::Backspace => input.backspace(),
      KeyCode::Delete => input.delete(),
      KeyCode::Left => input.left(),
      KeyCode::Right => input.right(),
      KeyCode::Home => input.home(),
      KeyCode::End => input.end(),
      _ => {}
    }
    return;
  }

  let coarse = key.modifiers.contains(KeyModifiers::SHIFT);
  match key.code {
    KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => form.move_down(),
    KeyCode::Up | KeyCode::Char('k') | KeyCode::BackTab => form.move_up(),
    KeyCode::Left | KeyCode::Char('h') => form.adjust(if coarse { -10 } else { -1 }),
    KeyCode::Right | KeyCode::Char('l') => form.adjust(if coarse { 10 } else { 1 }),
    KeyCode::Enter | KeyCode::Char(' ') => form.activate(),
    KeyCode::Char('d') | KeyCode::Delete => form.remove_selected_folder(),
    KeyCode::Esc => app.cancel_settings(),
    _ => {}
  }
}

/// Press, drag and release on the seek bar; a click on the clock flips remaining/elapsed.
/// Mouse input is ignored outside playback.
pub async fn handle_mouse_event<E: MediaEngine>(app: &mut App<E>, mouse: MouseEvent) {
  if app.mode != AppMode::Playback {
    return;
  }
  if let MouseEventKind::Down(MouseButton::Left) = mouse.kind
    && let Some(label) = app.time_label_area
    && point_in_rect(mouse.column, mouse.row, label)
  {
    app.toggle_time_mode();
    return;
  }
  let Some(area) = app.seek_area else { return };
  match mouse.kind {
    MouseEventKind::Down(MouseButton::Left) if point_in_rect(mouse.column, mouse.row, area) => {
      app.begin_drag(column_ratio(mouse.column, area));
    }
    MouseEventKind::Drag(MouseButton::Left) => app.drag_to(column_ratio(mouse.column, area)),
    MouseEventKind::Up(MouseButton::Left) => app.end_drag().await,
    _ => {}
  }
}
