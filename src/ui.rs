use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, BorderType, LineGauge, List, ListItem, ListState, Padding, Paragraph, Wrap},
};
use std::path::Path;

use crate::app::{App, AppMode};
use crate::display::{PlayIcon, format_duration};
use crate::engine::MediaEngine;
use crate::form::{FormRow, SettingsForm};
use crate::session::SessionState;

struct Palette {
  bg: Color,
  fg: Color,
  accent: Color,
  muted: Color,
  border: Color,
  status: Color,
  error: Color,
  key_fg: Color,
  key_bg: Color,
  highlight_fg: Color,
  highlight_bg: Color,
}

const PALETTE: Palette = Palette {
  bg: Color::Rgb(24, 24, 32),
  fg: Color::Rgb(220, 220, 228),
  accent: Color::Rgb(242, 140, 168),
  muted: Color::Rgb(128, 128, 148),
  border: Color::Rgb(70, 70, 92),
  status: Color::Rgb(140, 200, 170),
  error: Color::Rgb(240, 110, 100),
  key_fg: Color::Rgb(24, 24, 32),
  key_bg: Color::Rgb(150, 150, 175),
  highlight_fg: Color::Rgb(24, 24, 32),
  highlight_bg: Color::Rgb(242, 140, 168),
};

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

fn file_name(path: &Path) -> String {
  path.file_name().map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn rounded_block(title: &str, focused: bool) -> Block<'_> {
  let color = if focused { PALETTE.accent } else { PALETTE.border };
  Block::bordered()
    .title(title)
    .title_style(Style::default().fg(PALETTE.accent).add_modifier(Modifier::BOLD))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(color))
    .padding(Padding::horizontal(1))
}

// --- UI Rendering ---

pub fn ui<E: MediaEngine>(frame: &mut Frame, app: &mut App<E>) {
  frame.render_widget(Block::default().style(Style::default().bg(PALETTE.bg)), frame.area());

  let [header_area, main_area, time_area, status_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(5),
    Constraint::Length(1),
    Constraint::Length(1),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  let current = app.session.plan().map(|plan| file_name(&plan.source_path));
  render_header(frame, current.as_deref(), header_area);
  match (&app.mode, &app.settings) {
    (AppMode::Settings, Some(form)) => render_settings(frame, form, main_area),
    _ => render_now_playing(frame, app, main_area),
  }
  render_time_row(frame, app, time_area);
  render_status(frame, app, status_area);
  render_footer(frame, app, footer_area);
}

fn render_header(frame: &mut Frame, current: Option<&str>, area: Rect) {
  let title_style = Style::default().fg(PALETTE.accent).add_modifier(Modifier::BOLD);
  let mut spans = vec![Span::styled(" ▶ clipshuffle ", title_style)];
  if let Some(name) = current {
    let max = (area.width as usize).saturating_sub(30);
    spans.push(Span::styled(format!(" {}", truncate_str(name, max)), Style::default().fg(PALETTE.fg)));
  }
  frame.render_widget(Line::from(spans), area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(PALETTE.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

fn render_now_playing<E: MediaEngine>(frame: &mut Frame, app: &App<E>, area: Rect) {
  let block = rounded_block(" Now Playing ", false);

  if let Some(banner) = app.session.banner() {
    let text = vec![
      Line::from(""),
      Line::from(Span::styled(banner.message(), Style::default().fg(PALETTE.accent).add_modifier(Modifier::BOLD))),
    ];
    let paragraph = Paragraph::new(text).alignment(Alignment::Center).wrap(Wrap { trim: true }).block(block);
    frame.render_widget(paragraph, area);
    return;
  }

  let Some(plan) = app.session.plan() else {
    let label = if app.session.state() == SessionState::Loading { "Loading…" } else { "" };
    let paragraph = Paragraph::new(Span::styled(label, Style::default().fg(PALETTE.muted))).block(block);
    frame.render_widget(paragraph, area);
    return;
  };

  let inner_w = area.width.saturating_sub(4) as usize;
  let field = |label: &'static str, value: String| {
    let value_w = inner_w.saturating_sub(label.len());
    Line::from(vec![
      Span::styled(label, Style::default().fg(PALETTE.muted)),
      Span::styled(truncate_str(&value, value_w), Style::default().fg(PALETTE.fg)),
    ])
  };

  let config = app.session.config();
  let mode = match (config.random_start, config.random_length) {
    (true, true) => "random clips",
    (true, false) => "random start",
    (false, true) => "random length",
    (false, false) => "whole files",
  };
  let folder = plan.source_path.parent().map(|p| p.display().to_string()).unwrap_or_default();

  let lines = vec![
    Line::from(""),
    Line::from(Span::styled(
      truncate_str(&file_name(&plan.source_path), inner_w),
      Style::default().fg(PALETTE.fg).add_modifier(Modifier::BOLD),
    )),
    Line::from(""),
    field("Folder    ", folder),
    field("Length    ", plan.total_duration.map_or_else(|| "unknown".to_string(), format_duration)),
    field("Start     ", format_duration(plan.start_offset)),
    field("Clip      ", plan.effective_clip_duration.map_or_else(|| "to end".to_string(), format_duration)),
    field("Mode      ", mode.to_string()),
    field("Library   ", format!("{} files", app.session.library().len())),
  ];
  frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn settings_row_line(form: &SettingsForm, row: FormRow) -> Line<'static> {
  let muted = Style::default().fg(PALETTE.muted);
  let fg = Style::default().fg(PALETTE.fg);
  let check = |on: bool| if on { "[x] " } else { "[ ] " };
  match row {
    FormRow::Folder(idx) => {
      let path = form.draft.folders.get(idx).map(|p| p.display().to_string()).unwrap_or_default();
      Line::from(vec![Span::styled("Folder    ", muted), Span::styled(path, fg)])
    }
    FormRow::AddFolder => Line::from(Span::styled("+ Add folder…", Style::default().fg(PALETTE.accent))),
    FormRow::MinSeconds => Line::from(vec![
      Span::styled("Min seconds  ", muted),
      Span::styled(format!("◀ {} ▶", form.draft.min_clip_seconds), fg),
    ]),
    FormRow::MaxSeconds => Line::from(vec![
      Span::styled("Max seconds  ", muted),
      Span::styled(format!("◀ {} ▶", form.draft.max_clip_seconds), fg),
    ]),
    FormRow::RandomStart => Line::from(Span::styled(format!("{}Random start", check(form.draft.random_start)), fg)),
    FormRow::RandomLength => Line::from(Span::styled(format!("{}Random length", check(form.draft.random_length)), fg)),
  }
}

fn render_settings(frame: &mut Frame, form: &SettingsForm, area: Rect) {
  let input_height = if form.folder_input.is_some() { 3 } else { 0 };
  let [list_area, input_area] =
    Layout::vertical([Constraint::Min(3), Constraint::Length(input_height)]).areas(area);

  let items: Vec<ListItem> = form.rows().into_iter().map(|row| ListItem::new(settings_row_line(form, row))).collect();
  let list = List::new(items)
    .block(rounded_block(" Settings ", form.folder_input.is_none()))
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(PALETTE.highlight_fg).bg(PALETTE.highlight_bg).add_modifier(Modifier::BOLD));
  let mut state = ListState::default().with_selected(Some(form.selected));
  frame.render_stateful_widget(list, list_area, &mut state);

  let Some(input) = &form.folder_input else { return };
  let inner_w = input_area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&input.text, input.cursor);
  let scroll = (cursor_col + 1).saturating_sub(inner_w);

  let visible: String = input
    .text
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= scroll)
    .take_while(|(start, _, _)| *start < scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let paragraph =
    Paragraph::new(visible).style(Style::default().fg(PALETTE.fg)).block(rounded_block(" Folder path ", true));
  frame.render_widget(paragraph, input_area);
  let cursor_x = input_area.x + 2 + cursor_col.saturating_sub(scroll) as u16;
  frame.set_cursor_position((cursor_x, input_area.y + 1));
}

fn render_time_row<E: MediaEngine>(frame: &mut Frame, app: &mut App<E>, area: Rect) {
  let display = &app.display;
  let icon = match display.play_icon {
    PlayIcon::Play => " ▶ ",
    PlayIcon::Pause => " ⏸ ",
  };
  let left = display.countdown_label.clone().unwrap_or_default();
  let right = display.time_label.clone().unwrap_or_default();
  let left_w = (icon.chars().count() + left.chars().count() + 1) as u16;
  let right_w = (right.chars().count() + 2) as u16;

  let [left_area, gauge_area, right_area] =
    Layout::horizontal([Constraint::Length(left_w), Constraint::Min(1), Constraint::Length(right_w)]).areas(area);

  frame.render_widget(
    Line::from(vec![
      Span::styled(icon, Style::default().fg(PALETTE.accent)),
      Span::styled(left, Style::default().fg(PALETTE.fg)),
    ]),
    left_area,
  );

  let filled = if display.seek_interactive { PALETTE.accent } else { PALETTE.muted };
  let gauge = LineGauge::default()
    .ratio(app.seek_ratio().clamp(0.0, 1.0))
    .label("")
    .filled_style(Style::default().fg(filled))
    .unfilled_style(Style::default().fg(PALETTE.border));
  frame.render_widget(gauge, gauge_area);
  app.seek_area = Some(gauge_area);

  app.time_label_area = (!right.is_empty()).then_some(right_area);
  frame.render_widget(Line::from(Span::styled(format!(" {}", right), Style::default().fg(PALETTE.fg))), right_area);
}

fn render_status<E: MediaEngine>(frame: &mut Frame, app: &App<E>, area: Rect) {
  let (text, style) = if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(PALETTE.error))
  } else if let Some(msg) = &app.status_message {
    (format!(" ♪ {}", msg), Style::default().fg(PALETTE.status))
  } else {
    let state = match app.session.state() {
      SessionState::Playing => "Playing",
      SessionState::Paused => "Paused",
      SessionState::Loading => "Loading…",
      SessionState::Idle(_) => "Idle",
    };
    (format!(" {}", state), Style::default().fg(PALETTE.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);

  let config = app.session.config();
  let volume = if config.muted { "muted ".to_string() } else { format!("vol {}% ", config.volume) };
  let right = Line::from(Span::styled(&volume, Style::default().fg(PALETTE.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(volume.len() as u16), width: volume.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

fn render_footer<E: MediaEngine>(frame: &mut Frame, app: &App<E>, area: Rect) {
  let editing_folder = app.settings.as_ref().is_some_and(|f| f.folder_input.is_some());
  let keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Playback => {
      let mut k = vec![("Space", "Next"), ("p", "Pause")];
      if !app.session.config().random_length {
        k.push(("←/→", "Seek"));
        k.push(("t", "Time"));
      }
      k.extend([("m", "Mute"), ("+/-", "Volume"), ("f", "Fullscreen"), ("s", "Settings"), ("q", "Quit")]);
      k
    }
    AppMode::Settings if editing_folder => vec![("Enter", "Add"), ("Esc", "Back")],
    AppMode::Settings => vec![
      ("j/k", "Navigate"),
      ("←/→", "Adjust"),
      ("Enter", "Toggle"),
      ("d", "Remove"),
      ("^s", "Save"),
      ("Esc", "Cancel"),
    ],
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(PALETTE.key_fg).bg(PALETTE.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(PALETTE.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);
}
