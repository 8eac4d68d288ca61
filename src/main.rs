mod app;
mod config;
mod constants;
mod display;
mod engine;
mod form;
mod input;
mod library;
mod planner;
mod player;
mod session;
mod settings;
mod timer;
mod ui;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use directories::ProjectDirs;
use ratatui::{
  DefaultTerminal,
  crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
  },
};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::App;
use config::ConfigStore;
use constants::constants;
use engine::EngineEvent;
use player::MpvPlayer;
use session::Session;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Preferences file (default: prefs.toml in the platform config dir)
  #[arg(short, long, value_name = "PATH")]
  config: Option<PathBuf>,

  /// Log at debug level, including the clip countdown
  #[arg(long)]
  debug: bool,

  /// Add a folder to search for media for this run (repeatable)
  #[arg(short, long = "folder", value_name = "DIR")]
  folders: Vec<PathBuf>,

  /// Print shell completions and exit
  #[arg(long, value_name = "SHELL")]
  completions: Option<clap_complete::Shell>,
}

// --- Logging ---

/// Log to a daily file in the data dir; the terminal belongs to the UI. `CLIPSHUFFLE_LOG`
/// overrides the filter.
fn init_logging(debug: bool) -> Result<Option<WorkerGuard>> {
  let Some(dirs) = ProjectDirs::from("", "", &constants().app_name) else { return Ok(None) };
  let log_dir = dirs.data_dir().join("logs");
  std::fs::create_dir_all(&log_dir).with_context(|| format!("Failed to create log dir {}", log_dir.display()))?;

  let appender = tracing_appender::rolling::daily(&log_dir, "clipshuffle.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  let default_level = if debug { "clipshuffle=debug" } else { "clipshuffle=info" };
  let filter = EnvFilter::try_from_env("CLIPSHUFFLE_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

  tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
  Ok(Some(guard))
}

// --- Terminal input ---

/// Read terminal events on a plain thread and forward them to the control loop.
fn spawn_input_reader() -> mpsc::UnboundedReceiver<Event> {
  let (tx, rx) = mpsc::unbounded_channel();
  std::thread::spawn(move || {
    loop {
      match event::read() {
        Ok(ev) => {
          if tx.send(ev).is_err() {
            break;
          }
        }
        Err(e) => {
          warn!(err = %e, "input: failed to read terminal event");
          break;
        }
      }
    }
  });
  rx
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(shell) = args.completions {
    clap_complete::generate(shell, &mut Args::command(), "clipshuffle", &mut std::io::stdout());
    return Ok(());
  }

  let _log_guard = init_logging(args.debug)?;

  let store = ConfigStore::resolve(args.config);
  let mut config = store.load();
  // Command-line folders apply to this run; they reach disk with the next save.
  for folder in args.folders {
    config.add_folder(folder);
  }
  info!(
    config = ?store.path().map(|p| p.display().to_string()),
    folders = config.folders.len(),
    "clipshuffle starting"
  );

  let (player, engine_rx) = MpvPlayer::spawn().await.context("Failed to start the media engine")?;
  let app = App::new(Session::new(player, config), store);

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  execute!(std::io::stdout(), EnableMouseCapture).context("Failed to enable mouse capture")?;
  let result = run(&mut terminal, app, engine_rx).await;
  let _ = execute!(std::io::stdout(), DisableMouseCapture);
  ratatui::restore();
  result
}

async fn run(
  terminal: &mut DefaultTerminal,
  mut app: App<MpvPlayer>,
  mut engine_rx: mpsc::UnboundedReceiver<EngineEvent>,
) -> Result<()> {
  let mut terminal_rx = spawn_input_reader();

  if let Err(e) = app.session.apply_audio_settings().await {
    warn!(err = %format!("{:#}", e), "app: failed to apply audio settings");
  }
  if let Err(e) = app.session.restart().await {
    app.set_error(format!("{:#}", e));
  }

  let mut ticker = tokio::time::interval(constants().tick_interval());
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

  loop {
    terminal.draw(|frame| ui::ui(frame, &mut app))?;

    let deadline = app.session.advance_deadline();
    tokio::select! {
      _ = ticker.tick() => app.on_tick().await,
      _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
        app.on_advance_timer().await;
      }
      Some(event) = engine_rx.recv() => app.on_engine_event(event).await,
      Some(event) = terminal_rx.recv() => match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => input::handle_key_event(&mut app, key).await,
        Event::Mouse(mouse) => input::handle_mouse_event(&mut app, mouse).await,
        _ => {}
      },
    }

    if app.should_quit {
      break;
    }
  }

  info!("clipshuffle shutting down");
  if let Err(e) = app.session.engine_mut().shutdown().await {
    warn!(err = %format!("{:#}", e), "app: player shutdown failed");
  }
  Ok(())
}
