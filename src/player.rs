//! `MpvPlayer`: drives an `mpv` child process over its JSON IPC socket.
//!
//! Requests carry a `request_id`; a reader task matches replies to waiting callers and
//! forwards `end-file`/`shutdown` events to the control loop over a channel. mpv's own key
//! and mouse bindings are off, so every transport change goes through the session.

use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::{
  io::{AsyncBufReadExt, AsyncWriteExt, BufReader as TokioBufReader},
  net::{UnixStream, unix::OwnedReadHalf, unix::OwnedWriteHalf},
  process::{Child as TokioChild, Command},
  sync::{mpsc, oneshot},
  task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::constants::constants;
use crate::engine::{EngineEvent, MediaEngine};

/// mpv's answer to one request.
#[derive(Debug, Clone, PartialEq)]
struct Reply {
  error: String,
  data: Value,
}

impl Reply {
  fn is_success(&self) -> bool {
    self.error == "success"
  }

  fn is_unavailable(&self) -> bool {
    self.error == "property unavailable"
  }
}

/// A caller waiting on a reply. `generation` is set for `loadfile` and becomes current when
/// the reply is read, so events that follow it in the stream carry the new token.
struct Waiter {
  reply: oneshot::Sender<Reply>,
  generation: Option<u64>,
}

type PendingReplies = Arc<StdMutex<HashMap<u64, Waiter>>>;

/// One line read from the IPC socket, classified.
#[derive(Debug, Clone, PartialEq)]
enum IpcMessage {
  Reply { request_id: u64, reply: Reply },
  EndOfFile,
  LoadFailed,
  Shutdown,
  Other,
}

fn parse_ipc_line(line: &str) -> IpcMessage {
  let Ok(val) = serde_json::from_str::<Value>(line) else {
    return IpcMessage::Other;
  };
  if let Some(request_id) = val.get("request_id").and_then(Value::as_u64) {
    let error = val.get("error").and_then(Value::as_str).unwrap_or("unknown").to_string();
    let data = val.get("data").cloned().unwrap_or(Value::Null);
    return IpcMessage::Reply { request_id, reply: Reply { error, data } };
  }
  match val.get("event").and_then(Value::as_str) {
    // "stop" is emitted when we replace the file ourselves and never advances.
    Some("end-file") => match val.get("reason").and_then(Value::as_str) {
      Some("eof") => IpcMessage::EndOfFile,
      Some("error") => IpcMessage::LoadFailed,
      _ => IpcMessage::Other,
    },
    Some("shutdown") => IpcMessage::Shutdown,
    _ => IpcMessage::Other,
  }
}

/// Command line for the mpv child. Built-in bindings, the on-screen controller and window
/// mouse input are disabled.
fn mpv_args(title: &str, socket: &str) -> Vec<String> {
  vec![
    "--idle=yes".to_string(),
    "--force-window=yes".to_string(),
    "--keep-open=no".to_string(),
    "--no-terminal".to_string(),
    "--no-input-default-bindings".to_string(),
    "--input-cursor=no".to_string(),
    "--osc=no".to_string(),
    format!("--title={}", title),
    format!("--input-ipc-server={}", socket),
  ]
}

/// The only window bindings left: closing the window or pressing `q` quits the app.
const QUIT_KEYS: [&str; 2] = ["CLOSE_WIN", "q"];

fn secs_to_duration(secs: f64) -> Option<Duration> {
  (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

pub struct MpvPlayer {
  process: TokioChild,
  writer: OwnedWriteHalf,
  pending: PendingReplies,
  next_request_id: u64,
  reader_handle: Option<JoinHandle<()>>,
  socket_path: PathBuf,
}

impl MpvPlayer {
  /// Spawn mpv idle with its own window and connect to its IPC socket.
  ///
  /// Failure here is fatal for the app: there is nothing to play with.
  pub async fn spawn() -> Result<(Self, mpsc::UnboundedReceiver<EngineEvent>)> {
    let c = constants();
    let socket_path = std::env::temp_dir().join(format!("{}-mpv-{}.sock", c.app_name, std::process::id()));
    let socket_path_str = socket_path.to_str().context("Temp dir path is not valid UTF-8")?.to_string();
    // Remove stale socket if it exists from a previous crash.
    let _ = std::fs::remove_file(&socket_path);

    let mut cmd = Command::new("mpv");
    cmd.args(mpv_args(&c.mpv_window_title, &socket_path_str));
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());
    cmd.kill_on_drop(true);

    let mut process = cmd.spawn().map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        anyhow!("mpv not found. Install it with: brew install mpv (macOS) or apt install mpv (Linux)")
      } else {
        anyhow!(e).context("Failed to spawn mpv process")
      }
    })?;

    let stream = connect_with_retry(&socket_path, &mut process).await?;
    let (read_half, writer) = stream.into_split();

    let pending: PendingReplies = Arc::new(StdMutex::new(HashMap::new()));
    let generation = Arc::new(AtomicU64::new(0));
    let (tx, rx) = mpsc::unbounded_channel();
    let reader_handle = tokio::spawn(read_loop(read_half, Arc::clone(&pending), generation, tx));

    info!(socket = %socket_path_str, "mpv: connected");
    let mut player = Self {
      process,
      writer,
      pending,
      next_request_id: 1,
      reader_handle: Some(reader_handle),
      socket_path,
    };
    for key in QUIT_KEYS {
      if let Err(e) = player.command(json!(["keybind", key, "quit"])).await {
        warn!(key, err = %format!("{:#}", e), "mpv: failed to bind quit key");
      }
    }
    Ok((player, rx))
  }

  async fn request(&mut self, command: Value) -> Result<Reply> {
    self.request_with_generation(command, None).await
  }

  async fn request_with_generation(&mut self, command: Value, generation: Option<u64>) -> Result<Reply> {
    let request_id = self.next_request_id;
    self.next_request_id += 1;

    let (tx, rx) = oneshot::channel();
    self
      .pending
      .lock()
      .map_err(|_| anyhow!("mpv reply table poisoned"))?
      .insert(request_id, Waiter { reply: tx, generation });

    let mut line = serde_json::to_string(&json!({ "command": command, "request_id": request_id }))
      .context("Failed to encode mpv command")?;
    line.push('\n');
    if let Err(e) = self.writer.write_all(line.as_bytes()).await {
      self.forget(request_id);
      return Err(anyhow!(e).context("Failed to send command to mpv IPC"));
    }

    match tokio::time::timeout(constants().ipc_timeout(), rx).await {
      Ok(Ok(reply)) => Ok(reply),
      Ok(Err(_)) => bail!("mpv IPC connection closed"),
      Err(_) => {
        self.forget(request_id);
        bail!("Timeout waiting for mpv IPC response")
      }
    }
  }

  fn forget(&self, request_id: u64) {
    if let Ok(mut pending) = self.pending.lock() {
      pending.remove(&request_id);
    }
  }

  async fn command(&mut self, command: Value) -> Result<()> {
    let reply = self.request(command.clone()).await?;
    if !reply.is_success() {
      bail!("mpv rejected {}: {}", command, reply.error);
    }
    Ok(())
  }

  async fn set_property(&mut self, name: &str, value: Value) -> Result<()> {
    self.command(json!(["set_property", name, value])).await
  }

  /// `Ok(None)` when mpv reports the property as unavailable (nothing loaded yet).
  async fn get_property(&mut self, name: &str) -> Result<Option<Value>> {
    let reply = self.request(json!(["get_property", name])).await?;
    if reply.is_unavailable() {
      return Ok(None);
    }
    if !reply.is_success() {
      bail!("mpv get_property {} failed: {}", name, reply.error);
    }
    Ok(Some(reply.data))
  }

  async fn get_bool(&mut self, name: &str) -> Result<Option<bool>> {
    Ok(self.get_property(name).await?.and_then(|v| v.as_bool()))
  }

  async fn get_seconds(&mut self, name: &str) -> Result<Option<Duration>> {
    Ok(self.get_property(name).await?.and_then(|v| v.as_f64()).and_then(secs_to_duration))
  }

  /// Ask mpv to quit, then make sure the process and socket are gone.
  pub async fn shutdown(&mut self) -> Result<()> {
    let _ = tokio::time::timeout(Duration::from_millis(500), self.command(json!(["quit"]))).await;

    if let Some(handle) = self.reader_handle.take() {
      handle.abort();
      let _ = handle.await;
    }
    if self.process.try_wait().ok().flatten().is_none() {
      self.process.kill().await.context("Failed to kill mpv process")?;
    }
    let _ = self.process.wait().await;
    let _ = std::fs::remove_file(&self.socket_path);
    info!("mpv: shut down");
    Ok(())
  }
}

async fn connect_with_retry(socket_path: &Path, process: &mut TokioChild) -> Result<UnixStream> {
  let c = constants();
  let delay = Duration::from_millis(c.ipc_connect_delay_ms);
  for attempt in 1..=c.ipc_connect_attempts {
    if let Some(status) = process.try_wait().context("Failed to poll mpv process")? {
      bail!("mpv exited during startup ({})", status);
    }
    match UnixStream::connect(socket_path).await {
      Ok(stream) => return Ok(stream),
      Err(e) => debug!(attempt, err = %e, "mpv: IPC socket not ready"),
    }
    tokio::time::sleep(delay).await;
  }
  bail!("mpv IPC socket {} never became available", socket_path.display())
}

async fn read_loop(
  read_half: OwnedReadHalf,
  pending: PendingReplies,
  generation: Arc<AtomicU64>,
  events: mpsc::UnboundedSender<EngineEvent>,
) {
  let mut lines = TokioBufReader::new(read_half).lines();
  loop {
    let line = match lines.next_line().await {
      Ok(Some(line)) => line,
      Ok(None) => break,
      Err(e) => {
        warn!(err = %e, "mpv: IPC read failed");
        break;
      }
    };
    match parse_ipc_line(&line) {
      IpcMessage::Reply { request_id, reply } => {
        let waiter = pending.lock().ok().and_then(|mut p| p.remove(&request_id));
        if let Some(waiter) = waiter {
          if let Some(loaded) = waiter.generation
            && reply.is_success()
          {
            generation.store(loaded, Ordering::SeqCst);
          }
          let _ = waiter.reply.send(reply);
        }
      }
      IpcMessage::EndOfFile => {
        let _ = events.send(EngineEvent::EndOfMedia { generation: generation.load(Ordering::SeqCst) });
      }
      IpcMessage::LoadFailed => {
        let _ = events.send(EngineEvent::OpenFailed { generation: generation.load(Ordering::SeqCst) });
      }
      IpcMessage::Shutdown => {
        let _ = events.send(EngineEvent::Shutdown);
        return;
      }
      IpcMessage::Other => {}
    }
  }
  let _ = events.send(EngineEvent::Shutdown);
}

impl MediaEngine for MpvPlayer {
  async fn open(&mut self, path: &Path, generation: u64) -> Result<()> {
    let path_str = path.to_str().with_context(|| format!("Path is not valid UTF-8: {}", path.display()))?;
    // Replies and events share one ordered stream: an eof for the previous file is read
    // before this reply and keeps the old generation, a decode error after it gets the new one.
    let command = json!(["loadfile", path_str, "replace"]);
    let reply = self.request_with_generation(command.clone(), Some(generation)).await?;
    if !reply.is_success() {
      bail!("mpv rejected {}: {}", command, reply.error);
    }
    Ok(())
  }

  async fn play(&mut self) -> Result<()> {
    self.set_property("pause", json!(false)).await
  }

  async fn pause(&mut self) -> Result<()> {
    self.set_property("pause", json!(true)).await
  }

  async fn stop(&mut self) -> Result<()> {
    self.command(json!(["stop"])).await
  }

  async fn length(&mut self) -> Result<Option<Duration>> {
    self.get_seconds("duration").await
  }

  async fn position(&mut self) -> Result<Duration> {
    Ok(self.get_seconds("time-pos").await?.unwrap_or_default())
  }

  async fn set_position(&mut self, position: Duration) -> Result<()> {
    self.command(json!(["seek", position.as_secs_f64(), "absolute"])).await
  }

  async fn is_playing(&mut self) -> Result<bool> {
    let paused = self.get_bool("pause").await?.unwrap_or(true);
    let idle = self.get_bool("core-idle").await?.unwrap_or(true);
    Ok(!paused && !idle)
  }

  async fn set_volume(&mut self, volume: u8) -> Result<()> {
    self.set_property("volume", json!(volume)).await
  }

  async fn set_mute(&mut self, muted: bool) -> Result<()> {
    self.set_property("mute", json!(muted)).await
  }

  async fn toggle_fullscreen(&mut self) -> Result<()> {
    self.command(json!(["cycle", "fullscreen"])).await
  }
}
