use std::time::Duration;
use tokio::time::Instant;

/// Single-shot auto-advance timer.
///
/// `freeze` keeps the unspent budget so `thaw` can resume it. A new clip replaces the timer.
#[derive(Debug, Default)]
pub struct AdvanceTimer {
  deadline: Option<Instant>,
  frozen: Option<Duration>,
}

impl AdvanceTimer {
  /// Arm the timer to fire `after` from now, replacing any previous state.
  pub fn start(&mut self, after: Duration) {
    self.deadline = Some(Instant::now() + after);
    self.frozen = None;
  }

  #[cfg(test)]
  pub fn stop(&mut self) {
    self.deadline = None;
    self.frozen = None;
  }

  /// Stop the clock, keeping the remaining budget. Returns that budget.
  pub fn freeze(&mut self) -> Option<Duration> {
    let deadline = self.deadline.take()?;
    let left = deadline.saturating_duration_since(Instant::now());
    self.frozen = Some(left);
    Some(left)
  }

  /// Replace the frozen budget without starting the clock.
  pub fn set_frozen(&mut self, left: Duration) {
    self.deadline = None;
    self.frozen = Some(left);
  }

  /// Resume a frozen timer with its retained budget. No-op if nothing was frozen.
  pub fn thaw(&mut self) {
    if let Some(left) = self.frozen.take() {
      self.start(left);
    }
  }

  pub fn deadline(&self) -> Option<Instant> {
    self.deadline
  }

  #[cfg(test)]
  pub fn frozen(&self) -> Option<Duration> {
    self.frozen
  }

  pub fn is_due(&self, now: Instant) -> bool {
    self.deadline.is_some_and(|deadline| now >= deadline)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test(start_paused = true)]
  async fn fires_after_budget() {
    let mut timer = AdvanceTimer::default();
    timer.start(Duration::from_secs(3));
    assert!(!timer.is_due(Instant::now()));

    tokio::time::advance(Duration::from_secs(3)).await;
    assert!(timer.is_due(Instant::now()));
  }

  #[tokio::test(start_paused = true)]
  async fn freeze_keeps_remaining_budget() {
    let mut timer = AdvanceTimer::default();
    timer.start(Duration::from_secs(10));
    tokio::time::advance(Duration::from_secs(4)).await;

    assert_eq!(timer.freeze(), Some(Duration::from_secs(6)));
    assert!(timer.deadline().is_none());

    // Time spent frozen does not count.
    tokio::time::advance(Duration::from_secs(60)).await;
    timer.thaw();
    assert_eq!(timer.deadline(), Some(Instant::now() + Duration::from_secs(6)));
  }

  #[tokio::test(start_paused = true)]
  async fn stop_discards_budget() {
    let mut timer = AdvanceTimer::default();
    timer.start(Duration::from_secs(10));
    timer.freeze();
    timer.stop();
    timer.thaw();
    assert!(timer.deadline().is_none());
    assert!(timer.frozen().is_none());
  }

  #[test]
  fn freeze_on_idle_timer_is_noop() {
    let mut timer = AdvanceTimer::default();
    assert_eq!(timer.freeze(), None);
    assert!(!timer.is_due(Instant::now()));
  }
}
