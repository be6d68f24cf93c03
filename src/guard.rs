//! Hard deadline around one refresh run.
//!
//! The window is `Running` until its deadline passes, then `Expired` for the
//! rest of the run.  Outcomes are only handed out while running; one that
//! arrives at or after the deadline is dropped unmerged.  Waiting is done with
//! [`tokio::time::timeout_at`] on the outcome channel, so the run returns at
//! the deadline without waiting for fetches still in flight.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{self, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Running,
    Expired,
}

#[derive(Debug)]
pub struct ExecutionWindow {
    deadline: Option<Instant>,
    state: WindowState,
}

impl ExecutionWindow {
    /// A window that never expires.
    pub fn unbounded() -> Self {
        Self {
            deadline: None,
            state: WindowState::Running,
        }
    }

    /// A window that expires `budget` after `start`.  A budget too large to
    /// represent as an instant never expires.
    pub fn new(start: Instant, budget: Duration) -> Self {
        Self {
            deadline: start.checked_add(budget),
            state: WindowState::Running,
        }
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn is_expired(&self) -> bool {
        self.state == WindowState::Expired
    }

    /// Wait for the next value on `rx` that arrives in time.
    ///
    /// Returns `None` once the channel is exhausted or the window has
    /// expired; after expiry it keeps returning `None` without touching `rx`.
    pub async fn next<T>(&mut self, rx: &mut UnboundedReceiver<T>) -> Option<T> {
        if self.is_expired() {
            return None;
        }
        let Some(deadline) = self.deadline else {
            return rx.recv().await;
        };

        match time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(value)) if Instant::now() < deadline => Some(value),
            Ok(Some(_late)) => {
                debug!("outcome arrived at the deadline, discarding");
                self.expire();
                None
            }
            Ok(None) => None,
            Err(_) => {
                self.expire();
                None
            }
        }
    }

    fn expire(&mut self) {
        if self.state == WindowState::Running {
            debug!("execution window expired");
            self.state = WindowState::Expired;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn unbounded_window_drains_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        drop(tx);

        let mut window = ExecutionWindow::unbounded();
        assert_eq!(window.next(&mut rx).await, Some(1));
        assert_eq!(window.next(&mut rx).await, Some(2));
        assert_eq!(window.next(&mut rx).await, None);
        assert_eq!(window.state(), WindowState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn expires_without_waiting_for_sender() {
        let (tx, mut rx) = mpsc::unbounded_channel::<u32>();
        let start = Instant::now();
        let mut window = ExecutionWindow::new(start, Duration::from_millis(50));

        assert_eq!(window.next(&mut rx).await, None);
        assert!(window.is_expired());
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(start.elapsed() < Duration::from_millis(60));

        // One-way: a value sent afterwards is never handed out.
        tx.send(7).unwrap();
        assert_eq!(window.next(&mut rx).await, None);
        assert_eq!(window.state(), WindowState::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn on_time_values_pass_then_late_ones_are_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let start = Instant::now();
        let mut window = ExecutionWindow::new(start, Duration::from_millis(100));

        let sender = tokio::spawn(async move {
            time::sleep(Duration::from_millis(30)).await;
            tx.send("early").unwrap();
            time::sleep(Duration::from_millis(200)).await;
            let _ = tx.send("late");
        });

        assert_eq!(window.next(&mut rx).await, Some("early"));
        assert_eq!(window.next(&mut rx).await, None);
        assert!(window.is_expired());
        sender.await.unwrap();
    }

    #[tokio::test]
    async fn oversized_budget_behaves_as_unbounded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send("only").unwrap();
        drop(tx);

        let mut window = ExecutionWindow::new(Instant::now(), Duration::MAX);
        assert_eq!(window.next(&mut rx).await, Some("only"));
        assert_eq!(window.next(&mut rx).await, None);
        assert_eq!(window.state(), WindowState::Running);
    }

    #[tokio::test]
    async fn closed_channel_before_deadline_is_not_expiry() {
        let (tx, mut rx) = mpsc::unbounded_channel::<u32>();
        drop(tx);
        let mut window = ExecutionWindow::new(Instant::now(), Duration::from_secs(5));
        assert_eq!(window.next(&mut rx).await, None);
        assert_eq!(window.state(), WindowState::Running);
    }
}
