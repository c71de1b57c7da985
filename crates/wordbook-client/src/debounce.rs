//! Debounced search input.
//!
//! Raw keystrokes go in; a settled term comes out only after the input has
//! been quiet for the configured delay. Every input restarts the timer, and
//! the settled value is always the last input before the quiet period.
//!
//! [`Debounce`] is the timer-free state machine; [`Debouncer`] drives it
//! from a tokio task and publishes on a `watch` channel.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

/// Pending-value state machine. Time is passed in.
#[derive(Debug)]
pub struct Debounce<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debounce<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Record an input at `at`, replacing anything pending.
    pub fn input(&mut self, value: T, at: Instant) {
        self.pending = Some((value, at + self.delay));
    }

    /// When the pending value settles, if there is one.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    /// Take the pending value if its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, deadline)) if *deadline <= now => self.pending.take().map(|(v, _)| v),
            _ => None,
        }
    }

    /// Drop the pending value without settling it.
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

/// Debounces search terms on a background task.
///
/// Dropping the `Debouncer` (or calling [`shutdown`](Self::shutdown))
/// cancels any pending term; nothing is emitted afterwards.
pub struct Debouncer {
    input_tx: mpsc::UnboundedSender<(String, Instant)>,
    settled_rx: watch::Receiver<String>,
    task: JoinHandle<()>,
}

impl Debouncer {
    /// Spawn the debounce task. The settled term starts empty.
    pub fn spawn(delay: Duration) -> Self {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (settled_tx, settled_rx) = watch::channel(String::new());
        let task = tokio::spawn(run(Debounce::new(delay), input_rx, settled_tx));
        Self {
            input_tx,
            settled_rx,
            task,
        }
    }

    /// Feed a raw input. Timestamped here, not when the task gets to it.
    pub fn input(&self, raw: impl Into<String>) {
        let _ = self.input_tx.send((raw.into(), Instant::now()));
    }

    /// Receiver of settled terms.
    pub fn settled(&self) -> watch::Receiver<String> {
        self.settled_rx.clone()
    }

    /// The most recently settled term.
    pub fn current(&self) -> String {
        self.settled_rx.borrow().clone()
    }

    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    mut state: Debounce<String>,
    mut input_rx: mpsc::UnboundedReceiver<(String, Instant)>,
    settled_tx: watch::Sender<String>,
) {
    loop {
        let deadline = state.deadline();
        tokio::select! {
            input = input_rx.recv() => match input {
                Some((raw, at)) => {
                    trace!(term = %raw, "search input");
                    state.input(raw, at);
                }
                None => break,
            },
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some(term) = state.poll(Instant::now()) {
                    trace!(term = %term, "search settled");
                    settled_tx.send_if_modified(|current| {
                        if *current == term {
                            return false;
                        }
                        *current = term;
                        true
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(300);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_state_machine_restarts_on_input() {
        let t0 = Instant::now();
        let mut d = Debounce::new(DELAY);
        d.input("a", t0);
        d.input("ab", t0 + ms(50));
        d.input("abc", t0 + ms(100));
        assert_eq!(d.deadline(), Some(t0 + ms(400)));
        assert_eq!(d.poll(t0 + ms(399)), None);
        assert_eq!(d.poll(t0 + ms(400)), Some("abc"));
        assert_eq!(d.poll(t0 + ms(1000)), None);
    }

    #[test]
    fn test_state_machine_cancel() {
        let t0 = Instant::now();
        let mut d = Debounce::new(DELAY);
        d.input("a", t0);
        d.cancel();
        assert_eq!(d.deadline(), None);
        assert_eq!(d.poll(t0 + ms(1000)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_emission_after_quiet_period() {
        let start = Instant::now();
        let debouncer = Debouncer::spawn(DELAY);
        let mut settled = debouncer.settled();

        debouncer.input("a");
        tokio::time::sleep(ms(50)).await;
        debouncer.input("ab");
        tokio::time::sleep(ms(50)).await;
        debouncer.input("abc");

        // Nothing before t=400ms.
        assert!(tokio::time::timeout(ms(299), settled.changed()).await.is_err());

        settled.changed().await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= ms(400) && elapsed < ms(401), "settled at {elapsed:?}");
        assert_eq!(*settled.borrow_and_update(), "abc");

        // And nothing after.
        assert!(tokio::time::timeout(ms(1000), settled.changed()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_quiet_periods_emit_separately() {
        let debouncer = Debouncer::spawn(DELAY);
        let mut settled = debouncer.settled();

        debouncer.input("sol");
        settled.changed().await.unwrap();
        assert_eq!(*settled.borrow_and_update(), "sol");

        debouncer.input("luna");
        settled.changed().await.unwrap();
        assert_eq!(debouncer.current(), "luna");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending() {
        let debouncer = Debouncer::spawn(DELAY);
        let mut settled = debouncer.settled();
        debouncer.input("abc");
        debouncer.shutdown();
        // The sender is dropped with the aborted task.
        assert!(settled.changed().await.is_err());
        assert_eq!(*settled.borrow(), "");
    }
}
