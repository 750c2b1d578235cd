//! Periodic timers driving the enable retry and output push loops.
//!
//! Sessions create timers through a [`TimerHost`], so tests can replace the
//! thread-backed host with one they fire by hand.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Callback run on every timer expiry.
pub type TimerCallback = Arc<dyn Fn() + Send + Sync>;

/// A started/stopped periodic timer.
pub trait PeriodicTimer: Send + Sync {
    /// Start firing every period. Starting a running timer does nothing.
    fn start(&self);

    /// Stop firing. With `drain`, wait for an in-progress callback unless
    /// called from that callback.
    fn stop(&self, drain: bool);

    fn is_running(&self) -> bool;
}

/// Factory for periodic timers.
pub trait TimerHost: Send + Sync {
    fn create_timer(
        &self,
        name: &'static str,
        period: Duration,
        callback: TimerCallback,
    ) -> Arc<dyn PeriodicTimer>;
}

/// Timer host backed by one OS thread per running timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadTimerHost;

impl ThreadTimerHost {
    pub fn new() -> Self {
        Self
    }
}

impl TimerHost for ThreadTimerHost {
    fn create_timer(
        &self,
        name: &'static str,
        period: Duration,
        callback: TimerCallback,
    ) -> Arc<dyn PeriodicTimer> {
        Arc::new(ThreadTimer::new(name, period, callback))
    }
}

struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Periodic timer running its callback on a dedicated thread.
pub struct ThreadTimer {
    name: &'static str,
    period: Duration,
    callback: TimerCallback,
    worker: Mutex<Option<Worker>>,
}

impl ThreadTimer {
    pub fn new(name: &'static str, period: Duration, callback: TimerCallback) -> Self {
        Self {
            name,
            period,
            callback,
            worker: Mutex::new(None),
        }
    }

    fn run(period: Duration, callback: &TimerCallback, stop_rx: &channel::Receiver<()>) {
        loop {
            match stop_rx.recv_timeout(period) {
                Err(RecvTimeoutError::Timeout) => callback(),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }
}

impl PeriodicTimer for ThreadTimer {
    fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = channel::bounded(1);
        let callback = Arc::clone(&self.callback);
        let period = self.period;
        match thread::Builder::new()
            .name(format!("timer-{}", self.name))
            .spawn(move || Self::run(period, &callback, &stop_rx))
        {
            Ok(handle) => {
                debug!(timer = self.name, period_ms = period.as_millis(), "Timer started");
                *worker = Some(Worker { stop_tx, handle });
            }
            Err(e) => warn!(timer = self.name, error = %e, "Failed to spawn timer thread"),
        }
    }

    fn stop(&self, drain: bool) {
        let Some(Worker { stop_tx, handle }) = self.worker.lock().take() else {
            return;
        };
        drop(stop_tx);

        if drain && handle.thread().id() != thread::current().id() && handle.join().is_err() {
            warn!(timer = self.name, "Timer callback panicked");
        }
        debug!(timer = self.name, drain, "Timer stopped");
    }

    fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        self.stop(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    fn counting_timer(period_ms: u64) -> (Arc<dyn PeriodicTimer>, Arc<AtomicU32>) {
        let fired = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&fired);
        let timer = ThreadTimerHost::new().create_timer(
            "test",
            Duration::from_millis(period_ms),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        (timer, fired)
    }

    #[test]
    fn test_timer_fires_until_stopped() {
        let (timer, fired) = counting_timer(2);
        timer.start();
        assert!(timer.is_running());

        let deadline = Instant::now() + Duration::from_secs(5);
        while fired.load(Ordering::SeqCst) < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        timer.stop(true);
        assert!(!timer.is_running());
        assert!(fired.load(Ordering::SeqCst) >= 3);

        let after_stop = fired.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(fired.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_start_is_idempotent_and_stop_without_start() {
        let (timer, _) = counting_timer(50);
        timer.stop(true);
        timer.start();
        timer.start();
        assert!(timer.is_running());
        timer.stop(false);
        assert!(!timer.is_running());
    }
}
