//! Single-in-flight polling with backoff and a stop flag.

use crate::config::ClientConfig;
use crate::runtime::{sleep_with_stop, RuntimeError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_backoff: Duration,
    /// Consecutive failed ticks tolerated before giving up.
    pub max_failures: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_backoff: Duration, max_failures: u32) -> Self {
        Self {
            interval,
            max_backoff: max_backoff.max(interval),
            max_failures: max_failures.max(1),
        }
    }

    pub fn progress(config: &ClientConfig) -> Self {
        Self::new(
            config.progress_interval(),
            config.max_backoff(),
            config.max_poll_failures,
        )
    }

    pub fn task_list(config: &ClientConfig) -> Self {
        Self::new(
            config.task_list_interval(),
            config.max_backoff(),
            config.max_poll_failures,
        )
    }

    /// `interval * 2^failures`, capped at `max_backoff`.
    pub fn delay_after(&self, failures: u32) -> Duration {
        if failures == 0 {
            return self.interval;
        }
        let factor = 1u32.checked_shl(failures.min(16)).unwrap_or(u32::MAX);
        self.interval
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep<T> {
    Continue,
    Done(T),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T, E> {
    Done(T),
    Stopped,
    GaveUp(E),
}

/// Calls `tick` until it reports `Done`, the stop flag is raised, or the
/// failure budget runs out. The next tick is only scheduled after the
/// current one returned.
pub fn poll_until<T, E, F>(policy: &PollPolicy, stop: &AtomicBool, mut tick: F) -> PollOutcome<T, E>
where
    F: FnMut() -> Result<PollStep<T>, E>,
{
    let mut failures = 0u32;
    loop {
        if stop.load(Ordering::Relaxed) {
            return PollOutcome::Stopped;
        }
        match tick() {
            Ok(PollStep::Done(value)) => return PollOutcome::Done(value),
            Ok(PollStep::Continue) => failures = 0,
            Err(err) => {
                failures += 1;
                if failures >= policy.max_failures {
                    return PollOutcome::GaveUp(err);
                }
            }
        }
        if !sleep_with_stop(stop, policy.delay_after(failures)) {
            return PollOutcome::Stopped;
        }
    }
}

/// Owns one background polling thread. Dropping the handle raises the stop
/// flag and joins the thread.
#[derive(Debug)]
pub struct PollHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn spawn<F>(name: &str, body: F) -> Result<Self, RuntimeError>
    where
        F: FnOnce(&AtomicBool) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(&flag))
            .map_err(|err| RuntimeError::Spawn(err.to_string()))?;
        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.thread
            .as_ref()
            .map(JoinHandle::is_finished)
            .unwrap_or(true)
    }

    /// Waits for the thread to exit on its own.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = PollPolicy::new(Duration::from_millis(100), Duration::from_millis(500), 5);
        assert_eq!(policy.delay_after(0), Duration::from_millis(100));
        assert_eq!(policy.delay_after(1), Duration::from_millis(200));
        assert_eq!(policy.delay_after(2), Duration::from_millis(400));
        assert_eq!(policy.delay_after(3), Duration::from_millis(500));
        assert_eq!(policy.delay_after(40), Duration::from_millis(500));
    }

    #[test]
    fn zero_failure_budget_is_clamped() {
        let policy = PollPolicy::new(Duration::from_millis(1), Duration::ZERO, 0);
        assert_eq!(policy.max_failures, 1);
        assert_eq!(policy.max_backoff, Duration::from_millis(1));
    }
}
