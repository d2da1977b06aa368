use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

const SLEEP_STEP: Duration = Duration::from_millis(200);

/// Sleeps for `total` in short steps. Returns `false` as soon as `stop` is
/// raised, `true` when the full duration elapsed.
pub fn sleep_with_stop(stop: &AtomicBool, total: Duration) -> bool {
    let mut remaining = total;
    while remaining > Duration::from_millis(0) {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let step = remaining.min(SLEEP_STEP);
        thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    !stop.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn raised_stop_interrupts_long_sleep() {
        let stop = Arc::new(AtomicBool::new(false));
        let signal = Arc::clone(&stop);
        let raiser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            signal.store(true, Ordering::Relaxed);
        });

        let started = Instant::now();
        assert!(!sleep_with_stop(&stop, Duration::from_secs(10)));
        assert!(started.elapsed() < Duration::from_secs(2));
        raiser.join().expect("join");
    }

    #[test]
    fn full_sleep_reports_completion() {
        let stop = AtomicBool::new(false);
        assert!(sleep_with_stop(&stop, Duration::from_millis(10)));
    }
}
