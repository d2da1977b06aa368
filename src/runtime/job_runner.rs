use super::RuntimeError;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct SlotCounts {
    running: usize,
    pending: usize,
}

#[derive(Debug)]
struct JobSlots {
    capacity: usize,
    counts: Mutex<SlotCounts>,
    changed: Condvar,
}

impl JobSlots {
    fn lock(&self) -> MutexGuard<'_, SlotCounts> {
        self.counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn acquire(self: &Arc<Self>) -> SlotGuard {
        let mut counts = self.lock();
        while counts.running >= self.capacity {
            counts = self
                .changed
                .wait(counts)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        counts.running += 1;
        SlotGuard {
            slots: Arc::clone(self),
        }
    }
}

/// Held by a job thread while it occupies a slot. Releasing also retires the
/// job from the pending count.
struct SlotGuard {
    slots: Arc<JobSlots>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut counts = self.slots.lock();
        counts.running = counts.running.saturating_sub(1);
        counts.pending = counts.pending.saturating_sub(1);
        self.slots.changed.notify_all();
    }
}

/// Runs background jobs on named threads, at most `capacity` at a time.
/// Jobs beyond the bound block on their own thread until a slot frees up.
#[derive(Debug, Clone)]
pub struct JobRunner {
    slots: Arc<JobSlots>,
}

impl JobRunner {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Arc::new(JobSlots {
                capacity: capacity.max(1),
                counts: Mutex::new(SlotCounts::default()),
                changed: Condvar::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity
    }

    pub fn running(&self) -> usize {
        self.slots.lock().running
    }

    pub fn pending(&self) -> usize {
        self.slots.lock().pending
    }

    pub fn spawn<F>(&self, name: &str, job: F) -> Result<(), RuntimeError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.slots.lock().pending += 1;
        let slots = Arc::clone(&self.slots);
        let spawned = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _slot = slots.acquire();
                job();
            });
        if let Err(err) = spawned {
            let mut counts = self.slots.lock();
            counts.pending = counts.pending.saturating_sub(1);
            self.slots.changed.notify_all();
            return Err(RuntimeError::Spawn(err.to_string()));
        }
        Ok(())
    }

    /// Blocks until every spawned job has finished or `timeout` elapses.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut counts = self.slots.lock();
        while counts.pending > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (next, _) = self
                .slots
                .changed
                .wait_timeout(counts, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            counts = next;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn never_exceeds_capacity() {
        let runner = JobRunner::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for index in 0..6 {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            runner
                .spawn(&format!("embed-test-{index}"), move || {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(30));
                    active.fetch_sub(1, Ordering::SeqCst);
                })
                .expect("spawn");
        }

        assert!(runner.wait_idle(Duration::from_secs(5)));
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(runner.pending(), 0);
        assert_eq!(runner.running(), 0);
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let runner = JobRunner::new(0);
        assert_eq!(runner.capacity(), 1);
        let done = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&done);
        runner
            .spawn("embed-single", move || {
                flag.fetch_add(1, Ordering::SeqCst);
            })
            .expect("spawn");
        assert!(runner.wait_idle(Duration::from_secs(5)));
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
