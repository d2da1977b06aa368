use docvec::client::{poll_until, PollHandle, PollOutcome, PollPolicy, PollStep};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn fast_policy(max_failures: u32) -> PollPolicy {
    PollPolicy::new(Duration::from_millis(5), Duration::from_millis(20), max_failures)
}

#[test]
fn first_tick_runs_immediately() {
    let stop = AtomicBool::new(false);
    let policy = PollPolicy::new(Duration::from_secs(30), Duration::from_secs(60), 3);
    let started = Instant::now();
    let outcome: PollOutcome<u8, String> = poll_until(&policy, &stop, || Ok(PollStep::Done(9)));
    assert_eq!(outcome, PollOutcome::Done(9));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn a_success_resets_the_failure_budget() {
    let stop = AtomicBool::new(false);
    let mut calls = 0;
    // fail, fail, ok, fail, fail, done: never three failures in a row
    let outcome: PollOutcome<&str, &str> = poll_until(&fast_policy(3), &stop, || {
        calls += 1;
        match calls {
            1 | 2 | 4 | 5 => Err("flaky"),
            3 => Ok(PollStep::Continue),
            _ => Ok(PollStep::Done("finished")),
        }
    });
    assert_eq!(outcome, PollOutcome::Done("finished"));
    assert_eq!(calls, 6);
}

#[test]
fn consecutive_failures_give_up_with_last_error() {
    let stop = AtomicBool::new(false);
    let mut calls = 0;
    let outcome: PollOutcome<(), String> = poll_until(&fast_policy(2), &stop, || {
        calls += 1;
        Err(format!("attempt {calls}"))
    });
    assert_eq!(outcome, PollOutcome::GaveUp("attempt 2".to_string()));
}

#[test]
fn stop_flag_interrupts_a_long_sleep() {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        flag.store(true, Ordering::Relaxed);
    });
    let policy = PollPolicy::new(Duration::from_secs(30), Duration::from_secs(30), 3);
    let started = Instant::now();
    let outcome: PollOutcome<(), ()> = poll_until(&policy, &stop, || Ok(PollStep::Continue));
    stopper.join().expect("stopper");
    assert_eq!(outcome, PollOutcome::Stopped);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn dropping_the_handle_stops_its_thread() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ticks);
    let handle = PollHandle::spawn("poll-test", move |stop| {
        let _: PollOutcome<(), ()> = poll_until(&fast_policy(3), stop, || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(PollStep::Continue)
        });
    })
    .expect("spawn");
    thread::sleep(Duration::from_millis(40));
    assert!(!handle.is_finished());
    drop(handle);

    let after_drop = ticks.load(Ordering::SeqCst);
    assert!(after_drop > 0);
    thread::sleep(Duration::from_millis(40));
    assert_eq!(ticks.load(Ordering::SeqCst), after_drop);
}
