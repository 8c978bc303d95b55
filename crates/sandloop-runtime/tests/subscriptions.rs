#![forbid(unsafe_code)]

//! Subscriptions merge external messages into the chain.
//!
//! Run:
//!   cargo test -p sandloop-runtime --test subscriptions

use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use sandloop_harness::RecordingView;
use sandloop_runtime::{Emitter, Every, FromIter, Sandbox};

const WAIT: Duration = Duration::from_secs(10);

#[test]
fn from_iter_messages_arrive_in_order() {
    let view = RecordingView::new();
    let sandbox = Sandbox::pure(String::new(), |c: char, s: &String| format!("{s}{c}"), view.callback())
        .subscribe(FromIter::new(1, "abc".chars()))
        .start()
        .unwrap();
    let states = view.wait_for_len(4, WAIT);
    assert_eq!(states, vec!["", "a", "ab", "abc"]);
    assert_eq!(sandbox.stats().accepted, 3);
}

#[test]
fn duplicate_ids_start_once() {
    let view = RecordingView::new();
    let sandbox = Sandbox::pure(0u32, |n: u32, total: &u32| total + n, view.callback())
        .subscribe(FromIter::new(7, [1, 1, 1]))
        .subscribe(FromIter::new(7, [100]))
        .start()
        .unwrap();
    let states = view.wait_for_len(4, WAIT);
    assert_eq!(states, vec![0, 1, 2, 3]);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(sandbox.stats().accepted, 3);
}

#[test]
fn distinct_ids_all_start() {
    let view = RecordingView::new();
    let _sandbox = Sandbox::pure(0u32, |n: u32, total: &u32| total + n, view.callback())
        .subscribe(FromIter::new(1, [1]))
        .subscribe(FromIter::new(2, [10]))
        .start()
        .unwrap();
    let states = view.wait_for_len(3, WAIT);
    assert_eq!(states.last(), Some(&11));
}

#[test]
fn ticks_stop_after_dispose() {
    let view = RecordingView::new();
    let sandbox = Sandbox::pure(0u32, |(): (), n: &u32| n + 1, view.callback())
        .subscribe(Every::new(Duration::from_millis(2), || ()))
        .start()
        .unwrap();
    let states = view.wait_for_len(4, WAIT);
    assert!(states.len() >= 4);
    sandbox.dispose();
    // A view call already running when dispose returned may still finish.
    thread::sleep(Duration::from_millis(20));
    let settled = view.len();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(view.len(), settled);
}

#[test]
fn view_can_feed_back_through_an_emitter() {
    let slot: Arc<OnceLock<Emitter<u8>>> = Arc::new(OnceLock::new());
    let view = RecordingView::new();
    let record = view.callback();
    let feedback = Arc::clone(&slot);
    let sandbox = Sandbox::pure(
        0u8,
        |n: u8, total: &u8| total + n,
        move |total: &u8| {
            record(total);
            if (1..5).contains(total) {
                if let Some(emitter) = feedback.get() {
                    emitter.emit(1);
                }
            }
        },
    )
    .start()
    .unwrap();
    let _ = slot.set(sandbox.emitter());

    sandbox.accept(1);
    assert_eq!(view.snapshot(), vec![0, 1, 2, 3, 4, 5]);
}
