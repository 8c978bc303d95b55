#![forbid(unsafe_code)]

//! A view that remembers what it was shown.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

struct Log<S> {
    states: Mutex<Vec<S>>,
    changed: Condvar,
}

/// Records rendered states for later assertions.
///
/// [`callback`](Self::callback) produces the closure to pass as the view;
/// the recorder itself stays with the test.
pub struct RecordingView<S> {
    log: Arc<Log<S>>,
}

impl<S> Clone for RecordingView<S> {
    fn clone(&self) -> Self {
        Self {
            log: Arc::clone(&self.log),
        }
    }
}

impl<S> Default for RecordingView<S> {
    fn default() -> Self {
        Self {
            log: Arc::new(Log {
                states: Mutex::new(Vec::new()),
                changed: Condvar::new(),
            }),
        }
    }
}

impl<S: Clone + Send + 'static> RecordingView<S> {
    /// An empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// View callback appending each state.
    pub fn callback(&self) -> impl Fn(&S) + Send + Sync + 'static {
        let log = Arc::clone(&self.log);
        move |state: &S| {
            log.states
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(state.clone());
            log.changed.notify_all();
        }
    }

    /// Everything rendered so far, in order.
    pub fn snapshot(&self) -> Vec<S> {
        self.log
            .states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of rendered states.
    pub fn len(&self) -> usize {
        self.log
            .states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Whether nothing was rendered yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most recent state.
    pub fn last(&self) -> Option<S> {
        self.log
            .states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    /// Block until at least `n` states were rendered or `timeout` elapses.
    ///
    /// Returns the snapshot either way; callers assert on its contents.
    pub fn wait_for_len(&self, n: usize, timeout: Duration) -> Vec<S> {
        let deadline = Instant::now() + timeout;
        let mut states = self
            .log
            .states
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        while states.len() < n {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            states = self
                .log
                .changed
                .wait_timeout(states, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
        states.clone()
    }
}

impl<S> std::fmt::Debug for RecordingView<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self
            .log
            .states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len();
        f.debug_struct("RecordingView").field("len", &len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_records_in_order() {
        let view = RecordingView::new();
        let cb = view.callback();
        cb(&1);
        cb(&2);
        assert_eq!(view.snapshot(), vec![1, 2]);
        assert_eq!(view.last(), Some(2));
        assert_eq!(view.len(), 2);
    }

    #[test]
    fn wait_sees_other_thread() {
        let view = RecordingView::new();
        let cb = view.callback();
        let handle = std::thread::spawn(move || {
            for i in 0..5 {
                cb(&i);
            }
        });
        let seen = view.wait_for_len(5, Duration::from_secs(5));
        handle.join().unwrap();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn wait_times_out() {
        let view = RecordingView::<u8>::new();
        let seen = view.wait_for_len(1, Duration::from_millis(10));
        assert!(seen.is_empty());
    }
}
