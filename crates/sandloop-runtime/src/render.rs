#![forbid(unsafe_code)]

//! The render sink: ordered delivery of states to the view callback.
//!
//! Every state the reducer emits is pushed into a [`StageQueue`] and drained
//! by a single job on the render context. The view therefore observes states
//! in emission order even if the render context is concurrent or slow.
//!
//! After disposal the queue is closed and the drain stops before its next
//! view call. A view call already in progress at that moment completes.

use std::sync::Arc;

use sandloop_core::Context;

use crate::channel::{Offer, StageQueue};
use crate::lifecycle::{TaskRegistry, UnwindGuard};
use crate::stats::Counters;

/// View callback type.
pub type View<S> = Box<dyn Fn(&S) + Send + Sync>;

/// Schedules view invocations on the render context.
pub struct RenderSink<S> {
    sandbox: Arc<str>,
    view: View<S>,
    queue: StageQueue<Arc<S>>,
    context: Arc<dyn Context>,
    registry: Arc<TaskRegistry>,
    counters: Arc<Counters>,
}

impl<S> RenderSink<S>
where
    S: Send + Sync + 'static,
{
    pub(crate) fn new(
        sandbox: Arc<str>,
        view: View<S>,
        context: Arc<dyn Context>,
        registry: Arc<TaskRegistry>,
        counters: Arc<Counters>,
    ) -> Self {
        Self {
            sandbox,
            view,
            queue: StageQueue::new(),
            context,
            registry,
            counters,
        }
    }

    /// Queue `state` for the view.
    pub fn publish(self: &Arc<Self>, state: Arc<S>) {
        if self.registry.is_disposed() {
            self.counters.dropped(1);
            return;
        }
        match self.queue.offer(state) {
            Offer::Claimed => {
                let this = Arc::clone(self);
                self.context.execute(Box::new(move || this.drain()));
            }
            Offer::Queued => {}
            Offer::Closed => self.counters.dropped(1),
        }
    }

    fn drain(&self) {
        let dispose = || {
            self.registry.dispose();
            self.queue.close();
        };
        let _guard = UnwindGuard::new(&self.sandbox, "render", &dispose);
        while let Some(state) = self.queue.next() {
            if self.registry.is_disposed() {
                let dropped = self.queue.close() as u64 + 1;
                self.counters.dropped(dropped);
                tracing::trace!(target: "sandloop.render", sandbox = %self.sandbox, dropped, "render drain stopped by disposal");
                continue;
            }
            (self.view)(&state);
            self.counters.rendered();
        }
    }
}

impl<S> RenderSink<S> {
    /// Stop rendering; returns the number of states discarded.
    pub(crate) fn close(&self) -> usize {
        self.queue.close()
    }

    /// States waiting for the render context.
    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandloop_core::Immediate;
    use std::sync::Mutex;

    fn sink(log: Arc<Mutex<Vec<i32>>>) -> Arc<RenderSink<i32>> {
        Arc::new(RenderSink::new(
            Arc::from("test"),
            Box::new(move |s: &i32| log.lock().unwrap().push(*s)),
            Arc::new(Immediate),
            Arc::new(TaskRegistry::new()),
            Arc::new(Counters::default()),
        ))
    }

    #[test]
    fn publishes_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = sink(Arc::clone(&log));
        for i in 0..4 {
            sink.publish(Arc::new(i));
        }
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(sink.counters.snapshot().rendered, 4);
    }

    #[test]
    fn disposed_sink_drops_states() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = sink(Arc::clone(&log));
        sink.publish(Arc::new(1));
        sink.registry.dispose();
        sink.close();
        sink.publish(Arc::new(2));
        assert_eq!(*log.lock().unwrap(), vec![1]);
        assert_eq!(sink.counters.snapshot().dropped, 1);
        assert_eq!(sink.pending(), 0);
    }
}
