#![forbid(unsafe_code)]

//! In-memory tracing capture.
//!
//! [`with_captured_tracing`] installs a thread-local subscriber for the
//! duration of a closure and records every span and event at any level.
//! Work that runs on other threads is not captured, so tests that assert on
//! spans should use inline contexts.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;

/// A span with its fields and the span that was current when it opened.
#[derive(Debug, Clone)]
pub struct CapturedSpan {
    pub name: String,
    pub target: String,
    pub level: tracing::Level,
    /// Declared fields; ones never recorded map to an empty string.
    pub fields: HashMap<String, String>,
    pub parent: Option<String>,
}

/// An event with its fields and enclosing span.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: tracing::Level,
    pub target: String,
    pub message: String,
    pub fields: HashMap<String, String>,
    pub parent: Option<String>,
}

#[derive(Default)]
struct Store {
    spans: Vec<CapturedSpan>,
    events: Vec<CapturedEvent>,
    by_id: HashMap<u64, usize>,
}

struct CaptureLayer {
    store: Arc<Mutex<Store>>,
}

/// Read access to what was captured.
#[derive(Clone)]
pub struct CaptureHandle {
    store: Arc<Mutex<Store>>,
}

impl CaptureHandle {
    fn lock(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All spans in creation order.
    pub fn spans(&self) -> Vec<CapturedSpan> {
        self.lock().spans.clone()
    }

    /// All events in emission order.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.lock().events.clone()
    }

    /// Spans with the given name.
    pub fn spans_named(&self, name: &str) -> Vec<CapturedSpan> {
        self.lock()
            .spans
            .iter()
            .filter(|s| s.name == name)
            .cloned()
            .collect()
    }

    /// Events whose target starts with `prefix`.
    pub fn events_for(&self, prefix: &str) -> Vec<CapturedEvent> {
        self.lock()
            .events
            .iter()
            .filter(|e| e.target.starts_with(prefix))
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let store = self.lock();
        f.debug_struct("CaptureHandle")
            .field("spans", &store.spans.len())
            .field("events", &store.events.len())
            .finish()
    }
}

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.push((field.name().to_string(), value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.push((field.name().to_string(), value.to_string()));
    }
}

fn current_name<S>(ctx: &tracing_subscriber::layer::Context<'_, S>) -> Option<String>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    ctx.current_span()
        .id()
        .and_then(|id| ctx.span(id))
        .map(|span| span.name().to_string())
}

impl<S> tracing_subscriber::Layer<S> for CaptureLayer
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        attrs.record(&mut visitor);
        let mut fields: HashMap<String, String> = visitor.0.into_iter().collect();
        for field in attrs.metadata().fields() {
            fields.entry(field.name().to_string()).or_default();
        }
        let parent = current_name(&ctx);

        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let idx = store.spans.len();
        store.spans.push(CapturedSpan {
            name: attrs.metadata().name().to_string(),
            target: attrs.metadata().target().to_string(),
            level: *attrs.metadata().level(),
            fields,
            parent,
        });
        store.by_id.insert(id.into_u64(), idx);
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor(Vec::new());
        values.record(&mut visitor);
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        let Some(&idx) = store.by_id.get(&id.into_u64()) else {
            return;
        };
        if let Some(span) = store.spans.get_mut(idx) {
            span.fields.extend(visitor.0);
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        let fields: HashMap<String, String> = visitor.0.into_iter().collect();
        let message = fields.get("message").cloned().unwrap_or_default();
        let parent = current_name(&ctx);

        self.store
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .events
            .push(CapturedEvent {
                level: *event.metadata().level(),
                target: event.metadata().target().to_string(),
                message,
                fields,
                parent,
            });
    }
}

/// Run `f` with a capturing subscriber installed on this thread.
pub fn with_captured_tracing<F>(f: F) -> CaptureHandle
where
    F: FnOnce(),
{
    let store = Arc::new(Mutex::new(Store::default()));
    let layer = CaptureLayer {
        store: Arc::clone(&store),
    };
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::TRACE)
        .with(layer);
    tracing::subscriber::with_default(subscriber, f);
    CaptureHandle { store }
}
