#![forbid(unsafe_code)]

//! Test support for sandloop.
//!
//! - [`ManualContext`] queues jobs until the test runs them, so interleavings
//!   are chosen by the test instead of the scheduler
//! - [`RecordingView`] captures every state a view receives
//! - [`capture`] records tracing spans and events for assertions

pub mod capture;
pub mod manual;
pub mod recording;

pub use capture::{CaptureHandle, CapturedEvent, CapturedSpan, with_captured_tracing};
pub use manual::ManualContext;
pub use recording::RecordingView;
