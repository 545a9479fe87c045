#![forbid(unsafe_code)]

//! Remote-call observability.
//!
//! - **Tracing spans**: every backend call runs inside an `ordo.remote` span
//!   recording `operation`, `subject`, `duration_us`, and `result`.
//! - **Panic containment**: a panicking call becomes a
//!   [`BackendError::Transport`], so its result still reaches the engine.
//! - **Counters**: `remote_calls_total`, `remote_failures_total`, and
//!   `resyncs_total`, monotonic for the process lifetime.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

use web_time::Instant;

use crate::backend::{BackendError, Operation};

// ---------------------------------------------------------------------------
// Monotonic counters
// ---------------------------------------------------------------------------

static REMOTE_CALLS_TOTAL: AtomicU64 = AtomicU64::new(0);
static REMOTE_FAILURES_TOTAL: AtomicU64 = AtomicU64::new(0);
static RESYNCS_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Total backend calls issued.
#[must_use]
pub fn remote_calls_total() -> u64 {
    REMOTE_CALLS_TOTAL.load(Ordering::Relaxed)
}

/// Total backend calls that failed.
#[must_use]
pub fn remote_failures_total() -> u64 {
    REMOTE_FAILURES_TOTAL.load(Ordering::Relaxed)
}

/// Total resyncs started.
#[must_use]
pub fn resyncs_total() -> u64 {
    RESYNCS_TOTAL.load(Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Instrumentation
// ---------------------------------------------------------------------------

/// Run a backend call inside an `ordo.remote` span.
pub fn trace_remote_call<T, F>(operation: Operation, subject: &str, f: F) -> Result<T, BackendError>
where
    F: FnOnce() -> Result<T, BackendError>,
{
    REMOTE_CALLS_TOTAL.fetch_add(1, Ordering::Relaxed);

    let start = Instant::now();
    let span = tracing::debug_span!(
        "ordo.remote",
        operation = %operation,
        subject = %subject,
        duration_us = tracing::field::Empty,
        result = tracing::field::Empty,
    );
    let _guard = span.enter();

    let result = panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(BackendError::Transport {
            operation,
            message: format!("backend panicked: {}", panic_message(payload.as_ref())),
        })
    });
    let duration_us = start.elapsed().as_micros() as u64;
    span.record("duration_us", duration_us);

    match &result {
        Ok(_) => {
            span.record("result", "ok");
            tracing::debug!(
                target: "ordo.effect",
                operation = %operation,
                subject = %subject,
                duration_us,
                "remote call completed"
            );
        }
        Err(err) => {
            REMOTE_FAILURES_TOTAL.fetch_add(1, Ordering::Relaxed);
            span.record("result", "error");
            tracing::warn!(
                target: "ordo.effect",
                operation = %operation,
                subject = %subject,
                duration_us,
                error = %err,
                "remote call failed"
            );
        }
    }

    result
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Record the start of a resync.
pub fn record_resync_start(generation: u64) {
    RESYNCS_TOTAL.fetch_add(1, Ordering::Relaxed);
    tracing::info!(target: "ordo.resync", generation, "resync started");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::registry::LookupSpan;

    #[derive(Debug, Clone)]
    struct CapturedSpan {
        name: String,
        fields: HashMap<String, String>,
    }

    #[derive(Debug, Clone)]
    struct CapturedEvent {
        level: tracing::Level,
        target: String,
        fields: HashMap<String, String>,
    }

    #[derive(Clone, Default)]
    struct Capture {
        spans: Arc<Mutex<Vec<CapturedSpan>>>,
        events: Arc<Mutex<Vec<CapturedEvent>>>,
    }

    struct FieldVisitor(Vec<(String, String)>);

    impl tracing::field::Visit for FieldVisitor {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            self.0.push((field.name().to_string(), format!("{value:?}")));
        }
        fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
            self.0.push((field.name().to_string(), value.to_string()));
        }
        fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
            self.0.push((field.name().to_string(), value.to_string()));
        }
    }

    impl<S> tracing_subscriber::Layer<S> for Capture
    where
        S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_new_span(
            &self,
            attrs: &tracing::span::Attributes<'_>,
            _id: &tracing::span::Id,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let mut visitor = FieldVisitor(Vec::new());
            attrs.record(&mut visitor);
            self.spans.lock().unwrap().push(CapturedSpan {
                name: attrs.metadata().name().to_string(),
                fields: visitor.0.into_iter().collect(),
            });
        }

        fn on_record(
            &self,
            _id: &tracing::span::Id,
            values: &tracing::span::Record<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let mut visitor = FieldVisitor(Vec::new());
            values.record(&mut visitor);
            if let Some(last) = self.spans.lock().unwrap().last_mut() {
                last.fields.extend(visitor.0);
            }
        }

        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let mut visitor = FieldVisitor(Vec::new());
            event.record(&mut visitor);
            self.events.lock().unwrap().push(CapturedEvent {
                level: *event.metadata().level(),
                target: event.metadata().target().to_string(),
                fields: visitor.0.into_iter().collect(),
            });
        }
    }

    fn with_captured_tracing<F: FnOnce()>(f: F) -> Capture {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        tracing::subscriber::with_default(subscriber, f);
        capture
    }

    #[test]
    fn successful_call_records_span_fields() {
        let capture = with_captured_tracing(|| {
            let out = trace_remote_call(Operation::ReplaceOrder, "l1", || Ok(5));
            assert_eq!(out, Ok(5));
        });

        let spans = capture.spans.lock().unwrap().clone();
        let remote: Vec<_> = spans.iter().filter(|s| s.name == "ordo.remote").collect();
        assert_eq!(remote.len(), 1);
        assert_eq!(remote[0].fields.get("operation").unwrap(), "replace_order");
        assert_eq!(remote[0].fields.get("subject").unwrap(), "l1");
        assert_eq!(remote[0].fields.get("result").unwrap(), "ok");
        assert!(remote[0].fields.contains_key("duration_us"));
    }

    #[test]
    fn failed_call_warns_and_counts() {
        let before = remote_failures_total();
        let capture = with_captured_tracing(|| {
            let out: Result<(), _> = trace_remote_call(Operation::UpdateItem, "a", || {
                Err(BackendError::Timeout {
                    operation: Operation::UpdateItem,
                })
            });
            assert!(out.is_err());
        });

        assert!(remote_failures_total() > before);
        let events = capture.events.lock().unwrap().clone();
        let warns: Vec<_> = events
            .iter()
            .filter(|e| e.level == tracing::Level::WARN && e.target == "ordo.effect")
            .collect();
        assert_eq!(warns.len(), 1);
        assert!(warns[0].fields.contains_key("error"));
    }

    #[test]
    fn panicking_call_becomes_transport_error() {
        let before = remote_failures_total();
        let out: Result<(), _> = trace_remote_call(Operation::ReplaceOrder, "l1", || {
            panic!("connection pool exploded")
        });
        assert_eq!(
            out,
            Err(BackendError::Transport {
                operation: Operation::ReplaceOrder,
                message: "backend panicked: connection pool exploded".into(),
            })
        );
        assert!(remote_failures_total() > before);

        let owned = format!("code {}", 7);
        let out: Result<(), _> =
            trace_remote_call(Operation::ListItems, "l2", move || panic!("{owned}"));
        assert!(matches!(
            out,
            Err(BackendError::Transport { ref message, .. }) if message == "backend panicked: code 7"
        ));
    }

    #[test]
    fn counters_increment() {
        let calls = remote_calls_total();
        let resyncs = resyncs_total();
        let _ = trace_remote_call(Operation::ListContainers, "*", || Ok(()));
        record_resync_start(1);
        assert!(remote_calls_total() > calls);
        assert!(resyncs_total() > resyncs);
    }
}
