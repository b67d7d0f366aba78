//! Span stack and span handles.
//!
//! [`ContextManager`] is the seam between the interceptor and whatever owns the
//! active-span stack. [`TracingContext`] is the default implementation, built on
//! `tracing` spans kept on a thread-local stack.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{field, span::EnteredSpan, Span};

use crate::config::TracingConfig;
use crate::error::{Error, Result};
use crate::tags::{Component, SpanLayer, Tag};

/// Error details logged on a span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Type name of the error.
    pub kind: String,
    pub message: String,
    /// Messages of the `source()` chain, outermost first.
    pub stack: Vec<String>,
}

impl ErrorRecord {
    pub fn from_error<E>(error: &E) -> Self
    where
        E: std::error::Error + ?Sized,
    {
        let mut stack = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            stack.push(cause.to_string());
            source = cause.source();
        }

        Self {
            kind: std::any::type_name::<E>().to_string(),
            message: error.to_string(),
            stack,
        }
    }
}

/// Operations the interceptor performs on an open span.
pub trait SpanHandle {
    fn set_tag(&self, tag: Tag, value: &str);

    fn set_component(&self, component: Component);

    fn set_layer(&self, layer: SpanLayer);

    /// Mark the span as failed.
    fn error_occurred(&self);

    /// Attach error details to the span.
    fn log(&self, error: &ErrorRecord);
}

/// Owner of the active-span stack for the calling execution context.
pub trait ContextManager {
    type Span: SpanHandle;

    /// Open an exit span towards `peer` and push it onto the stack.
    ///
    /// The new span is a child of the currently active span, if any.
    fn create_exit_span(&self, operation_name: &str, peer: &str) -> Result<Self::Span>;

    /// The top of the stack.
    fn active_span(&self) -> Option<Self::Span>;

    /// Pop and finish the top of the stack.
    fn stop_span(&self) -> Result<()>;
}

impl<C: ContextManager + ?Sized> ContextManager for &C {
    type Span = C::Span;

    fn create_exit_span(&self, operation_name: &str, peer: &str) -> Result<Self::Span> {
        (**self).create_exit_span(operation_name, peer)
    }

    fn active_span(&self) -> Option<Self::Span> {
        (**self).active_span()
    }

    fn stop_span(&self) -> Result<()> {
        (**self).stop_span()
    }
}

/// A `tracing` span opened for an outbound database call.
#[derive(Debug, Clone)]
pub struct ExitSpan {
    span: Span,
    errored: Rc<Cell<bool>>,
}

impl ExitSpan {
    /// The underlying `tracing` span.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn is_errored(&self) -> bool {
        self.errored.get()
    }
}

impl SpanHandle for ExitSpan {
    fn set_tag(&self, tag: Tag, value: &str) {
        self.span.record(tag.key(), value);
    }

    fn set_component(&self, component: Component) {
        self.span.record("component", component.name);
        self.span.record("component.id", component.id);
    }

    fn set_layer(&self, layer: SpanLayer) {
        self.span.record("span.layer", layer.as_str());
    }

    fn error_occurred(&self) {
        self.errored.set(true);
        self.span.record("otel.status_code", "ERROR");
    }

    fn log(&self, error: &ErrorRecord) {
        self.span.record("error.type", error.kind.as_str());
        self.span.record("error.message", error.message.as_str());

        let stack = error.stack.join("\n");
        tracing::error!(
            parent: &self.span,
            error.kind = %error.kind,
            error.message = %error.message,
            error.stack = %stack,
            "Statement execution failed"
        );
    }
}

struct StackEntry {
    handle: ExitSpan,
    // Keeps the span entered until it is popped.
    _entered: EnteredSpan,
    started: Instant,
}

thread_local! {
    static EXIT_SPANS: RefCell<Vec<StackEntry>> = const { RefCell::new(Vec::new()) };
}

/// [`ContextManager`] backed by `tracing` spans.
///
/// The stack is per thread: an exit span is entered when it is created, so
/// spans and events emitted by the driver during the call become its children,
/// and it is exited and closed by [`stop_span`](ContextManager::stop_span).
#[derive(Debug, Clone)]
pub struct TracingContext {
    slow_query_threshold: Duration,
}

impl Default for TracingContext {
    fn default() -> Self {
        Self::from_config(&TracingConfig::default())
    }
}

impl TracingContext {
    pub fn new(slow_query_threshold: Duration) -> Self {
        Self {
            slow_query_threshold,
        }
    }

    pub fn from_config(config: &TracingConfig) -> Self {
        Self::new(config.slow_query_threshold)
    }

    /// Number of exit spans open on the calling thread.
    pub fn depth(&self) -> usize {
        EXIT_SPANS.with(|stack| stack.borrow().len())
    }

    fn finish(&self, entry: StackEntry) {
        let StackEntry {
            handle,
            _entered: entered,
            started,
        } = entry;
        let span = handle.span();

        let elapsed = started.elapsed();
        let duration_ms = elapsed.as_millis() as i64;
        span.record("db.duration_ms", duration_ms);

        if elapsed > self.slow_query_threshold {
            span.record("slow_query", true);
            let threshold_ms = self.slow_query_threshold.as_millis() as i64;
            tracing::warn!(
                parent: span,
                duration_ms = duration_ms,
                threshold_ms = threshold_ms,
                "Slow statement detected"
            );
        }

        if !handle.is_errored() {
            span.record("otel.status_code", "OK");
        }

        drop(entered);
    }
}

impl ContextManager for TracingContext {
    type Span = ExitSpan;

    fn create_exit_span(&self, operation_name: &str, peer: &str) -> Result<ExitSpan> {
        let span = tracing::info_span!(
            "db.exit",
            "otel.name" = %operation_name,
            "otel.kind" = "client",
            "peer.address" = %peer,
            "component" = field::Empty,
            "component.id" = field::Empty,
            "span.layer" = field::Empty,
            "db.type" = field::Empty,
            "db.instance" = field::Empty,
            "db.statement" = field::Empty,
            "db.sql.parameters" = field::Empty,
            "db.sql.results" = field::Empty,
            "db.duration_ms" = field::Empty,
            "otel.status_code" = field::Empty,
            "error.type" = field::Empty,
            "error.message" = field::Empty,
            "slow_query" = field::Empty,
        );

        let handle = ExitSpan {
            span: span.clone(),
            errored: Rc::new(Cell::new(false)),
        };
        let entry = StackEntry {
            handle: handle.clone(),
            _entered: span.entered(),
            started: Instant::now(),
        };
        EXIT_SPANS.with(|stack| stack.borrow_mut().push(entry));

        Ok(handle)
    }

    fn active_span(&self) -> Option<ExitSpan> {
        EXIT_SPANS.with(|stack| stack.borrow().last().map(|entry| entry.handle.clone()))
    }

    fn stop_span(&self) -> Result<()> {
        let entry = EXIT_SPANS
            .with(|stack| stack.borrow_mut().pop())
            .ok_or(Error::NoActiveSpan)?;
        self.finish(entry);
        Ok(())
    }
}
