//! Before/after/error interception of statement execution calls.

use std::sync::Arc;

use crate::config::TracingConfig;
use crate::context::{ContextManager, ErrorRecord, SpanHandle, TracingContext};
use crate::error::Error;
use crate::parameters::ParameterFormatter;
use crate::statement::{ConnectionInfo, EnhancedStatement, StatementContext, StatementMethod};
use crate::tags::{SpanLayer, Tag};

/// Operation name of an exit span: `{db_type}/JDBC/{statement_name}/{method}`.
pub fn operation_name(db_type: &str, statement_name: &str, method: &str) -> String {
    format!("{db_type}/JDBC/{statement_name}/{method}")
}

/// Shape of a value returned by an intercepted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnValue {
    /// The call returned nothing (a null reference).
    Absent,
    /// A single update count.
    UpdateCount(i64),
    /// Per-item update counts of a batch, summarized.
    Batch { items: usize, sum: i64 },
    /// Anything else, e.g. a result set or an `execute` flag.
    Other,
}

/// Describes the return value of an execute-family call.
pub trait ExecuteReturn {
    fn return_value(&self) -> ReturnValue;
}

macro_rules! impl_update_count {
    ($($ty:ty),*) => {
        $(
            impl ExecuteReturn for $ty {
                fn return_value(&self) -> ReturnValue {
                    i64::try_from(*self).map_or(ReturnValue::Other, ReturnValue::UpdateCount)
                }
            }
        )*
    };
}

impl_update_count!(i32, i64, u32, u64, usize);

fn summarize<T: Copy + Into<i64>>(counts: &[T]) -> ReturnValue {
    ReturnValue::Batch {
        items: counts.len(),
        sum: counts
            .iter()
            .fold(0i64, |acc, c| acc.wrapping_add((*c).into())),
    }
}

impl ExecuteReturn for [i32] {
    fn return_value(&self) -> ReturnValue {
        summarize(self)
    }
}

impl ExecuteReturn for [i64] {
    fn return_value(&self) -> ReturnValue {
        summarize(self)
    }
}

impl ExecuteReturn for Vec<i32> {
    fn return_value(&self) -> ReturnValue {
        summarize(self.as_slice())
    }
}

impl ExecuteReturn for Vec<i64> {
    fn return_value(&self) -> ReturnValue {
        summarize(self.as_slice())
    }
}

impl ExecuteReturn for bool {
    fn return_value(&self) -> ReturnValue {
        ReturnValue::Other
    }
}

impl ExecuteReturn for () {
    fn return_value(&self) -> ReturnValue {
        ReturnValue::Other
    }
}

impl<T: ExecuteReturn> ExecuteReturn for Option<T> {
    fn return_value(&self) -> ReturnValue {
        match self {
            Some(value) => value.return_value(),
            None => ReturnValue::Absent,
        }
    }
}

impl<T: ExecuteReturn + ?Sized> ExecuteReturn for &T {
    fn return_value(&self) -> ReturnValue {
        (**self).return_value()
    }
}

/// Value of the `db.sql.results` tag for a call, if it gets one.
fn sql_results(method: StatementMethod, value: ReturnValue) -> Option<String> {
    match value {
        ReturnValue::Batch { items, sum } if method.is_batch() => Some(format!("[{items},{sum}]")),
        ReturnValue::UpdateCount(count) if method.is_update() => Some(format!("[{count}]")),
        _ => None,
    }
}

/// Context and connection of a statement that should be traced.
fn traced_parts<S>(statement: &S) -> Option<(&StatementContext, &ConnectionInfo)>
where
    S: EnhancedStatement + ?Sized,
{
    let context = statement.statement_context()?;
    let connection = context.connection_info()?;
    Some((context, connection))
}

/// Opens, annotates, and closes exit spans around statement executions.
///
/// The three entry points mirror around-advice: [`before_call`] runs before the
/// wrapped method, then exactly one of [`after_call`] (normal return) or
/// [`on_error`] followed by [`stop`] (failure). [`intercept`] wires all of this
/// around a closure.
///
/// Statements without cached context or connection info pass through untraced.
///
/// [`before_call`]: StatementInterceptor::before_call
/// [`after_call`]: StatementInterceptor::after_call
/// [`on_error`]: StatementInterceptor::on_error
/// [`stop`]: StatementInterceptor::stop
/// [`intercept`]: StatementInterceptor::intercept
#[derive(Debug, Clone)]
pub struct StatementInterceptor<C = TracingContext> {
    context: C,
    config: Arc<TracingConfig>,
}

impl StatementInterceptor<TracingContext> {
    /// Create an interceptor backed by [`TracingContext`].
    pub fn new(config: TracingConfig) -> Self {
        let context = TracingContext::from_config(&config);
        Self::with_context(context, config)
    }
}

impl Default for StatementInterceptor<TracingContext> {
    fn default() -> Self {
        Self::new(TracingConfig::default())
    }
}

impl<C: ContextManager> StatementInterceptor<C> {
    pub fn with_context(context: C, config: TracingConfig) -> Self {
        Self {
            context,
            config: Arc::new(config),
        }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn config(&self) -> &TracingConfig {
        &self.config
    }

    /// Open and tag an exit span for the call.
    ///
    /// Returns `Ok(true)` if a span was opened, `Ok(false)` if the statement is
    /// not traced. Failures of the context manager are returned as is.
    pub fn before_call<S>(&self, statement: &S, method: StatementMethod) -> Result<bool, Error>
    where
        S: EnhancedStatement + ?Sized,
    {
        let Some((cache, connection)) = traced_parts(statement) else {
            tracing::trace!(method = %method, "Statement has no connection info, not tracing");
            return Ok(false);
        };

        let name = operation_name(
            connection.db_type(),
            cache.statement_name(),
            method.as_str(),
        );
        let span = self
            .context
            .create_exit_span(&name, connection.database_peer())?;

        span.set_tag(Tag::DbType, connection.db_type());
        span.set_tag(Tag::DbInstance, connection.database_name());
        span.set_tag(Tag::DbStatement, cache.sql());
        span.set_component(connection.component());

        let config = &*self.config;
        if config.trace_sql_parameters {
            let parameters = cache.parameters();
            if !parameters.is_empty() {
                let rendered = ParameterFormatter::new(config.sql_parameters_max_length)
                    .render(parameters, cache.max_index());
                span.set_tag(Tag::SqlParameters, &rendered);
            }
        }

        span.set_layer(SpanLayer::Database);

        Ok(true)
    }

    /// Record the call's results and close its span. Returns `ret` unchanged.
    pub fn after_call<S, R>(&self, statement: &S, method: StatementMethod, ret: R) -> R
    where
        S: EnhancedStatement + ?Sized,
        R: ExecuteReturn,
    {
        if traced_parts(statement).is_none() {
            return ret;
        }

        self.record_results(method, &ret);
        self.stop(statement);
        ret
    }

    fn record_results<R: ExecuteReturn>(&self, method: StatementMethod, ret: &R) {
        if let Some(results) = sql_results(method, ret.return_value()) {
            match self.context.active_span() {
                Some(span) => span.set_tag(Tag::SqlResults, &results),
                None => tracing::warn!(method = %method, "No active span to record results on"),
            }
        }
    }

    /// Mark the active span as failed and log `error` on it.
    ///
    /// The span stays open; the caller closes it and returns `error` unchanged.
    pub fn on_error<S, E>(&self, statement: &S, error: &E)
    where
        S: EnhancedStatement + ?Sized,
        E: std::error::Error + ?Sized,
    {
        if traced_parts(statement).is_none() {
            return;
        }

        match self.context.active_span() {
            Some(span) => {
                span.error_occurred();
                span.log(&ErrorRecord::from_error(error));
            }
            None => tracing::warn!(error = %error, "No active span to mark as failed"),
        }
    }

    /// Close the span opened by [`before_call`](Self::before_call) without
    /// recording results. Used on the error path.
    pub fn stop<S>(&self, statement: &S)
    where
        S: EnhancedStatement + ?Sized,
    {
        if traced_parts(statement).is_none() {
            return;
        }

        if let Err(e) = self.context.stop_span() {
            tracing::warn!(error = %e, "Failed to stop statement span");
        }
    }

    /// Run `call` inside an exit span.
    ///
    /// The `Ok` or `Err` value of `call` is returned unchanged. If `call` or
    /// the recording of its results panics, the span is marked as failed and
    /// closed while unwinding.
    ///
    /// # Example
    ///
    /// ```rust
    /// use statement_tracing::{
    ///     Component, ConnectionInfo, StatementContext, StatementInterceptor, StatementMethod,
    ///     TracedStatement,
    /// };
    ///
    /// #[derive(Debug)]
    /// struct DriverError(statement_tracing::Error);
    ///
    /// impl std::fmt::Display for DriverError {
    ///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    ///         write!(f, "{}", self.0)
    ///     }
    /// }
    ///
    /// impl std::error::Error for DriverError {}
    ///
    /// impl From<statement_tracing::Error> for DriverError {
    ///     fn from(e: statement_tracing::Error) -> Self {
    ///         DriverError(e)
    ///     }
    /// }
    ///
    /// let connection = ConnectionInfo::new(Component::ORACLE, "db1", 1521, "ORCL");
    /// let context = StatementContext::new(Some(connection), "UPDATE t SET a = 1", "PreparedStatement");
    /// let statement = TracedStatement::new((), context);
    ///
    /// let interceptor = StatementInterceptor::default();
    /// let rows = interceptor
    ///     .intercept(&statement, StatementMethod::ExecuteUpdate, || Ok::<_, DriverError>(4i32))
    ///     .unwrap();
    /// assert_eq!(rows, 4);
    /// ```
    pub fn intercept<S, T, E, F>(
        &self,
        statement: &S,
        method: StatementMethod,
        call: F,
    ) -> Result<T, E>
    where
        S: EnhancedStatement + ?Sized,
        T: ExecuteReturn,
        E: std::error::Error + From<Error>,
        F: FnOnce() -> Result<T, E>,
    {
        let opened = self.before_call(statement, method)?;
        let guard = OpenSpan {
            interceptor: self,
            statement,
            armed: opened,
        };

        // The guard owns the single `stop` for this call.
        match call() {
            Ok(ret) => {
                if opened {
                    self.record_results(method, &ret);
                }
                drop(guard);
                Ok(ret)
            }
            Err(err) => {
                self.on_error(statement, &err);
                drop(guard);
                Err(err)
            }
        }
    }
}

/// Closes a span when dropped while still armed.
struct OpenSpan<'a, C: ContextManager, S: EnhancedStatement + ?Sized> {
    interceptor: &'a StatementInterceptor<C>,
    statement: &'a S,
    armed: bool,
}

impl<C: ContextManager, S: EnhancedStatement + ?Sized> Drop for OpenSpan<'_, C, S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if std::thread::panicking() {
            if let Some(span) = self.interceptor.context.active_span() {
                span.error_occurred();
                span.log(&ErrorRecord {
                    kind: "panic".to_string(),
                    message: "statement call panicked".to_string(),
                    stack: Vec::new(),
                });
            }
        }
        self.interceptor.stop(self.statement);
    }
}
