//! Exit spans as seen by a `tracing` subscriber.
//!
//! Each test installs its own subscriber with `tracing::subscriber::set_default`,
//! so captured spans are isolated per test thread.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use statement_tracing::prelude::*;
use statement_tracing::{Component, ContextManager, Error, TracingContext};
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;

#[derive(Debug, Clone)]
struct CapturedSpan {
    name: &'static str,
    fields: HashMap<String, String>,
    parent_name: Option<String>,
    closed: bool,
}

#[derive(Debug, Clone)]
struct CapturedEvent {
    parent_name: Option<String>,
    fields: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
struct Store {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl Store {
    fn spans(&self, name: &str) -> Vec<CapturedSpan> {
        self.spans
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.name == name)
            .cloned()
            .collect()
    }

    fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }
}

struct SpanIndex(usize);

struct CaptureLayer {
    store: Store,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: Context<'_, S>,
    ) {
        let mut fields = FieldVisitor(HashMap::new());
        attrs.record(&mut fields);

        let parent_name = attrs
            .parent()
            .and_then(|pid| ctx.span(pid))
            .map(|span| span.name().to_string())
            .or_else(|| ctx.lookup_current().map(|span| span.name().to_string()));

        let span_ref = ctx.span(id).expect("span should exist in registry");
        let index = {
            let mut spans = self.store.spans.lock().unwrap();
            spans.push(CapturedSpan {
                name: span_ref.metadata().name(),
                fields: fields.0,
                parent_name,
                closed: false,
            });
            spans.len() - 1
        };
        span_ref.extensions_mut().insert(SpanIndex(index));
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        ctx: Context<'_, S>,
    ) {
        if let Some(span_ref) = ctx.span(id) {
            if let Some(index) = span_ref.extensions().get::<SpanIndex>() {
                let mut visitor = FieldVisitor(HashMap::new());
                values.record(&mut visitor);
                if let Some(captured) = self.store.spans.lock().unwrap().get_mut(index.0) {
                    captured.fields.extend(visitor.0);
                }
            }
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
        let mut fields = FieldVisitor(HashMap::new());
        event.record(&mut fields);
        let parent_name = ctx.event_span(event).map(|span| span.name().to_string());
        self.store.events.lock().unwrap().push(CapturedEvent {
            parent_name,
            fields: fields.0,
        });
    }

    fn on_close(&self, id: tracing::span::Id, ctx: Context<'_, S>) {
        if let Some(span_ref) = ctx.span(&id) {
            if let Some(index) = span_ref.extensions().get::<SpanIndex>() {
                if let Some(captured) = self.store.spans.lock().unwrap().get_mut(index.0) {
                    captured.closed = true;
                }
            }
        }
    }
}

struct FieldVisitor(HashMap<String, String>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{:?}", value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }
}

fn init_test_tracing() -> (Store, tracing::subscriber::DefaultGuard) {
    let store = Store::default();
    let layer = CaptureLayer {
        store: store.clone(),
    };
    let subscriber = tracing_subscriber::Registry::default().with(layer);
    let guard = tracing::subscriber::set_default(subscriber);
    (store, guard)
}

#[derive(Debug, PartialEq, thiserror::Error)]
enum DriverError {
    #[error("ORA-01017: invalid username/password")]
    Denied,
    #[error("tracing failed: {0}")]
    Tracing(String),
}

impl From<Error> for DriverError {
    fn from(e: Error) -> Self {
        DriverError::Tracing(e.to_string())
    }
}

fn oracle_statement(sql: &str) -> TracedStatement<()> {
    let connection = ConnectionInfo::parse_url("jdbc:oracle:thin:@db1:1521:ORCL").unwrap();
    TracedStatement::new((), StatementContext::new(Some(connection), sql, "PreparedStatement"))
}

#[test]
fn batch_call_records_span_fields() {
    let (store, _guard) = init_test_tracing();
    let interceptor = StatementInterceptor::new(TracingConfig::development());
    let mut statement = oracle_statement("INSERT INTO t (a, b) VALUES (?, ?)");
    statement.set_parameter(1, "x").unwrap();
    statement.set_parameter(2, 9i64).unwrap();

    let counts = interceptor
        .intercept(&statement, StatementMethod::ExecuteBatch, || {
            Ok::<_, DriverError>(vec![1i32, 2, 3])
        })
        .unwrap();
    assert_eq!(counts, vec![1, 2, 3]);

    let spans = store.spans("db.exit");
    assert_eq!(spans.len(), 1);
    let span = &spans[0];
    assert!(span.closed);
    assert_eq!(span.fields["otel.name"], "Oracle/JDBC/PreparedStatement/executeBatch");
    assert_eq!(span.fields["peer.address"], "db1:1521");
    assert_eq!(span.fields["db.type"], "Oracle");
    assert_eq!(span.fields["db.instance"], "ORCL");
    assert_eq!(span.fields["db.statement"], "INSERT INTO t (a, b) VALUES (?, ?)");
    assert_eq!(span.fields["db.sql.parameters"], "[x,9]");
    assert_eq!(span.fields["db.sql.results"], "[3,6]");
    assert_eq!(span.fields["component"], Component::ORACLE.name);
    assert_eq!(span.fields["span.layer"], "Database");
    assert_eq!(span.fields["otel.status_code"], "OK");
    assert!(span.fields.contains_key("db.duration_ms"));
}

#[test]
fn failed_call_records_error() {
    let (store, _guard) = init_test_tracing();
    let interceptor = StatementInterceptor::default();
    let statement = oracle_statement("SELECT 1 FROM dual");

    let err = interceptor
        .intercept(&statement, StatementMethod::ExecuteQuery, || {
            Err::<(), _>(DriverError::Denied)
        })
        .unwrap_err();
    assert_eq!(err, DriverError::Denied);

    let spans = store.spans("db.exit");
    assert_eq!(spans.len(), 1);
    let span = &spans[0];
    assert!(span.closed);
    assert_eq!(span.fields["otel.status_code"], "ERROR");
    assert_eq!(span.fields["error.message"], "ORA-01017: invalid username/password");
    assert!(!span.fields.contains_key("db.sql.results"));

    let errors: Vec<_> = store
        .events()
        .into_iter()
        .filter(|e| e.fields.contains_key("error.kind"))
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].parent_name.as_deref(), Some("db.exit"));
}

#[test]
fn exit_span_nests_under_current_span() {
    let (store, _guard) = init_test_tracing();
    let interceptor = StatementInterceptor::default();
    let statement = oracle_statement("UPDATE t SET a = 1");

    let request = tracing::info_span!("http.request");
    let rows = request.in_scope(|| {
        interceptor.intercept(&statement, StatementMethod::ExecuteUpdate, || {
            tracing::info_span!("driver.roundtrip").in_scope(|| Ok::<_, DriverError>(4i32))
        })
    });
    assert_eq!(rows.unwrap(), 4);

    let exit = &store.spans("db.exit")[0];
    assert_eq!(exit.parent_name.as_deref(), Some("http.request"));
    assert_eq!(exit.fields["db.sql.results"], "[4]");

    let driver = &store.spans("driver.roundtrip")[0];
    assert_eq!(driver.parent_name.as_deref(), Some("db.exit"));
}

#[test]
fn untraced_statement_creates_no_span() {
    let (store, _guard) = init_test_tracing();
    let interceptor = StatementInterceptor::new(TracingConfig::development());
    let statement = TracedStatement::new((), StatementContext::new(None, "SELECT 1", "Statement"));

    let ret = interceptor
        .intercept(&statement, StatementMethod::ExecuteUpdate, || Ok::<_, DriverError>(1i32))
        .unwrap();

    assert_eq!(ret, 1);
    assert!(store.spans("db.exit").is_empty());
    assert_eq!(interceptor.context().depth(), 0);
}

#[test]
fn slow_call_is_flagged() {
    let (store, _guard) = init_test_tracing();
    let interceptor = StatementInterceptor::new(
        TracingConfig::default().with_slow_query_threshold(std::time::Duration::ZERO),
    );
    let statement = oracle_statement("SELECT 1 FROM dual");

    interceptor
        .intercept(&statement, StatementMethod::Execute, || {
            std::thread::sleep(std::time::Duration::from_millis(2));
            Ok::<_, DriverError>(true)
        })
        .unwrap();

    assert_eq!(store.spans("db.exit")[0].fields["slow_query"], "true");
}

#[test]
fn manual_entry_points_close_the_span() {
    let (store, _guard) = init_test_tracing();
    let context = TracingContext::default();
    let interceptor = StatementInterceptor::with_context(&context, TracingConfig::default());
    let statement = oracle_statement("DELETE FROM t");

    assert!(interceptor
        .before_call(&statement, StatementMethod::ExecuteUpdate)
        .unwrap());
    assert_eq!(context.depth(), 1);
    interceptor.on_error(&statement, &DriverError::Denied);
    assert_eq!(context.depth(), 1);
    interceptor.stop(&statement);
    assert_eq!(context.depth(), 0);
    assert!(context.active_span().is_none());

    let span = &store.spans("db.exit")[0];
    assert!(span.closed);
    assert_eq!(span.fields["otel.status_code"], "ERROR");
}
