//! Basic example showing how to use statement-tracing.
//!
//! Run with: cargo run --example basic

use statement_tracing::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Stand-in for a driver statement.
struct FakeStatement;

impl FakeStatement {
    fn execute_batch(&self) -> Result<Vec<i32>, statement_tracing::Error> {
        Ok(vec![1, 1, 1])
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,statement_tracing=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "jdbc:oracle:thin:@localhost:1521:ORCL".into());
    let connection = ConnectionInfo::parse_url(&url)?;

    // Parameter capture from SW_JDBC_TRACE_SQL_PARAMETERS, or force it on for the demo
    let config = TracingConfig::from_env()?.with_parameter_tracing(true);
    let interceptor = StatementInterceptor::new(config);

    let context = StatementContext::new(
        Some(connection),
        "INSERT INTO audit (user_id, action) VALUES (?, ?)",
        "PreparedStatement",
    );
    let mut statement = TracedStatement::new(FakeStatement, context);
    statement.set_parameter(1, 42i64)?;
    statement.set_parameter(2, "login")?;

    let request = tracing::info_span!("http.request", http.route = "/login");
    let counts = request.in_scope(|| {
        interceptor.intercept(&statement, StatementMethod::ExecuteBatch, || {
            statement.inner().execute_batch()
        })
    })?;

    tracing::info!(?counts, "Batch executed with tracing enabled");

    Ok(())
}
