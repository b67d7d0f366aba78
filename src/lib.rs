//! # statement-tracing
//!
//! Tracing interception for prepared-statement execution calls.
//!
//! Every execute-family call on a traced statement (`execute`, `executeQuery`,
//! `executeBatch`, `executeUpdate`, `executeLargeUpdate`) gets exactly one exit
//! span. The span is opened before the call, annotated with database and
//! statement metadata, tagged with row/update counts or the error afterwards,
//! and always closed exactly once.
//!
//! ## Features
//!
//! - **Around-advice entry points**: `before_call`, `after_call`, and `on_error`
//!   for instrumentation layers that hook calls themselves
//! - **Closure wrapping**: `intercept` runs a call inside a span and closes it
//!   even if the call panics
//! - **Proper Span Nesting**: exit spans are children of the current tracing span
//! - **Parameter Visibility**: optionally attach bound parameter values, truncated
//!   to a configurable length
//! - **Connection URL parsing**: Oracle thin/TNS, PostgreSQL, MySQL, and H2 URLs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use statement_tracing::prelude::*;
//!
//! let connection = ConnectionInfo::parse_url("jdbc:oracle:thin:@db1:1521:ORCL")?;
//! let context = StatementContext::new(Some(connection), "UPDATE users SET active = ?", "PreparedStatement");
//! let mut statement = TracedStatement::new(driver_statement, context);
//! statement.set_parameter(1, true)?;
//!
//! let interceptor = StatementInterceptor::new(TracingConfig::default());
//! let updated = interceptor.intercept(&statement, StatementMethod::ExecuteUpdate, || {
//!     statement.inner().execute_update()
//! })?;
//! ```
//!
//! ## Configuration
//!
//! ```rust,ignore
//! use statement_tracing::TracingConfig;
//!
//! let config = TracingConfig::default()
//!     .with_parameter_tracing(true)      // Include bound parameters (default: false)
//!     .with_parameters_max_length(256)   // Truncate rendered parameters
//!     .with_slow_query_threshold(Duration::from_millis(100));
//!
//! // Or from SW_JDBC_TRACE_SQL_PARAMETERS / SW_JDBC_SQL_PARAMETERS_MAX_LENGTH
//! let config = TracingConfig::from_env()?;
//! ```
//!
//! ## Span Attributes
//!
//! | Attribute | Description |
//! |-----------|-------------|
//! | `otel.name` | `{db.type}/JDBC/{statement}/{method}` |
//! | `peer.address` | Database `host:port` |
//! | `db.type` | Database kind, e.g. "Oracle" |
//! | `db.instance` | Database name |
//! | `db.statement` | Full SQL text |
//! | `db.sql.parameters` | Bound parameters (when enabled) |
//! | `db.sql.results` | `[count]` for updates, `[items,sum]` for batches |
//! | `component` | Driver component name |
//! | `span.layer` | Always "Database" |
//! | `otel.status_code` | "OK" or "ERROR" |
//! | `error.type` / `error.message` | Error details (on failure) |

mod config;
mod context;
mod error;
mod interceptor;
mod parameters;
mod parser;
mod statement;
mod tags;

pub use config::{TracingConfig, ENV_SQL_PARAMETERS_MAX_LENGTH, ENV_TRACE_SQL_PARAMETERS};
pub use context::{ContextManager, ErrorRecord, ExitSpan, SpanHandle, TracingContext};
pub use error::{Error, Result};
pub use interceptor::{operation_name, ExecuteReturn, ReturnValue, StatementInterceptor};
pub use parameters::ParameterFormatter;
pub use statement::{
    ConnectionInfo, EnhancedStatement, SqlValue, StatementContext, StatementMethod,
    TracedStatement,
};
pub use tags::{Component, SpanLayer, Tag};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ConnectionInfo, EnhancedStatement, SqlValue, StatementContext, StatementInterceptor,
        StatementMethod, TracedStatement, TracingConfig,
    };
}
