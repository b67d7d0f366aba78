//! Per-statement metadata attached to an intercepted statement object.

use std::fmt;

use crate::error::{Error, Result};
use crate::tags::Component;

/// Initial capacity of the bound parameter array.
const DEFAULT_PARAMETERS_SIZE: usize = 32;

/// A value bound to a statement placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("null"),
            SqlValue::Bool(v) => write!(f, "{v}"),
            SqlValue::Int(v) => write!(f, "{v}"),
            SqlValue::Float(v) => write!(f, "{v}"),
            SqlValue::Text(v) => f.write_str(v),
            SqlValue::Bytes(bytes) => {
                f.write_str("0x")?;
                for b in bytes {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(value.into())
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Bytes(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

/// The execute-family methods that get intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementMethod {
    Execute,
    ExecuteQuery,
    ExecuteBatch,
    ExecuteUpdate,
    ExecuteLargeUpdate,
}

impl StatementMethod {
    /// Match a method name against the intercepted set.
    ///
    /// Returns `None` for methods that are not traced.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "execute" => Some(StatementMethod::Execute),
            "executeQuery" => Some(StatementMethod::ExecuteQuery),
            "executeBatch" => Some(StatementMethod::ExecuteBatch),
            "executeUpdate" => Some(StatementMethod::ExecuteUpdate),
            "executeLargeUpdate" => Some(StatementMethod::ExecuteLargeUpdate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatementMethod::Execute => "execute",
            StatementMethod::ExecuteQuery => "executeQuery",
            StatementMethod::ExecuteBatch => "executeBatch",
            StatementMethod::ExecuteUpdate => "executeUpdate",
            StatementMethod::ExecuteLargeUpdate => "executeLargeUpdate",
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, StatementMethod::ExecuteBatch)
    }

    /// Only `executeUpdate` carries a `[count]` results tag.
    pub fn is_update(&self) -> bool {
        matches!(self, StatementMethod::ExecuteUpdate)
    }
}

impl fmt::Display for StatementMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of the connection a statement was prepared on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    db_type: String,
    database_name: String,
    database_peer: String,
    component: Component,
}

impl ConnectionInfo {
    /// Connection identity with the database kind derived from the component.
    pub fn new(
        component: Component,
        host: &str,
        port: i32,
        database_name: impl Into<String>,
    ) -> Self {
        Self {
            db_type: component.db_type().to_string(),
            database_name: database_name.into(),
            database_peer: format!("{host}:{port}"),
            component,
        }
    }

    /// Connection identity with an explicit database kind and peer string.
    pub fn with_peer(
        component: Component,
        db_type: impl Into<String>,
        database_peer: impl Into<String>,
        database_name: impl Into<String>,
    ) -> Self {
        Self {
            db_type: db_type.into(),
            database_name: database_name.into(),
            database_peer: database_peer.into(),
            component,
        }
    }

    pub fn db_type(&self) -> &str {
        &self.db_type
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    /// Network peer as `host:port`, comma-separated for multi-host connections.
    pub fn database_peer(&self) -> &str {
        &self.database_peer
    }

    pub fn component(&self) -> Component {
        self.component
    }
}

/// Metadata cached alongside a prepared statement.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementContext {
    statement_name: String,
    sql: String,
    parameters: Vec<Option<SqlValue>>,
    max_index: usize,
    connection: Option<ConnectionInfo>,
}

impl StatementContext {
    pub fn new(
        connection: Option<ConnectionInfo>,
        sql: impl Into<String>,
        statement_name: impl Into<String>,
    ) -> Self {
        Self {
            statement_name: statement_name.into(),
            sql: sql.into(),
            parameters: Vec::new(),
            max_index: 0,
            connection,
        }
    }

    pub fn statement_name(&self) -> &str {
        &self.statement_name
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn connection_info(&self) -> Option<&ConnectionInfo> {
        self.connection.as_ref()
    }

    /// Bound values by zero-based position. Unset slots are `None`.
    pub fn parameters(&self) -> &[Option<SqlValue>] {
        &self.parameters
    }

    /// Highest 1-based index bound so far.
    pub fn max_index(&self) -> usize {
        self.max_index
    }

    /// Record a value bound at a 1-based placeholder index.
    pub fn set_parameter(&mut self, index: usize, value: impl Into<SqlValue>) -> Result<()> {
        if index == 0 {
            return Err(Error::InvalidParameterIndex);
        }

        self.max_index = self.max_index.max(index);

        let slot = index - 1;
        if slot >= self.parameters.len() {
            let new_len = index.max(self.parameters.len() * 2).max(DEFAULT_PARAMETERS_SIZE);
            self.parameters.resize(new_len, None);
        }
        self.parameters[slot] = Some(value.into());

        Ok(())
    }

    pub fn clear_parameters(&mut self) {
        self.parameters.clear();
        self.max_index = 0;
    }
}

/// Lookup of the cached context for an intercepted statement object.
pub trait EnhancedStatement {
    fn statement_context(&self) -> Option<&StatementContext>;
}

impl EnhancedStatement for StatementContext {
    fn statement_context(&self) -> Option<&StatementContext> {
        Some(self)
    }
}

impl<T: EnhancedStatement + ?Sized> EnhancedStatement for &T {
    fn statement_context(&self) -> Option<&StatementContext> {
        (**self).statement_context()
    }
}

/// A statement handle that owns its cached context.
///
/// # Example
///
/// ```rust
/// use statement_tracing::{Component, ConnectionInfo, StatementContext, TracedStatement};
///
/// let connection = ConnectionInfo::new(Component::ORACLE, "db1", 1521, "ORCL");
/// let context = StatementContext::new(Some(connection), "SELECT 1 FROM dual", "PreparedStatement");
/// let mut statement = TracedStatement::new((), context);
/// statement.set_parameter(1, "abc").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct TracedStatement<S> {
    inner: S,
    context: Option<StatementContext>,
}

impl<S> TracedStatement<S> {
    pub fn new(inner: S, context: StatementContext) -> Self {
        Self {
            inner,
            context: Some(context),
        }
    }

    /// Wrap a statement whose context was never captured.
    pub fn untraced(inner: S) -> Self {
        Self {
            inner,
            context: None,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Bind a parameter on the cached context. A no-op for untraced statements.
    pub fn set_parameter(&mut self, index: usize, value: impl Into<SqlValue>) -> Result<()> {
        match &mut self.context {
            Some(context) => context.set_parameter(index, value),
            None => Ok(()),
        }
    }

    pub fn clear_parameters(&mut self) {
        if let Some(context) = &mut self.context {
            context.clear_parameters();
        }
    }
}

impl<S> EnhancedStatement for TracedStatement<S> {
    fn statement_context(&self) -> Option<&StatementContext> {
        self.context.as_ref()
    }
}
