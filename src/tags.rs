//! Span tag vocabulary, span layers, and tracing components.

/// Tags set on statement exit spans.
///
/// The keys are stable strings consumed by downstream backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Database kind, e.g. `Oracle`.
    DbType,
    /// Logical database name.
    DbInstance,
    /// Full SQL text.
    DbStatement,
    /// Rendered bound parameters.
    SqlParameters,
    /// Row or update counts of the call.
    SqlResults,
}

impl Tag {
    pub const ALL: [Tag; 5] = [
        Tag::DbType,
        Tag::DbInstance,
        Tag::DbStatement,
        Tag::SqlParameters,
        Tag::SqlResults,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Tag::DbType => "db.type",
            Tag::DbInstance => "db.instance",
            Tag::DbStatement => "db.statement",
            Tag::SqlParameters => "db.sql.parameters",
            Tag::SqlResults => "db.sql.results",
        }
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Layer classification of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanLayer {
    Database,
}

impl SpanLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpanLayer::Database => "Database",
        }
    }
}

/// Library or driver that produced a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Component {
    pub id: u16,
    pub name: &'static str,
}

impl Component {
    pub const H2: Component = Component { id: 4, name: "h2" };
    pub const MYSQL: Component = Component { id: 5, name: "mysql" };
    pub const ORACLE: Component = Component { id: 6, name: "Oracle" };
    pub const POSTGRESQL: Component = Component {
        id: 22,
        name: "postgresql",
    };
    pub const SQLITE: Component = Component {
        id: 0,
        name: "sqlite",
    };

    /// Database kind reported in the `db.type` tag for this component.
    pub fn db_type(&self) -> &'static str {
        match *self {
            Component::H2 => "H2",
            Component::MYSQL => "Mysql",
            Component::ORACLE => "Oracle",
            Component::POSTGRESQL => "PostgreSQL",
            Component::SQLITE => "Sqlite",
            _ => "sql",
        }
    }
}

#[cfg(feature = "sea-orm")]
impl From<sea_orm::DbBackend> for Component {
    fn from(backend: sea_orm::DbBackend) -> Self {
        match backend {
            sea_orm::DbBackend::Postgres => Component::POSTGRESQL,
            sea_orm::DbBackend::MySql => Component::MYSQL,
            sea_orm::DbBackend::Sqlite => Component::SQLITE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_keys_are_stable() {
        let keys: Vec<_> = Tag::ALL.iter().map(Tag::key).collect();
        assert_eq!(
            keys,
            [
                "db.type",
                "db.instance",
                "db.statement",
                "db.sql.parameters",
                "db.sql.results"
            ]
        );
    }

    #[test]
    fn test_component_db_type() {
        assert_eq!(Component::ORACLE.db_type(), "Oracle");
        assert_eq!(Component::POSTGRESQL.db_type(), "PostgreSQL");
        assert_eq!(Component::SQLITE.db_type(), "Sqlite");
        let custom = Component { id: 900, name: "custom" };
        assert_eq!(custom.db_type(), "sql");
    }
}
