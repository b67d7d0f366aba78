//! Connection URL parsing for building [`ConnectionInfo`].

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::statement::ConnectionInfo;
use crate::tags::Component;

const ORACLE_DEFAULT_PORT: i32 = 1521;
const POSTGRESQL_DEFAULT_PORT: i32 = 5432;
const MYSQL_DEFAULT_PORT: i32 = 3306;
const H2_DEFAULT_PORT: i32 = 8084;

// Regex patterns for URL decomposition (compiled once)
static ORACLE_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^jdbc:oracle:(?:thin|oci):[^@]*@(?://)?([^:/()\s]+)(?::(\d+))?(?:[:/]([\w.$#-]+))?")
        .expect("valid oracle url regex")
});

static TNS_HOST_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\(\s*HOST\s*=\s*([^)\s]+)\s*\)").expect("valid host regex"));

static TNS_PORT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\(\s*PORT\s*=\s*(\d+)\s*\)").expect("valid port regex"));

static TNS_SERVICE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\(\s*(?:SERVICE_NAME|SID)\s*=\s*([^)\s]+)\s*\)").expect("valid service regex")
});

static NETWORK_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^jdbc:(postgresql|mysql|h2:tcp|h2:ssl)://([^/:?,;\s]+)(?::(\d+))?(?:/([^?;]*))?")
        .expect("valid network url regex")
});

static H2_EMBEDDED_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^jdbc:h2:(?:(?:mem|file):)?([^;]*)").expect("valid h2 url regex")
});

impl ConnectionInfo {
    /// Build connection identity from a JDBC URL.
    ///
    /// # Example
    ///
    /// ```rust
    /// use statement_tracing::ConnectionInfo;
    ///
    /// let info = ConnectionInfo::parse_url("jdbc:oracle:thin:@db1:1521:ORCL").unwrap();
    /// assert_eq!(info.database_peer(), "db1:1521");
    /// assert_eq!(info.database_name(), "ORCL");
    /// ```
    pub fn parse_url(url: &str) -> Result<Self> {
        let trimmed = url.trim();
        let lower = trimmed.to_ascii_lowercase();

        if lower.starts_with("jdbc:oracle:") {
            parse_oracle(trimmed)
        } else if lower.starts_with("jdbc:postgresql:") || lower.starts_with("jdbc:mysql:") {
            parse_network(trimmed)
        } else if lower.starts_with("jdbc:h2:tcp:") || lower.starts_with("jdbc:h2:ssl:") {
            parse_network(trimmed)
        } else if lower.starts_with("jdbc:h2:") {
            parse_h2_embedded(trimmed)
        } else {
            Err(Error::UnsupportedUrl(trimmed.to_string()))
        }
    }
}

fn parse_port(url: &str, digits: Option<regex::Match<'_>>, default: i32) -> Result<i32> {
    match digits {
        Some(m) => m
            .as_str()
            .parse()
            .map_err(|_| Error::MalformedUrl(url.to_string())),
        None => Ok(default),
    }
}

fn parse_oracle(url: &str) -> Result<ConnectionInfo> {
    let after_at = url.split_once('@').map(|(_, rest)| rest.trim_start());
    if after_at.is_some_and(|rest| rest.starts_with('(')) {
        return parse_tns_descriptor(url);
    }

    let caps = ORACLE_URL_REGEX
        .captures(url)
        .ok_or_else(|| Error::MalformedUrl(url.to_string()))?;

    let host = caps.get(1).map_or("", |m| m.as_str());
    let port = parse_port(url, caps.get(2), ORACLE_DEFAULT_PORT)?;
    let database = caps.get(3).map_or("", |m| m.as_str());

    Ok(ConnectionInfo::new(Component::ORACLE, host, port, database))
}

fn parse_tns_descriptor(url: &str) -> Result<ConnectionInfo> {
    let hosts: Vec<&str> = TNS_HOST_REGEX
        .captures_iter(url)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    if hosts.is_empty() {
        return Err(Error::MalformedUrl(url.to_string()));
    }

    let ports = TNS_PORT_REGEX
        .captures_iter(url)
        .map(|caps| parse_port(url, caps.get(1), ORACLE_DEFAULT_PORT))
        .collect::<Result<Vec<_>>>()?;

    let peer = hosts
        .iter()
        .enumerate()
        .map(|(i, host)| {
            let port = ports.get(i).copied().unwrap_or(ORACLE_DEFAULT_PORT);
            format!("{host}:{port}")
        })
        .collect::<Vec<_>>()
        .join(",");

    let database = TNS_SERVICE_REGEX
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map_or("", |m| m.as_str());

    Ok(ConnectionInfo::with_peer(
        Component::ORACLE,
        Component::ORACLE.db_type(),
        peer,
        database,
    ))
}

fn parse_network(url: &str) -> Result<ConnectionInfo> {
    let caps = NETWORK_URL_REGEX
        .captures(url)
        .ok_or_else(|| Error::MalformedUrl(url.to_string()))?;

    let scheme = caps.get(1).map_or("", |m| m.as_str()).to_ascii_lowercase();
    let (component, default_port) = match scheme.as_str() {
        "postgresql" => (Component::POSTGRESQL, POSTGRESQL_DEFAULT_PORT),
        "mysql" => (Component::MYSQL, MYSQL_DEFAULT_PORT),
        _ => (Component::H2, H2_DEFAULT_PORT),
    };

    let host = caps.get(2).map_or("", |m| m.as_str());
    let port = parse_port(url, caps.get(3), default_port)?;
    let database = caps.get(4).map_or("", |m| m.as_str());

    Ok(ConnectionInfo::new(component, host, port, database))
}

fn parse_h2_embedded(url: &str) -> Result<ConnectionInfo> {
    let database = H2_EMBEDDED_REGEX
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map_or("", |m| m.as_str());

    Ok(ConnectionInfo::new(Component::H2, "localhost", -1, database))
}
