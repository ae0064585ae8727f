//! Database Client
//!
//! A minimal prepared-statement client over a single lazily created
//! connection.
//!
//! # Binding Contract
//! Every statement is prepared by the connection and executed with named
//! parameters. Caller-supplied values never reach the statement text without
//! going through the driver's binding or escaping.
//!
//! # Failure Classification
//! Driver failures from any phase (connect, prepare, execute, fetch) are
//! surfaced as [`WardenError::Client`] carrying the driver error as source.
//!
//! # Connection Lifecycle
//! The first statement opens the connection. A failed attempt is terminal for
//! the client: later calls fail immediately without reconnecting. The
//! connection lives as long as the client.

use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use tracing::{debug, warn};

use crate::config::{ConnectionDescriptor, ConnectionParams};
use crate::error::{BoxError, Result, WardenError};

#[cfg(feature = "mysql")]
pub mod mysql;

/// Result type returned by connection implementations
pub type DriverResult<T> = std::result::Result<T, BoxError>;

/// Semantic type of a bound parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Bool,
    Int,
    Lob,
    Null,
    Str,
}

/// A bound parameter value with its semantic type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Bool(bool),
    Int(i64),
    Lob(Vec<u8>),
    Null,
    Str(String),
}

impl Param {
    #[must_use]
    pub const fn kind(&self) -> ParamKind {
        match self {
            Self::Bool(_) => ParamKind::Bool,
            Self::Int(_) => ParamKind::Int,
            Self::Lob(_) => ParamKind::Lob,
            Self::Null => ParamKind::Null,
            Self::Str(_) => ParamKind::Str,
        }
    }
}

// Bare values bind as strings unless a kind is given explicitly.
impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for Param {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

/// Named parameter set for one statement
///
/// Names are stored without the leading `:`; `":user"` and `"user"` address
/// the same parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, Param>);

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, builder style
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<Param>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Param>) {
        let name = name.strip_prefix(':').unwrap_or(name);
        self.0.insert(name.to_string(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Param> {
        self.0.get(name.strip_prefix(':').unwrap_or(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.0.iter().map(|(name, param)| (name.as_str(), param))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Statement text paired with its parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Params,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Params) -> Self {
        Self { sql: sql.into(), params }
    }

    /// Statement without parameters
    pub fn bare(sql: impl Into<String>) -> Self {
        Self::new(sql, Params::new())
    }
}

/// A result row, addressable by position or by column name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<serde_json::Value>,
}

impl Row {
    /// Create a row; `columns` and `values` are matched by position
    #[must_use]
    pub fn new(columns: Vec<String>, values: Vec<serde_json::Value>) -> Self {
        Self { columns, values }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&serde_json::Value> {
        self.values.get(index)
    }

    #[must_use]
    pub fn get_by_name(&self, column: &str) -> Option<&serde_json::Value> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.values.get(index)
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A live server connection
///
/// The three phases are separate so each failure can be classified.
/// `fetch_all` returns the rows produced by the preceding `execute`.
pub trait Connection: Send {
    type Statement: Send + Sync;

    fn prepare(
        &mut self,
        sql: &str,
    ) -> impl Future<Output = DriverResult<Self::Statement>> + Send;

    fn execute(
        &mut self,
        statement: &Self::Statement,
        params: &Params,
    ) -> impl Future<Output = DriverResult<bool>> + Send;

    fn fetch_all(
        &mut self,
        statement: &Self::Statement,
    ) -> impl Future<Output = DriverResult<Vec<Row>>> + Send;
}

/// Opens connections from parsed connection parameters
pub trait ConnectionFactory {
    type Connection: Connection;

    fn create(
        &self,
        params: &ConnectionParams,
    ) -> impl Future<Output = DriverResult<Self::Connection>> + Send;
}

enum ConnectionState<C> {
    Idle,
    Connected(C),
    Failed,
}

/// Prepared-statement client over one lazily opened connection
pub struct Client<F: ConnectionFactory> {
    descriptor: ConnectionDescriptor,
    factory: F,
    state: ConnectionState<F::Connection>,
}

impl<F: ConnectionFactory> Client<F> {
    pub fn new(descriptor: ConnectionDescriptor, factory: F) -> Self {
        Self { descriptor, factory, state: ConnectionState::Idle }
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    /// Mutable access, e.g. to point the client at a new URL before first use
    pub fn descriptor_mut(&mut self) -> &mut ConnectionDescriptor {
        &mut self.descriptor
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Return the live connection, opening it on first use
    pub async fn connection(&mut self) -> Result<&mut F::Connection> {
        if matches!(self.state, ConnectionState::Idle) {
            let params = self.descriptor.params()?.clone();
            // A URL without a host is a configuration problem, not a failed attempt
            params.dsn()?;
            match self.factory.create(&params).await {
                Ok(conn) => self.state = ConnectionState::Connected(conn),
                Err(e) => {
                    warn!(server = %params.redacted(), error = %e, "connection failed");
                    self.state = ConnectionState::Failed;
                    return Err(WardenError::client("Failed to create a MySQL connection.", e));
                }
            }
        }

        match &mut self.state {
            ConnectionState::Connected(conn) => Ok(conn),
            ConnectionState::Idle | ConnectionState::Failed => Err(WardenError::client(
                "Failed to create a MySQL connection.",
                "an earlier connection attempt failed",
            )),
        }
    }

    /// Prepare and execute a statement, returning the driver's success flag
    pub async fn execute(&mut self, sql: &str, params: &Params) -> Result<bool> {
        let conn = self.connection().await?;
        let prepared = prepare(&mut *conn, sql).await?;

        conn.execute(&prepared, params)
            .await
            .map_err(|e| WardenError::client("Failed to execute MySQL statement.", e))
    }

    /// Prepare and execute a statement, returning every result row
    pub async fn query_all(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>> {
        let conn = self.connection().await?;
        let prepared = prepare(&mut *conn, sql).await?;

        conn.execute(&prepared, params)
            .await
            .map_err(|e| WardenError::client("Failed to execute MySQL statement.", e))?;

        conn.fetch_all(&prepared).await.map_err(|e| {
            WardenError::client("Failed to fetch results of a MySQL statement execution.", e)
        })
    }

    /// First row of the result, if any
    pub async fn query_single(&mut self, sql: &str, params: &Params) -> Result<Option<Row>> {
        Ok(self.query_all(sql, params).await?.into_iter().next())
    }

    /// Execute a prebuilt [`Statement`]
    pub async fn run(&mut self, statement: &Statement) -> Result<bool> {
        self.execute(&statement.sql, &statement.params).await
    }
}

async fn prepare<C: Connection>(conn: &mut C, sql: &str) -> Result<C::Statement> {
    debug!(statement = sql, "preparing statement");
    conn.prepare(sql)
        .await
        .map_err(|e| WardenError::client("Failed to prepare MySQL statement.", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_bare_values_default_to_str() {
        let params = Params::new().with(":user", "bob").with("pos", Param::Int(4));
        assert_eq!(params.get("user"), Some(&Param::Str("bob".to_string())));
        assert_eq!(params.get(":pos").map(Param::kind), Some(ParamKind::Int));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_param_kinds() {
        assert_eq!(Param::Bool(true).kind(), ParamKind::Bool);
        assert_eq!(Param::Lob(vec![0, 1]).kind(), ParamKind::Lob);
        assert_eq!(Param::Null.kind(), ParamKind::Null);
        assert_eq!(Param::from(String::from("x")).kind(), ParamKind::Str);
    }

    #[test]
    fn test_row_lookup_by_index_and_name() {
        let row = Row::new(
            vec!["user".to_string(), "host".to_string()],
            vec![json!("bob"), json!("%")],
        );
        assert_eq!(row.get(1), Some(&json!("%")));
        assert_eq!(row.get_by_name("user"), Some(&json!("bob")));
        assert_eq!(row.get_by_name("missing"), None);
        assert_eq!(row.get(2), None);
    }
}
