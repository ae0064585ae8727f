//! MySQL Connection Implementation
//!
//! This module implements [`ConnectionFactory`] and [`Connection`] for MySQL
//! (including MariaDB) using `mysql_async`.
//!
//! # Implementation Notes
//! - Placeholders are bound on the client: MySQL's server-side prepare does
//!   not accept `?` markers in account names or `CHANGE MASTER` options
//! - Each bound value is rendered through the driver's own escaping
//!   (`Value::as_sql`); caller text never reaches the statement unescaped
//! - `Bool` binds as 0/1
//! - Rows are read during execution; stream errors fail `execute`
//! - BLOB data is Base64-encoded for JSON safety
//! - No timeout layer: the driver defaults apply

use mysql_async::{prelude::*, Conn, OptsBuilder, Value};
use mysql_common::named_params::ParsedNamedParams;

use crate::client::{Connection, ConnectionFactory, DriverResult, Param, Params, Row};
use crate::config::ConnectionParams;

/// Opens `mysql_async` connections
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlConnectionFactory;

impl ConnectionFactory for MySqlConnectionFactory {
    type Connection = MySqlConnection;

    async fn create(&self, params: &ConnectionParams) -> DriverResult<MySqlConnection> {
        let opts = build_mysql_opts(params)?;
        let conn = Conn::new(opts).await?;
        Ok(MySqlConnection { conn, pending: Vec::new() })
    }
}

/// A single MySQL connection
pub struct MySqlConnection {
    conn: Conn,
    pending: Vec<mysql_async::Row>,
}

/// Statement text split at its named placeholders
///
/// `fragments` always holds one more element than `names`; the value bound to
/// `names[i]` goes between `fragments[i]` and `fragments[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextStatement {
    fragments: Vec<Vec<u8>>,
    names: Vec<String>,
}

impl TextStatement {
    /// Split `sql` at its `:name` placeholders
    ///
    /// Placeholders inside quoted strings, identifiers and comments are left
    /// alone. Positional `?` markers are rejected.
    pub fn parse(sql: &str) -> DriverResult<Self> {
        let parsed = ParsedNamedParams::parse(sql.as_bytes())
            .map_err(|_| "statement mixes named and positional placeholders")?;

        let names: Vec<String> = parsed
            .params()
            .iter()
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .collect();
        let fragments: Vec<Vec<u8>> = if names.is_empty() {
            vec![parsed.query().to_vec()]
        } else {
            parsed.query().split(|b| *b == b'?').map(<[u8]>::to_vec).collect()
        };

        if fragments.len() != names.len() + 1 {
            return Err("statement text contains a literal '?' next to named placeholders".into());
        }
        Ok(Self { fragments, names })
    }

    /// Placeholder names in order of appearance (a name may repeat)
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Statement text with every placeholder replaced by its escaped value
    pub fn render(&self, params: &Params) -> DriverResult<Vec<u8>> {
        let mut sql = self.fragments[0].clone();
        for (name, fragment) in self.names.iter().zip(&self.fragments[1..]) {
            let param = params
                .get(name)
                .ok_or_else(|| format!("no value bound for parameter :{name}"))?;
            sql.extend_from_slice(param_to_value(param).as_sql(false).as_bytes());
            sql.extend_from_slice(fragment);
        }
        Ok(sql)
    }
}

impl Connection for MySqlConnection {
    type Statement = TextStatement;

    async fn prepare(&mut self, sql: &str) -> DriverResult<Self::Statement> {
        TextStatement::parse(sql)
    }

    async fn execute(&mut self, statement: &Self::Statement, params: &Params) -> DriverResult<bool> {
        self.pending.clear();
        let sql = statement.render(params)?;
        let result = self.conn.query_iter(sql).await?;
        self.pending = result.collect_and_drop::<mysql_async::Row>().await?;
        Ok(true)
    }

    async fn fetch_all(&mut self, _statement: &Self::Statement) -> DriverResult<Vec<Row>> {
        std::mem::take(&mut self.pending).iter().map(row_to_json).collect()
    }
}

/// Build MySQL connection options from parsed connection parameters
fn build_mysql_opts(params: &ConnectionParams) -> DriverResult<OptsBuilder> {
    let host = params
        .host
        .as_deref()
        .ok_or("MySQL requires a host in the connection URL")?;

    let opts = OptsBuilder::default()
        .ip_or_hostname(host)
        .tcp_port(params.port_or_default())
        .user(params.user.as_deref())
        .pass(params.password.as_deref())
        .db_name(params.database.as_deref());

    Ok(opts)
}

fn param_to_value(param: &Param) -> Value {
    match param {
        Param::Bool(b) => Value::Int(i64::from(*b)),
        Param::Int(i) => Value::Int(*i),
        Param::Lob(bytes) => Value::Bytes(bytes.clone()),
        Param::Null => Value::NULL,
        Param::Str(s) => Value::Bytes(s.as_bytes().to_vec()),
    }
}

/// Convert a MySQL row to a [`Row`] of JSON-safe values
fn row_to_json(row: &mysql_async::Row) -> DriverResult<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());

    for (idx, column) in row.columns_ref().iter().enumerate() {
        columns.push(column.name_str().to_string());
        values.push(mysql_value_to_json(row, idx)?);
    }

    Ok(Row::new(columns, values))
}

/// Convert MySQL value to JSON value
fn mysql_value_to_json(row: &mysql_async::Row, idx: usize) -> DriverResult<serde_json::Value> {
    let value = row
        .as_ref(idx)
        .ok_or_else(|| format!("Failed to get value at index {idx}"))?;

    let json_value = match value {
        Value::NULL => serde_json::Value::Null,

        Value::Bytes(bytes) => {
            if let Ok(s) = std::str::from_utf8(bytes) {
                serde_json::Value::String(s.to_string())
            } else {
                use base64::Engine;
                let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
                serde_json::Value::String(encoded)
            }
        }

        Value::Int(i) => serde_json::Value::Number((*i).into()),

        Value::UInt(u) => serde_json::json!(*u),

        Value::Float(f) => serde_json::Number::from_f64(f64::from(*f))
            .map_or(serde_json::Value::Null, serde_json::Value::Number),

        Value::Double(d) => serde_json::Number::from_f64(*d)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),

        Value::Date(year, month, day, hour, minute, second, micro) => serde_json::Value::String(
            format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}.{micro:06}"),
        ),

        Value::Time(is_negative, days, hours, minutes, seconds, microseconds) => {
            let sign = if *is_negative { "-" } else { "" };
            let total_hours = days * 24 + u32::from(*hours);
            serde_json::Value::String(format!(
                "{sign}{total_hours}:{minutes:02}:{seconds:02}.{microseconds:06}"
            ))
        }
    };

    Ok(json_value)
}
