//! Connection Descriptor
//!
//! This module turns a connection URL into the parameters needed to reach a
//! MySQL server.
//!
//! # URL Shape
//! `scheme://[user[:password]@]host[:port][/database]`
//!
//! # Parse On Demand
//! A descriptor starts out `Unset` or `Unparsed`. The first accessor call parses
//! the URL and moves the descriptor to `Parsed`; later calls reuse the parsed
//! fields. Setting a new source URL moves it back to `Unparsed`.
//!
//! User name and password are returned exactly as written in the URL
//! (no percent-decoding).

use serde::Serialize;
use url::Url;

use crate::error::{Result, WardenError};

/// Port used when the URL does not name one
pub const DEFAULT_PORT: u16 = 3306;

const DSN_PREFIX: &str = "mysql:";
const DSN_DELIMITER: &str = ":";
const MISSING_SOURCE: &str = "missing or invalid connection source";

/// Fields extracted from a connection URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionParams {
    /// URL scheme (e.g. `mysql`)
    pub scheme: String,

    /// Hostname
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Port, only when the URL names one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Database name (URL path without slashes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Username
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Password
    /// WARNING: Sensitive data, do not log or include in error messages
    #[serde(skip)]
    pub password: Option<String>,
}

impl ConnectionParams {
    /// Parse a connection URL
    pub fn parse(source: &str) -> Result<Self> {
        let source = source.trim();
        if source.is_empty() {
            return Err(WardenError::config(MISSING_SOURCE));
        }

        let url = Url::parse(source)
            .map_err(|e| WardenError::config(format!("{MISSING_SOURCE}: {e}")))?;

        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

        Ok(Self {
            scheme: url.scheme().to_string(),
            host: url.host_str().and_then(non_empty),
            port: url.port(),
            database: non_empty(url.path().trim_matches('/')),
            user: non_empty(url.username()),
            password: url.password().and_then(non_empty),
        })
    }

    /// Port to connect to, falling back to [`DEFAULT_PORT`]
    #[must_use]
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Driver connection string, e.g. `mysql:host=db1:port=3307:dbname=app`
    pub fn dsn(&self) -> Result<String> {
        let host = self.host.as_deref().ok_or_else(|| {
            WardenError::config(format!("{MISSING_SOURCE}: the URL names no host"))
        })?;

        let mut parts = vec![format!("host={host}")];
        if let Some(port) = self.port {
            parts.push(format!("port={port}"));
        }
        if let Some(database) = &self.database {
            parts.push(format!("dbname={database}"));
        }

        Ok(format!("{DSN_PREFIX}{}", parts.join(DSN_DELIMITER)))
    }

    /// URL with the password masked, safe for logs and reports
    #[must_use]
    pub fn redacted(&self) -> String {
        let mut out = format!("{}://", self.scheme);
        if let Some(user) = &self.user {
            out.push_str(user);
            if self.password.is_some() {
                out.push_str(":***");
            }
            out.push('@');
        }
        if let Some(host) = &self.host {
            out.push_str(host);
        }
        if let Some(port) = self.port {
            out.push_str(&format!(":{port}"));
        }
        if let Some(database) = &self.database {
            out.push('/');
            out.push_str(database);
        }
        out
    }
}

/// Connection URL, parsed on first use
#[derive(Debug, Clone, Default)]
pub enum ConnectionDescriptor {
    /// No URL set yet
    #[default]
    Unset,
    /// URL set but not parsed
    Unparsed(String),
    /// URL parsed
    Parsed(ConnectionParams),
}

impl ConnectionDescriptor {
    /// Create a descriptor from a URL without parsing it
    pub fn from_url(source: impl Into<String>) -> Self {
        Self::Unparsed(source.into())
    }

    /// Replace the source URL, discarding any parsed fields
    pub fn set_source(&mut self, source: impl Into<String>) {
        *self = Self::Unparsed(source.into());
    }

    /// Whether the URL has already been parsed
    #[must_use]
    pub const fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }

    /// Parse the URL if needed and return its fields
    ///
    /// A failed parse leaves the descriptor `Unparsed`, so the same error is
    /// reported on every call.
    pub fn params(&mut self) -> Result<&ConnectionParams> {
        if let Self::Unparsed(source) = self {
            let parsed = ConnectionParams::parse(source)?;
            *self = Self::Parsed(parsed);
        }

        match self {
            Self::Parsed(params) => Ok(params),
            Self::Unset | Self::Unparsed(_) => Err(WardenError::config(MISSING_SOURCE)),
        }
    }

    pub fn host(&mut self) -> Result<Option<&str>> {
        Ok(self.params()?.host.as_deref())
    }

    /// Port, defaulting to 3306
    pub fn port(&mut self) -> Result<u16> {
        Ok(self.params()?.port_or_default())
    }

    pub fn database_name(&mut self) -> Result<Option<&str>> {
        Ok(self.params()?.database.as_deref())
    }

    pub fn user_name(&mut self) -> Result<Option<&str>> {
        Ok(self.params()?.user.as_deref())
    }

    pub fn password(&mut self) -> Result<Option<&str>> {
        Ok(self.params()?.password.as_deref())
    }

    pub fn dsn(&mut self) -> Result<String> {
        self.params()?.dsn()
    }
}
