//! MySQL user accounts
//!
//! Builds the statements that check for, create, drop and grant privileges
//! to an account, and runs them through a [`Client`].
//!
//! Identifiers (`user`, `host`, `password`) are always bound parameters. The
//! privilege list and grant level cannot be bound in MySQL, so they are placed
//! in the statement text verbatim and must come from a trusted caller.

use serde::Serialize;
use tracing::debug;

use crate::client::{Client, ConnectionFactory, Params, Statement};
use crate::error::{Result, WardenError};

/// Longest user name MySQL accepts
pub const NAME_LEN_MAX: usize = 16;

/// Table holding one row per account
pub const ACCOUNT_TABLE: &str = "mysql.user";

/// Reloads the grant tables
pub const RELOAD_PRIVILEGES: &str = "FLUSH PRIVILEGES";

const ANY_HOST: &str = "any";
const WILDCARD_HOST: &str = "%";
const ALL_GRANTS: &str = "all";

/// Collects the fields of a [`User`]; validated by [`UserBuilder::build`]
#[derive(Debug, Clone, Default)]
pub struct UserBuilder {
    name: Option<String>,
    password: Option<String>,
    host: Option<String>,
    grant_level: Option<String>,
    grants: Option<String>,
    can_grant: bool,
}

impl UserBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = non_empty(name.into());
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = non_empty(password.into());
        self
    }

    /// Host pattern the account may connect from; `any` means `%`
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = non_empty(host.into());
        self
    }

    /// `ON` clause of a grant, e.g. `*.*` or `app.*`
    #[must_use]
    pub fn grant_level(mut self, level: impl Into<String>) -> Self {
        self.grant_level = non_empty(level.into());
        self
    }

    /// Comma separated privilege list, or `all`
    #[must_use]
    pub fn grants(mut self, grants: impl Into<String>) -> Self {
        self.grants = non_empty(grants.into());
        self
    }

    #[must_use]
    pub fn can_grant(mut self, can_grant: bool) -> Self {
        self.can_grant = can_grant;
        self
    }

    pub fn build(self) -> Result<User> {
        let name = self
            .name
            .ok_or_else(|| WardenError::validation("Cannot manage a user account without a name"))?;

        if name.chars().count() > NAME_LEN_MAX {
            return Err(WardenError::validation(format!(
                "User name cannot exceed {NAME_LEN_MAX} characters in length"
            )));
        }

        Ok(User {
            name,
            password: self.password,
            host: self.host,
            grant_level: self.grant_level,
            grants: self.grants,
            can_grant: self.can_grant,
        })
    }
}

/// A validated MySQL account description
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    name: String,
    #[serde(skip)]
    password: Option<String>,
    host: Option<String>,
    grant_level: Option<String>,
    grants: Option<String>,
    can_grant: bool,
}

impl User {
    #[must_use]
    pub fn builder() -> UserBuilder {
        UserBuilder::default()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host as given by the caller (before `any` is mapped to `%`)
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    #[must_use]
    pub fn has_grants(&self) -> bool {
        self.grants.is_some()
    }

    fn bound_host(&self) -> Option<&str> {
        self.host.as_deref().map(|host| {
            if host.eq_ignore_ascii_case(ANY_HOST) {
                WILDCARD_HOST
            } else {
                host
            }
        })
    }

    /// Append `@:host` when a host is set
    fn push_account(&self, parts: &mut Vec<String>, params: &mut Params) {
        if let Some(host) = self.bound_host() {
            parts.push("@:host".to_string());
            params.insert("host", host);
        }
    }

    /// `SELECT EXISTS(...)` for this name and host
    ///
    /// A host is required: without one the answer would cover any account
    /// sharing the name.
    pub fn exists_statement(&self) -> Result<Statement> {
        let host = self.bound_host().ok_or_else(|| {
            WardenError::validation(
                "Cannot check for existing user without a host because the result could be ambiguous",
            )
        })?;

        Ok(Statement::new(
            format!("SELECT EXISTS(SELECT 1 FROM {ACCOUNT_TABLE} WHERE user = :user AND host = :host)"),
            Params::new().with("user", self.name.as_str()).with("host", host),
        ))
    }

    #[must_use]
    pub fn create_statement(&self) -> Statement {
        let mut parts = vec!["CREATE USER :user".to_string()];
        let mut params = Params::new().with("user", self.name.as_str());

        self.push_account(&mut parts, &mut params);

        if let Some(password) = &self.password {
            parts.push("IDENTIFIED BY :password".to_string());
            params.insert("password", password);
        }

        Statement::new(parts.join(" "), params)
    }

    #[must_use]
    pub fn delete_statement(&self) -> Statement {
        let mut parts = vec!["DROP USER :user".to_string()];
        let mut params = Params::new().with("user", self.name.as_str());

        self.push_account(&mut parts, &mut params);

        Statement::new(parts.join(" "), params)
    }

    /// `GRANT ... ON ... TO ...`; needs both grants and a grant level
    pub fn grant_statement(&self) -> Result<Statement> {
        let grants = self.grants.as_deref().ok_or_else(|| {
            WardenError::validation(
                "Cannot grant privileges without being told what privileges to grant",
            )
        })?;
        let level = self.grant_level.as_deref().ok_or_else(|| {
            WardenError::validation("Cannot grant privileges without being told on what to grant them")
        })?;

        let privileges = if grants.eq_ignore_ascii_case(ALL_GRANTS) {
            "ALL PRIVILEGES"
        } else {
            grants
        };

        let mut parts = vec![format!("GRANT {privileges} ON {level}"), "TO :user".to_string()];
        let mut params = Params::new().with("user", self.name.as_str());

        self.push_account(&mut parts, &mut params);

        if self.can_grant {
            parts.push("WITH GRANT OPTION".to_string());
        }

        Ok(Statement::new(parts.join(" "), params))
    }

    /// Whether an account with this name and host exists
    pub async fn exists<F: ConnectionFactory>(&self, client: &mut Client<F>) -> Result<bool> {
        let statement = self.exists_statement()?;
        let row = client.query_single(&statement.sql, &statement.params).await?;

        Ok(row.and_then(|r| r.get(0).cloned()).is_some_and(|v| is_truthy(&v)))
    }

    pub async fn create<F: ConnectionFactory>(&self, client: &mut Client<F>) -> Result<()> {
        let statement = self.create_statement();
        with_privilege_reload(client, &statement).await
    }

    pub async fn delete<F: ConnectionFactory>(&self, client: &mut Client<F>) -> Result<()> {
        let statement = self.delete_statement();
        with_privilege_reload(client, &statement).await
    }

    pub async fn grant<F: ConnectionFactory>(&self, client: &mut Client<F>) -> Result<()> {
        let statement = self.grant_statement()?;
        with_privilege_reload(client, &statement).await
    }
}

/// Reload, mutate, reload
async fn with_privilege_reload<F: ConnectionFactory>(
    client: &mut Client<F>,
    statement: &Statement,
) -> Result<()> {
    let reload = Statement::bare(RELOAD_PRIVILEGES);

    client.run(&reload).await?;
    client.run(statement).await?;
    client.run(&reload).await?;

    debug!(statement = %statement.sql, "account statement applied");
    Ok(())
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty() && s != "0",
        serde_json::Value::Null => false,
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}
