//! Replication master linkage
//!
//! Generates the `CHANGE MASTER TO` statement that points a replica at its
//! source server.
//!
//! Binary log coordinates are either unknown (empty file name, position 4) or
//! fully specified (a file name and a position greater than 4).

use serde::Serialize;

use crate::client::{Client, ConnectionFactory, Param, Params, Statement};
use crate::error::{Result, WardenError};

pub const EMPTY_LOG_FILE_NAME: &str = "";
pub const EMPTY_LOG_POSITION: i64 = 4;

/// Collects the fields of a [`MasterInfo`]
#[derive(Debug, Clone, Default)]
pub struct MasterInfoBuilder {
    master_hostname: Option<String>,
    replication_username: Option<String>,
    replication_password: Option<String>,
    recorded_log: Option<(String, i64)>,
}

impl MasterInfoBuilder {
    #[must_use]
    pub fn master_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.master_hostname = Some(hostname.into());
        self
    }

    #[must_use]
    pub fn replication_username(mut self, username: impl Into<String>) -> Self {
        self.replication_username = Some(username.into());
        self
    }

    #[must_use]
    pub fn replication_password(mut self, password: impl Into<String>) -> Self {
        self.replication_password = Some(password.into());
        self
    }

    /// Binary log file and position recorded on the master
    #[must_use]
    pub fn recorded_log_info(mut self, file_name: impl Into<String>, position: i64) -> Self {
        self.recorded_log = Some((file_name.into(), position));
        self
    }

    pub fn build(self) -> Result<MasterInfo> {
        let master_hostname = required(
            self.master_hostname,
            "Cannot execute CHANGE MASTER without a valid master hostname.",
        )?;
        let replication_username = required(
            self.replication_username,
            "Cannot execute CHANGE MASTER without a valid replication username.",
        )?;
        let replication_password = required(
            self.replication_password,
            "Cannot execute CHANGE MASTER without a valid replication password.",
        )?;

        let (recorded_log_file_name, recorded_log_pos) = self
            .recorded_log
            .unwrap_or_else(|| (EMPTY_LOG_FILE_NAME.to_string(), EMPTY_LOG_POSITION));

        if recorded_log_file_name == EMPTY_LOG_FILE_NAME && recorded_log_pos != EMPTY_LOG_POSITION {
            return Err(WardenError::validation(format!(
                "The value of the log position must be equal to {EMPTY_LOG_POSITION} when the log file name is given as \"{EMPTY_LOG_FILE_NAME}\"."
            )));
        }
        if recorded_log_file_name != EMPTY_LOG_FILE_NAME && recorded_log_pos <= EMPTY_LOG_POSITION {
            return Err(WardenError::validation(format!(
                "The value of the log position must be greater than {EMPTY_LOG_POSITION} when the log file name is given something other than \"{EMPTY_LOG_FILE_NAME}\"."
            )));
        }

        Ok(MasterInfo {
            master_hostname,
            replication_username,
            replication_password,
            recorded_log_file_name,
            recorded_log_pos,
        })
    }
}

/// Validated replication master coordinates
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MasterInfo {
    master_hostname: String,
    replication_username: String,
    #[serde(skip)]
    replication_password: String,
    recorded_log_file_name: String,
    recorded_log_pos: i64,
}

impl MasterInfo {
    #[must_use]
    pub fn builder() -> MasterInfoBuilder {
        MasterInfoBuilder::default()
    }

    #[must_use]
    pub fn master_hostname(&self) -> &str {
        &self.master_hostname
    }

    #[must_use]
    pub fn statement(&self) -> Statement {
        let sql = [
            "CHANGE MASTER TO MASTER_HOST=:master_hostname",
            "MASTER_USER=:replication_username",
            "MASTER_PASSWORD=:replication_password",
            "MASTER_LOG_FILE=:recorded_log_file_name",
            "MASTER_LOG_POS=:recorded_log_pos",
        ]
        .join(", ")
            + ";";

        let params = Params::new()
            .with("master_hostname", self.master_hostname.as_str())
            .with("replication_username", self.replication_username.as_str())
            .with("replication_password", self.replication_password.as_str())
            .with("recorded_log_file_name", self.recorded_log_file_name.as_str())
            .with("recorded_log_pos", Param::Int(self.recorded_log_pos));

        Statement::new(sql, params)
    }

    /// Execute `CHANGE MASTER TO`, returning the client's success flag
    pub async fn apply<F: ConnectionFactory>(&self, client: &mut Client<F>) -> Result<bool> {
        client.run(&self.statement()).await
    }
}

fn required(value: Option<String>, message: &str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| WardenError::validation(message))
}
