//! dbwarden - Idempotent MySQL Administration
//!
//! dbwarden creates and removes MySQL accounts, grants privileges and points
//! replicas at their master. Every command first reads the server state, only
//! changes what differs, and can report what it would do without doing it
//! (check mode).
//!
//! # Core Principles
//! - Idempotent: a second run against the same server is a no-op
//! - Check mode never sends a mutating statement
//! - Caller-supplied identifiers are always bound parameters
//! - Validation happens before anything reaches the server
//!
//! # Module Organization
//! - [`error`] - Error types and handling
//! - [`config`] - Connection URL parsing
//! - [`client`] - Prepared-statement client and connection traits
//! - [`model`] - Account and replication statements
//! - [`reconcile`] - Check / decide / apply workflow
//! - [`output`] - Text and JSON reports

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod reconcile;

// Re-export commonly used types for convenience
pub use client::{Client, Connection, ConnectionFactory, Param, ParamKind, Params, Row, Statement};
pub use config::{ConnectionDescriptor, ConnectionParams, DEFAULT_PORT};
pub use error::{Result, WardenError};
pub use model::{MasterInfo, User};
pub use reconcile::{Decision, Report, RunContext};

#[cfg(feature = "mysql")]
pub use client::mysql::MySqlConnectionFactory;
