//! Client Behaviour Tests
//!
//! Exercises the prepared-statement client against the scripted server:
//! - The connection is opened lazily, once
//! - A failed connection attempt is terminal for the client
//! - Prepare, execute and fetch failures all surface as client errors
//! - Parameters reach the connection exactly as built

mod common;

use common::{FakeServer, Failures};
use dbwarden::{Client, ConnectionDescriptor, Param, Params, Row, WardenError};
use pretty_assertions::assert_eq;
use serde_json::json;

const STATEMENT: &str = "SELECT :something";

fn params() -> Params {
    Params::new().with(":something", "all the things")
}

fn assert_client_error(err: &WardenError, message: &str) {
    assert!(matches!(err, WardenError::Client { .. }), "expected client error, got {err:?}");
    assert_eq!(err.to_string(), message);
    assert!(std::error::Error::source(err).is_some(), "client error must keep its cause");
}

// ============================================================================
// Connection Lifecycle
// ============================================================================

#[tokio::test]
async fn test_connection_is_created_lazily_and_once() {
    let server = FakeServer::new();
    let mut client = server.client();
    assert_eq!(server.state().connect_attempts, 0);

    assert!(client.execute(STATEMENT, &params()).await.unwrap());
    assert!(client.execute(STATEMENT, &params()).await.unwrap());

    assert_eq!(server.state().connects, 1);
}

#[tokio::test]
async fn test_failed_connection_is_terminal() {
    let server = FakeServer::new().with_failures(Failures { connect: true, ..Failures::default() });
    let mut client = server.client();

    let err = client.execute(STATEMENT, &params()).await.unwrap_err();
    assert_client_error(&err, "Failed to create a MySQL connection.");

    server.state().failures.connect = false;
    let err = client.query_all(STATEMENT, &params()).await.unwrap_err();
    assert!(err.is_client());

    assert_eq!(server.state().connect_attempts, 1);
    assert!(server.state().prepared.is_empty());
}

#[tokio::test]
async fn test_invalid_url_is_config_error_before_connecting() {
    let server = FakeServer::new();
    let mut client = Client::new(ConnectionDescriptor::from_url("not a url"), server.clone());

    let err = client.execute(STATEMENT, &params()).await.unwrap_err();
    assert_eq!(err.error_code(), "CONFIG_ERROR");
    assert_eq!(server.state().connect_attempts, 0);
}

#[tokio::test]
async fn test_url_without_host_is_config_error_before_connecting() {
    let server = FakeServer::new();
    let mut client = Client::new(ConnectionDescriptor::from_url("mysql:///app"), server.clone());

    let err = client.execute(STATEMENT, &params()).await.unwrap_err();
    assert_eq!(err.error_code(), "CONFIG_ERROR");
    assert_eq!(server.state().connect_attempts, 0);

    // Not a failed attempt: repointing the descriptor still works
    client.descriptor_mut().set_source(common::URL);
    assert!(client.execute(STATEMENT, &params()).await.unwrap());
    assert_eq!(server.state().connects, 1);
}

#[tokio::test]
async fn test_descriptor_can_be_repointed_before_first_use() {
    let server = FakeServer::new();
    let mut client = Client::new(ConnectionDescriptor::default(), server.clone());
    client.descriptor_mut().set_source(common::URL);

    client.execute(STATEMENT, &params()).await.unwrap();
    assert_eq!(server.state().connects, 1);
    assert!(client.descriptor().is_parsed());
}

// ============================================================================
// execute
// ============================================================================

#[tokio::test]
async fn test_execute_binds_params_by_name() {
    let server = FakeServer::new();
    let mut client = server.client();
    let params = Params::new().with("something", Param::Int(1)).with("other", "text");

    assert!(client.execute(STATEMENT, &params).await.unwrap());

    let state = server.state();
    assert_eq!(state.prepared, vec![STATEMENT.to_string()]);
    assert_eq!(state.executed[0].params.get("something"), Some(&Param::Int(1)));
    assert_eq!(state.executed[0].params.get("other"), Some(&Param::Str("text".to_string())));
}

#[tokio::test]
async fn test_execute_returns_driver_flag() {
    let server = FakeServer::new().with_failures(Failures { unconfirmed: true, ..Failures::default() });
    let mut client = server.client();

    assert!(!client.execute(STATEMENT, &params()).await.unwrap());
}

#[tokio::test]
async fn test_execute_prepare_failure_is_client_error() {
    let server = FakeServer::new().with_failures(Failures { prepare: true, ..Failures::default() });
    let mut client = server.client();

    let err = client.execute(STATEMENT, &params()).await.unwrap_err();
    assert_client_error(&err, "Failed to prepare MySQL statement.");
    assert!(server.state().executed.is_empty());
}

#[tokio::test]
async fn test_execute_failure_is_client_error() {
    let server =
        FakeServer::new().with_failures(Failures { execute_on: Some("SELECT"), ..Failures::default() });
    let mut client = server.client();

    let err = client.execute(STATEMENT, &params()).await.unwrap_err();
    assert_client_error(&err, "Failed to execute MySQL statement.");
    assert!(err.message().contains("access denied"));
}

// ============================================================================
// query_all / query_single
// ============================================================================

#[tokio::test]
async fn test_query_all_returns_rows_by_name_and_index() {
    let rows = vec![
        Row::new(vec!["c1".to_string()], vec![json!("r1c1-value")]),
        Row::new(vec!["c1".to_string()], vec![json!("r2c1-value")]),
    ];
    let server = FakeServer::new().with_rows(rows.clone());
    let mut client = server.client();

    let result = client.query_all(STATEMENT, &params()).await.unwrap();
    assert_eq!(result, rows);
    assert_eq!(result[1].get(0), Some(&json!("r2c1-value")));
    assert_eq!(result[0].get_by_name("c1"), Some(&json!("r1c1-value")));
}

#[tokio::test]
async fn test_query_all_prepare_failure_is_client_error() {
    let server = FakeServer::new().with_failures(Failures { prepare: true, ..Failures::default() });
    let mut client = server.client();

    let err = client.query_all(STATEMENT, &params()).await.unwrap_err();
    assert_client_error(&err, "Failed to prepare MySQL statement.");
}

#[tokio::test]
async fn test_query_all_execute_failure_is_client_error() {
    let server =
        FakeServer::new().with_failures(Failures { execute_on: Some("SELECT"), ..Failures::default() });
    let mut client = server.client();

    let err = client.query_all(STATEMENT, &params()).await.unwrap_err();
    assert_client_error(&err, "Failed to execute MySQL statement.");
}

#[tokio::test]
async fn test_query_all_fetch_failure_is_client_error() {
    let server = FakeServer::new().with_failures(Failures { fetch: true, ..Failures::default() });
    let mut client = server.client();

    let err = client.query_all(STATEMENT, &params()).await.unwrap_err();
    assert_client_error(&err, "Failed to fetch results of a MySQL statement execution.");
    assert_eq!(server.state().executed.len(), 1);
}

#[tokio::test]
async fn test_query_single_returns_first_row_or_none() {
    let server = FakeServer::new();
    let mut client = server.client();
    assert_eq!(client.query_single(STATEMENT, &params()).await.unwrap(), None);

    let rows = vec![
        Row::new(vec!["c1".to_string()], vec![json!(1)]),
        Row::new(vec!["c1".to_string()], vec![json!(2)]),
    ];
    let server = FakeServer::new().with_rows(rows);
    let mut client = server.client();
    let row = client.query_single(STATEMENT, &params()).await.unwrap().unwrap();
    assert_eq!(row.get(0), Some(&json!(1)));
}
