use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use shardkv_client::Connection;
use shardkv_net::{AuthConfig, EndpointTable, Server, ServerConfig, ServiceError};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

async fn spin_up_server(table: EndpointTable) -> (std::net::SocketAddr, CancellationToken, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(Server::without_lock(table, AuthConfig::disabled()));
    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let handle = tokio::spawn(async move {
        server.serve_on(listener, ServerConfig::default(), cancel_clone).await.unwrap();
    });
    (addr, cancel, handle)
}

#[tokio::test]
async fn unrestricted_endpoint_is_reachable_by_anonymous_channel() {
    let mut table = EndpointTable::new();
    table.register(
        "echo",
        |_chan, args, _kwargs| async move { Ok(args.into_iter().next().unwrap_or(json!(null))) },
        Vec::<String>::new(),
        false,
    );

    let (addr, cancel, handle) = spin_up_server(table).await;
    let conn = Connection::connect(addr).await.unwrap();
    let reply = conn.call("echo", vec![json!("hello")], serde_json::Map::new()).await.unwrap();
    assert_eq!(reply, json!("hello"));

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn permission_denied_when_group_not_allowed() {
    let mut table = EndpointTable::new();
    table.register(
        "admin_only",
        |_chan, _args, _kwargs| async move { Ok(json!("ok")) },
        vec!["master".to_string()],
        false,
    );

    let (addr, cancel, handle) = spin_up_server(table).await;
    let conn = Connection::connect(addr).await.unwrap();
    let err = conn.call("admin_only", Vec::new(), serde_json::Map::new()).await.unwrap_err();
    assert!(matches!(err, shardkv_client::ClientError::Remote(_)));

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn unknown_endpoint_returns_an_error_envelope() {
    let table = EndpointTable::new();
    let (addr, cancel, handle) = spin_up_server(table).await;
    let conn = Connection::connect(addr).await.unwrap();
    let err = conn.call("nonexistent", Vec::new(), serde_json::Map::new()).await.unwrap_err();
    assert!(matches!(err, shardkv_client::ClientError::Remote(_)));

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn handler_errors_become_error_envelopes_not_panics() {
    let mut table = EndpointTable::new();
    table.register(
        "fails",
        |_chan, _args, _kwargs| async move { Err(ServiceError::Handler(json!("boom"))) },
        Vec::<String>::new(),
        false,
    );

    let (addr, cancel, handle) = spin_up_server(table).await;
    let conn = Connection::connect(addr).await.unwrap();
    let err = conn.call("fails", Vec::new(), serde_json::Map::new()).await.unwrap_err();
    match err {
        shardkv_client::ClientError::Remote(message) => assert_eq!(message, json!("boom")),
        other => panic!("expected a remote error, got {other:?}"),
    }

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn cancellation_stops_the_accept_loop() {
    let table = EndpointTable::new();
    let (addr, cancel, handle) = spin_up_server(table).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle).await
        .expect("server should shut down promptly")
        .unwrap();
    // A fresh connection attempt after shutdown should fail to connect.
    assert!(Connection::connect(addr).await.is_err());
}
