//! Pool behaviour over the in-memory connector

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use ws_rpc::{
    ConnectionPool, ConnectionState, EndpointConfig, Error, MemoryAcceptor, MemoryConnector,
    Result, TransportError, Value,
};

fn pool_with(names: &[&str]) -> (Arc<ConnectionPool>, MemoryConnector, MemoryAcceptor) {
    let (connector, acceptor) = MemoryConnector::new();

    let endpoints = names.iter().map(|name| {
        let endpoint = EndpointConfig::parse(&format!("ws://{name}.test:25585"), "token").unwrap();
        (*name, endpoint)
    });

    let pool = ConnectionPool::builder()
        .endpoints(endpoints)
        .connector(connector.clone())
        .call_timeout(Duration::from_secs(30))
        .build();

    (Arc::new(pool), connector, acceptor)
}

fn spawn_request(
    pool: &Arc<ConnectionPool>,
    name: &'static str,
    method: &'static str,
    params: Option<Value>,
) -> JoinHandle<Result<Value>> {
    let pool = Arc::clone(pool);
    tokio::spawn(async move { pool.request(name, method, params).await })
}

#[tokio::test]
async fn test_ping_scenario() {
    let _ = tracing_subscriber::fmt::try_init();

    let (pool, _connector, mut acceptor) = pool_with(&["alpha"]);
    let call = spawn_request(&pool, "alpha", "ping", Some(json!({})));

    let mut peer = acceptor.accept().await.unwrap();
    assert_eq!(peer.endpoint().as_str(), "ws://alpha.test:25585/");

    let request = peer.recv_request().await.unwrap();
    assert_eq!(request["id"], 1);
    peer.send(r#"{"id":1,"result":"pong"}"#);

    assert_eq!(call.await.unwrap().unwrap(), json!("pong"));
}

#[tokio::test]
async fn test_missing_endpoint_scenario() {
    let (pool, connector, _acceptor) = pool_with(&["alpha"]);

    let err = pool.request("missing", "x", None).await.unwrap_err();

    assert!(matches!(
        err,
        Error::UnknownEndpoint { ref known, .. } if known == &["alpha"]
    ));
    assert_eq!(connector.connect_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_scenario() {
    let (pool, _connector, mut acceptor) = pool_with(&["alpha"]);
    let call = spawn_request(&pool, "alpha", "minecraft:server/status", None);

    let mut peer = acceptor.accept().await.unwrap();
    let request = peer.recv_request().await.unwrap();

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));

    // The late reply changes nothing.
    peer.reply(&request["id"], json!({"started": true}));
    tokio::task::yield_now().await;

    let conn = pool.route("alpha").unwrap();
    assert_eq!(conn.state(), ConnectionState::Open);
    assert_eq!(conn.pending_calls(), 0);
}

#[tokio::test]
async fn test_failure_is_scoped_to_one_endpoint() {
    let (pool, _connector, mut acceptor) = pool_with(&["alpha", "beta"]);

    let alpha_call = spawn_request(&pool, "alpha", "wait", None);
    let mut alpha = acceptor.accept().await.unwrap();
    let alpha_request = alpha.recv_request().await.unwrap();

    let beta_call = spawn_request(&pool, "beta", "wait", None);
    let mut beta = acceptor.accept().await.unwrap();
    beta.recv_request().await.unwrap();

    beta.close();
    let err = beta_call.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::Closed)));

    alpha.reply(&alpha_request["id"], json!("still here"));
    assert_eq!(alpha_call.await.unwrap().unwrap(), json!("still here"));
    assert_eq!(
        pool.route("alpha").unwrap().state(),
        ConnectionState::Open
    );
}

#[tokio::test]
async fn test_disconnect_fails_in_flight_calls() {
    let (pool, _connector, mut acceptor) = pool_with(&["alpha"]);

    let call = spawn_request(&pool, "alpha", "wait", None);
    let mut peer = acceptor.accept().await.unwrap();
    peer.recv_request().await.unwrap();

    pool.disconnect(Some("alpha")).await;

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::Closed)));

    // A fresh connection is created on demand.
    let call = spawn_request(&pool, "alpha", "ping", None);
    let mut peer = acceptor.accept().await.unwrap();
    let request = peer.recv_request().await.unwrap();
    assert_eq!(request["id"], 1);
    peer.reply(&request["id"], json!("pong"));

    assert_eq!(call.await.unwrap().unwrap(), json!("pong"));
}

#[tokio::test]
async fn test_rejected_handshake_can_be_retried() {
    let (connector, mut acceptor) = MemoryConnector::new();
    let pool = Arc::new(
        ConnectionPool::builder()
            .endpoint(
                "alpha",
                EndpointConfig::parse("ws://alpha.test", "wrong").unwrap(),
            )
            .connector(connector.clone().with_credential("right"))
            .build(),
    );

    for _ in 0..2 {
        let err = pool.request("alpha", "ping", None).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::Unauthorized { .. })
        ));
    }

    assert_eq!(connector.connect_attempts(), 2);
    drop(pool);
    drop(connector);
    assert!(acceptor.accept().await.is_none());
}
