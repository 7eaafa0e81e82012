//! End-to-end tests against an in-process WebSocket server.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use gremlin_client::frame::split_request;
use gremlin_client::{
    ConnectionState, DriverStatus, GremlinClient, GremlinError, QueryError, QueryEvent,
    ScriptQuery, SubmitOutcome,
};
use gremlin_settings::{AuthSettings, ConnectionSettings, GremlinSettings};

const TIMEOUT: Duration = Duration::from_secs(5);

type Handler = dyn Fn(&Value) -> Vec<Value> + Send + Sync;

/// A fake Gremlin Server that records requests and answers via a handler.
struct MockServer {
    port: u16,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl MockServer {
    fn requests(&self) -> Vec<Value> {
        self.requests.lock().clone()
    }
}

async fn boot_server<F>(handler: F) -> MockServer
where
    F: Fn(&Value) -> Vec<Value> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let handler: Arc<Handler> = Arc::new(handler);

    let recorded = Arc::clone(&requests);
    let _ = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let handler = Arc::clone(&handler);
            let recorded = Arc::clone(&recorded);
            let _ = tokio::spawn(async move {
                let Ok(mut ws) = accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(msg)) = ws.next().await {
                    let Message::Binary(frame) = msg else {
                        continue;
                    };
                    let (mime, payload) = split_request(&frame).unwrap();
                    assert_eq!(mime, "application/json");
                    let request: Value = serde_json::from_slice(payload).unwrap();
                    recorded.lock().push(request.clone());
                    for reply in handler(&request) {
                        if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                            return;
                        }
                    }
                }
            });
        }
    });

    MockServer { port, requests }
}

fn reply(request: &Value, code: u16, message: &str, data: Value) -> Value {
    json!({
        "requestId": request["requestId"],
        "status": { "code": code, "message": message, "attributes": {} },
        "result": { "data": data, "meta": {} }
    })
}

fn settings(port: u16) -> GremlinSettings {
    GremlinSettings {
        connection: ConnectionSettings {
            host: "127.0.0.1".into(),
            port,
            ..ConnectionSettings::default()
        },
        ..GremlinSettings::default()
    }
}

async fn wait_until<F>(client: &GremlinClient, pred: F) -> DriverStatus
where
    F: Fn(&DriverStatus) -> bool,
{
    timeout(TIMEOUT, async {
        loop {
            let status = client.status().await.unwrap();
            if pred(&status) {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("driver did not reach the expected state")
}

// ── Request / response ──

#[tokio::test]
async fn execute_collects_partial_and_final_results() {
    let server = boot_server(|req| {
        vec![
            reply(req, 206, "", json!([1, 2])),
            // Frames for unknown requests are dropped.
            json!({ "requestId": "ghost", "status": { "code": 200 }, "result": { "data": [99] } }),
            reply(req, 206, "", json!([3])),
            reply(req, 200, "", json!([4])),
        ]
    })
    .await;
    let client = GremlinClient::connect(&settings(server.port)).await.unwrap();

    let results = timeout(TIMEOUT, client.execute("g.V().values('age')"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(results, vec![json!(1), json!(2), json!(3), json!(4)]);

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["op"], "eval");
    assert_eq!(requests[0]["args"]["gremlin"], "g.V().values('age')");
    assert_eq!(requests[0]["args"]["language"], "gremlin-groovy");

    let status = client.status().await.unwrap();
    assert_eq!(status.in_flight, 0);
}

#[tokio::test]
async fn no_content_yields_empty_results() {
    let server = boot_server(|req| vec![reply(req, 204, "", Value::Null)]).await;
    let client = GremlinClient::connect(&settings(server.port)).await.unwrap();

    let results = timeout(TIMEOUT, client.execute("g.V().drop()"))
        .await
        .unwrap()
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn server_error_is_returned() {
    let server = boot_server(|req| vec![reply(req, 597, "No such property: x", Value::Null)]).await;
    let client = GremlinClient::connect(&settings(server.port)).await.unwrap();

    let err = timeout(TIMEOUT, client.execute("x"))
        .await
        .unwrap()
        .unwrap_err();
    assert_matches!(
        err,
        GremlinError::Query(QueryError::Server { code: 597, ref message }) if message == "No such property: x"
    );
    assert_eq!(client.status().await.unwrap().in_flight, 0);
}

#[tokio::test]
async fn bindings_reach_the_server() {
    let server = boot_server(|req| vec![reply(req, 200, "", req["args"]["bindings"]["x"].clone())]).await;
    let client = GremlinClient::connect(&settings(server.port)).await.unwrap();

    let query = ScriptQuery::new("x").bind("x", 7);
    let results = timeout(TIMEOUT, client.execute_query(query))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(results, vec![json!(7)]);
}

// ── Queueing ──

#[tokio::test]
async fn queued_queries_flush_in_order_on_open() {
    let server = boot_server(|req| vec![reply(req, 204, "", Value::Null)]).await;
    let client = GremlinClient::new(&settings(server.port)).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    for id in ["q1", "q2", "q3"] {
        let tx = tx.clone();
        let query = ScriptQuery::new(format!("'{id}'"))
            .with_id(id)
            .on_result(move |event| {
                let _ = tx.send((id, event));
            });
        assert_eq!(client.submit(query).await.unwrap(), SubmitOutcome::Queued);
    }
    assert_eq!(client.status().await.unwrap().queued, 3);

    client.open().await.unwrap();
    for _ in 0..3 {
        let (_, event) = timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(event, QueryEvent::End);
    }

    let ids: Vec<Value> = server.requests().iter().map(|r| r["requestId"].clone()).collect();
    assert_eq!(ids, vec![json!("q1"), json!("q2"), json!("q3")]);
    let status = client.status().await.unwrap();
    assert_eq!((status.queued, status.in_flight), (0, 0));
}

#[tokio::test]
async fn submit_after_open_sends_immediately() {
    let server = boot_server(|req| vec![reply(req, 204, "", Value::Null)]).await;
    let client = GremlinClient::connect(&settings(server.port)).await.unwrap();
    let _ = wait_until(&client, |s| s.state == ConnectionState::Open).await;

    let outcome = client.submit(ScriptQuery::new("1")).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Sent);
}

// ── Authentication ──

#[tokio::test]
async fn auth_challenge_is_answered_with_credentials() {
    let server = boot_server(|req| match req["op"].as_str() {
        Some("eval") => vec![reply(req, 407, "Authenticate", Value::Null)],
        Some("authentication") => vec![reply(req, 200, "", json!([true]))],
        _ => vec![],
    })
    .await;
    let mut config = settings(server.port);
    config.auth = Some(AuthSettings {
        user: "stephen".into(),
        password: "password".into(),
    });
    let client = GremlinClient::connect(&config).await.unwrap();

    let results = timeout(TIMEOUT, client.execute("g.V()"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(results, vec![json!(true)]);

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1]["op"], "authentication");
    assert_eq!(requests[1]["requestId"], requests[0]["requestId"]);
    assert_eq!(requests[1]["args"]["sasl"], "AHN0ZXBoZW4AcGFzc3dvcmQ=");
}

#[tokio::test]
async fn auth_challenge_without_credentials_stalls() {
    let server = boot_server(|req| vec![reply(req, 407, "Authenticate", Value::Null)]).await;
    let client = GremlinClient::connect(&settings(server.port)).await.unwrap();
    let _ = wait_until(&client, |s| s.state == ConnectionState::Open).await;

    let _ = client.submit(ScriptQuery::new("g.V()")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.status().await.unwrap().in_flight, 1);
    assert_eq!(server.requests().len(), 1);
}

// ── Lifecycle ──

#[tokio::test]
async fn unreachable_server_ends_closed() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = GremlinClient::connect(&settings(port)).await.unwrap();
    let status = wait_until(&client, |s| {
        s.state == ConnectionState::Closed && s.last_error.is_some()
    })
    .await;
    assert_eq!(status.in_flight, 0);
    assert_matches!(
        client.last_error().await.unwrap(),
        Some(GremlinError::Transport(reason)) if !reason.is_empty()
    );

    let outcome = client.submit(ScriptQuery::new("1")).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Queued);
}

#[tokio::test]
async fn secure_target_attempts_tls_handshake() {
    // Accepts TCP and hangs up, so the TLS handshake itself fails.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let _ = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    });

    let mut config = settings(port);
    config.connection.ssl = true;
    assert_eq!(config.connection.url().unwrap().scheme(), "wss");

    let client = GremlinClient::connect(&config).await.unwrap();
    let status = wait_until(&client, |s| {
        s.state == ConnectionState::Closed && s.last_error.is_some()
    })
    .await;
    let reason = status.last_error.unwrap();
    assert!(!reason.contains("TLS support not compiled in"), "{reason}");
}

#[tokio::test]
async fn close_fails_in_flight_queries() {
    let server = boot_server(|_| vec![]).await;
    let client = GremlinClient::connect(&settings(server.port)).await.unwrap();
    let _ = wait_until(&client, |s| s.state == ConnectionState::Open).await;

    let pending = {
        let client = client.clone();
        tokio::spawn(async move { client.execute("g.V()").await })
    };
    let _ = wait_until(&client, |s| s.in_flight == 1).await;

    client.close().await.unwrap();
    let err = timeout(TIMEOUT, pending).await.unwrap().unwrap().unwrap_err();
    assert_matches!(err, GremlinError::Query(QueryError::ConnectionClosed));

    let status = wait_until(&client, |s| s.state == ConnectionState::Closed).await;
    assert_eq!(status.in_flight, 0);
}

#[tokio::test]
async fn reopen_after_close() {
    let server = boot_server(|req| vec![reply(req, 200, "", json!(["again"]))]).await;
    let client = GremlinClient::connect(&settings(server.port)).await.unwrap();
    let _ = wait_until(&client, |s| s.state == ConnectionState::Open).await;

    client.close().await.unwrap();
    let _ = wait_until(&client, |s| s.state == ConnectionState::Closed).await;

    client.open().await.unwrap();
    let results = timeout(TIMEOUT, client.execute("'again'"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(results, vec![json!("again")]);
}
