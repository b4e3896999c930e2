//! Integration tests against a live recording endpoint

use std::collections::HashSet;
use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Request, Response, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use httptrap::endpoint::EndpointBuilder;
use httptrap::server::{start, ServerOptions};
use httptrap::{recording_endpoint, RequestRecord};

fn client() -> Client<HttpConnector, Full<Bytes>> {
    Client::builder(TokioExecutor::new()).build_http()
}

async fn send(
    client: &Client<HttpConnector, Full<Bytes>>,
    method: &str,
    url: &str,
    body: &str,
) -> Response<hyper::body::Incoming> {
    let request = Request::builder()
        .method(method)
        .uri(url)
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap();
    client.request(request).await.unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_get_with_query_string() {
    let (sequence, handler) = recording_endpoint();
    let server = start(handler, &ServerOptions::default()).await.unwrap();

    let response = send(&client(), "GET", &server.url("/lookup?a=1&b=2"), "").await;
    assert_eq!(response.status(), StatusCode::OK);

    let record = sequence.elements().next().unwrap();
    assert_eq!(record.method, "GET");
    assert_eq!(record.path, "/lookup");
    assert_eq!(record.query.len(), 2);
    assert_eq!(record.query["a"], "1");
    assert_eq!(record.query["b"], "2");
    assert_eq!(record.body, "");

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_post_body_recorded_and_re_readable() {
    let (sequence, handler) = EndpointBuilder::new()
        .respond_with(|req: Request<Full<Bytes>>| {
            // Echo the rebuilt body to prove the inner handler can read it
            // even though the original stream was drained for capture.
            Response::builder()
                .status(StatusCode::OK)
                .body(req.into_body())
                .unwrap()
        })
        .build();
    let server = start(handler, &ServerOptions::default()).await.unwrap();

    let response = send(&client(), "POST", &server.url("/submit"), "hello").await;
    assert_eq!(response.status(), StatusCode::OK);

    let echoed = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(echoed, Bytes::from("hello"));

    let record = sequence.elements().next().unwrap();
    assert_eq!(record.method, "POST");
    assert_eq!(record.body, "hello");

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_headers_recorded() {
    let (sequence, handler) = recording_endpoint();
    let server = start(handler, &ServerOptions::default()).await.unwrap();

    let request = Request::builder()
        .method("GET")
        .uri(server.url("/"))
        .header("x-correlation-id", "abc-123")
        .body(Full::new(Bytes::new()))
        .unwrap();
    client().request(request).await.unwrap();

    let record = sequence.elements().next().unwrap();
    assert_eq!(record.headers["x-correlation-id"], "abc-123");

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_requests_all_captured() {
    let (sequence, handler) = EndpointBuilder::new()
        .timeout(Duration::from_secs(5))
        .build();
    let server = start(handler, &ServerOptions::default()).await.unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..20 {
        let url = server.url(&format!("/burst?id={i}"));
        tasks.spawn(async move {
            let response = send(&client(), "GET", &url, "").await;
            assert_eq!(response.status(), StatusCode::OK);
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    let records: Vec<RequestRecord> = tokio::task::spawn_blocking(move || {
        sequence.elements().take(20).collect()
    })
    .await
    .unwrap();

    assert_eq!(records.len(), 20);
    let ids: HashSet<String> = records.iter().map(|r| r.query["id"].clone()).collect();
    assert_eq!(ids.len(), 20, "each request captured exactly once");

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_timed_out_sequence_stays_terminated() {
    let (sequence, handler) = EndpointBuilder::new()
        .timeout(Duration::from_millis(10))
        .build();
    let server = start(handler, &ServerOptions::default()).await.unwrap();

    // No request has arrived: the first read times out.
    assert!(sequence.elements().next().is_none());

    // ...and a request arriving afterwards does not revive it.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let response = send(&client(), "GET", &server.url("/late"), "").await;
    assert_eq!(response.status(), StatusCode::OK);

    assert!(sequence.is_terminated());
    assert!(sequence.elements().next().is_none());
    assert!(sequence
        .elements_with_timeout(Duration::from_millis(100))
        .next()
        .is_none());

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_custom_responder_status_observed_and_recorded() {
    let (sequence, handler) = EndpointBuilder::new()
        .respond_with(|_req: Request<Full<Bytes>>| {
            Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Full::new(Bytes::from("nothing here")))
                .unwrap()
        })
        .build();
    let server = start(handler, &ServerOptions::default()).await.unwrap();

    let response = send(&client(), "GET", &server.url("/missing"), "").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, Bytes::from("nothing here"));

    // Recorded despite the error response.
    let record = sequence.elements().next().unwrap();
    assert_eq!(record.path, "/missing");

    server.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_handle_dropped_on_panic_stops_server() {
    let (_sequence, handler) = recording_endpoint();
    let server = start(handler, &ServerOptions::default()).await.unwrap();
    let addr = server.addr();

    // The handle's Drop runs during unwinding, the Rust counterpart of a
    // try/finally-scoped stop.
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
        let _bound = server;
        panic!("test body failure");
    }));
    assert!(result.is_err());

    tokio::time::sleep(Duration::from_millis(50)).await;
    let connect = tokio::net::TcpStream::connect(addr).await;
    assert!(connect.is_err(), "server should be stopped after panic");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_two_servers_one_handler_share_capture_stream() {
    // Several sequential bindings; each handle is released independently.
    let (sequence, handler) = EndpointBuilder::new()
        .timeout(Duration::from_secs(5))
        .build();

    let first = start(handler.clone(), &ServerOptions::default()).await.unwrap();
    let second = start(handler, &ServerOptions::default()).await.unwrap();

    send(&client(), "GET", &first.url("/from?server=1"), "").await;
    send(&client(), "GET", &second.url("/from?server=2"), "").await;

    let records: Vec<RequestRecord> = tokio::task::spawn_blocking(move || {
        sequence.elements().take(2).collect()
    })
    .await
    .unwrap();

    let servers: HashSet<String> = records.iter().map(|r| r.query["server"].clone()).collect();
    assert_eq!(servers.len(), 2);

    second.stop().await.unwrap();
    first.stop().await.unwrap();
}
