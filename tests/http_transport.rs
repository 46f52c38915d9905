//! Tests for [`HttpTransport`] against a scripted local event-stream server.

use std::time::Duration;

use futures::StreamExt;
use pagestream::{
    HttpConfig,
    HttpTransport,
    Notification,
    PageSession,
    SessionConfig,
    StreamError,
    StreamMessage,
    Transport,
    TransportError,
};
use pagestream_testing::{SENTINEL, ScriptStep, SseServer, next_expect, page_json, sse_event};
use rstest::rstest;

fn page_event(idx: i64, total: i64, path: &str) -> ScriptStep {
    ScriptStep::Write(sse_event(&page_json(idx, total, path)))
}

#[tokio::test]
async fn streams_pages_until_sentinel() {
    let mut server = SseServer::start().await;
    server
        .respond(vec![
            ScriptStep::Write(": keep-alive\n\n".into()),
            page_event(1, 2, "p1"),
            page_event(0, 2, "p0"),
            ScriptStep::Write(sse_event(SENTINEL)),
            ScriptStep::Hold,
        ])
        .await;

    let transport = HttpTransport::default();
    let mut subscription = transport.open(&server.url("/chapter/mhr/12/stream"));

    let mut indices = Vec::new();
    for _ in 0..2 {
        match next_expect!(subscription.next()) {
            Ok(StreamMessage::Fragment(fragment)) => indices.push(fragment.index),
            other => panic!("expected fragment, got {other:?}"),
        }
    }
    assert_eq!(indices, vec![1, 0]);
    assert!(matches!(
        next_expect!(subscription.next()),
        Ok(StreamMessage::Sentinel)
    ));
    assert!(subscription.next().await.is_none());
    assert!(subscription.is_closed());

    let request = next_expect!(server.next_request());
    assert!(request.starts_with("GET /chapter/mhr/12/stream HTTP/1.0\r\n"));
    assert!(request.contains("Accept: text/event-stream"));
}

#[rstest]
#[case::not_found("HTTP/1.0 404 Not Found\r\n\r\n", 404)]
#[case::server_error("HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\n\r\n", 503)]
#[tokio::test]
async fn non_success_status_fails_the_stream(#[case] head: &str, #[case] expected: u16) {
    let server = SseServer::start().await;
    server.respond_with_head(head, vec![]).await;

    let mut subscription = HttpTransport::default().open(&server.url("/chapter/1"));
    match next_expect!(subscription.next()) {
        Err(StreamError::Transport(TransportError::Status { status })) => {
            assert_eq!(status, expected);
        }
        other => panic!("expected status error, got {other:?}"),
    }
    assert!(subscription.next().await.is_none());
}

#[tokio::test]
async fn chunked_response_is_rejected() {
    let server = SseServer::start().await;
    server
        .respond_with_head(
            "HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\nTransfer-Encoding: chunked\r\n\r\n",
            vec![ScriptStep::Hold],
        )
        .await;

    let mut subscription = HttpTransport::default().open(&server.url("/chapter/1"));
    assert!(matches!(
        next_expect!(subscription.next()),
        Err(StreamError::Transport(TransportError::Protocol(_)))
    ));
}

#[tokio::test]
async fn endless_header_line_is_rejected() {
    let server = SseServer::start().await;
    let head = format!("HTTP/1.0 200 OK\r\nX-Padding: {}", "a".repeat(64 * 1024));
    server.respond_with_head(&head, vec![ScriptStep::Hold]).await;

    let mut subscription = HttpTransport::default().open(&server.url("/chapter/1"));
    assert!(matches!(
        next_expect!(subscription.next()),
        Err(StreamError::Transport(TransportError::Protocol(_)))
    ));
    assert!(subscription.is_closed());
}

#[tokio::test]
async fn early_close_reports_disconnect() {
    let server = SseServer::start().await;
    server
        .respond(vec![
            page_event(0, 3, "p0"),
            ScriptStep::Write("data: {\"idx\": 1".into()),
        ])
        .await;

    let mut subscription = HttpTransport::default().open(&server.url("/chapter/1"));
    assert!(matches!(
        next_expect!(subscription.next()),
        Ok(StreamMessage::Fragment(_))
    ));
    assert!(matches!(
        next_expect!(subscription.next()),
        Err(StreamError::Transport(TransportError::Disconnected))
    ));
    assert!(subscription.next().await.is_none());
}

#[tokio::test]
async fn malformed_event_fails_the_stream() {
    let server = SseServer::start().await;
    server
        .respond(vec![
            ScriptStep::Write(sse_event("[1, 2, 3]")),
            ScriptStep::Hold,
        ])
        .await;

    let mut subscription = HttpTransport::default().open(&server.url("/chapter/1"));
    match next_expect!(subscription.next()) {
        Err(err) => assert!(err.is_malformed()),
        Ok(message) => panic!("expected malformed error, got {message:?}"),
    }
    assert!(subscription.is_closed());
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let config = HttpConfig::default().connect_timeout(Some(Duration::from_secs(1)));
    let transport = HttpTransport::new(config);
    let mut subscription = transport.open(&format!("http://{addr}/chapter/1"));
    assert!(matches!(
        next_expect!(subscription.next(), "connect failure"),
        Err(StreamError::Transport(
            TransportError::Connect { .. } | TransportError::ConnectTimeout { .. }
        ))
    ));
}

#[tokio::test]
async fn unsupported_scheme_fails_without_connecting() {
    let mut subscription = HttpTransport::default().open("https://reader.local/chapter/1");
    assert!(matches!(
        next_expect!(subscription.next()),
        Err(StreamError::Transport(TransportError::InvalidUrl { .. }))
    ));
}

#[tokio::test]
async fn session_assembles_pages_over_http() {
    let server = SseServer::start().await;
    server
        .respond(vec![
            page_event(2, 3, "/c/3.jpg"),
            page_event(0, 3, "/c/1.jpg"),
            ScriptStep::Sleep(Duration::from_millis(5)),
            page_event(1, 3, "/c/2.jpg"),
            ScriptStep::Write(sse_event(SENTINEL)),
            ScriptStep::Hold,
        ])
        .await;

    let config = SessionConfig::builder()
        .media_base("http://media.local")
        .build()
        .expect("valid config");
    let mut session = PageSession::new(HttpTransport::default(), &config);
    session.start(server.url("/chapter/1"));

    let mut completed = false;
    loop {
        let notification = tokio::time::timeout(Duration::from_secs(1), session.next_notification())
            .await
            .expect("notification before deadline");
        match notification {
            Some(Notification::Complete { .. }) => completed = true,
            Some(_) => {}
            None => break,
        }
    }
    assert!(completed);

    let pages: Vec<_> = session
        .assembler()
        .pages()
        .iter()
        .map(|p| p.as_ref().map(|p| p.as_str().to_owned()))
        .collect();
    assert_eq!(
        pages,
        vec![
            Some("http://media.local/c/1.jpg".to_owned()),
            Some("http://media.local/c/2.jpg".to_owned()),
            Some("http://media.local/c/3.jpg".to_owned()),
        ]
    );
}
