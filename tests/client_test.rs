//! HTTP client integration tests
//!
//! A raw TCP responder stands in for the queue server, captures the request
//! and answers with a canned envelope.

use disqueue::{queue_create, queue_list, Config, Disqueue, QueueError, QueueItem};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug)]
struct Captured {
    request_line: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Captured {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn form(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(self.body.as_bytes())
            .into_owned()
            .collect()
    }
}

async fn read_request(socket: &mut TcpStream) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap().to_string();
    let headers: Vec<(String, String)> = lines
        .filter(|l| !l.is_empty())
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let length: usize = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .map(|(_, v)| v.parse().unwrap())
        .unwrap_or(0);
    while buf.len() < header_end + length {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed mid-body");
        buf.extend_from_slice(&chunk[..n]);
    }

    Captured {
        request_line,
        headers,
        body: String::from_utf8_lossy(&buf[header_end..header_end + length]).to_string(),
    }
}

const QUEUE_OK: (&str, &str) = ("200 OK", r#"{"success": true, "payload": {"name": "jobs"}}"#);

/// Serve one request per entry in `responses`, in order.
async fn respond(responses: Vec<(&'static str, &'static str)>) -> (Config, JoinHandle<Vec<Captured>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = Config {
        url: format!("http://{}", listener.local_addr().unwrap()),
        ..Default::default()
    };

    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            seen.push(read_request(&mut socket).await);
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        }
        seen
    });

    (config, handle)
}

/// Serve the queue check made on first use, then one request.
async fn respond_after_check(
    status: &'static str,
    body: &'static str,
) -> (Config, JoinHandle<Vec<Captured>>) {
    respond(vec![QUEUE_OK, (status, body)]).await
}

#[tokio::test]
async fn test_put_sends_form_with_key() {
    let (mut config, server) = respond_after_check("200 OK", r#"{"success": true}"#).await;
    config.username = Some("ops".into());
    config.password = Some("pw".into());

    let client = Disqueue::new(config).unwrap();
    let queue = client.queue("jobs").await.unwrap();
    queue.put(Some("urgent"), "hello world").await.unwrap();

    let seen = server.await.unwrap();
    assert!(seen[0].request_line.starts_with("POST /queue "));
    let captured = &seen[1];
    assert!(captured.request_line.starts_with("POST /put "));
    assert_eq!(captured.header("authorization"), Some("Basic b3BzOnB3"));

    let form = captured.form();
    assert!(form.contains(&("key".to_string(), "urgent".to_string())));
    assert!(form.contains(&("value".to_string(), "hello world".to_string())));
    assert!(form.contains(&("name".to_string(), "jobs".to_string())));
}

#[tokio::test]
async fn test_take_returns_item() {
    let (config, server) = respond_after_check(
        "200 OK",
        r#"{"success": true, "payload": {"key": null, "value": "payload1"}}"#,
    )
    .await;

    let client = Disqueue::new(config).unwrap();
    let item = client.queue("jobs").await.unwrap().take(None).await.unwrap();
    assert_eq!(
        item,
        QueueItem {
            key: None,
            value: "payload1".into()
        }
    );

    let captured = &server.await.unwrap()[1];
    assert!(captured.request_line.starts_with("POST /take "));
    assert!(captured.header("authorization").is_none());
    assert_eq!(captured.form(), vec![("name".to_string(), "jobs".to_string())]);
}

#[tokio::test]
async fn test_missing_queue_is_not_cached() {
    let (config, server) = respond(vec![(
        "500 Internal Server Error",
        r#"{"success": false, "message": "no such queue"}"#,
    )])
    .await;

    let client = Disqueue::new(config).unwrap();
    match client.queue("missing").await {
        Err(QueueError::Application(message)) => assert_eq!(message, "no such queue"),
        other => panic!("expected application error, got {:?}", other.map(|c| c.queue_id().to_string())),
    }
    assert!(!client.is_cached("missing"));

    let captured = &server.await.unwrap()[0];
    assert!(captured.request_line.starts_with("POST /queue "));
    assert_eq!(captured.form(), vec![("name".to_string(), "missing".to_string())]);
}

#[tokio::test]
async fn test_verified_queue_is_cached() {
    let (config, server) = respond(vec![QUEUE_OK]).await;

    let client = Disqueue::new(config).unwrap();
    let first = client.queue("jobs").await.unwrap();
    assert!(client.is_cached("jobs"));
    assert_eq!(server.await.unwrap().len(), 1);

    // The responder is gone, so a second check would fail to connect.
    let again = client.queue("jobs").await.unwrap();
    assert_eq!(first.queue_id(), again.queue_id());
}

#[tokio::test]
async fn test_delete_uses_delete_method() {
    let (config, server) =
        respond_after_check("200 OK", r#"{"success": true, "payload": true}"#).await;

    let client = Disqueue::new(config).unwrap();
    client.queue("jobs").await.unwrap().delete().await.unwrap();

    let captured = &server.await.unwrap()[1];
    assert!(captured.request_line.starts_with("DELETE /queue "));
}

#[tokio::test]
async fn test_list_uses_get_without_body() {
    let (config, server) =
        respond(vec![("200 OK", r#"{"success": true, "payload": ["jobs", "mail"]}"#)]).await;

    let client = Disqueue::new(config).unwrap();
    let queues = queue_list(client.http()).await.unwrap();
    assert_eq!(queues, vec!["jobs".to_string(), "mail".to_string()]);

    let captured = &server.await.unwrap()[0];
    assert!(captured.request_line.starts_with("GET /queues "));
    assert!(captured.body.is_empty());
}

#[tokio::test]
async fn test_create_returns_name() {
    let (config, server) = respond(vec![(
        "200 OK",
        r#"{"success": true, "payload": "6f1c2a9e-1b7d-4c3e-9a2f-0d4b5e6f7a8b"}"#,
    )])
    .await;

    let client = Disqueue::new(config).unwrap();
    let name = queue_create(client.http(), None).await.unwrap();
    assert_eq!(name, "6f1c2a9e-1b7d-4c3e-9a2f-0d4b5e6f7a8b");

    let captured = &server.await.unwrap()[0];
    assert!(captured.request_line.starts_with("POST /queues "));
    assert!(captured.form().is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_protocol_error() {
    let (config, server) =
        respond_after_check("502 Bad Gateway", "<html>bad gateway</html>").await;

    let client = Disqueue::new(config).unwrap();
    let queue = client.queue("jobs").await.unwrap();
    assert!(matches!(
        queue.peek(None).await,
        Err(QueueError::Protocol(_))
    ));
    server.await.unwrap();
}
