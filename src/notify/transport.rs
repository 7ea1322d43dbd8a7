//! WebSocket Transport Layer
//!
//! Single responsibility: Connect the take websocket, pump outbound frames
//! from the manager's outbox, and post inbound text to the event mailbox.
//! No knowledge of envelopes or correlation.

use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{header::AUTHORIZATION, HeaderValue},
        protocol::Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};
use url::Url;

use super::Event;
use crate::error::{QueueError, Result};

/// Type alias for the WebSocket send half
pub type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Type alias for the WebSocket receive half
pub type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Derive the websocket address from the HTTP base URL.
///
/// `http` becomes `ws`, anything else `wss`; host and port are kept and the
/// path replaced.
pub fn websocket_address(base_url: &str, path: &str) -> Result<String> {
    let url = Url::parse(base_url)
        .map_err(|e| QueueError::Config(format!("Invalid url {}: {}", base_url, e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| QueueError::Config(format!("Url has no host: {}", base_url)))?;

    let scheme = if url.scheme() == "http" { "ws" } else { "wss" };
    let authority = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };

    Ok(format!("{}://{}{}", scheme, authority, path))
}

/// Open the websocket, attaching the authorization header as given.
pub async fn connect(address: &str, authorization: Option<&str>) -> Result<(WsSink, WsStream)> {
    debug!(address = %address, "Connecting take websocket");

    let mut request = address
        .into_client_request()
        .map_err(|e| QueueError::Transport(format!("Invalid websocket address: {}", e)))?;
    if let Some(value) = authorization {
        let value = HeaderValue::from_str(value)
            .map_err(|e| QueueError::Config(format!("Invalid authorization header: {}", e)))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }

    let (ws, _) = connect_async(request)
        .await
        .map_err(|e| QueueError::Transport(format!("WebSocket connect failed: {}", e)))?;

    Ok(ws.split())
}

/// Drive one connection from handshake to close.
///
/// Posts `Opened` once the handshake completes, `Inbound` per text message,
/// and always finishes with exactly one `Closed`.
pub(crate) async fn run_connection(
    address: String,
    authorization: Option<String>,
    events: mpsc::UnboundedSender<Event>,
) {
    let (sink, stream) = match connect(&address, authorization.as_deref()).await {
        Ok(halves) => halves,
        Err(e) => {
            error!(address = %address, error = %e, "Take websocket handshake failed");
            let _ = events.send(Event::Closed(Some(e.to_string())));
            return;
        }
    };
    info!(address = %address, "Take websocket connected");

    let (outbox, outbox_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(writer_loop(sink, outbox_rx));

    if events.send(Event::Opened(outbox)).is_err() {
        writer.abort();
        return;
    }

    let reason = reader_loop(stream, &events).await;
    writer.abort();
    let _ = events.send(Event::Closed(reason));
}

async fn writer_loop(mut sink: WsSink, mut outbox: mpsc::UnboundedReceiver<String>) {
    while let Some(frame) = outbox.recv().await {
        if let Err(e) = sink.send(Message::Text(frame)).await {
            error!(error = %e, "Failed to send subscribe frame");
            return;
        }
    }
    let _ = sink.close().await;
}

/// Returns the error text if the stream ended abnormally.
async fn reader_loop(
    mut stream: WsStream,
    events: &mpsc::UnboundedSender<Event>,
) -> Option<String> {
    while let Some(msg) = stream.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(data)) => {
                // Envelopes only travel as text frames.
                warn!(len = data.len(), "Dropping binary message");
                continue;
            }
            Ok(Message::Close(frame)) => {
                info!(frame = ?frame, "Server closed take websocket");
                return None;
            }
            Ok(_) => continue,
            Err(e) => return Some(format!("WebSocket error: {}", e)),
        };

        if events.send(Event::Inbound(text)).is_err() {
            // Event loop is gone; nothing left to deliver to.
            return None;
        }
    }
    None
}
