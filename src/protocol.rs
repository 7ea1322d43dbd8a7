//! Disqueue Wire Protocol
//!
//! Single responsibility: Encode and decode the JSON messages exchanged with
//! the queue server. The same envelope wraps every HTTP reply and every push
//! notification on the take websocket.
//!
//! # Wire Format
//!
//! ## Envelope (server -> client)
//! ```text
//! { "success": true,  "payload": <any> }
//! { "success": false, "message": <string> }
//! ```
//!
//! ## Subscribe Frame (client -> server, websocket)
//! ```text
//! { "queue": <string>, "identifier": <uuid-v4>, "key": <string, optional> }
//! ```
//!
//! ## Notification (payload of a successful envelope on the websocket)
//! ```text
//! { "id": <uuid-v4>, "item": { "key": <string|null>, "value": <string> } }
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{QueueError, Result};

/// A decoded reply from the queue server.
///
/// Exactly one of payload or message exists, selected by the success flag.
/// Reading the side that does not exist is a contract violation and panics.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    body: Body,
}

#[derive(Debug, Clone, PartialEq)]
enum Body {
    Payload(Value),
    Message(String),
}

impl Envelope {
    pub fn success(payload: Value) -> Self {
        Self {
            body: Body::Payload(payload),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            body: Body::Message(message.into()),
        }
    }

    pub fn is_successful(&self) -> bool {
        matches!(self.body, Body::Payload(_))
    }

    /// Payload of a successful envelope.
    ///
    /// # Panics
    /// If the envelope carries `success: false`.
    pub fn payload(&self) -> &Value {
        match &self.body {
            Body::Payload(payload) => payload,
            Body::Message(_) => panic!("Attempted to access an undefined payload."),
        }
    }

    /// Error text of a failed envelope.
    ///
    /// # Panics
    /// If the envelope carries `success: true`.
    pub fn error_message(&self) -> &str {
        match &self.body {
            Body::Message(message) => message,
            Body::Payload(_) => panic!("Attempted to access an undefined message."),
        }
    }

    /// Convert into the payload, or an `Application` error carrying the
    /// server's message verbatim.
    pub fn into_result(self) -> Result<Value> {
        match self.body {
            Body::Payload(payload) => Ok(payload),
            Body::Message(message) => Err(QueueError::Application(message)),
        }
    }

    /// Like `into_result`, then deserialize the payload into `T`.
    pub fn payload_as<T: DeserializeOwned>(self) -> Result<T> {
        let payload = self.into_result()?;
        serde_json::from_value(payload)
            .map_err(|e| QueueError::Protocol(format!("Unexpected payload shape: {}", e)))
    }
}

/// Parse raw text received from the server into an `Envelope`.
pub fn parse(raw: &str) -> Result<Envelope> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| QueueError::Protocol(format!("Invalid protocol data: {}", e)))?;

    let mut map = match value {
        Value::Object(map) => map,
        other => {
            return Err(QueueError::Protocol(format!(
                "Envelope is not an object: {}",
                other
            )))
        }
    };

    let success = map
        .get("success")
        .and_then(Value::as_bool)
        .ok_or_else(|| QueueError::Protocol("Protocol missing key: success".into()))?;

    if success {
        let payload = map.remove("payload").unwrap_or(Value::Null);
        Ok(Envelope::success(payload))
    } else {
        match map.remove("message") {
            Some(Value::String(message)) => Ok(Envelope::failure(message)),
            _ => Err(QueueError::Protocol("Protocol missing key: message".into())),
        }
    }
}

/// Serialize an envelope to the same text format `parse` reads.
pub fn serialize(envelope: &Envelope) -> String {
    match &envelope.body {
        Body::Payload(payload) => json!({ "success": true, "payload": payload }),
        Body::Message(message) => json!({ "success": false, "message": message }),
    }
    .to_string()
}

/// Request for the next item of a queue, sent over the take websocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeFrame {
    pub queue: String,
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl SubscribeFrame {
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// An item stored in a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    #[serde(default)]
    pub key: Option<String>,
    pub value: String,
}

/// Delivery of an item in answer to an earlier subscribe frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Notification {
    pub id: String,
    pub item: QueueItem,
}

impl Notification {
    /// Decode from the payload of a successful envelope.
    pub fn from_payload(payload: Value) -> Result<Self> {
        serde_json::from_value(payload)
            .map_err(|e| QueueError::Protocol(format!("Malformed notification: {}", e)))
    }
}
