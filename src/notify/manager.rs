//! Connection Manager
//!
//! Single responsibility: Own the registry and correlation table, track the
//! take websocket's lifecycle, and turn inbound text into deliveries.
//!
//! # States
//!
//! ```text
//! Idle -> Connecting -> Open -> Closed
//! ```
//!
//! The manager is plain synchronous state. It never touches the socket
//! directly: outbound frames are pushed onto an outbox channel drained by the
//! transport's writer task, and inbound text is handed in by the event loop.
//! All mutation therefore happens on one sequential stream of events.
//!
//! # Known limitations
//!
//! - No reconnection. Once `Closed`, in-flight subscriptions stay stranded
//!   in the table and later registrations are dropped.
//! - No unsubscribe. A subscribe frame cannot be retracted; a handler keeps
//!   being rearmed for as long as the connection lives.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::registry::{Registration, SubscriptionRegistry};
use super::table::CorrelationTable;
use crate::correlation::CorrelationId;
use crate::error::{QueueError, Result};
use crate::protocol::{self, Notification, QueueItem, SubscribeFrame};

/// Channel carrying encoded frames to the websocket writer.
pub type Outbox = mpsc::UnboundedSender<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
}

/// An item matched to the registration that asked for it.
///
/// The registration has already left the correlation table.
#[derive(Debug)]
pub struct Delivery {
    id: CorrelationId,
    registration: Registration,
    item: QueueItem,
}

impl Delivery {
    pub fn id(&self) -> &CorrelationId {
        &self.id
    }

    pub fn queue(&self) -> &str {
        self.registration.queue()
    }

    pub fn item(&self) -> &QueueItem {
        &self.item
    }

    /// Run the handler and give the registration back for rearming.
    pub fn run(self) -> Registration {
        self.registration
            .invoke(self.item.key.as_deref(), &self.item.value);
        self.registration
    }
}

pub struct ConnectionManager {
    state: ConnectionState,
    registry: SubscriptionRegistry,
    table: CorrelationTable,
    outbox: Option<Outbox>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Idle,
            registry: SubscriptionRegistry::new(),
            table: CorrelationTable::new(),
            outbox: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Registrations waiting for the connection to open.
    pub fn waiting(&self) -> usize {
        self.registry.len()
    }

    /// Subscribe frames sent and not yet answered.
    pub fn in_flight(&self) -> usize {
        self.table.len()
    }

    pub fn is_in_flight(&self, id: &CorrelationId) -> bool {
        self.table.contains(id)
    }

    pub fn connecting(&mut self) {
        if self.state == ConnectionState::Idle {
            self.state = ConnectionState::Connecting;
        } else {
            warn!(state = ?self.state, "Ignoring connect request outside Idle");
        }
    }

    /// Transition to `Open` and subscribe everything the registry buffered.
    ///
    /// Returns the number of registrations drained.
    pub fn open(&mut self, outbox: Outbox) -> Result<usize> {
        if self.state == ConnectionState::Closed {
            return Err(QueueError::Transport(
                "Cannot reopen a closed connection".into(),
            ));
        }

        self.state = ConnectionState::Open;
        self.outbox = Some(outbox);

        let drained = self.registry.drain();
        let count = drained.len();
        for registration in drained {
            self.subscribe(registration)?;
        }

        info!(subscriptions = count, "Take websocket open");
        Ok(count)
    }

    /// Accept a new registration: buffer it until open, or subscribe now.
    pub fn register(&mut self, registration: Registration) -> Result<()> {
        match self.state {
            ConnectionState::Idle | ConnectionState::Connecting => {
                debug!(queue = %registration.queue(), "Buffering registration until open");
                self.registry.push(registration);
                Ok(())
            }
            ConnectionState::Open => self.subscribe(registration).map(|_| ()),
            ConnectionState::Closed => {
                warn!(queue = %registration.queue(), "Connection closed, registration dropped");
                Ok(())
            }
        }
    }

    /// Record the registration under a fresh identifier and send its
    /// subscribe frame.
    pub fn subscribe(&mut self, registration: Registration) -> Result<CorrelationId> {
        let outbox = self
            .outbox
            .as_ref()
            .ok_or_else(|| QueueError::Transport("Take websocket is not open".into()))?;

        let id = CorrelationId::generate();
        let frame = SubscribeFrame {
            queue: registration.queue().to_string(),
            identifier: id.to_string(),
            key: registration.key().map(str::to_string),
        }
        .encode()?;

        debug!(id = %id, queue = %registration.queue(), key = ?registration.key(), "Subscribing");
        self.table.insert(id.clone(), registration)?;

        outbox
            .send(frame)
            .map_err(|_| QueueError::Transport("Websocket writer has stopped".into()))?;

        Ok(id)
    }

    /// Decode one inbound message and claim its registration.
    ///
    /// # Errors
    /// - `Protocol` if the text is not an envelope or notification
    /// - `Application` if the envelope reports failure
    /// - `Correlation` if the identifier is not in flight
    pub fn route(&mut self, raw: &str) -> Result<Delivery> {
        let payload = protocol::parse(raw)?.into_result()?;
        let notification = Notification::from_payload(payload)?;
        let id = CorrelationId::from(notification.id);
        let registration = self.table.resolve(&id)?;

        debug!(id = %id, queue = %registration.queue(), "Delivery matched");
        Ok(Delivery {
            id,
            registration,
            item: notification.item,
        })
    }

    /// Re-issue the subscription after its handler ran, with the key that was
    /// originally requested.
    pub fn rearm(&mut self, registration: Registration) -> Result<Option<CorrelationId>> {
        if self.state != ConnectionState::Open {
            warn!(queue = %registration.queue(), state = ?self.state, "Not rearming subscription");
            return Ok(None);
        }
        self.subscribe(registration).map(Some)
    }

    pub fn close(&mut self, reason: Option<&str>) {
        self.state = ConnectionState::Closed;
        self.outbox = None;

        match reason {
            Some(reason) => warn!(reason = %reason, "Take websocket closed with error"),
            None => info!("Take websocket closed"),
        }
        if !self.table.is_empty() {
            warn!(
                stranded = self.table.len(),
                "In-flight subscriptions will not be re-sent"
            );
        }
    }
}
