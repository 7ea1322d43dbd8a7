//! Take Notification Multiplexer
//!
//! Lets an application register many (queue, key) interests over a single
//! take websocket, routes each delivered item to the handler that asked for
//! it, and re-issues the interest after every delivery.
//!
//! # Architecture
//!
//! | Module      | Responsibility                                      |
//! |-------------|-----------------------------------------------------|
//! | `registry`  | Registrations buffered before the socket opens      |
//! | `table`     | In-flight correlation id -> registration            |
//! | `manager`   | Lifecycle state machine, routing, rearm             |
//! | `transport` | WebSocket connect, reader and writer pumps          |
//!
//! # Event Flow
//!
//! Everything that mutates the registry or table arrives as an `Event` on
//! one mailbox and is processed to completion before the next:
//!
//! ```text
//! register() ─┐
//! transport ──┼──> mailbox ──> ConnectionManager
//! handlers ───┘                    │
//!                                  └──> outbox ──> websocket writer
//! ```
//!
//! Handlers run on the blocking pool. When one returns, its registration is
//! posted back as `HandlerDone` and the manager rearms it, so continuous
//! consumption is a loop through the mailbox rather than recursion.
//!
//! # Usage
//!
//! ```rust,no_run
//! use disqueue::{Config, Disqueue};
//!
//! # async fn example() -> disqueue::Result<()> {
//! let client = Disqueue::new(Config::default())?;
//! client.register("jobs", None, |key: Option<&str>, value: &str| {
//!     println!("{:?} => {}", key, value);
//! });
//! client.run().await?;
//! # Ok(())
//! # }
//! ```

mod manager;
mod registry;
mod table;
mod transport;

pub use manager::{ConnectionManager, ConnectionState, Delivery, Outbox};
pub use registry::{QueueHandler, Registration, SubscriptionRegistry};
pub use table::CorrelationTable;
pub use transport::websocket_address;

use std::sync::Mutex;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::auth::Credentials;
use crate::client::{HttpClient, QueueClient};
use crate::config::Config;
use crate::error::{QueueError, Result};

/// Everything the connection manager reacts to.
pub(crate) enum Event {
    Register(Registration),
    Opened(Outbox),
    Inbound(String),
    HandlerDone(Registration),
    /// Carries the error text when the connection failed rather than ended.
    Closed(Option<String>),
}

/// Queue service client with a multiplexed take websocket.
pub struct Disqueue {
    config: Config,
    http: HttpClient,
    authorization: Option<String>,
    clients: DashMap<String, QueueClient>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
}

impl Disqueue {
    pub fn new(config: Config) -> Result<Self> {
        let authorization = Credentials::from_config(&config)?.map(|c| c.header_value());
        let http = HttpClient::new(&config)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            http,
            authorization,
            clients: DashMap::new(),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        })
    }

    /// Register a handler for items of `queue`, optionally restricted to
    /// `key`.
    ///
    /// Before the websocket opens the registration is buffered; afterwards
    /// it is subscribed immediately.
    pub fn register(&self, queue: &str, key: Option<&str>, handler: impl QueueHandler) {
        let registration = Registration::new(queue, key.map(str::to_string), handler);
        if self.events_tx.send(Event::Register(registration)).is_err() {
            warn!(queue = %queue, "Multiplexer has stopped, registration dropped");
        }
    }

    /// HTTP client for `queue`.
    ///
    /// On first use the queue is checked with the info endpoint, and the
    /// client is cached only if that succeeds.
    pub async fn queue(&self, queue: &str) -> Result<QueueClient> {
        if let Some(client) = self.clients.get(queue) {
            return Ok(client.clone());
        }

        let client = QueueClient::new(self.http.clone(), queue);
        client.verify().await?;

        debug!(queue = %queue, "Caching queue client");
        Ok(self
            .clients
            .entry(queue.to_string())
            .or_insert(client)
            .clone())
    }

    /// Whether a verified client for `queue` is cached.
    pub fn is_cached(&self, queue: &str) -> bool {
        self.clients.contains_key(queue)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// HTTP plumbing shared by the cached queue clients.
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Connect the take websocket and process events until it closes.
    ///
    /// Returns `Ok` when the server closes the connection cleanly.
    ///
    /// # Errors
    /// - `Transport` if the handshake fails or the socket errors
    /// - `Protocol`, `Application` or `Correlation` for the first inbound
    ///   message that cannot be routed; the connection is dropped
    /// - `Config` if called more than once
    pub async fn run(&self) -> Result<()> {
        let events_rx = self
            .events_rx
            .lock()
            .map_err(|_| QueueError::Config("Multiplexer state poisoned".into()))?
            .take()
            .ok_or_else(|| QueueError::Config("Multiplexer is already running".into()))?;

        let address = websocket_address(&self.config.url, &self.config.websocket_path)?;
        info!(address = %address, "Starting take multiplexer");

        let mut manager = ConnectionManager::new();
        manager.connecting();

        let connection = tokio::spawn(transport::run_connection(
            address,
            self.authorization.clone(),
            self.events_tx.clone(),
        ));

        let result = event_loop(&mut manager, events_rx, self.events_tx.clone()).await;
        connection.abort();

        if manager.state() != ConnectionState::Closed {
            let reason = result.as_ref().err().map(|e| e.to_string());
            manager.close(reason.as_deref());
        }
        result
    }
}

async fn event_loop(
    manager: &mut ConnectionManager,
    mut events: mpsc::UnboundedReceiver<Event>,
    events_tx: mpsc::UnboundedSender<Event>,
) -> Result<()> {
    while let Some(event) = events.recv().await {
        match event {
            Event::Register(registration) => manager.register(registration)?,
            Event::Opened(outbox) => {
                manager.open(outbox)?;
            }
            Event::Inbound(raw) => {
                let delivery = manager.route(&raw).map_err(|e| {
                    error!(error = %e, "Failed to route notification");
                    e
                })?;
                dispatch(delivery, events_tx.clone());
            }
            Event::HandlerDone(registration) => {
                manager.rearm(registration)?;
            }
            Event::Closed(reason) => {
                manager.close(reason.as_deref());
                return match reason {
                    Some(reason) => Err(QueueError::Transport(reason)),
                    None => Ok(()),
                };
            }
        }
    }
    Ok(())
}

/// Run the handler off the event loop and post the registration back.
fn dispatch(delivery: Delivery, events: mpsc::UnboundedSender<Event>) {
    let queue = delivery.queue().to_string();
    let id = delivery.id().clone();

    tokio::spawn(async move {
        match tokio::task::spawn_blocking(move || delivery.run()).await {
            Ok(registration) => {
                let _ = events.send(Event::HandlerDone(registration));
            }
            Err(e) => {
                // The registration went down with the handler.
                error!(queue = %queue, id = %id, error = %e, "Handler panicked, not rearming");
            }
        }
    });
}
