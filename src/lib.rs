//! Disqueue - client for the Disqueue work-queue service
//!
//! ## Architecture
//!
//! - **Request/response** (`client`): one HTTP call per operation
//!   (create, list, info, delete, put, take, peek), each answered with the
//!   protocol envelope.
//! - **Take notifications** (`notify`): many (queue, key) interests
//!   multiplexed over one websocket. Each delivery is routed by correlation
//!   id to the handler that asked for it, and the interest is re-issued once
//!   the handler returns.
//!
//! Both paths share the envelope codec in `protocol` and the error taxonomy
//! in `error`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use disqueue::{Config, Disqueue};
//!
//! # async fn example() -> disqueue::Result<()> {
//! let client = Disqueue::new(Config {
//!     url: "http://localhost:8080".into(),
//!     ..Default::default()
//! })?;
//!
//! client.queue("jobs").await?.put(None, "hello").await?;
//!
//! client.register("jobs", None, |key: Option<&str>, value: &str| {
//!     println!("{:?}: {}", key, value);
//! });
//! client.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod correlation;
pub mod error;
pub mod notify;
pub mod protocol;

// Re-exports
pub use auth::Credentials;
pub use client::{queue_create, queue_list, HttpClient, QueueClient, QueueInfo};
pub use config::Config;
pub use correlation::CorrelationId;
pub use error::{QueueError, Result};
pub use notify::{ConnectionState, Disqueue, QueueHandler};
pub use protocol::{Envelope, QueueItem};
