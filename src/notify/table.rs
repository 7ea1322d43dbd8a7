//! Correlation Table
//!
//! Single responsibility: Map each in-flight correlation identifier to the
//! registration that issued it. An identifier resolves at most once.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::registry::Registration;
use crate::correlation::CorrelationId;
use crate::error::{QueueError, Result};

#[derive(Default)]
pub struct CorrelationTable {
    pending: HashMap<CorrelationId, Registration>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `registration` under `id`.
    ///
    /// An id already in flight keeps its registration and the new one is
    /// rejected with `DuplicateCorrelation`.
    pub fn insert(&mut self, id: CorrelationId, registration: Registration) -> Result<()> {
        match self.pending.entry(id) {
            Entry::Occupied(entry) => {
                tracing::error!(
                    id = %entry.key(),
                    queue = %entry.get().queue(),
                    rejected = %registration.queue(),
                    "Correlation id reused"
                );
                Err(QueueError::DuplicateCorrelation(entry.key().to_string()))
            }
            Entry::Vacant(entry) => {
                entry.insert(registration);
                Ok(())
            }
        }
    }

    /// Remove and return the registration for `id`.
    ///
    /// Unknown or already-resolved identifiers are a `Correlation` error.
    pub fn resolve(&mut self, id: &CorrelationId) -> Result<Registration> {
        self.pending
            .remove(id)
            .ok_or_else(|| QueueError::Correlation(id.to_string()))
    }

    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
