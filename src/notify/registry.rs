//! Subscription Registry
//!
//! Single responsibility: Hold handler registrations made before the take
//! websocket is open, and hand them over exactly once when it opens.

use std::fmt;

/// Callback invoked with the key and value of each delivered item.
///
/// Implemented for any `Fn(Option<&str>, &str)` closure.
pub trait QueueHandler: Send + 'static {
    fn handle(&self, key: Option<&str>, value: &str);
}

impl<F> QueueHandler for F
where
    F: Fn(Option<&str>, &str) + Send + 'static,
{
    fn handle(&self, key: Option<&str>, value: &str) {
        self(key, value)
    }
}

/// A (queue, key, handler) interest.
///
/// Immutable once created. Owned by exactly one holder at a time: the
/// registry, the correlation table, or the task running its handler.
pub struct Registration {
    queue: String,
    key: Option<String>,
    handler: Box<dyn QueueHandler>,
}

impl Registration {
    pub fn new(
        queue: impl Into<String>,
        key: Option<String>,
        handler: impl QueueHandler,
    ) -> Self {
        Self {
            queue: queue.into(),
            key,
            handler: Box::new(handler),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// The key originally asked for, not the key of any delivered item.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn invoke(&self, key: Option<&str>, value: &str) {
        self.handler.handle(key, value);
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("queue", &self.queue)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Registrations buffered per queue, in arrival order.
#[derive(Default)]
pub struct SubscriptionRegistry {
    queues: Vec<(String, Vec<Registration>)>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, registration: Registration) {
        match self
            .queues
            .iter_mut()
            .find(|(queue, _)| queue == registration.queue())
        {
            Some((_, waiting)) => waiting.push(registration),
            None => {
                let queue = registration.queue().to_string();
                self.queues.push((queue, vec![registration]));
            }
        }
    }

    /// Empty the registry. Queues come out in first-registration order and,
    /// within a queue, handlers in registration order.
    pub fn drain(&mut self) -> Vec<Registration> {
        std::mem::take(&mut self.queues)
            .into_iter()
            .flat_map(|(_, waiting)| waiting)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.queues.iter().map(|(_, waiting)| waiting.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(queue: &str, key: Option<&str>) -> Registration {
        Registration::new(queue, key.map(str::to_string), |_: Option<&str>, _: &str| {})
    }

    #[test]
    fn test_drain_orders_by_queue_then_registration() {
        let mut registry = SubscriptionRegistry::new();
        registry.push(noop("jobs", None));
        registry.push(noop("mail", Some("a")));
        registry.push(noop("jobs", Some("urgent")));
        registry.push(noop("mail", Some("b")));
        assert_eq!(registry.len(), 4);

        let drained: Vec<(String, Option<String>)> = registry
            .drain()
            .into_iter()
            .map(|r| (r.queue().to_string(), r.key().map(str::to_string)))
            .collect();

        assert_eq!(
            drained,
            vec![
                ("jobs".to_string(), None),
                ("jobs".to_string(), Some("urgent".to_string())),
                ("mail".to_string(), Some("a".to_string())),
                ("mail".to_string(), Some("b".to_string())),
            ]
        );
    }

    #[test]
    fn test_drain_empties_registry() {
        let mut registry = SubscriptionRegistry::new();
        registry.push(noop("jobs", None));
        assert_eq!(registry.drain().len(), 1);
        assert!(registry.is_empty());
        assert!(registry.drain().is_empty());
    }

    #[test]
    fn test_invoke_calls_handler() {
        use std::sync::{Arc, Mutex};

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let registration = Registration::new("jobs", None, move |key: Option<&str>, value: &str| {
            sink.lock()
                .unwrap()
                .push((key.map(str::to_string), value.to_string()));
        });

        registration.invoke(Some("abc"), "payload1");
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(Some("abc".to_string()), "payload1".to_string())]
        );
    }
}
