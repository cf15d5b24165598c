//! Broker topology: exchanges, queues, and bindings.

/// Name of the topic exchange all domain events are published to.
pub const EVENTS_EXCHANGE: &str = "events";

/// Name of the durable queue the saga consumer reads from.
pub const ORDER_EVENTS_QUEUE: &str = "order.events";

/// Binding pattern routing order events into [`ORDER_EVENTS_QUEUE`].
pub const ORDER_EVENTS_BINDING: &str = "order.*";

/// The kind of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    /// Routes by matching the routing key against binding patterns, where
    /// `*` matches exactly one dot-separated word and `#` matches zero or
    /// more.
    Topic,
}

/// Declaration of a single exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSpec {
    pub name: String,
    pub kind: ExchangeKind,
    pub durable: bool,
}

/// Declaration of a single queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: String,
    pub durable: bool,
}

/// A binding routing messages from an exchange into a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSpec {
    pub queue: String,
    pub exchange: String,
    pub routing_key: String,
}

/// A set of declarations to apply to the broker.
///
/// Declaration is idempotent: redeclaring an identical topology is always
/// safe. Publishers declare what they publish to; consumers declare what
/// they consume from; neither needs to know about the other's bindings —
/// a notification service could bind `user.*` or `*.cancelled` against the
/// same exchange without this crate changing.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub exchanges: Vec<ExchangeSpec>,
    pub queues: Vec<QueueSpec>,
    pub bindings: Vec<BindingSpec>,
}

impl Topology {
    /// Creates an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a durable topic exchange.
    pub fn topic_exchange(mut self, name: impl Into<String>) -> Self {
        self.exchanges.push(ExchangeSpec {
            name: name.into(),
            kind: ExchangeKind::Topic,
            durable: true,
        });
        self
    }

    /// Adds a durable queue.
    pub fn durable_queue(mut self, name: impl Into<String>) -> Self {
        self.queues.push(QueueSpec {
            name: name.into(),
            durable: true,
        });
        self
    }

    /// Binds a queue to an exchange with a routing pattern.
    pub fn bind(
        mut self,
        queue: impl Into<String>,
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Self {
        self.bindings.push(BindingSpec {
            queue: queue.into(),
            exchange: exchange.into(),
            routing_key: routing_key.into(),
        });
        self
    }

    /// The storefront topology: durable topic exchange `events`, durable
    /// queue `order.events`, bound with pattern `order.*`.
    pub fn storefront() -> Self {
        Self::new()
            .topic_exchange(EVENTS_EXCHANGE)
            .durable_queue(ORDER_EVENTS_QUEUE)
            .bind(ORDER_EVENTS_QUEUE, EVENTS_EXCHANGE, ORDER_EVENTS_BINDING)
    }
}

/// Matches a routing key against a topic binding pattern.
///
/// Both are dot-separated word lists. In the pattern, `*` matches exactly
/// one word and `#` matches zero or more words.
pub fn pattern_matches(pattern: &str, routing_key: &str) -> bool {
    fn matches(pattern: &[&str], key: &[&str]) -> bool {
        match (pattern.first(), key.first()) {
            (None, None) => true,
            (Some(&"#"), _) => {
                // `#` consumes zero words, or one word and stays.
                matches(&pattern[1..], key)
                    || (!key.is_empty() && matches(pattern, &key[1..]))
            }
            (Some(&"*"), Some(_)) => matches(&pattern[1..], &key[1..]),
            (Some(&word), Some(&k)) if word == k => matches(&pattern[1..], &key[1..]),
            _ => false,
        }
    }

    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    matches(&pattern, &key)
}
