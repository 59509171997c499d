// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Definitions
//!
//! The consumer reads from one queue. A configured queue name gives a durable
//! queue shared across restarts; without one, a uniquely named auto-delete queue
//! is generated and disappears with the consumer.

use uuid::Uuid;

/// Definition of a RabbitMQ queue with its configuration parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueDefinition {
    pub(crate) name: String,
    pub(crate) durable: bool,
    pub(crate) delete: bool,
    pub(crate) exclusive: bool,
    pub(crate) passive: bool,
    pub(crate) no_wait: bool,
    pub(crate) ttl: Option<i32>,
    pub(crate) max_length: Option<i32>,
    pub(crate) dead_letter_exchange: Option<String>,
}

impl QueueDefinition {
    /// Creates a new queue definition with default, non-durable settings.
    pub fn new(name: &str) -> QueueDefinition {
        QueueDefinition {
            name: name.to_owned(),
            ..QueueDefinition::default()
        }
    }

    /// Creates an auto-delete queue named `prefix` followed by a random suffix.
    pub fn generated(prefix: &str) -> QueueDefinition {
        QueueDefinition::new(&format!("{}{}", prefix, Uuid::new_v4().simple())).delete()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Makes the queue durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Sets the queue to auto-delete once its last consumer disconnects.
    pub fn delete(mut self) -> Self {
        self.delete = true;
        self
    }

    /// Makes the queue exclusive to the connection.
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    /// Sets the message Time-To-Live (TTL) for the queue, in milliseconds.
    pub fn ttl(mut self, ttl: i32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the maximum number of messages the queue can hold.
    pub fn max_length(mut self, max: i32) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Routes rejected and expired messages to the given exchange.
    pub fn dead_letter_exchange(mut self, exchange: &str) -> Self {
        self.dead_letter_exchange = Some(exchange.to_owned());
        self
    }
}

/// Binding of a queue to an exchange with one routing key pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding {
    pub(crate) queue_name: String,
    pub(crate) exchange_name: String,
    pub(crate) routing_key: String,
}

impl QueueBinding {
    pub fn new(queue: &str) -> QueueBinding {
        QueueBinding {
            queue_name: queue.to_owned(),
            exchange_name: String::new(),
            routing_key: String::new(),
        }
    }

    pub fn exchange(mut self, exchange: &str) -> Self {
        self.exchange_name = exchange.to_owned();
        self
    }

    pub fn routing_key(mut self, key: &str) -> Self {
        self.routing_key = key.to_owned();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_queue_is_unique_and_auto_deleted() {
        let first = QueueDefinition::generated("rabbitmq.exchange_");
        let second = QueueDefinition::generated("rabbitmq.exchange_");

        assert!(first.name().starts_with("rabbitmq.exchange_"));
        assert!(first.name().len() > "rabbitmq.exchange_".len());
        assert_ne!(first.name(), second.name());
        assert!(first.delete);
        assert!(!first.durable);
    }

    #[test]
    fn binding_builder() {
        let binding = QueueBinding::new("devices")
            .exchange("exchange.bus")
            .routing_key("device.#");

        assert_eq!(binding.queue_name, "devices");
        assert_eq!(binding.exchange_name, "exchange.bus");
        assert_eq!(binding.routing_key, "device.#");
    }
}
