// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Business Consumers
//!
//! The `Consumer` trait is the seam between the exchange and application code.
//! `Consumers` is the registry the message handler dispatches to: an immutable
//! list assembled once at startup that fans every document out to each consumer
//! in registration order.

use crate::{
    errors::{AmqpError, ConsumeError},
    source::Source,
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error};

/// Receives documents decoded from the exchange.
#[async_trait]
pub trait Consumer<D>: Send + Sync
where
    D: Send + Sync + 'static,
{
    /// Processes one document.
    ///
    /// Return `ConsumeError::Unprocessable` to reject the message; any other
    /// error stops the consumer.
    async fn consume(
        &self,
        source: &Source,
        routing_key: &str,
        document: &D,
    ) -> Result<(), ConsumeError>;
}

/// Fixed set of consumers built at startup.
pub struct Consumers<D> {
    consumers: Vec<Arc<dyn Consumer<D>>>,
}

impl<D> Consumers<D>
where
    D: Send + Sync + 'static,
{
    pub fn builder() -> ConsumersBuilder<D> {
        ConsumersBuilder { consumers: vec![] }
    }

    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}

#[async_trait]
impl<D> Consumer<D> for Consumers<D>
where
    D: Send + Sync + 'static,
{
    /// Dispatches to every consumer, stopping at the first error.
    async fn consume(
        &self,
        source: &Source,
        routing_key: &str,
        document: &D,
    ) -> Result<(), ConsumeError> {
        for consumer in &self.consumers {
            consumer.consume(source, routing_key, document).await?;
        }

        debug!(
            source = source.as_str(),
            routing_key = routing_key,
            consumers = self.consumers.len(),
            "message dispatched to consumers"
        );

        Ok(())
    }
}

pub struct ConsumersBuilder<D> {
    consumers: Vec<Arc<dyn Consumer<D>>>,
}

impl<D> ConsumersBuilder<D>
where
    D: Send + Sync + 'static,
{
    /// Registers a consumer; registering the same instance twice is a no-op.
    pub fn consumer(mut self, consumer: Arc<dyn Consumer<D>>) -> Self {
        if !self.consumers.iter().any(|c| Arc::ptr_eq(c, &consumer)) {
            self.consumers.push(consumer);
        }
        self
    }

    /// Fails when no consumer was registered, since every valid message would
    /// be acknowledged without reaching application code.
    pub fn build(self) -> Result<Consumers<D>, AmqpError> {
        if self.consumers.is_empty() {
            error!("no consumer registered, exchange could not be initialized");
            return Err(AmqpError::ConfigError("no consumer registered".to_owned()));
        }

        Ok(Consumers {
            consumers: self.consumers,
        })
    }
}
