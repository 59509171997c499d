// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Channel Management
//!
//! This module handles the creation of AMQP connections and channels, and the two
//! seams the rest of the crate talks to instead of `lapin` directly:
//! - [`PublishChannel`]: something a message can be published to
//! - [`Acknowledge`]: the disposition side of a single delivery
//!
//! It also provides [`LazyChannel`], a publish channel that connects on first use
//! and is used by the publisher until the consuming channel becomes available.

use crate::{config::ConnectionConfig, envelope::MessageHeaders, errors::AmqpError};
use async_trait::async_trait;
use lapin::{
    acker::Acker,
    options::{BasicAckOptions, BasicNackOptions, BasicPublishOptions, BasicRejectOptions},
    types::{AMQPValue, FieldTable, LongString, ShortString},
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Default content type for JSON messages
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Creates a new AMQP connection and a channel on it.
///
/// # Parameters
/// * `cfg` - Broker address and credentials
/// * `name` - Connection name shown in the broker management UI
/// * `heartbeat` - Heartbeat interval in seconds
///
/// # Returns
/// The connection and channel, both wrapped in `Arc` for sharing
pub async fn new_amqp_channel(
    cfg: &ConnectionConfig,
    name: &str,
    heartbeat: u16,
) -> Result<(Arc<Connection>, Arc<Channel>), AmqpError> {
    debug!(host = cfg.host(), port = cfg.port(), "creating amqp connection...");
    let options =
        ConnectionProperties::default().with_connection_name(LongString::from(name.to_owned()));

    let conn = match Connection::connect(&cfg.uri(heartbeat), options).await {
        Ok(c) => Ok(c),
        Err(err) => {
            error!(error = err.to_string(), "failure to connect");
            Err(AmqpError::ConnectionError {})
        }
    }?;
    debug!("amqp connected");

    debug!("creating amqp channel...");
    match conn.create_channel().await {
        Ok(c) => {
            debug!("channel created");
            Ok((Arc::new(conn), Arc::new(c)))
        }
        Err(err) => {
            error!(error = err.to_string(), "error to create the channel");
            Err(AmqpError::ChannelError {})
        }
    }
}

/// Target of outbound messages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PublishChannel: Send + Sync {
    /// Publishes a body with the given headers, resolving once the broker
    /// accepted (or refused) it.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
        headers: &MessageHeaders,
    ) -> Result<(), AmqpError>;
}

/// Broker-side disposition of a single delivery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Acknowledge: Send + Sync {
    async fn ack(&self) -> Result<(), AmqpError>;

    /// Negative-acknowledges the delivery; `requeue` returns it to the queue.
    async fn nack(&self, requeue: bool) -> Result<(), AmqpError>;

    async fn reject(&self, requeue: bool) -> Result<(), AmqpError>;
}

#[async_trait]
impl Acknowledge for Acker {
    async fn ack(&self) -> Result<(), AmqpError> {
        Acker::ack(self, BasicAckOptions { multiple: false })
            .await
            .map_err(|err| {
                error!(error = err.to_string(), "error whiling ack msg");
                AmqpError::AckMessageError
            })
            .map(|_| ())
    }

    async fn nack(&self, requeue: bool) -> Result<(), AmqpError> {
        Acker::nack(
            self,
            BasicNackOptions {
                multiple: false,
                requeue,
            },
        )
        .await
        .map_err(|err| {
            error!(error = err.to_string(), "error whiling nack msg");
            AmqpError::NackMessageError
        })
        .map(|_| ())
    }

    async fn reject(&self, requeue: bool) -> Result<(), AmqpError> {
        Acker::reject(self, BasicRejectOptions { requeue })
            .await
            .map_err(|err| {
                error!(error = err.to_string(), "error whiling reject msg");
                AmqpError::RejectMessageError
            })
            .map(|_| ())
    }
}

#[async_trait]
impl PublishChannel for Channel {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
        headers: &MessageHeaders,
    ) -> Result<(), AmqpError> {
        let confirm = self
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions {
                    immediate: false,
                    mandatory: false,
                },
                body,
                BasicProperties::default()
                    .with_content_type(ShortString::from(JSON_CONTENT_TYPE))
                    .with_headers(field_table(headers)),
            )
            .await
            .map_err(|err| {
                error!(error = err.to_string(), "error publishing message");
                AmqpError::PublishingError
            })?;

        match confirm.await {
            Ok(confirmation) if confirmation.is_nack() => {
                error!("message was nacked by the broker");
                Err(AmqpError::PublishingError)
            }
            Ok(_) => Ok(()),
            Err(err) => {
                error!(error = err.to_string(), "error waiting for publish confirmation");
                Err(AmqpError::PublishingError)
            }
        }
    }
}

fn field_table(headers: &MessageHeaders) -> FieldTable {
    let mut btree = BTreeMap::<ShortString, AMQPValue>::default();

    for (key, value) in headers {
        btree.insert(
            ShortString::from(key.clone()),
            AMQPValue::LongString(LongString::from(value.clone())),
        );
    }

    FieldTable::from(btree)
}

/// Publish channel that opens its own connection on first use.
///
/// The connection is reopened when the cached channel is no longer connected,
/// so a publisher can outlive broker restarts without the consumer running.
pub struct LazyChannel {
    cfg: ConnectionConfig,
    name: String,
    heartbeat: u16,
    inner: Mutex<Option<(Arc<Connection>, Arc<Channel>)>>,
}

impl LazyChannel {
    pub fn new(cfg: ConnectionConfig, name: &str, heartbeat: u16) -> LazyChannel {
        LazyChannel {
            cfg,
            name: name.to_owned(),
            heartbeat,
            inner: Mutex::new(None),
        }
    }

    async fn channel(&self) -> Result<Arc<Channel>, AmqpError> {
        let mut inner = self.inner.lock().await;

        if let Some((_, channel)) = inner.as_ref() {
            if channel.status().connected() {
                return Ok(channel.clone());
            }
            debug!("publish channel is closed, reconnecting");
        }

        let (conn, channel) = new_amqp_channel(&self.cfg, &self.name, self.heartbeat).await?;
        *inner = Some((conn, channel.clone()));

        Ok(channel)
    }
}

#[async_trait]
impl PublishChannel for LazyChannel {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
        headers: &MessageHeaders,
    ) -> Result<(), AmqpError> {
        let channel = self.channel().await?;
        PublishChannel::publish(channel.as_ref(), exchange, routing_key, body, headers).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_become_long_strings() {
        let mut headers = MessageHeaders::new();
        headers.insert("source".to_owned(), "module.devices".to_owned());
        headers.insert("sender_id".to_owned(), "proc-1".to_owned());

        let table = field_table(&headers);

        assert_eq!(table.inner().len(), 2);
        assert_eq!(
            table.inner().get("source"),
            Some(&AMQPValue::LongString(LongString::from("module.devices")))
        );
    }

    #[test]
    fn lazy_channel_keeps_configured_heartbeat() {
        let channel = LazyChannel::new(ConnectionConfig::default(), "publisher", 60);

        assert_eq!(channel.heartbeat, 60);
        assert_eq!(channel.name, "publisher");
    }
}
