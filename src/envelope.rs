// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Inbound Message Envelope
//!
//! A broker-independent, read-only view of one delivery: routing key, string
//! headers and the raw body. The message handler only ever sees envelopes, which
//! keeps it free of `lapin` types.

use lapin::{message::Delivery, protocol::basic::AMQPProperties, types::AMQPValue};
use std::collections::BTreeMap;
use tracing::warn;

/// Header naming the logical origin of a message
pub const AMQP_HEADERS_SOURCE: &str = "source";
/// Header carrying the identity of the publishing process
pub const AMQP_HEADERS_SENDER_ID: &str = "sender_id";
/// Header carrying the publish timestamp
pub const AMQP_HEADERS_CREATED: &str = "created";

/// String headers of a message.
pub type MessageHeaders = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    routing_key: String,
    headers: MessageHeaders,
    body: Vec<u8>,
}

impl Envelope {
    pub fn new(routing_key: &str, headers: MessageHeaders, body: impl Into<Vec<u8>>) -> Self {
        Envelope {
            routing_key: routing_key.to_owned(),
            headers,
            body: body.into(),
        }
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    pub fn headers(&self) -> &MessageHeaders {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn source(&self) -> Option<&str> {
        self.header(AMQP_HEADERS_SOURCE)
    }

    pub fn sender_id(&self) -> Option<&str> {
        self.header(AMQP_HEADERS_SENDER_ID)
    }
}

impl From<&Delivery> for Envelope {
    fn from(delivery: &Delivery) -> Self {
        Envelope {
            routing_key: delivery.routing_key.to_string(),
            headers: extract_headers(&delivery.properties),
            body: delivery.data.clone(),
        }
    }
}

/// Flattens AMQP headers into strings.
///
/// Textual, numeric and boolean values are kept; nested tables, arrays and
/// byte arrays are skipped.
pub(crate) fn extract_headers(props: &AMQPProperties) -> MessageHeaders {
    let mut headers = MessageHeaders::new();

    let Some(table) = props.headers() else {
        return headers;
    };

    for (key, value) in table.inner() {
        if let Some(value) = header_value(value) {
            headers.insert(key.as_str().to_owned(), value);
        }
    }

    headers
}

fn header_value(value: &AMQPValue) -> Option<String> {
    match value {
        AMQPValue::LongString(v) => match std::str::from_utf8(v.as_bytes()) {
            Ok(s) => Some(s.to_owned()),
            Err(err) => {
                warn!(error = err.to_string(), "header value is not valid utf-8");
                None
            }
        },
        AMQPValue::ShortString(v) => Some(v.as_str().to_owned()),
        AMQPValue::Boolean(v) => Some(v.to_string()),
        AMQPValue::ShortShortInt(v) => Some(v.to_string()),
        AMQPValue::ShortShortUInt(v) => Some(v.to_string()),
        AMQPValue::ShortInt(v) => Some(v.to_string()),
        AMQPValue::ShortUInt(v) => Some(v.to_string()),
        AMQPValue::LongInt(v) => Some(v.to_string()),
        AMQPValue::LongUInt(v) => Some(v.to_string()),
        AMQPValue::LongLongInt(v) => Some(v.to_string()),
        AMQPValue::Timestamp(v) => Some(v.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapin::{
        types::{FieldTable, LongString, ShortString},
        BasicProperties,
    };

    #[test]
    fn extracts_textual_and_numeric_headers() {
        let mut table = FieldTable::default();
        table.insert(
            ShortString::from(AMQP_HEADERS_SOURCE),
            AMQPValue::LongString(LongString::from("module.devices")),
        );
        table.insert(
            ShortString::from(AMQP_HEADERS_SENDER_ID),
            AMQPValue::ShortString(ShortString::from("proc-1")),
        );
        table.insert(ShortString::from("retries"), AMQPValue::LongInt(3));
        table.insert(
            ShortString::from("nested"),
            AMQPValue::FieldTable(FieldTable::default()),
        );

        let headers = extract_headers(&BasicProperties::default().with_headers(table));

        assert_eq!(headers.get("source").map(String::as_str), Some("module.devices"));
        assert_eq!(headers.get("sender_id").map(String::as_str), Some("proc-1"));
        assert_eq!(headers.get("retries").map(String::as_str), Some("3"));
        assert!(!headers.contains_key("nested"));
    }

    #[test]
    fn missing_headers_yield_empty_map() {
        assert!(extract_headers(&BasicProperties::default()).is_empty());
    }

    #[test]
    fn accessors_read_well_known_headers() {
        let mut headers = MessageHeaders::new();
        headers.insert("source".to_owned(), "module.devices".to_owned());

        let envelope = Envelope::new("device.updated", headers, b"{}".to_vec());

        assert_eq!(envelope.routing_key(), "device.updated");
        assert_eq!(envelope.source(), Some("module.devices"));
        assert_eq!(envelope.sender_id(), None);
        assert_eq!(envelope.body(), b"{}");
    }
}
