// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use crate::errors::DocumentError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;

/// Turns a decoded payload into a typed document.
///
/// The routing key is passed along so implementations can pick a different
/// document shape per topic.
pub trait DocumentFactory: Send + Sync {
    type Document: Send + Sync + 'static;

    fn create(&self, data: &Value, routing_key: &str) -> Result<Self::Document, DocumentError>;
}

/// Deserializes every payload into the same `serde` type.
#[derive(Debug)]
pub struct JsonDocumentFactory<T> {
    _document: PhantomData<fn() -> T>,
}

impl<T> JsonDocumentFactory<T> {
    pub fn new() -> Self {
        JsonDocumentFactory {
            _document: PhantomData,
        }
    }
}

impl<T> Default for JsonDocumentFactory<T> {
    fn default() -> Self {
        JsonDocumentFactory::new()
    }
}

impl<T> DocumentFactory for JsonDocumentFactory<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    type Document = T;

    fn create(&self, data: &Value, routing_key: &str) -> Result<T, DocumentError> {
        T::deserialize(data).map_err(|err| DocumentError::new(routing_key, err))
    }
}
