// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # OpenTelemetry Integration
//!
//! Propagates trace context through message headers: the publisher injects the
//! current context into outgoing headers and the consume loop opens a consumer
//! span for each delivery, parented on whatever the publisher sent.

use crate::envelope::MessageHeaders;
use opentelemetry::{
    global::{BoxedSpan, BoxedTracer},
    propagation::{Extractor, Injector},
    trace::{SpanKind, Tracer},
    Context,
};
use std::borrow::Cow;

/// Adapter exposing string message headers to OpenTelemetry propagators.
pub(crate) struct HeaderPropagator<'a> {
    headers: &'a mut MessageHeaders,
}

impl<'a> HeaderPropagator<'a> {
    pub(crate) fn new(headers: &'a mut MessageHeaders) -> Self {
        Self { headers }
    }
}

impl Injector for HeaderPropagator<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.headers.insert(key.to_lowercase(), value);
    }
}

/// Read-only counterpart of [`HeaderPropagator`].
pub(crate) struct HeaderExtractor<'a> {
    headers: &'a MessageHeaders,
}

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    fn keys(&self) -> Vec<&str> {
        self.headers.keys().map(String::as_str).collect()
    }
}

/// Injects the given context into outgoing headers.
pub(crate) fn inject(ctx: &Context, headers: &mut MessageHeaders) {
    opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.inject_context(ctx, &mut HeaderPropagator::new(headers))
    });
}

/// Creates a consumer span for a delivery, parented on the propagated context.
///
/// # Returns
/// A tuple containing the extracted context and the new span
pub fn new_span(headers: &MessageHeaders, tracer: &BoxedTracer, name: &str) -> (Context, BoxedSpan) {
    let ctx = opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.extract(&HeaderExtractor { headers })
    });

    let span = tracer
        .span_builder(Cow::from(name.to_owned()))
        .with_kind(SpanKind::Consumer)
        .start_with_context(tracer, &ctx);

    (ctx, span)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injector_lowercases_keys() {
        let mut headers = MessageHeaders::new();

        HeaderPropagator::new(&mut headers).set("TraceParent", "00-abc".to_owned());

        assert_eq!(headers.get("traceparent").map(String::as_str), Some("00-abc"));
    }

    #[test]
    fn extractor_reads_headers() {
        let mut headers = MessageHeaders::new();
        headers.insert("traceparent".to_owned(), "00-abc".to_owned());

        let extractor = HeaderExtractor { headers: &headers };

        assert_eq!(extractor.get("traceparent"), Some("00-abc"));
        assert_eq!(extractor.keys(), vec!["traceparent"]);
    }
}
