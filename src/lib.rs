// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

mod otel;

pub mod channel;
pub mod command;
pub mod config;
pub mod consumer;
pub mod document;
pub mod envelope;
pub mod errors;
pub mod exchange;
pub mod factory;
pub mod handler;
pub mod identifier;
pub mod outcome;
pub mod publisher;
pub mod queue;
pub mod source;
pub mod topology;
