// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Typed, immutable configuration objects for the client runtime.
//!
//! Each object is constructed through a `derive_builder`-generated builder (`pattern = "owned"`,
//! aggregate validation in `build_fn`). Connection, topic, and pool concerns are split into three
//! independently constructible configs, since a pool is shared across many topic subscriptions and
//! a topic subscription can be reused across pools.

mod client_config;
mod pool_config;
mod topic_config;

pub use client_config::{
    ClientConfig, ClientConfigBuilder, ClientConfigBuilderError, TlsOptions, TransportOptions,
    TransportOptionsBuilder, TransportOptionsBuilderError, WillMessage,
};
pub use pool_config::{PoolConfig, PoolConfigBuilder, PoolConfigBuilderError};
pub use topic_config::{TopicConfig, TopicConfigBuilder, TopicConfigBuilderError};
