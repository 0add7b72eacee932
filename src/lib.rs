// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![warn(missing_docs)]

//! Concurrency-safe pooled MQTT client runtime.
//!
//! Multiple interchangeable connections to one or more MQTT brokers are held in named
//! [`pool::Pool`]s, each connection driven by its own single-threaded [`client_proxy`] command
//! loop. A stateless [`facade::Client`] multiplexes publish/subscribe calls across pools by name,
//! applying topic transformations (shared groups, queue groups, multi-subscription fan-out) via
//! [`listeners`], validating every input via [`validator`], and recovering from broker failures
//! with the retry/circuit-breaker policy in [`error_handler`].

pub mod client_id_provider;
pub mod client_proxy;
pub mod config;
pub mod connection;
pub mod control_packet;
pub mod error;
pub mod error_handler;
pub mod event_bus;
pub mod facade;
pub mod interface;
pub mod listeners;
pub mod metrics;
pub mod pool;
pub mod rumqttc_adapter;
pub mod topic;
pub mod validator;

#[cfg(test)]
pub(crate) mod interface_mocks;

#[macro_use]
extern crate derive_builder;

//----------------------------------------------------------------------

/// Include the README doc on a struct when running doctests to validate that the code in the
/// README can compile to verify that it has not rotted.
/// Note that any code that requires network or environment setup will not be able to run,
/// and thus should be annotated by "no_run" in the README.
#[doc = include_str!("../README.md")]
#[cfg(doctest)]
struct ReadmeDoctests;
