// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Synthesizes client identifiers for connections that don't have one explicitly configured.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use rand::Rng;

/// Generates client IDs of the form `{prefix}{counter}-{random suffix}`, so that concurrent
/// `reconnect()` calls within the same pool never collide, even without coordinating on a
/// shared lock.
pub struct ClientIdProvider {
    counter: AtomicU64,
}

impl Default for ClientIdProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientIdProvider {
    /// Construct a fresh provider, with its counter starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// The process-wide provider used by [`crate::rumqttc_adapter::client`] when a
    /// [`crate::config::ClientConfig`] has no explicit `client_id`.
    pub(crate) fn shared() -> &'static Self {
        static SHARED: OnceLock<ClientIdProvider> = OnceLock::new();
        SHARED.get_or_init(ClientIdProvider::new)
    }

    /// Generate the next client ID for `prefix`.
    #[must_use]
    pub fn next_id(&self, prefix: &str) -> String {
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        let suffix: u32 = rand::thread_rng().gen_range(0..0x10000);
        format!("{prefix}{counter}-{suffix:04x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successive_ids_never_collide() {
        let provider = ClientIdProvider::new();
        let mut ids = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(ids.insert(provider.next_id("worker-")));
        }
    }

    #[test]
    fn id_carries_the_requested_prefix() {
        let provider = ClientIdProvider::new();
        assert!(provider.next_id("worker-").starts_with("worker-"));
    }
}
