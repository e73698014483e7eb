//! Embedding calls in progress, keyed by content hash.
//!
//! The first caller to miss the cache for a text owns its provider call;
//! concurrent callers for the same text wait on the owner's result instead of
//! calling the provider again.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use futures::future::{FutureExt, Shared};
use tokio::sync::oneshot;

use super::cache::EmbeddingCache;
use crate::types::EmbeddingFailure;

pub(crate) type EmbedResult = std::result::Result<Vec<f32>, EmbeddingFailure>;

/// Resolves to `Err` if the owning call was dropped before it finished.
pub(crate) type Pending = Shared<oneshot::Receiver<EmbedResult>>;

pub(crate) enum Claim {
    Cached(Vec<f32>),
    Wait(Pending),
    Owned,
}

#[derive(Default)]
pub(crate) struct InFlight {
    calls: Mutex<HashMap<String, Pending>>,
}

impl InFlight {
    pub fn claims(&self) -> Claims<'_> {
        Claims {
            registry: self,
            senders: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// The texts one caller owns. Dropping it releases unfinished claims.
pub(crate) struct Claims<'a> {
    registry: &'a InFlight,
    senders: HashMap<String, oneshot::Sender<EmbedResult>>,
}

impl Claims<'_> {
    /// Cached vector, someone else's pending call, or ownership of a new call.
    pub fn claim(&mut self, key: &str, cache: &EmbeddingCache) -> Claim {
        let mut calls = self
            .registry
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Owners fill the cache before leaving the registry, so checking both
        // under the registry lock cannot miss a finished call
        if let Some(vector) = cache.get(key) {
            return Claim::Cached(vector);
        }
        if let Some(pending) = calls.get(key) {
            return Claim::Wait(pending.clone());
        }

        let (sender, receiver) = oneshot::channel();
        calls.insert(key.to_string(), receiver.shared());
        self.senders.insert(key.to_string(), sender);
        Claim::Owned
    }

    /// Cache a successful vector, then wake the waiters.
    pub fn complete(&mut self, key: &str, result: EmbedResult, cache: &EmbeddingCache) {
        if let Ok(vector) = &result {
            cache.insert(key.to_string(), vector.clone());
        }
        if let Some(sender) = self.senders.remove(key) {
            self.registry
                .calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(key);
            let _ = sender.send(result);
        }
    }
}

impl Drop for Claims<'_> {
    fn drop(&mut self) {
        if self.senders.is_empty() {
            return;
        }
        let mut calls = self
            .registry
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for key in self.senders.keys() {
            calls.remove(key);
        }
    }
}
