//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Server-side table of live subscriptions.

use crate::protocol::RequestId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// The registry's handle on one running subscription.
///
/// Cancelling, or simply dropping, the handle fires the paired
/// [`StopSignal`].
#[derive(Debug)]
pub struct ActiveSubscription {
    stop: oneshot::Sender<()>,
    token: u64,
}

/// Fires when the subscription should stop emitting.
///
/// Also identifies its registration, so a task can only remove its own
/// entry even after the peer reuses the request ID.
#[derive(Debug)]
pub struct StopSignal {
    rx: oneshot::Receiver<()>,
    token: u64,
}

impl ActiveSubscription {
    /// Creates a handle and its paired stop signal.
    #[must_use]
    pub fn new() -> (Self, StopSignal) {
        let (tx, rx) = oneshot::channel();
        let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        (Self { stop: tx, token }, StopSignal { rx, token })
    }

    /// Fires the stop signal.
    pub fn cancel(self) {
        let _ = self.stop.send(());
    }
}

impl StopSignal {
    /// Returns `true` if the stop signal has fired.
    pub fn is_stopped(&mut self) -> bool {
        !matches!(self.rx.try_recv(), Err(TryRecvError::Empty))
    }

    /// Waits for the stop signal.
    pub async fn stopped(&mut self) {
        let _ = (&mut self.rx).await;
    }
}

/// Live subscriptions of one inbound connection, keyed by request ID.
///
/// The registry lives exactly as long as its connection and is never shared
/// with another one. Every operation is idempotent.
///
/// # Example
///
/// ```rust
/// use portrpc::protocol::RequestId;
/// use portrpc::server::{ActiveSubscription, SubscriptionRegistry};
///
/// let registry = SubscriptionRegistry::new();
/// let id = RequestId::from("1");
/// let (handle, mut stop) = ActiveSubscription::new();
///
/// assert!(registry.register(id.clone(), handle));
/// assert!(registry.cancel(&id));
/// assert!(!registry.cancel(&id));
/// assert!(stop.is_stopped());
/// ```
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    active: Mutex<HashMap<RequestId, ActiveSubscription>>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscription.
    ///
    /// Returns `false`, leaving the existing entry in place, if `id` is
    /// already registered. The rejected handle is dropped, which fires its
    /// stop signal.
    pub fn register(&self, id: RequestId, handle: ActiveSubscription) -> bool {
        match self.active.lock().entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(handle);
                true
            }
        }
    }

    /// Stops and removes the subscription registered under `id`.
    ///
    /// Returns `false` if nothing was registered under `id`.
    pub fn cancel(&self, id: &RequestId) -> bool {
        let handle = self.active.lock().remove(id);
        match handle {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Removes the entry for a subscription that ended on its own.
    ///
    /// Only the registration paired with `stop` is removed. Returns `false`
    /// if `id` is unregistered or now belongs to a newer subscription.
    pub fn remove(&self, id: &RequestId, stop: &StopSignal) -> bool {
        let mut active = self.active.lock();
        match active.get(id) {
            Some(handle) if handle.token == stop.token => {
                active.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Stops and removes every subscription. Returns how many there were.
    pub fn cancel_all(&self) -> usize {
        let handles: Vec<ActiveSubscription> =
            self.active.lock().drain().map(|(_, handle)| handle).collect();
        let count = handles.len();
        for handle in handles {
            handle.cancel();
        }
        count
    }

    /// Returns the number of live subscriptions.
    pub fn len(&self) -> usize {
        self.active.lock().len()
    }

    /// Returns `true` if there are no live subscriptions.
    pub fn is_empty(&self) -> bool {
        self.active.lock().is_empty()
    }

    /// Returns `true` if a subscription is registered under `id`.
    pub fn contains(&self, id: &RequestId) -> bool {
        self.active.lock().contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_rejects_duplicates() {
        let registry = SubscriptionRegistry::new();
        let id = RequestId::from("a");

        let (first, mut first_stop) = ActiveSubscription::new();
        let (second, mut second_stop) = ActiveSubscription::new();
        assert!(registry.register(id.clone(), first));
        assert!(!registry.register(id.clone(), second));

        assert_eq!(registry.len(), 1);
        assert!(!first_stop.is_stopped());
        assert!(second_stop.is_stopped());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        assert!(!registry.cancel(&RequestId::from("missing")));

        let id = RequestId::from("a");
        let (handle, mut stop) = ActiveSubscription::new();
        registry.register(id.clone(), handle);

        assert!(registry.cancel(&id));
        assert!(!registry.cancel(&id));
        assert!(stop.is_stopped());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_does_not_require_presence() {
        let registry = SubscriptionRegistry::new();
        let id = RequestId::from("a");
        let (handle, stop) = ActiveSubscription::new();
        registry.register(id.clone(), handle);

        assert!(registry.remove(&id, &stop));
        assert!(!registry.remove(&id, &stop));
        assert!(!registry.contains(&id));
    }

    #[test]
    fn test_remove_ignores_reused_id() {
        let registry = SubscriptionRegistry::new();
        let id = RequestId::from("a");

        let (old, mut old_stop) = ActiveSubscription::new();
        registry.register(id.clone(), old);
        assert!(registry.cancel(&id));
        assert!(old_stop.is_stopped());

        let (new, new_stop) = ActiveSubscription::new();
        assert!(registry.register(id.clone(), new));

        // The stopped task finishing late must not evict its successor.
        assert!(!registry.remove(&id, &old_stop));
        assert!(registry.contains(&id));
        assert!(registry.remove(&id, &new_stop));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let registry = SubscriptionRegistry::new();
        let mut stops = Vec::new();
        for i in 0..5 {
            let (handle, stop) = ActiveSubscription::new();
            registry.register(RequestId::from(i.to_string()), handle);
            stops.push(stop);
        }

        assert_eq!(registry.cancel_all(), 5);
        assert_eq!(registry.len(), 0);
        assert_eq!(registry.cancel_all(), 0);

        for stop in &mut stops {
            stop.stopped().await;
        }
    }
}
