//! Connectivity monitoring.
//!
//! A `ConnectivityMonitor` hands out `Subscription`s: streams of online/offline
//! values that start with the current state and then yield every observed
//! transition. Dropping a subscription unsubscribes it.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::channel::mpsc::{self, UnboundedSender};
use futures::stream::{BoxStream, Stream, StreamExt};
use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::ApiClient;

/// Source of online/offline transitions.
pub trait ConnectivityMonitor: Send + Sync {
    fn subscribe(&self) -> Subscription;
}

/// A live connectivity subscription. Unsubscribes on drop.
pub struct Subscription {
    stream: BoxStream<'static, bool>,
}

impl Subscription {
    pub fn new(stream: impl Stream<Item = bool> + Send + 'static) -> Self {
        Self {
            stream: stream.boxed(),
        }
    }

    /// Wait for the next observed value. `None` once the monitor is gone.
    pub async fn next(&mut self) -> Option<bool> {
        self.stream.next().await
    }

    /// Next value if one is already queued.
    pub fn try_next(&mut self) -> Option<bool> {
        self.stream.next().now_or_never().flatten()
    }
}

struct HubState {
    online: bool,
    subscribers: Vec<UnboundedSender<bool>>,
}

/// In-process connectivity monitor. Whoever observes the network (a probe
/// task, a platform callback, a test) calls `set_online`; every subscriber
/// receives the change.
pub struct ConnectivityHub {
    state: Mutex<HubState>,
}

impl ConnectivityHub {
    pub fn new(initially_online: bool) -> Self {
        Self {
            state: Mutex::new(HubState {
                online: initially_online,
                subscribers: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        // A panicking subscriber cannot leave HubState half-updated
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_online(&self) -> bool {
        self.lock().online
    }

    /// Record the current state. Subscribers are only notified on a change.
    /// Returns whether the state changed.
    pub fn set_online(&self, online: bool) -> bool {
        let mut state = self.lock();
        if state.online == online {
            return false;
        }
        state.online = online;
        state
            .subscribers
            .retain(|tx| tx.unbounded_send(online).is_ok());
        debug!(online = online, subscribers = state.subscribers.len(), "Connectivity changed");
        true
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.lock();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }
}

impl ConnectivityMonitor for ConnectivityHub {
    fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded();
        let mut state = self.lock();
        // The initial state is delivered like any other observation
        if tx.unbounded_send(state.online).is_ok() {
            state.subscribers.push(tx);
        }
        Subscription::new(rx)
    }
}

/// Poll the service every `interval` and publish reachability into `hub`.
///
/// The task runs until aborted through the returned handle.
pub fn spawn_probe(
    hub: Arc<ConnectivityHub>,
    client: ApiClient,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let online = client.ping().await;
            if hub.set_online(online) {
                info!(online = online, "Connectivity probe observed a transition");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_delivers_initial_state() {
        let hub = ConnectivityHub::new(false);
        let mut sub = hub.subscribe();
        assert_eq!(sub.next().await, Some(false));
        assert_eq!(sub.try_next(), None);
    }

    #[tokio::test]
    async fn test_only_transitions_are_published() {
        let hub = ConnectivityHub::new(true);
        let mut sub = hub.subscribe();
        assert_eq!(sub.try_next(), Some(true));

        assert!(!hub.set_online(true));
        assert_eq!(sub.try_next(), None);

        assert!(hub.set_online(false));
        assert!(hub.set_online(true));
        assert_eq!(sub.next().await, Some(false));
        assert_eq!(sub.next().await, Some(true));
        assert!(hub.is_online());
    }

    #[test]
    fn test_dropped_subscription_unsubscribes() {
        let hub = ConnectivityHub::new(true);
        let first = hub.subscribe();
        let second = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        drop(first);
        assert_eq!(hub.subscriber_count(), 1);

        drop(second);
        hub.set_online(false);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
