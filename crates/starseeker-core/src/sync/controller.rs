//! Stale-while-revalidate synchronization of the gate catalog.
//!
//! `GateSync` is the session's single owner of the in-memory gate list.
//! Background work (catalog fetches, connectivity changes) never touches that
//! state directly: fetch tasks report through a channel and the owner applies
//! results with `next_event` / `process_pending`, the same way a UI loop
//! drains finished background tasks between frames.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::{ApiError, CatalogSource};
use crate::cache::{CacheManager, DEFAULT_TTL};
use crate::models::{CatalogSnapshot, Gate};

use super::connectivity::{ConnectivityMonitor, Subscription};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background result channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Prefix for the user-facing error text.
const LOAD_ERROR_PREFIX: &str = "Failed to load gates";

// ============================================================================
// State
// ============================================================================

/// Where the published gate list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing usable yet (or after a reset).
    Empty,
    /// Serving a cached snapshot older than the TTL while a refresh is pending.
    ServingStale { captured_at: DateTime<Utc> },
    /// Serving a snapshot that was within the TTL when published.
    Fresh { captured_at: DateTime<Utc> },
}

impl SyncState {
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        match self {
            SyncState::Empty => None,
            SyncState::ServingStale { captured_at } | SyncState::Fresh { captured_at } => {
                Some(*captured_at)
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SyncState::Empty => "empty",
            SyncState::ServingStale { .. } => "stale",
            SyncState::Fresh { .. } => "fresh",
        }
    }
}

/// What applying one event did, for callers that report progress.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncUpdate {
    /// A fetched catalog replaced the published one.
    Updated { count: usize },
    /// A fetch finished after a newer one had already been applied.
    Superseded,
    /// A fetch failed. Published gates are untouched.
    Failed { error: String },
    /// Online. `refreshing` is true if this was a reconnection that issued a fetch.
    Online { refreshing: bool },
    Offline,
}

/// Message from background work to the owning task.
enum SyncEvent {
    Fetched {
        seq: u64,
        result: Result<CatalogSnapshot, ApiError>,
    },
}

/// Session-scoped synchronization controller.
///
/// Construct once per session, call `start`, then keep draining events.
/// Dropping it (or calling `stop`) releases the connectivity subscription.
pub struct GateSync {
    cache: CacheManager,
    source: Arc<dyn CatalogSource>,
    ttl: Duration,

    state: SyncState,
    snapshot: Option<CatalogSnapshot>,
    loading: bool,
    last_error: Option<String>,

    // Background task channel
    events_tx: mpsc::Sender<SyncEvent>,
    events_rx: mpsc::Receiver<SyncEvent>,
    in_flight: usize,

    // Fetch ordering: results older than the last applied one are dropped
    next_seq: u64,
    applied_seq: u64,

    connectivity: Option<Subscription>,
    was_online: Option<bool>,
    started: bool,
}

impl GateSync {
    pub fn new(cache: CacheManager, source: Arc<dyn CatalogSource>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        Self {
            cache,
            source,
            ttl: DEFAULT_TTL,
            state: SyncState::Empty,
            snapshot: None,
            loading: true,
            last_error: None,
            events_tx,
            events_rx,
            in_flight: 0,
            next_seq: 0,
            applied_seq: 0,
            connectivity: None,
            was_online: None,
            started: false,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    // =========================================================================
    // Consumer view
    // =========================================================================

    /// Latest published gates; empty before the first successful load.
    pub fn gates(&self) -> &[Gate] {
        self.snapshot
            .as_ref()
            .map(|s| s.gates.as_slice())
            .unwrap_or(&[])
    }

    pub fn snapshot(&self) -> Option<&CatalogSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn gate(&self, code: &str) -> Option<&Gate> {
        self.gates().iter().find(|g| g.code == code)
    }

    /// True until the session has obtained usable data from cache or network,
    /// or the first network attempt has failed.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether the published snapshot is older than the TTL right now.
    pub fn is_stale(&self) -> bool {
        match &self.snapshot {
            Some(snapshot) => !snapshot.is_fresh_at(Utc::now(), self.ttl),
            None => true,
        }
    }

    /// Fetches spawned in the background whose results have not been applied.
    pub fn pending_fetches(&self) -> usize {
        self.in_flight
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Initial load, run once per session.
    ///
    /// Any cached snapshot, however old, is published immediately and a
    /// refresh is fetched in the background. Without a cache the fetch is
    /// awaited here.
    pub async fn start(&mut self, monitor: &dyn ConnectivityMonitor) {
        if self.started {
            warn!("Gate sync already started, ignoring");
            return;
        }
        self.started = true;
        self.connectivity = Some(monitor.subscribe());

        let record = self.cache.load().await;
        match record.snapshot {
            Some(snapshot) => {
                let fresh = snapshot.is_fresh_at(Utc::now(), self.ttl);
                info!(
                    count = snapshot.len(),
                    fresh = fresh,
                    "Serving cached gates, refreshing in background"
                );
                self.state = if fresh {
                    SyncState::Fresh {
                        captured_at: snapshot.captured_at,
                    }
                } else {
                    SyncState::ServingStale {
                        captured_at: snapshot.captured_at,
                    }
                };
                self.snapshot = Some(snapshot);
                self.loading = false;
                self.spawn_fetch();
            }
            None => {
                info!("No cached gates, fetching");
                let seq = self.issue_seq();
                let result = self.source.fetch_catalog().await.map(CatalogSnapshot::new);
                self.apply_fetch(seq, result).await;
                self.loading = false;
            }
        }
    }

    /// Release the connectivity subscription. Fetches already in flight are
    /// not aborted; their results are simply never applied.
    pub fn stop(&mut self) {
        if self.connectivity.take().is_some() {
            debug!("Gate sync stopped, connectivity subscription released");
        }
    }

    /// Fetch now regardless of freshness, and apply the result.
    pub async fn refresh(&mut self) -> SyncUpdate {
        info!("Refreshing gates");
        let seq = self.issue_seq();
        let result = self.source.fetch_catalog().await.map(CatalogSnapshot::new);
        self.apply_fetch(seq, result).await
    }

    /// Clear the durable cache and the published view (logout/reset).
    pub async fn reset(&mut self) {
        self.cache.clear().await;
        self.snapshot = None;
        self.state = SyncState::Empty;
        self.last_error = None;
        self.loading = false;
        // Anything still in flight was issued before the reset
        self.applied_seq = self.next_seq;
        info!("Gate sync reset");
    }

    /// Look up a single gate on the service. Not cached and not retried;
    /// an unknown code comes back as `ApiError::NotFound`.
    pub async fn fetch_gate(&self, code: &str) -> Result<Gate, ApiError> {
        self.source.fetch_gate(code).await
    }

    // =========================================================================
    // Background events
    // =========================================================================

    /// Wait for the next background event and apply it.
    ///
    /// Returns `None` once nothing can arrive any more: the connectivity
    /// subscription is released (or its monitor is gone) and no background
    /// fetch is outstanding.
    pub async fn next_event(&mut self) -> Option<SyncUpdate> {
        enum Next {
            Connectivity(Option<bool>),
            Event(SyncEvent),
        }

        loop {
            if self.connectivity.is_none() && self.in_flight == 0 {
                return None;
            }

            let next = {
                let events_rx = &mut self.events_rx;
                let connectivity = &mut self.connectivity;
                tokio::select! {
                    biased;
                    online = next_connectivity(connectivity) => Next::Connectivity(online),
                    Some(event) = events_rx.recv() => Next::Event(event),
                }
            };

            match next {
                Next::Connectivity(Some(online)) => return Some(self.on_connectivity(online)),
                Next::Connectivity(None) => {
                    debug!("Connectivity monitor closed");
                    self.connectivity = None;
                }
                Next::Event(event) => return Some(self.handle_event(event).await),
            }
        }
    }

    /// Apply everything that has already arrived, without waiting.
    pub async fn process_pending(&mut self) -> Vec<SyncUpdate> {
        let mut updates = Vec::new();

        while let Some(online) = self.connectivity.as_mut().and_then(Subscription::try_next) {
            updates.push(self.on_connectivity(online));
        }

        // Collect first so handling can borrow self mutably
        let mut events = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            events.push(event);
        }
        for event in events {
            updates.push(self.handle_event(event).await);
        }

        updates
    }

    async fn handle_event(&mut self, event: SyncEvent) -> SyncUpdate {
        match event {
            SyncEvent::Fetched { seq, result } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.apply_fetch(seq, result).await
            }
        }
    }

    /// Only an offline -> online edge issues a fetch.
    fn on_connectivity(&mut self, online: bool) -> SyncUpdate {
        let reconnected = online && self.was_online == Some(false);
        self.was_online = Some(online);

        if reconnected {
            info!("Network reconnected - refreshing gates");
            self.spawn_fetch();
            SyncUpdate::Online { refreshing: true }
        } else if online {
            SyncUpdate::Online { refreshing: false }
        } else {
            debug!("Network offline");
            SyncUpdate::Offline
        }
    }

    fn issue_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn spawn_fetch(&mut self) {
        let seq = self.issue_seq();
        let source = Arc::clone(&self.source);
        let tx = self.events_tx.clone();
        self.in_flight += 1;

        tokio::spawn(async move {
            let result = source.fetch_catalog().await.map(CatalogSnapshot::new);
            if tx.send(SyncEvent::Fetched { seq, result }).await.is_err() {
                debug!(seq = seq, "Gate sync gone, dropping fetch result");
            }
        });
    }

    async fn apply_fetch(
        &mut self,
        seq: u64,
        result: Result<CatalogSnapshot, ApiError>,
    ) -> SyncUpdate {
        if seq <= self.applied_seq {
            debug!(
                seq = seq,
                applied = self.applied_seq,
                "Discarding superseded fetch result"
            );
            return SyncUpdate::Superseded;
        }

        match result {
            Ok(snapshot) => {
                self.applied_seq = seq;
                let count = snapshot.len();
                self.state = SyncState::Fresh {
                    captured_at: snapshot.captured_at,
                };
                self.last_error = None;
                self.loading = false;
                self.cache.save(&snapshot).await;
                self.snapshot = Some(snapshot);
                info!(count = count, "Gate catalog updated");
                SyncUpdate::Updated { count }
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch gate catalog");
                let error = format!("{}: {}", LOAD_ERROR_PREFIX, e);
                self.last_error = Some(error.clone());
                SyncUpdate::Failed { error }
            }
        }
    }
}

impl Drop for GateSync {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn next_connectivity(connectivity: &mut Option<Subscription>) -> Option<bool> {
    match connectivity {
        Some(sub) => sub.next().await,
        None => std::future::pending().await,
    }
}

// ============================================================================
// Tests
// ============================================================================
