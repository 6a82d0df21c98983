//! Synchronization of the gate catalog between the service, the local cache
//! and the in-memory view.
//!
//! - `GateSync`: stale-while-revalidate loading and connectivity-triggered refresh
//! - `ConnectivityHub`: in-process connectivity monitor, fed by `spawn_probe`

pub mod connectivity;
pub mod controller;

pub use connectivity::{spawn_probe, ConnectivityHub, ConnectivityMonitor, Subscription};
pub use controller::{GateSync, SyncState, SyncUpdate};
