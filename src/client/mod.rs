//! Observer side of the timer
//!
//! A [`ClientReconciler`] caches the last fetched record, interpolates the
//! display locally between fetches, and picks its polling cadence from the
//! [`SyncSchedule`] table. [`run_observer`] wires it to a transport.

pub mod observer;
pub mod reconciler;
pub mod schedule;

pub use observer::{run_observer, sync_once};
pub use reconciler::{ClientReconciler, ConnectionStatus, SyncStats, Transition};
pub use schedule::{Cadence, SyncSchedule, Visibility};
