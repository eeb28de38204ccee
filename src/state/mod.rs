//! State management module
//!
//! This module contains the timer record, its pure transitions, the store
//! that owns it, and the shared application state.

pub mod app_state;
pub mod command;
pub mod store;
pub mod time_basis;
pub mod timer_record;

// Re-export main types
pub use app_state::AppState;
pub use command::{Action, TimerCommand};
pub use store::{ApplyOutcome, TimerStore};
pub use timer_record::{Applied, RunState, SettleEvent, TimerRecord, TimerSnapshot};
