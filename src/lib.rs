//! Session Timer - A shared countdown timer served over HTTP and WebSocket
//!
//! One server owns a dual-clock timer (total time plus the current session).
//! Admins drive it with actions, observers poll it, receive pushes, or read a
//! mirrored copy from a GitHub repository.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod persistence;
pub mod state;
pub mod sync;
pub mod tasks;
pub mod utils;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use api::create_router;
pub use config::Config;
pub use error::{TimerError, TimerResult};
pub use state::{AppState, TimerRecord, TimerStore};
pub use utils::signals::shutdown_signal;
