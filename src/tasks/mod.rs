//! Background tasks module
//! 
//! This module contains background tasks that run alongside the HTTP server.

pub mod remote_mirror;
pub mod session_clock;

// Re-export main functions
pub use remote_mirror::remote_mirror_task;
pub use session_clock::session_clock_task;
