//! State delivery to remote observers
//!
//! Three transports share one contract. Pull-over-HTTP reads the live store
//! on every GET, so publishing is implicit. Push-over-socket broadcasts each
//! committed mutation (see [`push`]). The GitHub object store keeps a
//! versioned JSON blob that observers poll and accept only when its version
//! moved forward (see [`github`]).

pub mod github;
pub mod http_pull;
pub mod push;
pub mod retry;

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
    error::TimerResult,
    state::{TimerRecord, TimerSnapshot},
};

pub use github::{GithubConfig, GithubStore};
pub use http_pull::HttpTimerClient;
pub use push::{PushMessage, TimerUpdate};
pub use retry::RetryPolicy;

/// A record fetched from a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteState {
    pub record: TimerRecord,
    /// The server's clock when it produced the record, when the transport
    /// reports one. Observers use it to correct for local clock offset.
    pub server_time: Option<DateTime<Utc>>,
}

/// A state returned by the server, e.g. in reply to an admin action.
impl From<TimerSnapshot> for RemoteState {
    fn from(snapshot: TimerSnapshot) -> Self {
        Self {
            server_time: Some(snapshot.server_time),
            record: snapshot.record,
        }
    }
}

/// Read side of a transport.
pub trait StateSource {
    /// Fetch the latest visible record. `Ok(None)` means nothing newer than
    /// what this source already delivered.
    fn fetch(&self) -> impl Future<Output = TimerResult<Option<RemoteState>>> + Send;

    fn describe(&self) -> String;
}

/// Write side of a transport.
pub trait StatePublisher {
    /// Make `record` visible to observers, returning what was stored.
    fn publish(
        &self,
        record: &TimerRecord,
        action: &str,
    ) -> impl Future<Output = TimerResult<TimerRecord>> + Send;
}
