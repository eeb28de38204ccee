//! Mirror committed mutations into a remote object store

use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::{
    error::TimerError,
    state::AppState,
    sync::{RetryPolicy, StatePublisher},
};

/// Background task that publishes every committed record to `publisher`.
///
/// Transient failures are retried with backoff and then dropped; the next
/// mutation publishes a complete record anyway. Credential failures are
/// reported and never retried.
pub async fn remote_mirror_task<P>(state: Arc<AppState>, publisher: P, retry: RetryPolicy)
where
    P: StatePublisher,
{
    info!("Starting remote mirror task");

    let mut updates = state.store.subscribe();

    loop {
        let update = match updates.recv().await {
            Ok(update) => update,
            Err(RecvError::Lagged(skipped)) => {
                // Only the newest record matters; the next recv yields it.
                warn!("Remote mirror skipped {} intermediate updates", skipped);
                continue;
            }
            Err(RecvError::Closed) => {
                info!("Timer store closed, stopping remote mirror");
                break;
            }
        };

        let record = update.state.record;
        let result = retry
            .run("remote publish", || publisher.publish(&record, &update.action))
            .await;

        match result {
            Ok(stored) => info!("Mirrored {} as v{}", update.action, stored.version),
            Err(TimerError::Authorization(reason)) => {
                error!("Remote mirror write rejected: {}", reason);
            }
            Err(e) => error!("Remote mirror gave up on v{}: {}", record.version, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::TimerResult,
        persistence::Persistence,
        state::{Action, TimerCommand, TimerRecord, TimerStore},
    };
    use chrono::Utc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct ChannelPublisher {
        sent: mpsc::UnboundedSender<(u64, String)>,
    }

    impl StatePublisher for ChannelPublisher {
        async fn publish(&self, record: &TimerRecord, action: &str) -> TimerResult<TimerRecord> {
            let _ = self.sent.send((record.version, action.to_string()));
            Ok(record.clone())
        }
    }

    #[tokio::test]
    async fn mirrors_each_commit() {
        let store = TimerStore::with_record(TimerRecord::new(60_000, 30_000), Persistence::Memory);
        let state = Arc::new(AppState::new(store, 0, "127.0.0.1".to_string(), None));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mirror = tokio::spawn(remote_mirror_task(
            Arc::clone(&state),
            ChannelPublisher { sent: tx },
            RetryPolicy::default(),
        ));
        // Let the task subscribe before committing.
        tokio::time::sleep(Duration::from_millis(20)).await;

        state.store.apply(&TimerCommand::new(Action::Start), Utc::now()).await.unwrap();
        state.store.apply(&TimerCommand::new(Action::Pause), Utc::now()).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), (1, "start".to_string()));
        assert_eq!(rx.recv().await.unwrap(), (2, "pause".to_string()));
        mirror.abort();
    }
}
