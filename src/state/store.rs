//! The single shared timer store

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use super::{
    command::TimerCommand,
    timer_record::{SettleEvent, TimerRecord, TimerSnapshot},
};
use crate::{error::TimerResult, persistence::Persistence, sync::push::TimerUpdate};

const UPDATE_CHANNEL_CAPACITY: usize = 100;

/// Outcome of an admin command.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub snapshot: TimerSnapshot,
    pub changed: bool,
}

/// Holds the canonical record, persists every committed change and
/// broadcasts it to push subscribers.
///
/// The record lock is held across persistence I/O, so commands and reads are
/// serialized; there is one writer at a time.
#[derive(Debug)]
pub struct TimerStore {
    record: Mutex<TimerRecord>,
    persistence: Persistence,
    updates: broadcast::Sender<TimerUpdate>,
}

impl TimerStore {
    /// Open the store, loading any persisted record. Load failures fall back
    /// to a fresh record with the default durations.
    pub async fn open(total_duration: u64, session_duration: u64, persistence: Persistence) -> Self {
        let record = match persistence.load().await {
            Ok(Some(record)) => {
                info!("Restored timer record v{} from {}", record.version, persistence.describe());
                record
            }
            Ok(None) => TimerRecord::new(total_duration, session_duration),
            Err(e) => {
                warn!("{}; starting from defaults", e);
                TimerRecord::new(total_duration, session_duration)
            }
        };
        Self::with_record(record, persistence)
    }

    pub fn with_record(record: TimerRecord, persistence: Persistence) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            record: Mutex::new(record),
            persistence,
            updates,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerUpdate> {
        self.updates.subscribe()
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    /// Apply an admin command at `now`.
    ///
    /// Due session rollovers and expiry are settled before the command so it
    /// acts on an up-to-date record.
    pub async fn apply(
        &self,
        command: &TimerCommand,
        now: DateTime<Utc>,
    ) -> TimerResult<ApplyOutcome> {
        let mut record = self.record.lock().await;
        self.refresh(&mut record).await;
        self.settle_locked(&mut record, now).await;

        let applied = record.apply(command, now)?;
        if applied.changed {
            *record = applied.record;
            info!(
                "Timer {} committed (v{}, origin={})",
                command.action,
                record.version,
                command.client_id.as_deref().unwrap_or("-")
            );
            self.commit(&record, command.action.as_str(), command.client_id.clone(), now)
                .await;
        } else {
            debug!("Timer {} was a no-op in state {:?}", command.action, record.run_state());
        }

        Ok(ApplyOutcome {
            snapshot: record.snapshot(now),
            changed: applied.changed,
        })
    }

    /// Read the current state.
    ///
    /// Side effect: a read that finds the session clock exhausted starts the
    /// next session, and one that finds the total clock exhausted stops the
    /// timer. Either change is committed like an admin action.
    pub async fn read(&self, now: DateTime<Utc>) -> TimerSnapshot {
        let mut record = self.record.lock().await;
        self.refresh(&mut record).await;
        self.settle_locked(&mut record, now).await;
        record.snapshot(now)
    }

    /// Run session rollover and expiry checks without producing a snapshot.
    pub async fn settle(&self, now: DateTime<Utc>) -> Option<SettleEvent> {
        let mut record = self.record.lock().await;
        self.refresh(&mut record).await;
        self.settle_locked(&mut record, now).await
    }

    async fn settle_locked(&self, record: &mut TimerRecord, now: DateTime<Utc>) -> Option<SettleEvent> {
        let (next, event) = record.settle(now)?;
        *record = next;
        match event {
            SettleEvent::SessionAdvanced => info!("Session ran out, next session started (v{})", record.version),
            SettleEvent::Expired => info!("Total time ran out, timer stopped (v{})", record.version),
        }
        self.commit(record, event.as_str(), None, now).await;
        Some(event)
    }

    /// Re-read durable storage so external writers are observed.
    ///
    /// A stored copy older than the in-memory record is left over from a
    /// failed save; it is overwritten instead of loaded, so `version` never
    /// moves backwards.
    async fn refresh(&self, record: &mut TimerRecord) {
        if !self.persistence.is_durable() {
            return;
        }
        match self.persistence.load().await {
            Ok(Some(stored)) if stored.version >= record.version => *record = stored,
            Ok(stored) => {
                let stored_version = stored.map_or(0, |stored| stored.version);
                if record.version > stored_version {
                    debug!("Stored v{} is behind v{}, saving again", stored_version, record.version);
                    if let Err(e) = self.persistence.save(record).await {
                        warn!("{}; change kept in memory only", e);
                    }
                }
            }
            Err(e) => warn!("{}; serving in-memory state", e),
        }
    }

    async fn commit(
        &self,
        record: &TimerRecord,
        action: &str,
        origin: Option<String>,
        now: DateTime<Utc>,
    ) {
        if let Err(e) = self.persistence.save(record).await {
            warn!("{}; change kept in memory only", e);
        }
        // No subscribers is fine; the send only fails when nobody listens.
        let _ = self
            .updates
            .send(TimerUpdate::new(action, record.snapshot(now), origin));
    }
}
