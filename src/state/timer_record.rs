//! The canonical timer record and its pure transition function

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    command::{Action, TimerCommand},
    time_basis::{self, ClockReading},
};
use crate::error::{TimerError, TimerResult};

/// Which of the three mutually exclusive states the timer is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunState {
    Stopped,
    Running,
    Paused,
}

/// Durable timer state. Durations are milliseconds, instants serialize as
/// epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerRecord {
    pub is_running: bool,
    pub is_paused: bool,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub paused_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub accumulated_pause: u64,
    pub total_duration: u64,
    pub session_duration: u64,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub session_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub session_accumulated_pause: u64,
    /// Set when the total clock ran out; remaining values then read as zero.
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub last_action: Option<String>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_update: Option<DateTime<Utc>>,
}

/// A record plus the values derived from it at `server_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    #[serde(flatten)]
    pub record: TimerRecord,
    pub remaining_total: u64,
    pub remaining_session: u64,
    /// Elapsed time on the total clock.
    pub current_time: u64,
    pub session_elapsed: u64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub server_time: DateTime<Utc>,
}

/// Changes a read can discover without any admin action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleEvent {
    /// The session clock ran out while the total clock still had time.
    SessionAdvanced,
    /// The total clock ran out and the timer stopped itself.
    Expired,
}

impl SettleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettleEvent::SessionAdvanced => "autoNextSession",
            SettleEvent::Expired => "timeout",
        }
    }
}

/// Result of applying a command to a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub record: TimerRecord,
    /// False for no-op actions; the version is untouched in that case.
    pub changed: bool,
}

impl TimerRecord {
    /// A stopped record with the given durations.
    pub fn new(total_duration: u64, session_duration: u64) -> Self {
        Self {
            is_running: false,
            is_paused: false,
            started_at: None,
            paused_at: None,
            accumulated_pause: 0,
            total_duration,
            session_duration,
            session_started_at: None,
            session_accumulated_pause: 0,
            is_complete: false,
            version: 0,
            last_action: None,
            last_update: None,
        }
    }

    pub fn run_state(&self) -> RunState {
        match (self.is_running, self.is_paused) {
            (true, true) => RunState::Paused,
            (true, false) => RunState::Running,
            _ => RunState::Stopped,
        }
    }

    /// The instant the clocks are frozen at, or `now` while ticking.
    fn measured_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match (self.run_state(), self.paused_at) {
            (RunState::Paused, Some(paused_at)) => paused_at,
            _ => now,
        }
    }

    pub fn total_clock(&self, now: DateTime<Utc>) -> ClockReading {
        self.clock(now, self.started_at, self.accumulated_pause, self.total_duration)
    }

    pub fn session_clock(&self, now: DateTime<Utc>) -> ClockReading {
        self.clock(
            now,
            self.session_started_at.or(self.started_at),
            self.session_accumulated_pause,
            self.session_duration,
        )
    }

    fn clock(
        &self,
        now: DateTime<Utc>,
        started_at: Option<DateTime<Utc>>,
        accumulated_pause: u64,
        duration: u64,
    ) -> ClockReading {
        if self.is_complete {
            return ClockReading { elapsed: duration, remaining: 0 };
        }
        match (self.run_state(), started_at) {
            (RunState::Stopped, _) | (_, None) => ClockReading { elapsed: 0, remaining: duration },
            (_, Some(started_at)) => {
                time_basis::measure(self.measured_at(now), started_at, accumulated_pause, duration)
            }
        }
    }

    /// Derive the display values at `now` without changing anything.
    pub fn snapshot(&self, now: DateTime<Utc>) -> TimerSnapshot {
        let total = self.total_clock(now);
        let session = self.session_clock(now);
        TimerSnapshot {
            record: self.clone(),
            remaining_total: total.remaining,
            remaining_session: session.remaining,
            current_time: total.elapsed,
            session_elapsed: session.elapsed,
            server_time: now,
        }
    }

    /// Apply an admin command at `now`.
    ///
    /// Successful state changes bump `version` by one; no-op actions return
    /// the record unchanged. Rejected commands leave the caller's record as it
    /// was, so the version can never move on an error.
    pub fn apply(&self, command: &TimerCommand, now: DateTime<Utc>) -> TimerResult<Applied> {
        Ok(match self.transition(command, now)? {
            Some(next) => Applied {
                record: self.commit(next, command.action.as_str(), now),
                changed: true,
            },
            None => Applied {
                record: self.clone(),
                changed: false,
            },
        })
    }

    fn transition(&self, command: &TimerCommand, now: DateTime<Utc>) -> TimerResult<Option<Self>> {
        let state = self.run_state();
        let next = match command.action {
            Action::Start => match state {
                RunState::Stopped => Some(self.started(command, now)),
                RunState::Paused => Some(self.resumed(now)),
                RunState::Running => None,
            },
            Action::Pause => (state == RunState::Running).then(|| Self {
                is_paused: true,
                paused_at: Some(now),
                ..self.clone()
            }),
            Action::Reset => Some(Self::new(
                command.total_duration_ms().unwrap_or(self.total_duration),
                command.session_duration_ms().unwrap_or(self.session_duration),
            )),
            Action::NextSession => self.next_session(now),
            Action::SetTime => self.with_time(command)?,
            Action::Stop => (state != RunState::Stopped || self.is_complete)
                .then(|| Self::new(self.total_duration, self.session_duration)),
        };
        Ok(next)
    }

    fn started(&self, command: &TimerCommand, now: DateTime<Utc>) -> Self {
        Self {
            is_running: true,
            started_at: Some(now),
            session_started_at: Some(now),
            ..Self::new(
                command.total_duration_ms().unwrap_or(self.total_duration),
                command.session_duration_ms().unwrap_or(self.session_duration),
            )
        }
    }

    fn resumed(&self, now: DateTime<Utc>) -> Self {
        let gap = self
            .paused_at
            .map(|paused_at| time_basis::pause_length_ms(now, paused_at))
            .unwrap_or(0);
        Self {
            is_paused: false,
            paused_at: None,
            accumulated_pause: self.accumulated_pause + gap,
            session_accumulated_pause: self.session_accumulated_pause + gap,
            ..self.clone()
        }
    }

    /// Restart only the session clock. A paused timer's new session begins at
    /// the pause instant so the pause gap is not charged against it.
    fn next_session(&self, now: DateTime<Utc>) -> Option<Self> {
        let session_start = match self.run_state() {
            RunState::Stopped => return None,
            RunState::Running => now,
            RunState::Paused => self.paused_at.unwrap_or(now),
        };
        Some(Self {
            session_started_at: Some(session_start),
            session_accumulated_pause: 0,
            ..self.clone()
        })
    }

    fn with_time(&self, command: &TimerCommand) -> TimerResult<Option<Self>> {
        if self.run_state() != RunState::Stopped {
            return Err(TimerError::Conflict(
                "setTime is only permitted while the timer is stopped".to_string(),
            ));
        }
        if command.total_minutes.is_none() && command.session_minutes.is_none() {
            return Err(TimerError::validation(
                "totalMinutes",
                "setTime requires totalMinutes or sessionMinutes",
            ));
        }
        let next = Self {
            total_duration: command.total_duration_ms().unwrap_or(self.total_duration),
            session_duration: command.session_duration_ms().unwrap_or(self.session_duration),
            is_complete: false,
            ..self.clone()
        };
        Ok((next != *self).then_some(next))
    }

    /// Detect session rollover or total expiry at `now`.
    ///
    /// Returns the record that should replace this one, already committed
    /// with a bumped version, or `None` when nothing is due.
    pub fn settle(&self, now: DateTime<Utc>) -> Option<(Self, SettleEvent)> {
        if self.run_state() == RunState::Stopped {
            return None;
        }

        let (next, event) = if self.total_clock(now).remaining == 0 {
            let expired = Self {
                is_complete: true,
                ..Self::new(self.total_duration, self.session_duration)
            };
            (expired, SettleEvent::Expired)
        } else if self.session_clock(now).remaining == 0 {
            (self.next_session(now)?, SettleEvent::SessionAdvanced)
        } else {
            return None;
        };

        Some((self.commit(next, event.as_str(), now), event))
    }

    fn commit(&self, mut next: Self, action: &str, now: DateTime<Utc>) -> Self {
        next.version = self.version + 1;
        next.last_action = Some(action.to_string());
        next.last_update = Some(now);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const TOTAL: u64 = 1_200_000;
    const SESSION: u64 = 600_000;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
    }

    fn run(record: &TimerRecord, action: Action, ms: i64) -> TimerRecord {
        record.apply(&TimerCommand::new(action), at(ms)).unwrap().record
    }

    fn assert_invariants(record: &TimerRecord) {
        match record.run_state() {
            RunState::Stopped => assert!(record.started_at.is_none()),
            RunState::Paused => assert!(record.paused_at.is_some()),
            RunState::Running => assert!(record.paused_at.is_none()),
        }
        if let (Some(session), Some(start)) = (record.session_started_at, record.started_at) {
            assert!(session >= start);
        }
    }

    #[test]
    fn start_from_stopped_sets_both_clocks() {
        let record = run(&TimerRecord::new(TOTAL, SESSION), Action::Start, 0);
        assert_eq!(record.run_state(), RunState::Running);
        assert_eq!(record.started_at, Some(at(0)));
        assert_eq!(record.session_started_at, Some(at(0)));
        assert_eq!(record.version, 1);
        assert_eq!(record.last_action.as_deref(), Some("start"));
        assert_invariants(&record);
    }

    #[test]
    fn start_overrides_durations() {
        let command = TimerCommand::new(Action::Start).with_minutes(Some(30.0), Some(10.0));
        let record = TimerRecord::new(TOTAL, SESSION).apply(&command, at(0)).unwrap().record;
        assert_eq!(record.total_duration, 1_800_000);
        assert_eq!(record.session_duration, 600_000);
    }

    #[test]
    fn start_while_running_is_noop() {
        let running = run(&TimerRecord::new(TOTAL, SESSION), Action::Start, 0);
        let applied = running.apply(&TimerCommand::new(Action::Start), at(5_000)).unwrap();
        assert!(!applied.changed);
        assert_eq!(applied.record, running);
    }

    #[test]
    fn remaining_decreases_while_running_and_freezes_while_paused() {
        let running = run(&TimerRecord::new(TOTAL, SESSION), Action::Start, 0);
        let early = running.snapshot(at(10_000)).remaining_total;
        let later = running.snapshot(at(20_000)).remaining_total;
        assert!(later < early);

        let paused = run(&running, Action::Pause, 20_000);
        assert_eq!(paused.snapshot(at(25_000)).remaining_total, later);
        assert_eq!(paused.snapshot(at(90_000)).remaining_total, later);
        assert_invariants(&paused);
    }

    #[test]
    fn pause_twice_keeps_first_pause_instant() {
        let running = run(&TimerRecord::new(TOTAL, SESSION), Action::Start, 0);
        let paused = run(&running, Action::Pause, 1_000);
        let applied = paused.apply(&TimerCommand::new(Action::Pause), at(2_000)).unwrap();
        assert!(!applied.changed);
        assert_eq!(applied.record.paused_at, Some(at(1_000)));
        assert_eq!(applied.record.version, paused.version);
    }

    #[test]
    fn resume_after_gap_keeps_remaining() {
        let running = run(&TimerRecord::new(TOTAL, SESSION), Action::Start, 0);
        let paused = run(&running, Action::Pause, 300_000);
        let before = paused.snapshot(at(350_000));

        let resumed = run(&paused, Action::Start, 350_000);
        let after = resumed.snapshot(at(350_000));

        assert!(resumed.accumulated_pause >= 50_000);
        assert_eq!(resumed.session_accumulated_pause, 50_000);
        assert_eq!(after.remaining_total, before.remaining_total);
        assert_eq!(after.remaining_session, before.remaining_session);
        assert_invariants(&resumed);
    }

    #[test]
    fn reset_restores_full_durations() {
        let running = run(&TimerRecord::new(TOTAL, SESSION), Action::Start, 0);
        let command = TimerCommand::new(Action::Reset).with_minutes(Some(45.0), Some(15.0));
        let reset = running.apply(&command, at(100_000)).unwrap().record;
        let snapshot = reset.snapshot(at(100_000));

        assert_eq!(reset.run_state(), RunState::Stopped);
        assert_eq!(snapshot.remaining_total, 45 * 60_000);
        assert_eq!(snapshot.remaining_session, 15 * 60_000);
        assert_eq!(reset.version, running.version + 1);
        assert_invariants(&reset);
    }

    #[test]
    fn next_session_leaves_total_clock_alone() {
        let running = run(&TimerRecord::new(TOTAL, SESSION), Action::Start, 0);
        let next = run(&running, Action::NextSession, 200_000);
        let snapshot = next.snapshot(at(200_000));
        assert_eq!(next.started_at, running.started_at);
        assert_eq!(snapshot.remaining_total, TOTAL - 200_000);
        assert_eq!(snapshot.remaining_session, SESSION);
    }

    #[test]
    fn next_session_while_paused_does_not_charge_pause() {
        let running = run(&TimerRecord::new(TOTAL, SESSION), Action::Start, 0);
        let paused = run(&running, Action::Pause, 100_000);
        let advanced = run(&paused, Action::NextSession, 150_000);
        let resumed = run(&advanced, Action::Start, 200_000);
        assert_eq!(resumed.snapshot(at(200_000)).remaining_session, SESSION);
        assert_eq!(resumed.snapshot(at(210_000)).remaining_session, SESSION - 10_000);
        assert_invariants(&resumed);
    }

    #[test]
    fn next_session_while_stopped_is_noop() {
        let record = TimerRecord::new(TOTAL, SESSION);
        let applied = record.apply(&TimerCommand::new(Action::NextSession), at(0)).unwrap();
        assert!(!applied.changed);
        assert_eq!(applied.record.version, 0);
    }

    #[test]
    fn set_time_requires_stopped() {
        let running = run(&TimerRecord::new(TOTAL, SESSION), Action::Start, 0);
        let command = TimerCommand::new(Action::SetTime).with_minutes(Some(10.0), None);
        let err = running.apply(&command, at(1_000)).unwrap_err();
        assert!(matches!(err, TimerError::Conflict(_)));
    }

    #[test]
    fn set_time_updates_durations_only() {
        let record = TimerRecord::new(TOTAL, SESSION);
        let command = TimerCommand::new(Action::SetTime).with_minutes(None, Some(5.0));
        let applied = record.apply(&command, at(0)).unwrap();
        assert!(applied.changed);
        assert_eq!(applied.record.total_duration, TOTAL);
        assert_eq!(applied.record.session_duration, 300_000);
        assert_eq!(applied.record.run_state(), RunState::Stopped);
    }

    #[test]
    fn stop_discards_progress_and_keeps_durations() {
        let running = run(&TimerRecord::new(TOTAL, SESSION), Action::Start, 0);
        let stopped = run(&running, Action::Stop, 400_000);
        assert_eq!(stopped.total_duration, TOTAL);
        assert_eq!(stopped.snapshot(at(400_000)).remaining_total, TOTAL);
        assert_invariants(&stopped);

        let again = stopped.apply(&TimerCommand::new(Action::Stop), at(500_000)).unwrap();
        assert!(!again.changed);
    }

    #[test]
    fn session_rollover_on_settle() {
        let running = run(&TimerRecord::new(TOTAL, SESSION), Action::Start, 0);
        assert_eq!(running.snapshot(at(700_000)).remaining_session, 0);

        let (advanced, event) = running.settle(at(700_000)).unwrap();
        let snapshot = advanced.snapshot(at(700_000));
        assert_eq!(event, SettleEvent::SessionAdvanced);
        assert_eq!(snapshot.remaining_total, 500_000);
        assert_eq!(snapshot.remaining_session, SESSION);
        assert_eq!(advanced.version, running.version + 1);
        assert!(advanced.settle(at(700_000)).is_none());
    }

    #[test]
    fn expiry_on_settle_stops_timer() {
        let running = run(&TimerRecord::new(TOTAL, SESSION), Action::Start, 0);
        let (expired, event) = running.settle(at(TOTAL as i64 + 5_000)).unwrap();
        let snapshot = expired.snapshot(at(TOTAL as i64 + 5_000));

        assert_eq!(event, SettleEvent::Expired);
        assert!(!expired.is_running);
        assert!(!expired.is_paused);
        assert_eq!(snapshot.remaining_total, 0);
        assert_eq!(snapshot.remaining_session, 0);
        assert_invariants(&expired);

        let restarted = run(&expired, Action::Start, TOTAL as i64 + 10_000);
        assert!(!restarted.is_complete);
        assert_eq!(restarted.snapshot(at(TOTAL as i64 + 10_000)).remaining_total, TOTAL);
    }

    #[test]
    fn settle_is_quiet_mid_session() {
        let running = run(&TimerRecord::new(TOTAL, SESSION), Action::Start, 0);
        assert!(running.settle(at(100_000)).is_none());
        assert!(TimerRecord::new(TOTAL, SESSION).settle(at(100_000)).is_none());
    }

    #[test]
    fn snapshot_json_uses_wire_names() {
        let running = run(&TimerRecord::new(TOTAL, SESSION), Action::Start, 0);
        let json = serde_json::to_value(running.snapshot(at(1_000))).unwrap();
        assert_eq!(json["isRunning"], true);
        assert_eq!(json["remainingTotal"], TOTAL - 1_000);
        assert_eq!(json["startedAt"], at(0).timestamp_millis());
        assert_eq!(json["serverTime"], at(1_000).timestamp_millis());

        let record: TimerRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record, running);
    }

    #[test]
    fn version_only_moves_on_change() {
        let mut record = TimerRecord::new(TOTAL, SESSION);
        let script = [
            (Action::Pause, false),
            (Action::Start, true),
            (Action::Start, false),
            (Action::Pause, true),
            (Action::Pause, false),
            (Action::Start, true),
            (Action::Stop, true),
            (Action::Stop, false),
        ];
        for (step, (action, expect_change)) in script.into_iter().enumerate() {
            let now = at(0) + Duration::seconds(step as i64);
            let applied = record.apply(&TimerCommand::new(action), now).unwrap();
            assert_eq!(applied.changed, expect_change, "step {} ({})", step, action);
            if expect_change {
                assert_eq!(applied.record.version, record.version + 1);
            } else {
                assert_eq!(applied.record.version, record.version);
            }
            record = applied.record;
        }
    }
}
