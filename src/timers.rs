// Deterministic one-shot timer queue
//
// The engine never sleeps. It schedules deadlines here and the host fires them
// in order, either from a real-time loop or by advancing a manual clock.

use std::collections::BTreeMap;

/// What a timer is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Auto-record quiet interval elapsed
    SilenceTimeout,
    /// Resume the playback chunk loop at this event index
    PlaybackChunk { index: usize },
    /// Periodic playback position report
    PlaybackProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

/// Owned handle to a pending timer. Not `Clone`: exactly one owner holds the
/// right to cancel it, and that owner drops the handle when leaving the state
/// that scheduled it.
#[derive(Debug, PartialEq, Eq)]
pub struct TimerToken {
    id: TimerId,
}

impl TimerToken {
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Whether a fired timer is the one this token refers to
    pub fn matches(&self, fired: &FiredTimer) -> bool {
        self.id == fired.id
    }
}

/// A timer that has come due
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiredTimer {
    pub id: TimerId,
    pub kind: TimerKind,
    pub deadline_ms: f64,
}

#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    deadline_ms: f64,
    kind: TimerKind,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    next_id: u64,
    pending: BTreeMap<TimerId, PendingTimer>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_at(&mut self, deadline_ms: f64, kind: TimerKind) -> TimerToken {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.insert(id, PendingTimer { deadline_ms, kind });
        TimerToken { id }
    }

    /// Cancel a pending timer. Returns false if it already fired.
    pub fn cancel(&mut self, token: TimerToken) -> bool {
        self.pending.remove(&token.id).is_some()
    }

    pub fn is_pending(&self, token: &TimerToken) -> bool {
        self.pending.contains_key(&token.id)
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<f64> {
        self.pending
            .values()
            .map(|t| t.deadline_ms)
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Remove and return the earliest timer due at `now_ms`. Timers sharing a
    /// deadline fire in the order they were scheduled.
    pub fn pop_due(&mut self, now_ms: f64) -> Option<FiredTimer> {
        let (id, timer) = self
            .pending
            .iter()
            .filter(|(_, t)| t.deadline_ms <= now_ms)
            .min_by(|(a_id, a), (b_id, b)| {
                a.deadline_ms.total_cmp(&b.deadline_ms).then(a_id.cmp(b_id))
            })
            .map(|(id, t)| (*id, *t))?;
        self.pending.remove(&id);
        Some(FiredTimer {
            id,
            kind: timer.kind,
            deadline_ms: timer.deadline_ms,
        })
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
