// Silence detection for auto-record

use crate::timers::{FiredTimer, TimerKind, TimerQueue, TimerToken};

/// Default quiet interval before an auto-recording ends
pub const DEFAULT_QUIET_INTERVAL_MS: f64 = 3_000.0;

/// Debounced one-shot timer. Each note re-arms it; if it runs out the take is
/// over. The detector fires at most once per arming.
#[derive(Debug)]
pub struct SilenceDetector {
    quiet_ms: f64,
    pending: Option<TimerToken>,
}

impl SilenceDetector {
    pub fn new(quiet_ms: f64) -> Self {
        Self {
            quiet_ms: quiet_ms.max(0.0),
            pending: None,
        }
    }

    pub fn quiet_ms(&self) -> f64 {
        self.quiet_ms
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Qualifying activity: cancel any pending timeout and arm a new one.
    pub fn notify_activity(&mut self, timers: &mut TimerQueue, now_ms: f64) {
        if let Some(token) = self.pending.take() {
            timers.cancel(token);
        }
        self.pending = Some(timers.schedule_at(now_ms + self.quiet_ms, TimerKind::SilenceTimeout));
    }

    /// Disarm without firing.
    pub fn reset(&mut self, timers: &mut TimerQueue) {
        if let Some(token) = self.pending.take() {
            timers.cancel(token);
        }
    }

    /// Claim a fired timer. Returns true exactly once per arming, and only for
    /// the timer this detector currently owns.
    pub fn on_timer(&mut self, fired: &FiredTimer) -> bool {
        match &self.pending {
            Some(token) if token.matches(fired) => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }
}

impl Default for SilenceDetector {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_INTERVAL_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Advance to `now` and report whether the detector fired
    fn fire_due(detector: &mut SilenceDetector, timers: &mut TimerQueue, now: f64) -> bool {
        let mut fired = false;
        while let Some(timer) = timers.pop_due(now) {
            fired |= detector.on_timer(&timer);
        }
        fired
    }

    #[test]
    fn test_fires_quiet_interval_after_last_activity() {
        let mut timers = TimerQueue::new();
        let mut detector = SilenceDetector::new(3000.0);

        detector.notify_activity(&mut timers, 0.0);
        detector.notify_activity(&mut timers, 1000.0);

        assert!(!fire_due(&mut detector, &mut timers, 3999.0));
        assert!(fire_due(&mut detector, &mut timers, 4000.0));
        assert!(!detector.is_armed());
        assert!(!fire_due(&mut detector, &mut timers, 10_000.0));
    }

    #[test]
    fn test_late_activity_defers_firing() {
        let mut timers = TimerQueue::new();
        let mut detector = SilenceDetector::new(3000.0);

        detector.notify_activity(&mut timers, 0.0);
        detector.notify_activity(&mut timers, 1000.0);
        assert!(!fire_due(&mut detector, &mut timers, 3500.0));
        detector.notify_activity(&mut timers, 3500.0);

        assert!(!fire_due(&mut detector, &mut timers, 6499.0));
        assert!(fire_due(&mut detector, &mut timers, 6500.0));
    }

    #[test]
    fn test_reset_cancels_without_firing() {
        let mut timers = TimerQueue::new();
        let mut detector = SilenceDetector::default();
        detector.notify_activity(&mut timers, 0.0);
        detector.reset(&mut timers);

        assert!(timers.is_empty());
        assert!(!fire_due(&mut detector, &mut timers, 60_000.0));
    }

    #[test]
    fn test_ignores_foreign_timers() {
        let mut timers = TimerQueue::new();
        let mut detector = SilenceDetector::new(100.0);
        timers.schedule_at(50.0, TimerKind::PlaybackProgress);
        detector.notify_activity(&mut timers, 0.0);

        let first = timers.pop_due(200.0).unwrap();
        assert!(!detector.on_timer(&first));
        assert!(detector.is_armed());
        let second = timers.pop_due(200.0).unwrap();
        assert!(detector.on_timer(&second));
    }
}
