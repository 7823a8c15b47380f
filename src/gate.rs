//! Debounce / cooldown gate
//!
//! Collapses repeated "window ready" signals into at most one dispatch per
//! cooldown interval. The gate is a plain state machine over millisecond
//! timestamps; the caller owns the timer and calls [`DebounceGate::poll`] when a
//! scheduled deadline passes.
//!
//! ```text
//! Idle ──signal──▶ Coalescing(deadline) ──poll ≥ deadline──▶ Cooling(until)
//!                    ▲      │ signal: deadline restarts            │
//!                    └──────┘                      now ≥ until ──▶ Idle
//! ```

use crate::config::{DEFAULT_COALESCE_DELAY_MS, DEFAULT_DETECTION_INTERVAL_MS};

/// Observable gate state at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Coalescing { deadline: u64 },
    Cooling { until: u64 },
}

/// What happened to a "window ready" signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSignal {
    /// Inside the cooldown; dropped
    Ignored { remaining_ms: u64 },
    /// Coalescing timer (re)started; poll at `deadline`
    Scheduled { deadline: u64 },
}

#[derive(Debug, Clone)]
pub struct DebounceGate {
    cooldown_ms: u64,
    coalesce_ms: u64,
    pending_deadline: Option<u64>,
    last_dispatch: Option<u64>,
}

impl Default for DebounceGate {
    fn default() -> Self {
        Self::new(DEFAULT_DETECTION_INTERVAL_MS, DEFAULT_COALESCE_DELAY_MS)
    }
}

impl DebounceGate {
    pub fn new(cooldown_ms: u64, coalesce_ms: u64) -> Self {
        Self {
            cooldown_ms,
            coalesce_ms,
            pending_deadline: None,
            last_dispatch: None,
        }
    }

    /// Handle a "window ready" signal
    pub fn signal(&mut self, now: u64) -> GateSignal {
        if let Some(remaining_ms) = self.cooldown_remaining(now) {
            return GateSignal::Ignored { remaining_ms };
        }

        let deadline = now.saturating_add(self.coalesce_ms);
        self.pending_deadline = Some(deadline);
        GateSignal::Scheduled { deadline }
    }

    /// Fire if the coalescing deadline has passed. Returns true exactly once
    /// per coalesced burst, recording `now` as the dispatch time.
    pub fn poll(&mut self, now: u64) -> bool {
        match self.pending_deadline {
            Some(deadline) if now >= deadline => {
                self.pending_deadline = None;
                self.last_dispatch = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Drop a pending burst without dispatching
    pub fn cancel(&mut self) -> bool {
        self.pending_deadline.take().is_some()
    }

    /// Record a dispatch that bypassed the gate
    pub fn record_dispatch(&mut self, now: u64) {
        self.last_dispatch = Some(now);
    }

    pub fn set_timing(&mut self, cooldown_ms: u64, coalesce_ms: u64) {
        self.cooldown_ms = cooldown_ms;
        self.coalesce_ms = coalesce_ms;
    }

    pub fn state(&self, now: u64) -> GateState {
        if let Some(deadline) = self.pending_deadline {
            return GateState::Coalescing { deadline };
        }
        match self.last_dispatch {
            Some(last) if now < last.saturating_add(self.cooldown_ms) => GateState::Cooling {
                until: last.saturating_add(self.cooldown_ms),
            },
            _ => GateState::Idle,
        }
    }

    fn cooldown_remaining(&self, now: u64) -> Option<u64> {
        let last = self.last_dispatch?;
        let elapsed = now.saturating_sub(last);
        (elapsed < self.cooldown_ms).then(|| self.cooldown_ms - elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};

    #[test]
    fn test_burst_collapses_to_one_dispatch() {
        let clock = ManualClock::new(10_000);
        let mut gate = DebounceGate::new(3000, 100);
        let mut fired = 0;

        // 20 signals, 10ms apart, then let the timer run out
        for _ in 0..20 {
            gate.signal(clock.now_ms());
            if gate.poll(clock.now_ms()) {
                fired += 1;
            }
            clock.advance(10);
        }
        clock.advance(100);
        if gate.poll(clock.now_ms()) {
            fired += 1;
        }
        assert_eq!(fired, 1);

        // further signals inside the cooldown are ignored
        for _ in 0..5 {
            assert!(matches!(
                gate.signal(clock.now_ms()),
                GateSignal::Ignored { .. }
            ));
            clock.advance(100);
        }
        assert!(!gate.poll(clock.now_ms()));
    }

    #[test]
    fn test_signal_restarts_coalescing_timer() {
        let mut gate = DebounceGate::new(3000, 100);
        assert_eq!(gate.signal(0), GateSignal::Scheduled { deadline: 100 });
        assert_eq!(gate.signal(80), GateSignal::Scheduled { deadline: 180 });

        // the first deadline is stale
        assert!(!gate.poll(100));
        assert_eq!(gate.state(100), GateState::Coalescing { deadline: 180 });
        assert!(gate.poll(180));
        assert_eq!(gate.state(180), GateState::Cooling { until: 3180 });
    }

    #[test]
    fn test_cooldown_expires() {
        let mut gate = DebounceGate::new(3000, 100);
        gate.signal(0);
        assert!(gate.poll(100));

        assert_eq!(
            gate.signal(2000),
            GateSignal::Ignored { remaining_ms: 1100 }
        );
        assert_eq!(gate.state(3100), GateState::Idle);
        assert_eq!(gate.signal(3100), GateSignal::Scheduled { deadline: 3200 });
        assert!(gate.poll(3200));
        assert_eq!(gate.state(3200), GateState::Cooling { until: 6200 });
    }

    #[test]
    fn test_cancel_drops_pending_burst() {
        let mut gate = DebounceGate::new(3000, 100);
        gate.signal(0);
        assert!(gate.cancel());
        assert!(!gate.poll(500));
        assert_eq!(gate.state(500), GateState::Idle);
        assert!(!gate.cancel());
    }

    #[test]
    fn test_forced_dispatch_starts_cooldown() {
        let mut gate = DebounceGate::new(3000, 100);
        gate.record_dispatch(1000);
        assert!(matches!(gate.signal(1500), GateSignal::Ignored { .. }));
        assert!(matches!(gate.signal(4000), GateSignal::Scheduled { .. }));
    }

    #[test]
    fn test_huge_timings_do_not_overflow() {
        let mut gate = DebounceGate::new(u64::MAX, u64::MAX);
        assert_eq!(
            gate.signal(5_000),
            GateSignal::Scheduled { deadline: u64::MAX }
        );
        assert!(!gate.poll(u64::MAX - 1));
        assert!(gate.poll(u64::MAX));
        assert_eq!(
            gate.state(u64::MAX - 1),
            GateState::Cooling { until: u64::MAX }
        );
    }
}
