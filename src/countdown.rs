use crate::timer::Interval;
use std::time::{Duration, Instant};

/// One countdown step, reported to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountdownTick {
    pub remaining_secs: u64,
    pub percent_elapsed: f64,
    /// Set on the single tick that reaches zero
    pub expired: bool,
}

/// Per-session countdown, decremented once per second while the session is active
#[derive(Debug, Clone)]
pub struct Countdown {
    total_secs: u64,
    remaining_secs: u64,
    interval: Interval,
}

impl Countdown {
    pub const TICK: Duration = Duration::from_secs(1);

    pub fn new(duration: Duration) -> Self {
        let total_secs = duration.as_secs().max(1);
        Self {
            total_secs,
            remaining_secs: total_secs,
            interval: Interval::new(Self::TICK),
        }
    }

    pub fn start(&mut self, now: Instant) {
        if self.remaining_secs > 0 {
            self.interval.start(now);
        }
    }

    pub fn stop(&mut self) {
        self.interval.stop();
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_running()
    }

    pub fn total_secs(&self) -> u64 {
        self.total_secs
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn percent_elapsed(&self) -> f64 {
        let elapsed = self.total_secs - self.remaining_secs;
        (elapsed as f64 / self.total_secs as f64) * 100.0
    }

    /// Advance the countdown to `now`.
    ///
    /// Returns the latest tick if at least one second elapsed. The tick that
    /// reaches zero has `expired` set and stops the countdown, so expiry is
    /// reported at most once.
    pub fn poll(&mut self, now: Instant) -> Option<CountdownTick> {
        let fired = self.interval.poll(now) as u64;
        if fired == 0 {
            return None;
        }

        self.remaining_secs = self.remaining_secs.saturating_sub(fired);
        let expired = self.remaining_secs == 0;
        if expired {
            self.interval.stop();
        }

        Some(CountdownTick {
            remaining_secs: self.remaining_secs,
            percent_elapsed: self.percent_elapsed(),
            expired,
        })
    }
}
