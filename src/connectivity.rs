use crate::timer::Interval;
use std::time::{Duration, Instant};
use tracing::info;

/// Turns periodic reachability probes into a "connectivity restored" edge.
///
/// The edge fires only when a probe succeeds after a failed one. The first
/// observation just records the state.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    online: Option<bool>,
    interval: Interval,
}

impl ConnectivityMonitor {
    pub const DEFAULT_PROBE_PERIOD: Duration = Duration::from_secs(5);

    pub fn new(probe_period: Duration) -> Self {
        Self {
            online: None,
            interval: Interval::new(probe_period),
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.interval.start(now);
    }

    pub fn stop(&mut self) {
        self.interval.stop();
    }

    pub fn is_online(&self) -> Option<bool> {
        self.online
    }

    /// Record one probe result; true when reachability just came back
    pub fn observe(&mut self, reachable: bool) -> bool {
        let restored = self.online == Some(false) && reachable;
        if self.online != Some(reachable) {
            info!(reachable, "connectivity changed");
        }
        self.online = Some(reachable);
        restored
    }

    /// Run `probe` if a probe is due and report whether connectivity was restored
    pub fn poll<F: FnOnce() -> bool>(&mut self, now: Instant, probe: F) -> bool {
        if self.interval.poll(now) == 0 {
            return false;
        }
        self.observe(probe())
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PROBE_PERIOD)
    }
}
