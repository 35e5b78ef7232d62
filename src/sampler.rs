use crate::metrics::compute_wpm;
use crate::timer::Interval;
use crate::util::{mean, std_dev};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Maximum number of points kept for the trend chart
pub const SAMPLE_CAPACITY: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    /// Seconds since sampling started
    pub t: f64,
    pub wpm: f64,
}

impl From<SamplePoint> for (f64, f64) {
    fn from(p: SamplePoint) -> Self {
        (p.t, p.wpm)
    }
}

/// Once-per-second WPM history used for the live trend chart.
///
/// Purely observational: nothing in the session depends on it.
#[derive(Debug, Clone)]
pub struct LiveSampler {
    interval: Interval,
    points: VecDeque<SamplePoint>,
    ticks: u64,
}

impl Default for LiveSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveSampler {
    pub const PERIOD: Duration = Duration::from_secs(1);

    pub fn new() -> Self {
        Self {
            interval: Interval::new(Self::PERIOD),
            points: VecDeque::with_capacity(SAMPLE_CAPACITY),
            ticks: 0,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.interval.start(now);
    }

    pub fn stop(&mut self) {
        self.interval.stop();
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_running()
    }

    /// Take any due samples of the live WPM for `typed`.
    pub fn poll(&mut self, now: Instant, typed: &str, started_at: Instant) -> usize {
        let fired = self.interval.poll(now);
        if fired == 0 {
            return 0;
        }

        let wpm = compute_wpm(typed, now.saturating_duration_since(started_at)) as f64;
        for _ in 0..fired {
            self.ticks += 1;
            self.push(SamplePoint {
                t: self.ticks as f64,
                wpm,
            });
        }
        fired as usize
    }

    fn push(&mut self, point: SamplePoint) {
        if self.points.len() == SAMPLE_CAPACITY {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn points(&self) -> impl Iterator<Item = &SamplePoint> {
        self.points.iter()
    }

    pub fn coords(&self) -> Vec<(f64, f64)> {
        self.points.iter().copied().map(Into::into).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Mean and standard deviation of the sampled WPM values
    pub fn consistency(&self) -> Option<(f64, f64)> {
        let values: Vec<f64> = self.points.iter().map(|p| p.wpm).collect();
        Some((mean(&values)?, std_dev(&values)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_once_per_second() {
        let t0 = Instant::now();
        let mut sampler = LiveSampler::new();
        sampler.start(t0);

        assert_eq!(sampler.poll(t0 + Duration::from_millis(500), "a b", t0), 0);
        assert_eq!(sampler.poll(t0 + Duration::from_secs(1), "a b", t0), 1);
        assert_eq!(sampler.len(), 1);

        let first = sampler.points().next().copied().unwrap();
        assert_eq!(first.t, 1.0);
        assert_eq!(first.wpm, 120.0);
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let t0 = Instant::now();
        let mut sampler = LiveSampler::new();
        sampler.start(t0);

        for s in 1..=75u64 {
            sampler.poll(t0 + Duration::from_secs(s), "word", t0);
        }

        assert_eq!(sampler.len(), SAMPLE_CAPACITY);
        let oldest = sampler.points().next().unwrap();
        assert_eq!(oldest.t, 16.0);
        let newest = sampler.points().last().unwrap();
        assert_eq!(newest.t, 75.0);
    }

    #[test]
    fn test_stopped_sampler_records_nothing() {
        let t0 = Instant::now();
        let mut sampler = LiveSampler::new();
        sampler.start(t0);
        sampler.stop();

        assert_eq!(sampler.poll(t0 + Duration::from_secs(3), "a", t0), 0);
        assert!(sampler.is_empty());
        assert_eq!(sampler.consistency(), None);
    }

    #[test]
    fn test_consistency() {
        let t0 = Instant::now();
        let mut sampler = LiveSampler::new();
        sampler.start(t0);
        sampler.poll(t0 + Duration::from_secs(1), "a", t0);
        sampler.poll(t0 + Duration::from_secs(2), "a", t0);

        let (avg, sd) = sampler.consistency().unwrap();
        assert_eq!(avg, 45.0);
        assert_eq!(sd, 15.0);
        assert_eq!(sampler.coords(), vec![(1.0, 60.0), (2.0, 30.0)]);
    }
}
