use crate::models::Timestamp;
use std::collections::VecDeque;

/// Queue of timestamped samples bounded by age
///
/// Samples are kept in arrival order and never reordered. The buffer is
/// bounded by age only: a burst of pushes without time advancing grows it
/// without limit until the next `trim` with a later `now`.
#[derive(Debug, Clone)]
pub struct TimeWindowBuffer<T> {
    window_seconds: f64,
    samples: VecDeque<(Timestamp, T)>,
}

impl<T> TimeWindowBuffer<T> {
    pub fn new(window_seconds: f64) -> Self {
        Self {
            window_seconds,
            samples: VecDeque::new(),
        }
    }

    pub fn window_seconds(&self) -> f64 {
        self.window_seconds
    }

    /// Append a sample to the back
    pub fn push(&mut self, timestamp: Timestamp, value: T) {
        self.samples.push_back((timestamp, value));
    }

    /// Drop samples older than `now - window_seconds` from the front
    ///
    /// Returns how many samples were dropped.
    pub fn trim(&mut self, now: Timestamp) -> usize {
        let cutoff = now - self.window_seconds;
        let mut dropped = 0;

        while let Some((ts, _)) = self.samples.front() {
            if *ts < cutoff {
                self.samples.pop_front();
                dropped += 1;
            } else {
                break;
            }
        }

        dropped
    }

    /// All retained samples, oldest first
    pub fn iter(&self) -> impl Iterator<Item = (Timestamp, &T)> + '_ {
        self.samples.iter().map(|(ts, value)| (*ts, value))
    }

    /// Retained samples that are still inside the window at `now`
    ///
    /// Read-only counterpart of `trim`: skips the expired front without
    /// mutating the buffer.
    pub fn iter_since(&self, now: Timestamp) -> impl Iterator<Item = (Timestamp, &T)> + '_ {
        let cutoff = now - self.window_seconds;
        self.samples
            .iter()
            .skip_while(move |(ts, _)| *ts < cutoff)
            .map(|(ts, value)| (*ts, value))
    }

    pub fn front(&self) -> Option<(Timestamp, &T)> {
        self.samples.front().map(|(ts, value)| (*ts, value))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
