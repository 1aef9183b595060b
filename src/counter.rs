//! Sliding-window byte-rate estimation.
//!
//! `cratetorrent`'s top-level module list declares `mod counter;` for this
//! responsibility (the file itself wasn't present in the retrieved sources);
//! this crate fills that slot with the `Rate` estimator the design calls for.

use std::time::Instant;

/// Tracks bytes transferred for a single peer session, supporting both an
/// instantaneous rate over a sliding window and a simple running total
/// since the last extraction (used for the per-tick status report).
#[derive(Clone, Copy, Debug)]
pub struct Rate {
    /// Bytes observed since the last call to `extract_count`.
    bytes_since_count: u64,
    /// Bytes observed since the window origin (used by `extract_rate`).
    bytes_in_window: u64,
    /// The start of the current rate-estimation window.
    window_start: Instant,
}

impl Rate {
    pub fn new(now: Instant) -> Self {
        Self {
            bytes_since_count: 0,
            bytes_in_window: 0,
            window_start: now,
        }
    }

    /// Registers that `bytes` more were transferred.
    pub fn update(&mut self, bytes: u64) {
        self.bytes_since_count += bytes;
        self.bytes_in_window += bytes;
    }

    /// Returns the average bytes/second over the window since the last
    /// extraction, and renews the window to start at `now`.
    pub fn extract_rate(&mut self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.window_start).as_secs_f64();
        let rate = if elapsed > 0.0 {
            (self.bytes_in_window as f64 / elapsed) as u64
        } else {
            0
        };
        self.bytes_in_window = 0;
        self.window_start = now;
        rate
    }

    /// Returns the total bytes observed since the last extraction, and
    /// resets the counter.
    pub fn extract_count(&mut self) -> u64 {
        let count = self.bytes_since_count;
        self.bytes_since_count = 0;
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn extract_rate_divides_by_elapsed_window() {
        let t0 = Instant::now();
        let mut rate = Rate::new(t0);
        rate.update(1000);
        let t1 = t0 + Duration::from_secs(1);
        assert_eq!(rate.extract_rate(t1), 1000);
        // window renewed, so a second extraction with no new bytes is 0
        let t2 = t1 + Duration::from_secs(1);
        assert_eq!(rate.extract_rate(t2), 0);
    }

    #[test]
    fn extract_count_resets_and_is_independent_of_rate_window() {
        let t0 = Instant::now();
        let mut rate = Rate::new(t0);
        rate.update(500);
        rate.update(250);
        assert_eq!(rate.extract_count(), 750);
        assert_eq!(rate.extract_count(), 0);
    }
}
