use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

struct Sample {
    bytes_total: u64,
    timestamp: Instant,
}

/// Estimates transfer speed from cumulative byte counts over a sliding window.
pub struct ThroughputMeter {
    inner: Mutex<MeterInner>,
}

struct MeterInner {
    samples: Vec<Sample>,
    max_samples: usize,
    window_size: Duration,
}

impl ThroughputMeter {
    /// Creates a new meter.
    ///
    /// - `window_size`: time window for speed calculation (default 5 s).
    /// - `max_samples`: maximum retained samples (default 100).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(MeterInner {
                samples: Vec::new(),
                max_samples: max_samples.unwrap_or(100).max(2),
                window_size: window_size.unwrap_or(Duration::from_secs(5)),
            }),
        }
    }

    /// Records the cumulative bytes transferred so far.
    pub fn record(&self, bytes_total: u64) {
        self.record_at(bytes_total, Instant::now());
    }

    /// Records a sample taken at `timestamp`.
    ///
    /// A total lower than the previous one means the transfer restarted;
    /// older samples are dropped.
    pub fn record_at(&self, bytes_total: u64, timestamp: Instant) {
        let mut s = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        if s.samples.last().is_some_and(|last| bytes_total < last.bytes_total) {
            s.samples.clear();
        }
        s.samples.push(Sample {
            bytes_total,
            timestamp,
        });

        // Keep the newest sample even if it is outside the window.
        if let Some(cutoff) = timestamp.checked_sub(s.window_size) {
            let keep_from = s
                .samples
                .iter()
                .position(|sample| sample.timestamp >= cutoff)
                .unwrap_or(s.samples.len() - 1);
            s.samples.drain(..keep_from);
        }

        if s.samples.len() > s.max_samples {
            let excess = s.samples.len() - s.max_samples;
            s.samples.drain(..excess);
        }
    }

    /// Average speed in bytes/second within the window.
    ///
    /// Returns 0.0 with fewer than 2 samples.
    pub fn bytes_per_second(&self) -> f64 {
        let s = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let (Some(first), Some(last)) = (s.samples.first(), s.samples.last()) else {
            return 0.0;
        };
        let elapsed = last.timestamp.saturating_duration_since(first.timestamp);
        if elapsed.is_zero() {
            return 0.0;
        }
        (last.bytes_total - first.bytes_total) as f64 / elapsed.as_secs_f64()
    }

    /// Estimates time remaining to transfer `remaining_bytes`.
    ///
    /// Returns `None` if speed is zero.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(remaining_bytes as f64 / speed).ok()
    }

    /// Clears all recorded samples.
    pub fn reset(&self) {
        let mut s = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        s.samples.clear();
    }
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new(None, None)
    }
}
