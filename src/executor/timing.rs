//! Request timing measurement and formatting.

use crate::models::response::RequestTiming;
use std::time::{Duration, Instant};

/// Timing checkpoints collected while a request executes.
#[derive(Debug, Clone)]
pub struct TimingCheckpoints {
    pub request_start: Instant,
    pub request_sent: Option<Instant>,
    pub first_byte_received: Option<Instant>,
    pub response_complete: Option<Instant>,
}

impl TimingCheckpoints {
    /// Starts the clock.
    pub fn new() -> Self {
        Self {
            request_start: Instant::now(),
            request_sent: None,
            first_byte_received: None,
            response_complete: None,
        }
    }

    pub fn mark_request_sent(&mut self) {
        self.request_sent = Some(Instant::now());
    }

    pub fn mark_first_byte_received(&mut self) {
        self.first_byte_received = Some(Instant::now());
    }

    pub fn mark_response_complete(&mut self) {
        self.response_complete = Some(Instant::now());
    }

    /// Converts checkpoints into phase durations.
    ///
    /// A missing checkpoint collapses its phase to zero; the phases always
    /// sum to the time between start and the last recorded checkpoint.
    pub fn to_request_timing(&self) -> RequestTiming {
        let sent = self.request_sent.unwrap_or(self.request_start);
        let first_byte = self.first_byte_received.unwrap_or(sent);
        let complete = self.response_complete.unwrap_or(first_byte);

        RequestTiming {
            connect: sent.saturating_duration_since(self.request_start),
            first_byte: first_byte.saturating_duration_since(sent),
            download: complete.saturating_duration_since(first_byte),
        }
    }
}

impl Default for TimingCheckpoints {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats timing on one line: `47ms (connect 5ms, ttfb 40ms, download 2ms)`.
pub fn format_timing_compact(timing: &RequestTiming) -> String {
    format!(
        "{} (connect {}, ttfb {}, download {})",
        format_duration_human(&timing.total()),
        format_duration_human(&timing.connect),
        format_duration_human(&timing.first_byte),
        format_duration_human(&timing.download),
    )
}

fn format_duration_human(duration: &Duration) -> String {
    let ms = duration.as_millis();
    if ms >= 1000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if ms == 0 && duration.as_micros() > 0 {
        format!("{}µs", duration.as_micros())
    } else {
        format!("{}ms", ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_phases_sum_to_total() {
        let mut checkpoints = TimingCheckpoints::new();
        thread::sleep(Duration::from_millis(2));
        checkpoints.mark_request_sent();
        thread::sleep(Duration::from_millis(5));
        checkpoints.mark_first_byte_received();
        thread::sleep(Duration::from_millis(2));
        checkpoints.mark_response_complete();

        let timing = checkpoints.to_request_timing();
        assert!(timing.first_byte >= Duration::from_millis(5));
        let complete = checkpoints.response_complete.unwrap();
        assert_eq!(
            timing.total(),
            complete.duration_since(checkpoints.request_start)
        );
    }

    #[test]
    fn test_missing_checkpoints_collapse() {
        let mut checkpoints = TimingCheckpoints::new();
        checkpoints.mark_request_sent();
        let timing = checkpoints.to_request_timing();
        assert_eq!(timing.first_byte, Duration::ZERO);
        assert_eq!(timing.download, Duration::ZERO);
    }

    #[test]
    fn test_format_timing_compact() {
        let timing = RequestTiming {
            connect: Duration::from_millis(3),
            first_byte: Duration::from_millis(1200),
            download: Duration::from_micros(300),
        };
        assert_eq!(
            format_timing_compact(&timing),
            "1.20s (connect 3ms, ttfb 1.20s, download 300µs)"
        );
    }
}
