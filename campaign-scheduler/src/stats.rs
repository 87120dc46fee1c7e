//! Rolling windows feeding the memory estimator: the largest recent
//! per-worker RSS sample, and the moving average completion duration used
//! to penalise workers running abnormally long.

use std::collections::VecDeque;
use std::time::Duration;

/// The last `6*num_workers + 4` RSS samples observed across all workers;
/// `mem_max_obs` is their maximum.
pub struct RssWindow {
    samples: VecDeque<u64>,
    capacity: usize,
}

impl RssWindow {
    pub fn new(num_workers: usize) -> Self {
        Self {
            samples: VecDeque::new(),
            capacity: 6 * num_workers + 4,
        }
    }

    pub fn record(&mut self, rss_bytes: u64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(rss_bytes);
    }

    pub fn max_observed(&self) -> u64 {
        self.samples.iter().copied().max().unwrap_or(0)
    }
}

/// The moving average of the last `num_workers + 2` completion durations,
/// used to compute `time_max`: how far past its own historical average the
/// slowest still-running worker has drifted.
pub struct DurationWindow {
    durations: VecDeque<Duration>,
    capacity: usize,
}

impl DurationWindow {
    pub fn new(num_workers: usize) -> Self {
        Self {
            durations: VecDeque::new(),
            capacity: num_workers + 2,
        }
    }

    pub fn record(&mut self, duration: Duration) {
        if self.durations.len() == self.capacity {
            self.durations.pop_front();
        }
        self.durations.push_back(duration);
    }

    pub fn average(&self) -> Duration {
        if self.durations.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.durations.iter().sum();
        total / self.durations.len() as u32
    }

    /// `max(0, current - average)` across every running worker's current
    /// duration, in seconds.
    pub fn time_max_secs(&self, running_durations: &[Duration]) -> f64 {
        let average = self.average();
        running_durations
            .iter()
            .map(|current| current.saturating_sub(average).as_secs_f64())
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rss_window_evicts_oldest_sample_past_capacity() {
        let mut window = RssWindow::new(1); // capacity 10
        for i in 0..12u64 {
            window.record(i * 100);
        }
        assert_eq!(window.max_observed(), 1100);
    }

    #[test]
    fn duration_window_average_of_recent_completions() {
        let mut window = DurationWindow::new(2); // capacity 4
        for secs in [10, 20, 30, 40, 100] {
            window.record(Duration::from_secs(secs));
        }
        // 10 evicted, average over 20,30,40,100
        assert_eq!(window.average(), Duration::from_secs((20 + 30 + 40 + 100) / 4));
    }

    #[test]
    fn time_max_is_never_negative() {
        let window = DurationWindow::new(2);
        let running = vec![Duration::from_secs(1)];
        assert_eq!(window.time_max_secs(&running), 0.0);
    }
}
