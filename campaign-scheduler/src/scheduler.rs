//! The adaptive worker pool: submits work as long as memory, running-worker
//! and in-queue limits allow, spawning one OS thread per submitted item and
//! polling at a fixed interval whenever the gate is shut.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::mem::{self, max_ram, mem_estimate};
use crate::queue::BoundedSender;
use crate::stats::{DurationWindow, RssWindow};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

pub struct SchedulerConfig {
    pub num_workers: usize,
    pub queue_depth: usize,
}

/// One sample of a worker's emulator child process's resident set size.
pub struct RamSample {
    pub rss_bytes: u64,
}

struct RunningWorker {
    handle: JoinHandle<()>,
    started: Instant,
}

/// Drives a pool of OS-thread workers over a fixed list of items, gating
/// new submissions on the memory estimate and queue depth from spec's
/// adaptive scheduler. Cancellation is cooperative: a shared flag is
/// checked before each submission and handed down to every worker, which
/// is expected to abort its own emulator child promptly on observing it.
pub struct Scheduler {
    config: SchedulerConfig,
    cancel: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, cancel: Arc<AtomicBool>) -> Self {
        Self { config, cancel }
    }

    /// Runs every item in `items` through `work_fn`, pushing each result
    /// into `output` as it completes. `work_fn` is handed the item, the
    /// shared cancellation flag, and a sender it may use to report RSS
    /// samples for its own emulator child.
    ///
    /// Falls back to an unbounded memory ceiling (no throttling) if system
    /// RAM cannot be read, logging a warning, rather than refusing to run
    /// the campaign at all.
    pub fn run<T, O, F>(&self, items: Vec<T>, output: BoundedSender<O>, work_fn: F)
    where
        T: Send + 'static,
        O: Send + 'static,
        F: Fn(T, Arc<AtomicBool>, Sender<RamSample>) -> O + Send + Sync + 'static,
    {
        let work_fn = Arc::new(work_fn);
        let mut pending: VecDeque<T> = items.into_iter().collect();
        let mut running: Vec<RunningWorker> = Vec::new();
        let running_count = Arc::new(AtomicUsize::new(0));
        let (ram_tx, ram_rx) = mpsc::channel::<RamSample>();

        let num_workers = self.config.num_workers.max(1);
        let mut rss_window = RssWindow::new(num_workers);
        let mut duration_window = DurationWindow::new(num_workers);
        let max_ram_bytes = self.resolve_max_ram();

        info!(
            num_workers = self.config.num_workers,
            queue_depth = self.config.queue_depth,
            max_ram_bytes,
            total = pending.len(),
            "scheduler starting"
        );

        loop {
            while let Ok(sample) = ram_rx.try_recv() {
                rss_window.record(sample.rss_bytes);
            }

            running.retain(|worker| {
                if worker.handle.is_finished() {
                    duration_window.record(worker.started.elapsed());
                    running_count.fetch_sub(1, Ordering::SeqCst);
                    false
                } else {
                    true
                }
            });

            if self.cancel.load(Ordering::SeqCst) {
                if running.is_empty() {
                    info!("cancellation observed, no workers remain, stopping");
                    break;
                }
                thread::sleep(POLL_INTERVAL);
                continue;
            }

            let mut submitted = false;
            while !pending.is_empty() {
                let running_now = running_count.load(Ordering::SeqCst) as u64;
                let in_queue_now = output.len() as u64;
                if running_now >= self.config.num_workers as u64 {
                    break;
                }
                if in_queue_now >= self.config.queue_depth as u64 {
                    break;
                }
                let running_elapsed: Vec<Duration> =
                    running.iter().map(|worker| worker.started.elapsed()).collect();
                let time_max = duration_window.time_max_secs(&running_elapsed);
                let estimate = mem_estimate(rss_window.max_observed(), running_now, in_queue_now, time_max);
                if estimate >= max_ram_bytes {
                    debug!(estimate, max_ram_bytes, "memory estimate blocks further submission");
                    break;
                }

                let item = pending.pop_front().expect("checked non-empty above");
                let work_fn = Arc::clone(&work_fn);
                let cancel = Arc::clone(&self.cancel);
                let ram_tx = ram_tx.clone();
                let output = output.clone();
                running_count.fetch_add(1, Ordering::SeqCst);
                let handle = thread::spawn(move || {
                    let result = work_fn(item, cancel, ram_tx);
                    if output.send(result).is_err() {
                        warn!("result consumer hung up before result could be enqueued");
                    }
                });
                running.push(RunningWorker {
                    handle,
                    started: Instant::now(),
                });
                submitted = true;
            }

            if pending.is_empty() && running.is_empty() {
                info!("all work submitted and completed, scheduler exiting");
                break;
            }
            if !submitted {
                thread::sleep(POLL_INTERVAL);
            }
        }
    }

    fn resolve_max_ram(&self) -> u64 {
        match mem::system_ram_bytes() {
            Ok(system_ram) => max_ram(system_ram),
            Err(err) => {
                warn!(%err, "could not read system RAM, disabling the memory gate");
                u64::MAX
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::bounded_channel;

    #[test]
    fn runs_every_item_exactly_once() {
        let scheduler = Scheduler::new(
            SchedulerConfig {
                num_workers: 4,
                queue_depth: 100,
            },
            Arc::new(AtomicBool::new(false)),
        );
        let (tx, rx) = bounded_channel::<u32>();
        scheduler.run(vec![1, 2, 3, 4, 5], tx, |item, _cancel, _ram| item * 2);

        let mut results = Vec::new();
        while let Ok(value) = rx.try_recv() {
            results.push(value);
        }
        results.sort_unstable();
        assert_eq!(results, vec![2, 4, 6, 8, 10]);
    }

    #[test]
    fn cancellation_flag_stops_submission_of_remaining_work() {
        let cancel = Arc::new(AtomicBool::new(false));
        let scheduler = Scheduler::new(
            SchedulerConfig {
                num_workers: 1,
                queue_depth: 100,
            },
            Arc::clone(&cancel),
        );
        let (tx, rx) = bounded_channel::<u32>();
        let cancel_trigger = Arc::clone(&cancel);
        scheduler.run(vec![1, 2, 3], tx, move |item, _cancel, _ram| {
            if item == 1 {
                cancel_trigger.store(true, Ordering::SeqCst);
            }
            item
        });

        let mut results = Vec::new();
        while let Ok(value) = rx.try_recv() {
            results.push(value);
        }
        assert!(results.len() < 3, "cancellation should have pre-empted later submissions");
    }
}
