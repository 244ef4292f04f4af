//! Scheduler monitoring: idle detection with auto-stop, summary recording,
//! and error-channel draining.
//!
//! The monitor runs three tasks against a scheduler handle. The idle checker
//! counts consecutive idle observations and — after re-confirming idleness
//! once the threshold is reached — stops the scheduler when `auto_stop` is
//! set. The summary recorder captures a structured snapshot on every tick
//! but records it only when it changed. The error drain keeps the
//! scheduler's error stage from backing up by consuming its channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{sleep, Instant};
use tracing::error;

use crate::scheduler::{SchedSummary, Scheduler, Status};

/// Log levels for [`Record`]: 0 = normal, 1 = warning, 2 = error.
pub type Record = Arc<dyn Fn(u8, &str) + Send + Sync>;

const MSG_REACH_MAX_IDLE_COUNT: &str =
    "The scheduler has been idle for a period of time (about {}). Consider to stop it now.";
const MSG_STOP_SCHEDULER: &str = "Stop scheduler...{}.";

/// What the summary recorder emits, serialized as indented JSON.
#[derive(Serialize)]
struct MonitorSummary {
    sched_summary: SchedSummary,
    escaped_time: String,
}

/// Monitors a scheduler.
///
/// `check_interval` is clamped to at least 100 ms, `summarize_interval` to
/// at least one second, and `max_idle_count` to at least 10, so that a
/// mis-configured monitor cannot disturb the crawl or stop it prematurely.
/// When monitoring ends, the accumulated number of idle checks is sent on
/// the returned channel.
pub fn monitor(
    scheduler: Arc<Scheduler>,
    check_interval: Duration,
    summarize_interval: Duration,
    max_idle_count: u32,
    auto_stop: bool,
    record: Record,
) -> kanal::AsyncReceiver<u64> {
    let (check_interval, summarize_interval, max_idle_count) =
        clamp_parameters(check_interval, summarize_interval, max_idle_count);
    let stop = Arc::new(AtomicBool::new(false));

    report_errors(Arc::clone(&scheduler), Arc::clone(&record), Arc::clone(&stop));
    record_summaries(
        Arc::clone(&scheduler),
        summarize_interval,
        Arc::clone(&record),
        Arc::clone(&stop),
    );

    let (count_tx, count_rx) = kanal::bounded_async(2);
    check_idle_status(
        scheduler,
        check_interval,
        max_idle_count,
        auto_stop,
        count_tx,
        record,
        stop,
    );
    count_rx
}

fn clamp_parameters(
    check_interval: Duration,
    summarize_interval: Duration,
    max_idle_count: u32,
) -> (Duration, Duration, u32) {
    (
        check_interval.max(Duration::from_millis(100)),
        summarize_interval.max(Duration::from_secs(1)),
        max_idle_count.max(10),
    )
}

/// Checks the idle state and takes action once it has persisted long enough.
fn check_idle_status(
    scheduler: Arc<Scheduler>,
    check_interval: Duration,
    max_idle_count: u32,
    auto_stop: bool,
    count_tx: kanal::AsyncSender<u64>,
    record: Record,
    stop: Arc<AtomicBool>,
) {
    tokio::spawn(async move {
        let mut check_count: u64 = 0;
        wait_for_scheduler_start(&scheduler).await;
        let mut idle_count: u32 = 0;
        let mut first_idle_time = Instant::now();
        loop {
            if scheduler.idle() {
                idle_count += 1;
                if idle_count == 1 {
                    first_idle_time = Instant::now();
                }
                if idle_count >= max_idle_count {
                    let msg = MSG_REACH_MAX_IDLE_COUNT
                        .replacen("{}", &format!("{:?}", first_idle_time.elapsed()), 1);
                    record(0, &msg);
                    // The streak alone is not proof: re-check before acting.
                    if scheduler.idle() {
                        if auto_stop {
                            let result = match scheduler.stop() {
                                Ok(()) => "success".to_string(),
                                Err(e) => format!("failing({e})"),
                            };
                            record(0, &MSG_STOP_SCHEDULER.replacen("{}", &result, 1));
                        }
                        break;
                    }
                    idle_count = 0;
                }
            } else {
                idle_count = 0;
            }
            check_count += 1;
            sleep(check_interval).await;
        }
        stop.store(true, Ordering::SeqCst);
        let _ = count_tx.send(check_count).await;
    });
}

/// Records a summary on every tick where it changed.
fn record_summaries(
    scheduler: Arc<Scheduler>,
    summarize_interval: Duration,
    record: Record,
    stop: Arc<AtomicBool>,
) {
    tokio::spawn(async move {
        wait_for_scheduler_start(&scheduler).await;
        let mut prev_summary: Option<SchedSummary> = None;
        let mut record_count: u64 = 1;
        let start_time = Instant::now();
        loop {
            if stop.load(Ordering::SeqCst) {
                return;
            }
            if let Some(current) = scheduler.summary() {
                if prev_summary.as_ref() != Some(&current) {
                    let snapshot = MonitorSummary {
                        sched_summary: current.clone(),
                        escaped_time: format!("{:?}", start_time.elapsed()),
                    };
                    match serde_json::to_string_pretty(&snapshot) {
                        Ok(text) => {
                            record(0, &format!("Monitor summary[{record_count}]:\n{text}"));
                            prev_summary = Some(current);
                            record_count += 1;
                        }
                        Err(e) => {
                            error!("an error occurs when generating scheduler summary: {e}");
                        }
                    }
                }
            }
            sleep(summarize_interval).await;
        }
    });
}

/// Drains the scheduler's error channel into the record function.
fn report_errors(scheduler: Arc<Scheduler>, record: Record, stop: Arc<AtomicBool>) {
    tokio::spawn(async move {
        wait_for_scheduler_start(&scheduler).await;
        let Some(error_rx) = scheduler.error_chan() else {
            return;
        };
        loop {
            if stop.load(Ordering::SeqCst) {
                return;
            }
            match error_rx.recv().await {
                Ok(err) => record(2, &format!("Received an error from error channel: {err}")),
                Err(_) => return,
            }
        }
    });
}

/// Waits until the scheduler has started — or has already passed that point,
/// so a monitor attached around a very short crawl cannot hang.
async fn wait_for_scheduler_start(scheduler: &Scheduler) {
    loop {
        if matches!(
            scheduler.status(),
            Status::Started | Status::Stopping | Status::Stopped
        ) {
            return;
        }
        sleep(Duration::from_millis(1)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_are_clamped_from_below() {
        let (check, summarize, idle) =
            clamp_parameters(Duration::from_millis(1), Duration::from_millis(5), 2);
        assert_eq!(check, Duration::from_millis(100));
        assert_eq!(summarize, Duration::from_secs(1));
        assert_eq!(idle, 10);
    }

    #[test]
    fn generous_parameters_pass_through() {
        let (check, summarize, idle) =
            clamp_parameters(Duration::from_secs(1), Duration::from_secs(5), 50);
        assert_eq!(check, Duration::from_secs(1));
        assert_eq!(summarize, Duration::from_secs(5));
        assert_eq!(idle, 50);
    }
}
