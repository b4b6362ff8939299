//! Background memory watcher.
//!
//! A single thread samples system memory on a fixed interval and, when usage
//! crosses the session threshold, prints the top memory consumers. The only
//! state shared with the foreground loop is the [`Session`] handle; the
//! thread observes the exit flag at sub-second granularity so shutdown joins
//! promptly.

use crate::session::Session;
use std::thread::JoinHandle;
use std::time::Duration;
use sysinfo::{ProcessExt, System, SystemExt};

/// Seconds between memory samples.
const POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Granularity of the exit-flag check while sleeping.
const SHUTDOWN_CHECK: Duration = Duration::from_millis(200);
/// How many processes the alert report lists.
const TOP_PROCESSES: usize = 5;

/// Handle to the running monitor thread.
pub struct MemoryMonitor {
    handle: Option<JoinHandle<()>>,
}

impl MemoryMonitor {
    /// Start the monitor thread for the given session.
    pub fn spawn(session: Session) -> Self {
        let handle = std::thread::Builder::new()
            .name("mem-monitor".into())
            .spawn(move || poll_loop(&session))
            .ok();
        if handle.is_none() {
            log::warn!("could not start memory monitor thread");
        }
        Self { handle }
    }

    /// Wait for the monitor thread to observe the exit flag and finish.
    pub fn shutdown(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn poll_loop(session: &Session) {
    let mut system = System::new();
    while !session.should_exit() {
        sleep_interruptibly(session, POLL_INTERVAL);
        if session.should_exit() {
            break;
        }

        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            continue;
        }
        let used_pct = system.used_memory() as f32 / total as f32 * 100.0;
        log::debug!("memory usage {:.1}%", used_pct);

        if used_pct > session.mem_limit() {
            system.refresh_processes();
            report_top_consumers(&system, used_pct);
        }
    }
}

/// Sleep for `total`, waking early if the session asks to exit.
fn sleep_interruptibly(session: &Session, total: Duration) {
    let mut remaining = total;
    while !remaining.is_zero() && !session.should_exit() {
        let step = remaining.min(SHUTDOWN_CHECK);
        std::thread::sleep(step);
        remaining -= step;
    }
}

fn report_top_consumers(system: &System, used_pct: f32) {
    let mut processes: Vec<_> = system.processes().values().collect();
    processes.sort_by(|a, b| b.memory().cmp(&a.memory()));

    eprintln!(
        "turtlesh: memory usage {:.1}% exceeds the alert threshold; top consumers:",
        used_pct
    );
    for process in processes.iter().take(TOP_PROCESSES) {
        eprintln!(
            "  {:>8} {:>10} KiB  {}",
            process.pid(),
            process.memory() / 1024,
            process.name()
        );
    }
}
