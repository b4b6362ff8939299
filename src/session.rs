use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default memory alert threshold, in percent of total memory.
pub const DEFAULT_MEM_LIMIT: f32 = 70.0;

/// Process-wide session state shared between the interactive loop and the
/// background memory monitor.
///
/// The handle is cheap to clone (`Arc` inside). The exit flag is written only
/// by the `exit` built-in (or the implicit exit on an empty line / EOF); the
/// threshold is written only by `setmemlimit` and read by the monitor; the
/// stopwatch is touched only by the `stopwatch` built-in.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionState>,
}

struct SessionState {
    should_exit: AtomicBool,
    /// f32 bit pattern; percent of total memory.
    mem_limit: AtomicU32,
    /// Starts at `UNIX_EPOCH` so `stopwatch stop` before any start yields a
    /// large but valid elapsed time instead of an error.
    stopwatch: Mutex<SystemTime>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SessionState {
                should_exit: AtomicBool::new(false),
                mem_limit: AtomicU32::new(DEFAULT_MEM_LIMIT.to_bits()),
                stopwatch: Mutex::new(UNIX_EPOCH),
            }),
        }
    }

    pub fn should_exit(&self) -> bool {
        self.inner.should_exit.load(Ordering::Relaxed)
    }

    pub fn request_exit(&self) {
        self.inner.should_exit.store(true, Ordering::Relaxed);
    }

    pub fn mem_limit(&self) -> f32 {
        f32::from_bits(self.inner.mem_limit.load(Ordering::Relaxed))
    }

    pub fn set_mem_limit(&self, percent: f32) {
        self.inner.mem_limit.store(percent.to_bits(), Ordering::Relaxed);
    }

    /// Re-arm the stopwatch at the current instant.
    pub fn stopwatch_start(&self) {
        *self.inner.stopwatch.lock().unwrap() = SystemTime::now();
    }

    /// Seconds elapsed since the last `stopwatch_start`, or since the Unix
    /// epoch if the stopwatch was never armed.
    pub fn stopwatch_elapsed(&self) -> f64 {
        let started = *self.inner.stopwatch.lock().unwrap();
        SystemTime::now()
            .duration_since(started)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
