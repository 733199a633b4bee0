use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic clock used to time phases and reaction times.
///
/// Timestamps are nanoseconds since the timer's own origin.
pub trait Timer: Clone + Send + Sync {
    fn now(&self) -> u64;

    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }

    fn sleep(&self, d: Duration);

    /// Sleeps until `deadline_ns`; returns immediately if it already passed.
    fn sleep_until(&self, deadline_ns: u64) {
        let now = self.now();
        if deadline_ns > now {
            self.sleep(Duration::from_nanos(deadline_ns - now));
        }
    }
}

/// Wall-clock backed timer with platform precise sleeping.
#[derive(Debug, Clone)]
pub struct HighPrecisionTimer {
    start: Instant,
}

impl Timer for HighPrecisionTimer {
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }

    fn sleep(&self, d: Duration) {
        self.high_precision_sleep(d)
    }
}

impl HighPrecisionTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn high_precision_sleep(&self, duration: Duration) {
        #[cfg(target_os = "linux")]
        self.linux_sleep(duration);
        #[cfg(not(target_os = "linux"))]
        std::thread::sleep(duration);
    }

    #[cfg(target_os = "linux")]
    fn linux_sleep(&self, duration: Duration) {
        use libc::{clock_nanosleep, timespec, CLOCK_MONOTONIC, EINTR};

        let mut req = timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: duration.subsec_nanos() as libc::c_long,
        };
        let mut rem = timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };

        // Resume with the remaining time when a signal interrupts the sleep.
        loop {
            let rc = unsafe { clock_nanosleep(CLOCK_MONOTONIC, 0, &req, &mut rem) };
            if rc != EINTR {
                if rc != 0 {
                    tracing::warn!(rc, "clock_nanosleep failed, falling back to thread::sleep");
                    std::thread::sleep(duration);
                }
                break;
            }
            req = rem;
        }
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Virtual clock that only moves when told to.
///
/// `sleep` advances the clock instead of blocking, so a run driven by this
/// timer completes instantly while keeping every phase timestamp exact.
/// Clones share the same clock.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    now_ns: Arc<AtomicU64>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        self.now_ns
            .fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// Moves the clock forward to `ts`; never moves it backwards.
    pub fn set(&self, ts: u64) {
        self.now_ns.fetch_max(ts, Ordering::SeqCst);
    }
}

impl Timer for ManualTimer {
    fn now(&self) -> u64 {
        self.now_ns.load(Ordering::SeqCst)
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}
