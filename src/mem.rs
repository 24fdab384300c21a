//! Cooperative low-memory backoff for the per-line loop.

use parking_lot::Mutex;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use sysinfo::{System, SystemExt};

/// Cached memory watcher; refreshes at most every `REFRESH_EVERY`.
struct MemState {
    sys: System,
    last_check: Instant,
    last_frac: f64, // available / total (0.0..1.0)
}

static STATE: OnceLock<Mutex<MemState>> = OnceLock::new();
const REFRESH_EVERY: Duration = Duration::from_millis(500);
const BACKOFF: Duration = Duration::from_millis(25);

/// Recent estimate of the available memory fraction (0.0..1.0).
pub fn available_memory_fraction() -> f64 {
    let state = STATE.get_or_init(|| {
        let mut sys = System::new();
        sys.refresh_memory();
        Mutex::new(MemState { sys, last_check: Instant::now() - REFRESH_EVERY * 2, last_frac: 1.0 })
    });
    let mut st = state.lock();
    let now = Instant::now();
    if now.duration_since(st.last_check) >= REFRESH_EVERY {
        st.sys.refresh_memory();
        let total = st.sys.total_memory() as f64;
        let avail = st.sys.available_memory() as f64;
        st.last_frac = if total > 0.0 { (avail / total).clamp(0.0, 1.0) } else { 1.0 };
        st.last_check = now;
    }
    st.last_frac
}

/// Sleeps briefly when available memory is under `threshold`. Returns whether it slept.
pub fn throttle_if_low(threshold: Option<f64>) -> bool {
    match threshold {
        Some(t) if available_memory_fraction() < t => {
            std::thread::sleep(BACKOFF);
            true
        }
        _ => false,
    }
}
