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
const MAX_WAIT: Duration = Duration::from_secs(30);

/// Returns a recent estimate of available memory fraction (0.0..1.0).
pub fn available_memory_fraction() -> f64 {
    let m = STATE.get_or_init(|| {
        let mut s = System::new();
        s.refresh_memory();
        Mutex::new(MemState { sys: s, last_check: Instant::now() - REFRESH_EVERY * 2, last_frac: 1.0 })
    });
    let mut st = m.lock();
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

/// Gate before loading a partition: wait (bounded) while available memory is below `threshold`,
/// giving the previous partition's buffers time to be returned. A threshold of 0 disables it.
pub fn wait_for_memory(threshold: f64, label: &str) {
    if threshold <= 0.0 {
        return;
    }
    let start = Instant::now();
    let mut warned = false;
    while available_memory_fraction() < threshold {
        if start.elapsed() >= MAX_WAIT {
            tracing::warn!("Memory still below {:.0}% after {:?}; loading {} anyway", threshold * 100.0, MAX_WAIT, label);
            return;
        }
        if !warned {
            tracing::info!("Low memory, delaying {}", label);
            warned = true;
        }
        std::thread::sleep(Duration::from_millis(250));
    }
}
