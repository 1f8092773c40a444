use std::borrow::Cow;
use std::time::{Duration, Instant};

use log::Level;

const TARGET: &str = "fxhost::timing";

/// Logs how long a scope took when dropped.
///
/// Scans, computes and single renders are timed with this so `RUST_LOG`
/// can surface slow plugins without extra instrumentation.
pub struct ScopedTimer {
    label: Option<Cow<'static, str>>,
    level: Level,
    start: Instant,
}

impl ScopedTimer {
    pub fn new(label: impl Into<Cow<'static, str>>, level: Level) -> Self {
        let label = log::log_enabled!(target: TARGET, level).then(|| label.into());
        Self {
            label,
            level,
            start: Instant::now(),
        }
    }

    pub fn info(label: impl Into<Cow<'static, str>>) -> Self {
        Self::new(label, Level::Info)
    }

    /// For per-frame work: the label is only formatted when debug logging is on.
    pub fn debug_lazy(label: impl FnOnce() -> String) -> Self {
        let label = log::log_enabled!(target: TARGET, Level::Debug).then(|| Cow::Owned(label()));
        Self {
            label,
            level: Level::Debug,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed().as_millis()
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        if let Some(label) = &self.label {
            let ms = self.elapsed().as_secs_f64() * 1000.0;
            log::log!(target: TARGET, self.level, "{} took {:.2} ms", label, ms);
        }
    }
}

/// Runs `f` and logs its duration at info level.
pub fn measure_info<T>(label: impl Into<Cow<'static, str>>, f: impl FnOnce() -> T) -> T {
    let _timer = ScopedTimer::info(label);
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_info_returns_result() {
        let value = measure_info("sum", || (1..=4).sum::<i32>());
        assert_eq!(value, 10);
    }

    #[test]
    fn test_elapsed_grows() {
        let timer = ScopedTimer::info("sleep");
        std::thread::sleep(Duration::from_millis(2));
        assert!(timer.elapsed() >= Duration::from_millis(2));
    }
}
