//! Time source used by the polling loops.
use std::time::Duration;

pub trait Clock: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Wall clock, it really sleeps.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
