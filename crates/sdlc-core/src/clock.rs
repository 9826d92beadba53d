use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Abstracts wall-clock reads so budget logic (coordinator wall-clock,
/// deploy poll timeout) is testable without sleeping in real time.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }
}

/// Deterministic clock for tests. Starts at an arbitrary epoch and only
/// advances when told to.
pub struct FakeClock {
    now_ms: Mutex<u64>,
}

impl FakeClock {
    pub fn new(start_ms: u64) -> Self {
        Self { now_ms: Mutex::new(start_ms) }
    }

    pub fn advance(&self, delta: Duration) {
        *self.now_ms.lock() += delta.as_millis() as u64;
    }

    pub fn set(&self, now_ms: u64) {
        *self.now_ms.lock() = now_ms;
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        *self.now_ms.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances_by_exact_delta() {
        let clock = FakeClock::new(1_000);
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now_ms(), 6_000);
    }

    #[test]
    fn system_clock_is_monotonic_across_two_reads() {
        let clock = SystemClock;
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
