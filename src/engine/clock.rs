//! Wall-clock sources used to anchor event timestamps.
//!
//! Trigger timing inside a session runs on stream time (frames processed);
//! the clock only supplies the unix-millisecond offset at `start`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Trait representing a wall-clock time source for event timestamps.
pub trait TimeSource: Send + Sync {
    fn now_unix_ms(&self) -> u64;
}

/// Default time source backed by `SystemTime::now`.
#[derive(Debug, Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now_unix_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Deterministic time source for tests and replays.
#[derive(Debug, Default)]
pub struct FixedTimeSource {
    now_ms: AtomicU64,
}

impl FixedTimeSource {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl TimeSource for FixedTimeSource {
    fn now_unix_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
