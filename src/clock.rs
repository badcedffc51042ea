//! Monotonic clock for admission timestamps.

use once_cell::sync::Lazy;
use std::time::Instant;

static ANCHOR: Lazy<Instant> = Lazy::new(Instant::now);

/// Nanoseconds elapsed on the process-wide monotonic clock.
#[inline]
pub fn monotonic_ns() -> u64 {
    ANCHOR.elapsed().as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotone() {
        let a = monotonic_ns();
        let b = monotonic_ns();
        assert!(b >= a);
    }
}
