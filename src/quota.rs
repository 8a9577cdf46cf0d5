//! Write quota enforcement.
//!
//! Every PUT passes through [`QuotaTracker::reserve`] before the backend is
//! touched. The per-request ceiling is checked first so oversized bodies never
//! consume global budget, then the running total is checked and bumped in a
//! single critical section.

use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Maximum length of a single request body (1 kilobyte).
pub const MAX_CONTENT_LENGTH: u64 = 1024;

/// Maximum total storage accepted by the front end (100 megabytes).
pub const MAX_STORAGE_SIZE: u64 = 104_857_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaLimits {
    pub max_content_length: u64,
    pub max_storage_size: u64,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            max_content_length: MAX_CONTENT_LENGTH,
            max_storage_size: MAX_STORAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuotaError {
    #[error("body of {size} bytes exceeds the {limit} byte request limit")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error("{requested} bytes requested but only {available} bytes of storage left")]
    StorageExhausted { requested: u64, available: u64 },
}

/// Bytes granted to a single write. Hand it back with
/// [`QuotaTracker::release`] if the write does not go through.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a reservation must be kept or released"]
pub struct Reservation {
    size: u64,
}

impl Reservation {
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Running total of accepted bytes.
///
/// The total only grows: overwriting a key does not reclaim the bytes of the
/// value it replaces.
#[derive(Debug, Default)]
pub struct QuotaTracker {
    limits: QuotaLimits,
    used: Mutex<u64>,
}

impl QuotaTracker {
    pub fn new(limits: QuotaLimits) -> Self {
        Self {
            limits,
            used: Mutex::new(0),
        }
    }

    pub fn limits(&self) -> QuotaLimits {
        self.limits
    }

    /// Bytes accepted so far.
    pub fn usage(&self) -> u64 {
        *self.lock()
    }

    /// Admit a write of `size` bytes or reject it without changing the total.
    pub fn reserve(&self, size: u64) -> Result<Reservation, QuotaError> {
        if size > self.limits.max_content_length {
            return Err(QuotaError::PayloadTooLarge {
                size,
                limit: self.limits.max_content_length,
            });
        }

        let mut used = self.lock();
        let total = used.saturating_add(size);
        if total > self.limits.max_storage_size {
            return Err(QuotaError::StorageExhausted {
                requested: size,
                available: self.limits.max_storage_size.saturating_sub(*used),
            });
        }
        *used = total;

        Ok(Reservation { size })
    }

    /// Return the bytes of a write that never reached the store.
    pub fn release(&self, reservation: Reservation) {
        let mut used = self.lock();
        *used = used.saturating_sub(reservation.size);
    }

    // The guarded value is a plain integer, so a poisoned lock still holds a
    // usable total.
    fn lock(&self) -> MutexGuard<'_, u64> {
        self.used.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn small_tracker(max_storage_size: u64) -> QuotaTracker {
        QuotaTracker::new(QuotaLimits {
            max_content_length: 16,
            max_storage_size,
        })
    }

    #[test]
    fn test_default_limits() {
        let limits = QuotaLimits::default();
        assert_eq!(limits.max_content_length, 1024);
        assert_eq!(limits.max_storage_size, 100 * 1024 * 1024);
    }

    #[test]
    fn test_oversized_body_leaves_usage_untouched() {
        let tracker = QuotaTracker::default();
        let err = tracker.reserve(MAX_CONTENT_LENGTH + 1).unwrap_err();
        assert_eq!(
            err,
            QuotaError::PayloadTooLarge {
                size: 1025,
                limit: 1024
            }
        );
        assert_eq!(tracker.usage(), 0);
    }

    #[test]
    fn test_exact_limits_are_accepted() {
        let tracker = small_tracker(32);
        assert_eq!(tracker.reserve(16).unwrap().size(), 16);
        assert_eq!(tracker.reserve(16).unwrap().size(), 16);
        assert_eq!(tracker.usage(), 32);

        let err = tracker.reserve(1).unwrap_err();
        assert_eq!(
            err,
            QuotaError::StorageExhausted {
                requested: 1,
                available: 0
            }
        );
        assert_eq!(tracker.usage(), 32);
    }

    #[test]
    fn test_rejected_write_does_not_leave_partial_increment() {
        let tracker = small_tracker(20);
        let _first = tracker.reserve(15).unwrap();
        assert!(tracker.reserve(10).is_err());
        assert_eq!(tracker.usage(), 15);

        // Smaller write still fits in what is left.
        let _second = tracker.reserve(5).unwrap();
        assert_eq!(tracker.usage(), 20);
    }

    #[test]
    fn test_release_returns_bytes() {
        let tracker = small_tracker(20);
        let reservation = tracker.reserve(12).unwrap();
        assert_eq!(reservation.size(), 12);
        tracker.release(reservation);
        assert_eq!(tracker.usage(), 0);
    }

    #[test]
    fn test_global_ceiling_with_default_limits() {
        let tracker = QuotaTracker::default();
        let writes = MAX_STORAGE_SIZE / MAX_CONTENT_LENGTH;
        for _ in 0..writes {
            let _reservation = tracker.reserve(MAX_CONTENT_LENGTH).unwrap();
        }
        assert_eq!(tracker.usage(), MAX_STORAGE_SIZE);
        assert!(matches!(
            tracker.reserve(1),
            Err(QuotaError::StorageExhausted { .. })
        ));
    }

    #[test]
    fn test_concurrent_writers_never_overshoot() {
        let tracker = Arc::new(small_tracker(1000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || {
                    let mut accepted = 0u64;
                    for _ in 0..100 {
                        if tracker.reserve(10).is_ok() {
                            accepted += 10;
                        }
                    }
                    accepted
                })
            })
            .collect();

        let accepted: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(accepted, 1000);
        assert_eq!(tracker.usage(), 1000);
    }
}
