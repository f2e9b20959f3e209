//! Store entries and expiry arithmetic.
//!
//! Deadlines are absolute wall-clock instants in milliseconds since the Unix
//! epoch, so they stay meaningful across a process restart.

use std::time::{SystemTime, UNIX_EPOCH};

/// Deadline sentinel for entries that never expire (TTL of zero at set time)
pub const NEVER_EXPIRES: u64 = u64::MAX;

/// Current wall-clock time in milliseconds since the Unix epoch
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Absolute deadline for a relative TTL
pub(crate) fn deadline_ms(ttl_ms: u64) -> u64 {
    if ttl_ms == 0 {
        NEVER_EXPIRES
    } else {
        now_ms().saturating_add(ttl_ms)
    }
}

/// TTL to re-apply when replaying a persisted deadline at startup. A deadline
/// that already passed maps to a minimal positive TTL so the entry is swept
/// promptly instead of coming back as non-expiring.
pub(crate) fn remaining_ttl_ms(expires_at_ms: u64, now_ms: u64) -> u64 {
    if expires_at_ms == NEVER_EXPIRES {
        0
    } else if expires_at_ms > now_ms {
        expires_at_ms - now_ms
    } else {
        1
    }
}

/// Entry in the store with value and expiry deadline
#[derive(Debug, Clone)]
pub(crate) struct Entry<V> {
    pub(crate) value: V,
    pub(crate) expires_at_ms: u64,
}

impl<V> Entry<V> {
    pub(crate) fn new(value: V, ttl_ms: u64) -> Self {
        Self {
            value,
            expires_at_ms: deadline_ms(ttl_ms),
        }
    }

    /// Strict comparison: an entry exactly at its deadline is still valid
    pub(crate) fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms > self.expires_at_ms
    }
}
