//! Per-user ingestion quota with a fixed time window.
//!
//! The first consumption for a user opens a window of `window` duration;
//! the count accumulates until the window lapses, after which the record
//! disappears and the next consumption starts fresh. This is a fixed window,
//! not a sliding one: a burst straddling the boundary can admit up to twice
//! the ceiling in a short span. A token-bucket scheme could replace this
//! module without touching any other component's contract.
//!
//! Check-and-increment is atomic with respect to concurrent callers for the
//! same user.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct QuotaRecord {
    count: u32,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct QuotaTracker {
    records: Mutex<HashMap<String, QuotaRecord>>,
    ceiling: u32,
    window: Duration,
}

impl QuotaTracker {
    pub fn new(ceiling: u32, window: Duration) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            ceiling,
            window,
        }
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Atomically check whether `amount` more operations fit under the
    /// ceiling for `user_id`; if so, record them and return true. A lapsed
    /// record is dropped before the check, so the consumption that follows
    /// opens a new window.
    pub fn try_consume(&self, user_id: &str, amount: u32) -> bool {
        let now = Instant::now();
        let mut records = self.records.lock().unwrap();

        match records.get_mut(user_id) {
            Some(record) if record.expires_at > now => {
                if record.count.saturating_add(amount) > self.ceiling {
                    return false;
                }
                record.count += amount;
                true
            }
            _ => {
                if amount > self.ceiling {
                    return false;
                }
                records.insert(
                    user_id.to_string(),
                    QuotaRecord {
                        count: amount,
                        expires_at: now + self.window,
                    },
                );
                true
            }
        }
    }

    /// Remaining headroom in the user's current window (the full ceiling if
    /// no live window exists).
    pub fn remaining(&self, user_id: &str) -> u32 {
        let now = Instant::now();
        let records = self.records.lock().unwrap();
        match records.get(user_id) {
            Some(record) if record.expires_at > now => self.ceiling.saturating_sub(record.count),
            _ => self.ceiling,
        }
    }
}
