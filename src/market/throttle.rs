//! Outbound call spacing.
//!
//! The market API allows as little as one call every few seconds. Every
//! request goes through `Throttle::acquire`, which hands out start slots
//! at least `min_interval` apart regardless of how many tasks are waiting.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

pub struct Throttle {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Wait for the next free slot and claim it.
    pub async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let mut next = self.next_slot.lock().await;
        let now = Instant::now();
        let slot = match *next {
            Some(at) if at > now => at,
            _ => now,
        };
        *next = Some(slot + self.min_interval);

        if slot > now {
            debug!(wait_ms = (slot - now).as_millis() as u64, "Throttling market call");
            // Holding the lock while sleeping keeps slots strictly ordered.
            tokio::time::sleep_until(slot).await;
        }
    }
}
