//! Request throttling
//!
//! This module handles:
//! - Global concurrency limiting via a semaphore
//! - A minimum delay between the starts of two requests
//!
//! The Open Data API is a single host, so a single throttle is shared by
//! discovery and document requests.

use crate::{CrawlError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Permission to send one request; the slot is released on drop
pub struct ThrottlePermit {
    _permit: OwnedSemaphorePermit,
}

/// Limits the number of requests in flight and spaces their starts
pub struct RequestThrottle {
    /// Global semaphore for limiting concurrent requests
    semaphore: Arc<Semaphore>,

    /// Minimum time between two request starts
    delay: Duration,

    /// Earliest instant at which the next request may start
    next_slot: Mutex<Option<Instant>>,
}

impl RequestThrottle {
    /// Creates a new throttle
    ///
    /// # Arguments
    ///
    /// * `max_concurrent` - Maximum number of outstanding requests (at least 1)
    /// * `delay` - Minimum spacing between request starts
    pub fn new(max_concurrent: usize, delay: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            delay,
            next_slot: Mutex::new(None),
        }
    }

    /// Waits until a request may be sent
    ///
    /// This method:
    /// 1. Acquires a concurrency permit
    /// 2. Reserves the next start slot
    /// 3. Sleeps until that slot is reached
    ///
    /// # Returns
    ///
    /// * `Ok(ThrottlePermit)` - Hold this while the request is in flight
    /// * `Err(CrawlError::Throttle)` - The semaphore was closed
    pub async fn acquire(&self) -> Result<ThrottlePermit> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| CrawlError::Throttle)?;

        let wait = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let start = match *next_slot {
                Some(slot) if slot > now => slot,
                _ => now,
            };
            *next_slot = Some(start + self.delay);
            start.saturating_duration_since(now)
        };

        if !wait.is_zero() {
            tracing::trace!("Throttling request for {:?}", wait);
            tokio::time::sleep(wait).await;
        }

        Ok(ThrottlePermit { _permit: permit })
    }

    /// Number of requests that could start right now without waiting for a permit
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}
