//! Provider call gate
//!
//! Single choke point for outbound reasoning calls: a bounded number of
//! concurrent permits plus a sliding-window request budget. Orchestrators
//! share one gate, so the provider's concurrent-request ceiling holds across
//! jobs and batches alike.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::debug;

/// Gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Max concurrent provider calls
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Max requests per rate window
    #[serde(default = "default_max_requests_per_window")]
    pub max_requests_per_window: u32,

    /// Rate limit window duration in seconds
    #[serde(default = "default_rate_window_secs")]
    pub rate_window_secs: u64,
}

fn default_max_concurrent() -> usize {
    4
}

fn default_max_requests_per_window() -> u32 {
    60
}

fn default_rate_window_secs() -> u64 {
    60
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            max_requests_per_window: 60,
            rate_window_secs: 60,
        }
    }
}

impl GateConfig {
    /// Get the rate window as a Duration
    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }
}

struct GateInner {
    running: usize,
    request_times: VecDeque<Instant>,
}

/// Bounded-concurrency gate for provider calls
pub struct CallGate {
    config: GateConfig,
    inner: Mutex<GateInner>,
    notify: Notify,
}

impl CallGate {
    pub fn new(config: GateConfig) -> Self {
        debug!(?config, "CallGate::new: called");
        Self {
            config,
            inner: Mutex::new(GateInner {
                running: 0,
                request_times: VecDeque::new(),
            }),
            notify: Notify::new(),
        }
    }

    /// Wait until a slot is free and the rate window has room, then take a
    /// permit. The permit is released on drop.
    pub async fn acquire(&self) -> GatePermit<'_> {
        loop {
            // Register interest before checking state so a release between
            // the check and the await cannot be missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let wait = {
                let mut inner = self.lock();
                let now = Instant::now();
                let window_start = now - self.config.rate_window();
                while inner
                    .request_times
                    .front()
                    .map(|t| *t < window_start)
                    .unwrap_or(false)
                {
                    inner.request_times.pop_front();
                }

                if inner.running < self.config.max_concurrent {
                    if (inner.request_times.len() as u32) < self.config.max_requests_per_window {
                        inner.running += 1;
                        inner.request_times.push_back(now);
                        return GatePermit { gate: self };
                    }
                    // Window full: wait until the oldest request ages out
                    inner
                        .request_times
                        .front()
                        .map(|oldest| self.config.rate_window().saturating_sub(now - *oldest))
                } else {
                    None
                }
            };

            match wait {
                Some(delay) => {
                    debug!(?delay, "CallGate::acquire: rate window full, sleeping");
                    tokio::time::sleep(delay.max(Duration::from_millis(10))).await;
                }
                None => notified.await,
            }
        }
    }

    /// Number of permits currently held
    pub fn in_flight(&self) -> usize {
        self.lock().running
    }

    fn lock(&self) -> MutexGuard<'_, GateInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// RAII permit for one provider call (held across its retries)
pub struct GatePermit<'a> {
    gate: &'a CallGate,
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        let mut inner = self.gate.lock();
        inner.running = inner.running.saturating_sub(1);
        drop(inner);
        self.gate.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_limit() {
        let gate = CallGate::new(GateConfig {
            max_concurrent: 2,
            max_requests_per_window: 100,
            rate_window_secs: 60,
        });

        let first = gate.acquire().await;
        let _second = gate.acquire().await;
        assert_eq!(gate.in_flight(), 2);

        // Third acquire must wait for a free slot
        let blocked = tokio::time::timeout(Duration::from_millis(50), gate.acquire()).await;
        assert!(blocked.is_err());

        drop(first);
        let _third = tokio::time::timeout(Duration::from_secs(1), gate.acquire())
            .await
            .expect("a slot should open after release");
        assert_eq!(gate.in_flight(), 2);
    }

    #[tokio::test]
    async fn test_rate_window_blocks_excess_requests() {
        let gate = CallGate::new(GateConfig {
            max_concurrent: 10,
            max_requests_per_window: 2,
            rate_window_secs: 60,
        });

        drop(gate.acquire().await);
        drop(gate.acquire().await);

        // Concurrency is free, but the window budget is spent
        let blocked = tokio::time::timeout(Duration::from_millis(50), gate.acquire()).await;
        assert!(blocked.is_err());
    }

    #[tokio::test]
    async fn test_permits_release_on_drop() {
        let gate = CallGate::new(GateConfig::default());
        {
            let _permit = gate.acquire().await;
            assert_eq!(gate.in_flight(), 1);
        }
        assert_eq!(gate.in_flight(), 0);
    }
}
