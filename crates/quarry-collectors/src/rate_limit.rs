//! Per-collector admission control for outbound requests.
//!
//! A [`RateLimiter`] hands out at most `max_requests` slots per fixed window.
//! Callers beyond the budget sleep until the window rolls over. Every wait is
//! cancellable: an already-cancelled token returns [`CollectorError::Cancelled`]
//! without touching the limiter, and cancelling mid-wait wakes the caller
//! immediately.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::CollectorError;

#[derive(Debug)]
struct RateLimitWindow {
    started_at: Instant,
    count: u32,
}

/// Fixed-window limiter gating one collector's outbound requests.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    authenticated: bool,
    state: Mutex<RateLimitWindow>,
}

impl RateLimiter {
    /// A budget of zero is treated as one so `wait` can always make progress.
    #[must_use]
    pub fn new(max_requests: u32, window: Duration, authenticated: bool) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            authenticated,
            state: Mutex::new(RateLimitWindow {
                started_at: Instant::now(),
                count: 0,
            }),
        }
    }

    #[must_use]
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Block until a request slot is available.
    ///
    /// Must be called exactly once before every outbound request.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Cancelled`] if `cancel` is already cancelled
    /// or becomes cancelled while waiting.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), CollectorError> {
        if cancel.is_cancelled() {
            return Err(CollectorError::Cancelled);
        }

        loop {
            let delay = {
                let mut window = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(CollectorError::Cancelled),
                    guard = self.state.lock() => guard,
                };

                let elapsed = window.started_at.elapsed();
                if elapsed >= self.window {
                    window.started_at = Instant::now();
                    window.count = 0;
                }

                if window.count < self.max_requests {
                    window.count += 1;
                    return Ok(());
                }

                self.window.saturating_sub(window.started_at.elapsed())
            };

            tracing::trace!(
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                budget = self.max_requests,
                "rate limit budget exhausted; waiting for next window"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(CollectorError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Request budgets for a source, keyed on whether the caller is authenticated.
///
/// Hosts publish higher limits for authenticated clients; collectors build
/// their limiter from the policy once they know which credentials they hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub anonymous: u32,
    pub authenticated: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    #[must_use]
    pub fn limiter(&self, authenticated: bool) -> RateLimiter {
        let budget = if authenticated {
            self.authenticated
        } else {
            self.anonymous
        };
        RateLimiter::new(budget, self.window, authenticated)
    }
}
