//! Rate limiting — client-side token bucket in front of the wire.
//!
//! One token refills every `interval`, up to `burst` tokens. The bucket
//! starts full. Each call costs 1 token. Empty bucket = wait.
//!
//! A zero interval means unlimited (never throttled).

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use courier_core::{CallContext, CallError, Request, Response, SharedClock};

use crate::invoker::{Middleware, Next};

#[derive(Debug)]
pub struct TokenBucket {
    tokens: u32,
    capacity: u32,
    interval: Duration,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(interval: Duration, burst: u32, now: Instant) -> Self {
        let capacity = burst.max(1);
        Self {
            tokens: capacity,
            capacity,
            interval,
            last_refill: now,
        }
    }

    /// Take a token, or return how long until the next one refills.
    pub fn try_take(&mut self, now: Instant) -> Result<(), Duration> {
        if self.interval.is_zero() {
            return Ok(());
        }

        self.refill(now);

        if self.tokens > 0 {
            self.tokens -= 1;
            Ok(())
        } else {
            let since = now.saturating_duration_since(self.last_refill);
            Err(self.interval.saturating_sub(since))
        }
    }

    pub fn tokens(&self) -> u32 {
        self.tokens
    }

    fn refill(&mut self, now: Instant) {
        if self.tokens >= self.capacity {
            self.last_refill = now;
            return;
        }

        let elapsed = now.saturating_duration_since(self.last_refill);
        let earned = elapsed.as_nanos() / self.interval.as_nanos();
        if earned == 0 {
            return;
        }

        let room = u128::from(self.capacity - self.tokens);
        if earned >= room {
            self.tokens = self.capacity;
            self.last_refill = now;
        } else {
            // earned < room <= u32::MAX
            self.tokens += earned as u32;
            self.last_refill += self.interval * earned as u32;
        }
    }
}

/// Token-bucket middleware. Clones share one bucket.
#[derive(Clone)]
pub struct RateLimiter {
    bucket: Arc<Mutex<TokenBucket>>,
    clock: SharedClock,
}

impl RateLimiter {
    pub fn new(interval: Duration, burst: u32, clock: SharedClock) -> Self {
        let bucket = TokenBucket::new(interval, burst, clock.now());
        Self {
            bucket: Arc::new(Mutex::new(bucket)),
            clock,
        }
    }

    /// Wait for a token. Waiters are served in arrival order; the bucket
    /// lock is held while the head waiter sleeps.
    pub async fn acquire(&self, ctx: &CallContext) -> Result<(), CallError> {
        let mut bucket = ctx.guard(self.bucket.lock()).await?;
        loop {
            match bucket.try_take(self.clock.now()) {
                Ok(()) => return Ok(()),
                Err(wait) => {
                    tracing::trace!(wait_ms = wait.as_millis() as u64, "rate limit: waiting for token");
                    ctx.guard(self.clock.sleep(wait)).await?;
                }
            }
        }
    }

    pub async fn available(&self) -> u32 {
        self.bucket.lock().await.tokens()
    }
}

#[async_trait]
impl Middleware for RateLimiter {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn handle(
        &self,
        ctx: &CallContext,
        request: &Request,
        next: Next<'_>,
    ) -> Result<Response, CallError> {
        self.acquire(ctx).await?;
        next.run(ctx, request).await
    }
}
