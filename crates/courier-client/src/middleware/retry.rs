//! Bounded retry of transient failures with exponential backoff.

use async_trait::async_trait;

use courier_core::{BackoffPolicy, CallContext, CallError, Request, Response, SharedClock};

use crate::invoker::{Middleware, Next};

/// Default attempt budget for unauthenticated and bot clients.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Clone)]
pub struct RetryExecutor {
    max_attempts: u32,
    backoff: BackoffPolicy,
    clock: SharedClock,
}

impl RetryExecutor {
    /// `max_attempts` counts the first try. Zero is treated as one.
    pub fn new(max_attempts: u32, clock: SharedClock) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: BackoffPolicy::default(),
            clock,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[async_trait]
impl Middleware for RetryExecutor {
    fn name(&self) -> &'static str {
        "retry"
    }

    async fn handle(
        &self,
        ctx: &CallContext,
        request: &Request,
        next: Next<'_>,
    ) -> Result<Response, CallError> {
        let mut backoff = self.backoff.start();
        let mut attempt = 1;

        loop {
            let err = match next.run(ctx, request).await {
                Err(e) if e.is_transient() => e,
                other => return other,
            };

            if attempt >= self.max_attempts {
                tracing::warn!(
                    method = request.method(),
                    attempts = attempt,
                    error = %err,
                    "retry budget exhausted"
                );
                return Err(err);
            }

            let Some(delay) = backoff.next_delay() else {
                tracing::warn!(
                    method = request.method(),
                    attempts = attempt,
                    backoff_ms = backoff.spent().as_millis() as u64,
                    "retry backoff exhausted"
                );
                return Err(err);
            };

            tracing::debug!(
                method = request.method(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient failure, retrying"
            );
            ctx.guard(self.clock.sleep(delay)).await?;
            attempt += 1;
        }
    }
}
