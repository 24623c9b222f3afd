//! Recovery — outermost guard against internal faults.
//!
//! A panic anywhere below this stage, or an `Internal` error from the
//! server, is retried under a capped exponential backoff. When the backoff
//! budget is spent the fault surfaces as a plain `Transient` error. Nothing
//! unwinds out of the pipeline.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;

use courier_core::{BackoffPolicy, CallContext, CallError, Request, Response, SharedClock};

use crate::invoker::{Middleware, Next};

#[derive(Clone)]
pub struct RecoveryGuard {
    backoff: BackoffPolicy,
    clock: SharedClock,
}

impl RecoveryGuard {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            clock,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

#[async_trait]
impl Middleware for RecoveryGuard {
    fn name(&self) -> &'static str {
        "recovery"
    }

    async fn handle(
        &self,
        ctx: &CallContext,
        request: &Request,
        next: Next<'_>,
    ) -> Result<Response, CallError> {
        let mut backoff = self.backoff.start();

        loop {
            let fault = match AssertUnwindSafe(next.run(ctx, request)).catch_unwind().await {
                Ok(Err(CallError::Internal(msg))) => msg,
                Ok(result) => return result,
                Err(panic) => format!("panic: {}", panic_message(&*panic)),
            };

            let Some(delay) = backoff.next_delay() else {
                tracing::warn!(
                    method = request.method(),
                    fault = %fault,
                    backoff_ms = backoff.spent().as_millis() as u64,
                    "internal fault persisted, giving up"
                );
                return Err(CallError::Transient(format!("recovered internal fault: {fault}")));
            };

            tracing::warn!(
                method = request.method(),
                fault = %fault,
                delay_ms = delay.as_millis() as u64,
                "internal fault, recovering"
            );
            ctx.guard(self.clock.sleep(delay)).await?;
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
