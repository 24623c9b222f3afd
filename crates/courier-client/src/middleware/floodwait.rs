//! Flood wait — honor server-issued "retry after D" signals.
//!
//! The wait is a protocol courtesy, not a failure: it is not counted by the
//! retry stage, and the call is resubmitted exactly once.

use async_trait::async_trait;

use courier_core::{CallContext, CallError, Request, Response, SharedClock};

use crate::invoker::{Middleware, Next};

#[derive(Clone)]
pub struct FloodWaitHandler {
    clock: SharedClock,
}

impl FloodWaitHandler {
    pub fn new(clock: SharedClock) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl Middleware for FloodWaitHandler {
    fn name(&self) -> &'static str {
        "flood_wait"
    }

    async fn handle(
        &self,
        ctx: &CallContext,
        request: &Request,
        next: Next<'_>,
    ) -> Result<Response, CallError> {
        let wait = match next.run(ctx, request).await {
            Err(CallError::FloodWait(wait)) => wait,
            other => return other,
        };

        tracing::warn!(
            method = request.method(),
            wait_secs = wait.as_secs(),
            "flood wait, sleeping before resubmitting"
        );
        ctx.guard(self.clock.sleep(wait)).await?;

        next.run(ctx, request).await
    }
}
