//! Invoker and middleware traits, and the ordered chain that joins them.
//!
//! A call enters the first middleware, which decides whether and how often
//! to hand it to [`Next`]. The last `Next` is the raw protocol invoker.

use std::sync::Arc;

use async_trait::async_trait;
use courier_core::{CallContext, CallError, Request, Response};

/// Anything that can perform a remote call.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, ctx: &CallContext, request: &Request) -> Result<Response, CallError>;
}

pub type SharedInvoker = Arc<dyn Invoker>;

/// One interceptor in the call chain.
///
/// Stages hold no per-call state on `self`; anything that must survive
/// between attempts lives on the stack of `handle`.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Stable name, used to check chain order.
    fn name(&self) -> &'static str;

    async fn handle(
        &self,
        ctx: &CallContext,
        request: &Request,
        next: Next<'_>,
    ) -> Result<Response, CallError>;
}

/// The remainder of the chain below a middleware. Cheap to copy, so a
/// stage may run it more than once.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
    raw: &'a dyn Invoker,
}

impl<'a> Next<'a> {
    pub async fn run(self, ctx: &CallContext, request: &Request) -> Result<Response, CallError> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    stages: rest,
                    raw: self.raw,
                };
                stage.handle(ctx, request, next).await
            }
            None => ctx.guard(self.raw.invoke(ctx, request)).await?,
        }
    }
}

/// Ordered middleware list. Index 0 is outermost.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    stages: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage inside every stage already present.
    pub fn push(&mut self, stage: Arc<dyn Middleware>) {
        self.stages.push(stage);
    }

    pub fn extend(&mut self, stages: impl IntoIterator<Item = Arc<dyn Middleware>>) {
        self.stages.extend(stages);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Wrap `raw` so every call passes through the chain.
    pub fn wrap(self, raw: SharedInvoker) -> Pipeline {
        Pipeline {
            stages: self.stages.into(),
            raw,
        }
    }
}

/// A raw invoker behind a fixed middleware chain.
#[derive(Clone)]
pub struct Pipeline {
    stages: Arc<[Arc<dyn Middleware>]>,
    raw: SharedInvoker,
}

impl Pipeline {
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl Invoker for Pipeline {
    async fn invoke(&self, ctx: &CallContext, request: &Request) -> Result<Response, CallError> {
        let next = Next {
            stages: &self.stages[..],
            raw: self.raw.as_ref(),
        };
        next.run(ctx, request).await
    }
}
