//! Client construction — dialer, device descriptor, session storage and the
//! middleware chain assembled into a ready-to-use [`Client`].
//!
//! Chain order is fixed:
//!   recovery → retry → flood_wait → rate_limit → extra middlewares → wire

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use courier_core::{
    BuildError, CallContext, CallError, CourierConfig, Request, Response, Session, SharedClock,
    SystemClock, TelegramConfig, TransportConfig,
};

use crate::dialer::{dialer_for, SharedDialer};
use crate::fetch::ChunkedFetcher;
use crate::invoker::{Invoker, Middleware, MiddlewareChain, Pipeline, SharedInvoker};
use crate::middleware::{
    FloodWaitHandler, RateLimiter, RecoveryGuard, RetryExecutor, DEFAULT_MAX_ATTEMPTS,
};
use crate::storage::{session_key, MemoryStorage, SessionStore, SharedStorage};

/// Fixed throttle for unauthenticated clients, independent of config.
pub const NO_AUTH_RATE: Duration = Duration::from_millis(100);
pub const NO_AUTH_BURST: u32 = 5;

/// Namespace for token-keyed bot sessions.
pub const BOT_SESSION_PREFIX: &str = "botsession";

/// Device descriptor sent to the server at connection setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub device_model: String,
    pub system_version: String,
    pub app_version: String,
    pub system_lang_code: String,
    pub lang_pack: String,
    pub lang_code: String,
}

impl From<&TelegramConfig> for DeviceConfig {
    fn from(tg: &TelegramConfig) -> Self {
        Self {
            device_model: tg.device_model.clone(),
            system_version: tg.system_version.clone(),
            app_version: tg.app_version.clone(),
            system_lang_code: tg.system_lang_code.clone(),
            lang_pack: tg.lang_pack.clone(),
            lang_code: tg.lang_code.clone(),
        }
    }
}

/// Everything the protocol layer needs to open a connection.
#[derive(Clone)]
pub struct TransportOptions {
    pub app_id: i32,
    pub app_hash: String,
    pub device: DeviceConfig,
    pub dialer: SharedDialer,
    pub session: SessionStore,
    /// Connection-level retries, separate from the call-level retry stage.
    pub retry_interval: Duration,
    pub max_retries: u32,
    pub dial_timeout: Duration,
}

/// The protocol layer: turns transport options into a raw invoker.
pub trait Transport: Send + Sync {
    fn open(&self, options: TransportOptions) -> Result<SharedInvoker, BuildError>;
}

/// A constructed client. Cheap to clone; clones share the rate limiter.
#[derive(Clone)]
pub struct Client {
    pipeline: Pipeline,
    options: Arc<TransportOptions>,
}

impl Client {
    pub async fn call(&self, ctx: &CallContext, request: &Request) -> Result<Response, CallError> {
        self.pipeline.invoke(ctx, request).await
    }

    /// Chunked reader over this client.
    pub fn fetcher(&self) -> ChunkedFetcher {
        ChunkedFetcher::new(Arc::new(self.clone()))
    }

    /// Middleware names, outermost first.
    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.pipeline.names()
    }

    pub fn options(&self) -> &TransportOptions {
        &self.options
    }
}

#[async_trait]
impl Invoker for Client {
    async fn invoke(&self, ctx: &CallContext, request: &Request) -> Result<Response, CallError> {
        self.call(ctx, request).await
    }
}

pub struct ClientFactory {
    telegram: TelegramConfig,
    transport_config: TransportConfig,
    transport: Arc<dyn Transport>,
    clock: SharedClock,
    extra: Vec<Arc<dyn Middleware>>,
}

impl ClientFactory {
    pub fn new(config: &CourierConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            telegram: config.telegram.clone(),
            transport_config: config.transport.clone(),
            transport,
            clock: SystemClock::shared(),
            extra: Vec::new(),
        }
    }

    /// Clock used by every timing stage of clients built from here on.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Middlewares installed inside the rate limiter, in order.
    pub fn with_middlewares(mut self, extra: Vec<Arc<dyn Middleware>>) -> Self {
        self.extra = extra;
        self
    }

    /// Client without user authorization. Always throttled at a fixed
    /// conservative rate.
    pub fn no_auth(&self, storage: SessionStore) -> Result<Client, BuildError> {
        let limiter = RateLimiter::new(NO_AUTH_RATE, NO_AUTH_BURST, self.clock.clone());
        let chain = self.chain(DEFAULT_MAX_ATTEMPTS, Some(limiter));
        self.build(storage, chain)
    }

    /// Client authorized by a string session. The session is decoded and
    /// held in fresh in-memory storage.
    pub async fn auth(&self, session_string: &str) -> Result<Client, BuildError> {
        let session = Session::from_string_session(session_string)?;
        let store = SessionStore::new(Arc::new(MemoryStorage::new()), "session");
        store.save(&session).await.map_err(BuildError::Storage)?;

        let limiter = self.configured_limiter();
        let chain = self.chain(DEFAULT_MAX_ATTEMPTS, Some(limiter));
        self.build(store, chain)
    }

    /// Bot client whose session lives in `storage` under `botsession:<token>`.
    /// Throttled only when `rate_limit` is enabled.
    pub fn bot(&self, storage: SharedStorage, token: &str, retries: u32) -> Result<Client, BuildError> {
        let store = SessionStore::new(storage, session_key(BOT_SESSION_PREFIX, token));
        let limiter = self.telegram.rate_limit.then(|| self.configured_limiter());
        let chain = self.chain(retries, limiter);
        self.build(store, chain)
    }

    /// Assemble a client around an explicit chain.
    pub fn build(&self, session: SessionStore, chain: MiddlewareChain) -> Result<Client, BuildError> {
        let dial_timeout = self.transport_config.dial_timeout();
        let dialer = dialer_for(&self.telegram.proxy, dial_timeout)?;

        let options = TransportOptions {
            app_id: self.telegram.app_id,
            app_hash: self.telegram.app_hash.clone(),
            device: DeviceConfig::from(&self.telegram),
            dialer,
            session,
            retry_interval: self.transport_config.retry_interval(),
            max_retries: self.transport_config.max_retries,
            dial_timeout,
        };

        let raw = self.transport.open(options.clone())?;
        let pipeline = chain.wrap(raw);

        tracing::info!(
            session = options.session.key().split(':').next().unwrap_or(""),
            middlewares = ?pipeline.names(),
            proxied = !self.telegram.proxy.is_empty(),
            "client ready"
        );

        Ok(Client {
            pipeline,
            options: Arc::new(options),
        })
    }

    /// The standard chain, with an optional rate limiter and any extras.
    pub fn chain(&self, retries: u32, limiter: Option<RateLimiter>) -> MiddlewareChain {
        let mut chain = MiddlewareChain::new();
        chain.push(Arc::new(RecoveryGuard::new(self.clock.clone())));
        chain.push(Arc::new(RetryExecutor::new(retries, self.clock.clone())));
        chain.push(Arc::new(FloodWaitHandler::new(self.clock.clone())));
        if let Some(limiter) = limiter {
            chain.push(Arc::new(limiter));
        }
        chain.extend(self.extra.iter().cloned());
        chain
    }

    fn configured_limiter(&self) -> RateLimiter {
        RateLimiter::new(
            self.telegram.rate_interval(),
            self.telegram.rate_burst,
            self.clock.clone(),
        )
    }
}
