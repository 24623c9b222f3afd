//! courier-client — resilient call pipeline, client construction and
//! chunked file retrieval on top of an injected protocol transport.

pub mod dialer;
pub mod factory;
pub mod fetch;
pub mod invoker;
pub mod middleware;
pub mod storage;


pub use dialer::{dialer_for, Dialer, DirectDialer, SharedDialer, Socks5Dialer};
pub use factory::{
    Client, ClientFactory, DeviceConfig, Transport, TransportOptions, BOT_SESSION_PREFIX,
    NO_AUTH_BURST, NO_AUTH_RATE,
};
pub use fetch::{ChunkedFetcher, FetchError, InvalidChunkLimit, DEFAULT_CHUNK_LIMIT};
pub use invoker::{Invoker, Middleware, MiddlewareChain, Next, Pipeline, SharedInvoker};
pub use middleware::{
    FloodWaitHandler, RateLimiter, RecoveryGuard, RetryExecutor, DEFAULT_MAX_ATTEMPTS,
};
pub use storage::{
    session_key, FileStorage, MemoryStorage, SessionStorage, SessionStore, SharedStorage,
};
