//! Middleware stages applied to every call.
//!
//! Fixed order, outermost first:
//!   recovery → retry → flood_wait → rate_limit → (extra) → wire

pub mod floodwait;
pub mod ratelimit;
pub mod recovery;
pub mod retry;

pub use floodwait::FloodWaitHandler;
pub use ratelimit::{RateLimiter, TokenBucket};
pub use recovery::RecoveryGuard;
pub use retry::{RetryExecutor, DEFAULT_MAX_ATTEMPTS};
