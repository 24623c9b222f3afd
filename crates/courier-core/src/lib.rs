//! courier-core — shared types, configuration, clocks and backoff.
//! All other Courier crates depend on this one.

pub mod backoff;
pub mod clock;
pub mod config;
pub mod error;
pub mod rpc;
pub mod session;

pub use backoff::{Backoff, BackoffPolicy};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{CourierConfig, TelegramConfig, TransportConfig};
pub use error::{BuildError, CallError};
pub use rpc::{CallContext, ChunkRequest, FileLocation, Request, Response};
pub use session::Session;
