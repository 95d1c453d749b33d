//! Async runtime for a single reconciliation run: concurrent source fetch,
//! ctrl-c cancellation, tracing setup.

mod error;
mod runtime;
pub mod telemetry;

pub use error::RuntimeError;
pub use runtime::{block_on, collect_concurrent, plan_once, run_once};
pub use telemetry::{init_tracing, LogFormat};
