#![forbid(unsafe_code)]
//! ragq-core library.
//!
//! Request-scoped data model, typed filters, settings, deadlines, and the
//! error taxonomy shared by the retrieval pipeline and its callers.
//!
//! # Conventions
//!
//! - **Errors**: library failures are [`error::RetrievalError`]; config loading
//!   uses `anyhow::Result` with file context.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod config;
pub mod deadline;
pub mod error;
pub mod model;

pub use deadline::{CancelToken, Deadline};
pub use error::{ErrorCode, RetrievalError};
