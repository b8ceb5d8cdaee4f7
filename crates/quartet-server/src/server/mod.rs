//! Server-side building blocks.
//!
//! - [`config`] - CLI/environment configuration.
//! - [`handlers`] - Pure per-call business logic (accumulators, producers,
//!   reactors).
//! - [`lifecycle`] - Call admission, in-flight accounting and shutdown.
//! - [`serve`] - Transport wiring and the shutdown sequence.
//! - [`service`] - The tonic service implementations.
//! - [`store`] - Document stores and the entity store adapter.
//! - [`streaming`] - The stream coordinator driving each calling convention.
//! - [`telemetry`] - Logging, tracing and metrics setup.

pub mod config;
pub mod handlers;
pub mod lifecycle;
pub mod serve;
pub mod service;
pub mod store;
pub mod streaming;
pub mod telemetry;
