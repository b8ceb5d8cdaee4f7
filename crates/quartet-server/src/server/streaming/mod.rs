//! Streaming machinery shared by all services.
//!
//! - [`processor`] defines what a handler has to provide for each calling
//!   convention.
//! - [`coordinator`] runs those handlers: admission, lane bookkeeping,
//!   pacing, back-pressure and cancellation.

pub mod coordinator;
pub mod processor;

pub use coordinator::{Coordinator, ResponseStream};
pub use processor::{Accumulator, Producer, Reactor};
