//! Handler contracts driven by the coordinator.
//!
//! Each streaming convention has one trait. Implementations hold the
//! call-scoped state (the accumulator) and are dropped when the call ends;
//! they never see channels, statuses or cancellation.
//!
//! - [`Producer`] - server streaming: yields items until exhausted.
//! - [`Accumulator`] - client streaming: folds every request, answers once
//!   after the caller half-closes.
//! - [`Reactor`] - bidirectional: answers each request with zero or one
//!   response before the next request is read.

use core::{future::Future, time::Duration};
use quartet_core::Result;

/// Server-streaming handler.
pub trait Producer: Send + 'static {
    type Item: Send + 'static;

    /// Produces the next item, `None` once the stream is complete. An `Err`
    /// terminates the stream with that error.
    ///
    /// The future is dropped if the call is cancelled while it runs, so
    /// long computations must yield now and then.
    fn next_item(&mut self) -> impl Future<Output = Option<Result<Self::Item>>> + Send;

    /// Delay between consecutive items. The first item is never delayed.
    fn interval(&self) -> Duration {
        Duration::ZERO
    }
}

/// Client-streaming handler.
pub trait Accumulator: Send {
    type Request: Send;
    type Output: Send;

    /// Folds one inbound request into the accumulator. An `Err` fails the
    /// call immediately.
    fn accept(&mut self, request: Self::Request) -> Result<()>;

    /// Produces the single response. Only called after the caller
    /// half-closed.
    fn finish(self) -> Result<Self::Output>;
}

/// Bidirectional handler.
pub trait Reactor: Send + 'static {
    type Request: Send + 'static;
    type Response: Send + 'static;

    /// Reacts to one inbound request with at most one response.
    fn react(&mut self, request: Self::Request) -> Result<Option<Self::Response>>;
}
