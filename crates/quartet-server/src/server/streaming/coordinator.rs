//! Per-convention call drivers.
//!
//! The [`Coordinator`] is the single place where a call's lanes are opened,
//! fed and closed. Service implementations hand it a request (or an inbound
//! stream) together with a handler from [`super::processor`], and it:
//!
//! - admits the call through the [`Lifecycle`],
//! - tracks the call in a [`Call`] state machine,
//! - spawns a task for server-streaming and bidirectional calls that pumps
//!   handler output into a bounded channel backing the response stream,
//! - races every blocking send, receive and pacing sleep against client
//!   disconnect and server shutdown.
//!
//! Normal completion of a response stream is the channel closing without an
//! error item. Any error item is the last item of the stream. The response
//! channel always keeps one slot free so that final error fits even when the
//! client has stopped reading.

use super::processor::{Accumulator, Producer, Reactor};
use crate::server::{
    lifecycle::Lifecycle,
    telemetry::{increment_call_errors, increment_messages_streamed},
};
use core::{future::Future, pin::Pin};
use quartet_core::{
    Error,
    call::{Call, Convention},
};
use std::sync::Arc;
use tokio::{sync::mpsc, time::sleep};
use tokio_stream::{Stream, StreamExt, wrappers::ReceiverStream};
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Boxed response stream handed back to tonic.
pub type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

type Outbound<T> = mpsc::Sender<Result<T, Status>>;
type Inbound<T> = mpsc::Receiver<Result<T, Status>>;

/// Response channel holding up to `buffer` messages plus the terminal error.
pub(crate) fn outbound<T>(buffer: usize) -> (Outbound<T>, Inbound<T>) {
    mpsc::channel(buffer.max(1).saturating_add(1))
}

/// Drives calls of every convention on behalf of the services.
#[derive(Clone, Debug)]
pub struct Coordinator {
    lifecycle: Arc<Lifecycle>,
    stream_buffer_size: usize,
}

impl Coordinator {
    /// `stream_buffer_size` bounds how many responses may queue up before
    /// the handler task waits for the client to read.
    pub const fn new(lifecycle: Arc<Lifecycle>, stream_buffer_size: usize) -> Self {
        Self {
            lifecycle,
            stream_buffer_size,
        }
    }

    pub const fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// One request in, one response or one error out.
    pub async fn unary<Req, Resp, F, Fut>(
        &self,
        method: &'static str,
        request: Req,
        handler: F,
    ) -> Result<Resp, Status>
    where
        F: FnOnce(Req) -> Fut,
        Fut: Future<Output = quartet_core::Result<Resp>>,
    {
        let _guard = self.lifecycle.admit(method, Convention::Unary)?;
        let mut call = Call::new(Convention::Unary);
        call.record_request()?;
        call.half_close()?;

        match handler(request).await {
            Ok(response) => {
                call.record_response()?;
                call.finish()?;
                Ok(response)
            }
            Err(e) => {
                call.reject();
                Err(fail(method, e))
            }
        }
    }

    /// One request in, a paced stream of producer items out.
    pub fn server_streaming<P: Producer>(
        &self,
        method: &'static str,
        producer: P,
    ) -> Result<ResponseStream<P::Item>, Status> {
        let guard = self.lifecycle.admit(method, Convention::ServerStreaming)?;
        let (tx, rx) = outbound(self.stream_buffer_size);
        let cancel = self.lifecycle.token();

        let fut = async move {
            let _guard = guard;
            let _call = drive_producer(method, producer, tx, cancel).await;
            #[cfg(feature = "tracing")]
            tracing::debug!("{method} closed in state {:?}", _call.state());
        };
        #[cfg(feature = "tracing")]
        let fut = {
            use tracing::Instrument;
            fut.instrument(tracing::info_span!("server_streaming", method))
        };
        tokio::spawn(fut);

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    /// A stream of requests in, exactly one response out once the caller
    /// half-closes.
    pub async fn client_streaming<S, A>(
        &self,
        method: &'static str,
        mut inbound: S,
        accumulator: A,
    ) -> Result<A::Output, Status>
    where
        S: Stream<Item = Result<A::Request, Status>> + Unpin + Send,
        A: Accumulator,
    {
        let _guard = self.lifecycle.admit(method, Convention::ClientStreaming)?;
        let cancel = self.lifecycle.token();

        let (_call, result) = accumulate(&mut inbound, accumulator, &cancel).await;
        #[cfg(feature = "tracing")]
        tracing::debug!("{method} closed in state {:?}", _call.state());

        result.map_err(|e| fail(method, e))
    }

    /// A stream of requests in, a reactive stream of responses out.
    pub fn bidirectional<S, R>(
        &self,
        method: &'static str,
        inbound: S,
        reactor: R,
    ) -> Result<ResponseStream<R::Response>, Status>
    where
        S: Stream<Item = Result<R::Request, Status>> + Unpin + Send + 'static,
        R: Reactor,
    {
        let guard = self.lifecycle.admit(method, Convention::Bidirectional)?;
        let (tx, rx) = outbound(self.stream_buffer_size);
        let cancel = self.lifecycle.token();

        let fut = async move {
            let _guard = guard;
            let _call = drive_reactor(method, inbound, reactor, tx, cancel).await;
            #[cfg(feature = "tracing")]
            tracing::debug!("{method} closed in state {:?}", _call.state());
        };
        #[cfg(feature = "tracing")]
        let fut = {
            use tracing::Instrument;
            fut.instrument(tracing::info_span!("bidirectional", method))
        };
        tokio::spawn(fut);

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Pumps producer items into `tx` until the producer is exhausted, fails,
/// the client disconnects, or the server shuts down. Returns the final
/// state of the call.
pub(crate) async fn drive_producer<P: Producer>(
    method: &'static str,
    mut producer: P,
    tx: Outbound<P::Item>,
    cancel: CancellationToken,
) -> Call {
    let mut call = Call::new(Convention::ServerStreaming);
    // The single request was already decoded by tonic.
    if let Err(e) = call.record_request().and_then(|_| call.half_close()) {
        abort(&mut call, &tx, method, e);
        return call;
    }
    let interval = producer.interval();

    loop {
        let item = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                abort(&mut call, &tx, method, Error::ServiceShutdown);
                return call;
            }
            () = tx.closed() => {
                abort(&mut call, &tx, method, Error::RequestCancelled);
                return call;
            }
            item = producer.next_item() => item,
        };
        let Some(item) = item else { break };

        if call.responses().messages() > 0 && !interval.is_zero() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    abort(&mut call, &tx, method, Error::ServiceShutdown);
                    return call;
                }
                () = tx.closed() => {
                    abort(&mut call, &tx, method, Error::RequestCancelled);
                    return call;
                }
                () = sleep(interval) => {}
            }
        }

        let message = match item {
            Ok(message) => message,
            Err(e) => {
                call.reject();
                terminate(&tx, fail(method, e));
                return call;
            }
        };

        if let Err(e) = call.record_response() {
            abort(&mut call, &tx, method, e);
            return call;
        }
        if let Err(e) = forward(&tx, message, &cancel).await {
            abort(&mut call, &tx, method, e);
            return call;
        }
        increment_messages_streamed(method);
    }

    if let Err(e) = call.finish() {
        abort(&mut call, &tx, method, e);
    }
    call
}

/// Folds every inbound request into the accumulator, then asks it for the
/// single response once the inbound stream ends.
pub(crate) async fn accumulate<S, A>(
    inbound: &mut S,
    mut accumulator: A,
    cancel: &CancellationToken,
) -> (Call, Result<A::Output, Error>)
where
    S: Stream<Item = Result<A::Request, Status>> + Unpin + Send,
    A: Accumulator,
{
    let mut call = Call::new(Convention::ClientStreaming);

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                call.abort();
                return (call, Err(Error::ServiceShutdown));
            }
            next = inbound.next() => next,
        };

        match next {
            Some(Ok(request)) => {
                if let Err(e) = call.record_request() {
                    call.abort();
                    return (call, Err(e));
                }
                if let Err(e) = accumulator.accept(request) {
                    call.reject();
                    return (call, Err(e));
                }
            }
            Some(Err(status)) => {
                call.abort();
                return (call, Err(aborted(&status)));
            }
            None => break,
        }
    }

    if let Err(e) = call.half_close() {
        call.abort();
        return (call, Err(e));
    }

    match accumulator.finish() {
        Ok(output) => match call.record_response().and_then(|_| call.finish()) {
            Ok(()) => (call, Ok(output)),
            Err(e) => {
                call.abort();
                (call, Err(e))
            }
        },
        Err(e) => {
            call.reject();
            (call, Err(e))
        }
    }
}

/// Feeds each inbound request to the reactor and forwards its reaction
/// before reading the next request. The response stream ends when the
/// inbound stream does.
pub(crate) async fn drive_reactor<S, R>(
    method: &'static str,
    mut inbound: S,
    mut reactor: R,
    tx: Outbound<R::Response>,
    cancel: CancellationToken,
) -> Call
where
    S: Stream<Item = Result<R::Request, Status>> + Unpin + Send,
    R: Reactor,
{
    let mut call = Call::new(Convention::Bidirectional);

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                abort(&mut call, &tx, method, Error::ServiceShutdown);
                return call;
            }
            () = tx.closed() => {
                abort(&mut call, &tx, method, Error::RequestCancelled);
                return call;
            }
            next = inbound.next() => next,
        };

        let request = match next {
            Some(Ok(request)) => request,
            Some(Err(status)) => {
                abort(&mut call, &tx, method, aborted(&status));
                return call;
            }
            None => break,
        };

        if let Err(e) = call.record_request() {
            abort(&mut call, &tx, method, e);
            return call;
        }

        match reactor.react(request) {
            Ok(Some(response)) => {
                if let Err(e) = call.record_response() {
                    abort(&mut call, &tx, method, e);
                    return call;
                }
                if let Err(e) = forward(&tx, response, &cancel).await {
                    abort(&mut call, &tx, method, e);
                    return call;
                }
                increment_messages_streamed(method);
            }
            Ok(None) => {}
            Err(e) => {
                call.reject();
                terminate(&tx, fail(method, e));
                return call;
            }
        }
    }

    if let Err(e) = call.half_close().and_then(|()| call.finish()) {
        abort(&mut call, &tx, method, e);
    }
    call
}

/// Sends one message, giving up if the server shuts down while the channel
/// is full.
///
/// Waits for two free slots and uses one, so the slot for the terminal
/// error stays free. The coordinator is the only sender, so nothing else can
/// take that slot in between.
async fn forward<T>(tx: &Outbound<T>, message: T, cancel: &CancellationToken) -> Result<(), Error> {
    let mut permits = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(Error::ServiceShutdown),
        permits = tx.reserve_many(2) => permits.map_err(|e| Error::ChannelError {
            context: format!("Failed to forward message: {e}"),
        })?,
    };
    if let Some(permit) = permits.next() {
        permit.send(Ok(message));
    }
    Ok(())
}

/// Queues the terminal error into the reserved slot. Only fails if the
/// client is gone.
fn terminate<T>(tx: &Outbound<T>, status: Status) {
    if let Err(_e) = tx.try_send(Err(status)) {
        #[cfg(feature = "tracing")]
        tracing::debug!("terminal status not delivered: {_e}");
    }
}

/// Aborts both lanes. Shutdown and protocol errors end the stream as its
/// last item; a vanished client gets nothing.
fn abort<T>(call: &mut Call, tx: &Outbound<T>, method: &'static str, err: Error) {
    call.abort();
    match err {
        Error::RequestCancelled | Error::ChannelError { .. } => {
            #[cfg(feature = "tracing")]
            tracing::debug!("{method} abandoned by client: {err}");
        }
        err => terminate(tx, fail(method, err)),
    }
}

fn aborted(status: &Status) -> Error {
    Error::Aborted {
        reason: format!("inbound stream failed: {}", status.message()),
    }
}

fn fail(method: &'static str, err: Error) -> Status {
    increment_call_errors(method);
    #[cfg(feature = "tracing")]
    tracing::warn!("{method} failed: {err}");
    err.into()
}
