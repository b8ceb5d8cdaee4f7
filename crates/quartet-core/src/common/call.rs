//! Per-invocation state machine.
//!
//! Every RPC invocation owns exactly one [`Call`]. A call has two
//! [`Lane`]s: the request lane (caller to handler) and the response lane
//! (handler to caller). Each lane counts the messages that crossed it and
//! ends with a single terminal signal, either end-of-stream or failure.
//!
//! The [`Convention`] decides how many messages each lane may carry and in
//! which order the lanes may progress:
//!
//! | convention        | requests     | responses                           |
//! |-------------------|--------------|-------------------------------------|
//! | `Unary`           | exactly one  | exactly one, after the request      |
//! | `ServerStreaming` | exactly one  | any number, after the request       |
//! | `ClientStreaming` | any number   | exactly one, only after half-close  |
//! | `Bidirectional`   | any number   | at most one per observed request    |
//!
//! A call is [`CallState::Closed`] once both lanes are terminal. The lanes
//! can be split apart so two independent loops can drive them without
//! sharing a lock, then joined back at a single completion point.

use crate::{Error, Result};
use core::fmt;

/// The four RPC calling conventions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Convention {
    Unary,
    ServerStreaming,
    ClientStreaming,
    Bidirectional,
}

impl Convention {
    /// Whether the caller may send more than one request.
    pub const fn streams_requests(self) -> bool {
        matches!(self, Self::ClientStreaming | Self::Bidirectional)
    }

    /// Whether the handler may send more than one response.
    pub const fn streams_responses(self) -> bool {
        matches!(self, Self::ServerStreaming | Self::Bidirectional)
    }
}

impl fmt::Display for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unary => write!(f, "unary"),
            Self::ServerStreaming => write!(f, "server-streaming"),
            Self::ClientStreaming => write!(f, "client-streaming"),
            Self::Bidirectional => write!(f, "bidirectional"),
        }
    }
}

/// Which way a lane carries messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Caller to handler.
    Requests,
    /// Handler to caller.
    Responses,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requests => write!(f, "request"),
            Self::Responses => write!(f, "response"),
        }
    }
}

/// The single terminal signal of a lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Terminal {
    /// Normal completion; for the request lane this is the half-close.
    EndOfStream,
    /// The lane ended with an error.
    Failed,
}

/// Observable state of a [`Call`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallState {
    /// Neither lane has terminated.
    Open,
    /// The caller is done sending; responses may still flow.
    SenderDone,
    /// The handler is done responding; the caller has not half-closed.
    ReceiverDone,
    /// Both lanes are terminal.
    Closed,
}

/// One direction of a call: a message cursor plus its terminal signal.
#[derive(Clone, Debug)]
pub struct Lane {
    direction: Direction,
    streaming: bool,
    messages: u64,
    terminal: Option<Terminal>,
}

impl Lane {
    const fn new(direction: Direction, streaming: bool) -> Self {
        Self {
            direction,
            streaming,
            messages: 0,
            terminal: None,
        }
    }

    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of messages that crossed this lane so far.
    pub const fn messages(&self) -> u64 {
        self.messages
    }

    pub const fn terminal(&self) -> Option<Terminal> {
        self.terminal
    }

    pub const fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    /// Records one message and returns its 1-based position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the lane already terminated, or if a
    /// single-message lane already carried its message.
    pub fn record(&mut self) -> Result<u64> {
        if let Some(terminal) = self.terminal {
            return Err(Error::protocol(format!(
                "{} lane already terminated ({terminal:?})",
                self.direction
            )));
        }
        if !self.streaming && self.messages == 1 {
            return Err(Error::protocol(format!(
                "{} lane accepts exactly one message",
                self.direction
            )));
        }
        self.messages += 1;
        Ok(self.messages)
    }

    /// Ends the lane normally.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the lane already terminated, or if a
    /// single-message lane ends without having carried its message.
    pub fn end(&mut self) -> Result<()> {
        if let Some(terminal) = self.terminal {
            return Err(Error::protocol(format!(
                "{} lane already terminated ({terminal:?})",
                self.direction
            )));
        }
        if !self.streaming && self.messages != 1 {
            return Err(Error::protocol(format!(
                "{} lane ended after {} messages, expected exactly one",
                self.direction, self.messages
            )));
        }
        self.terminal = Some(Terminal::EndOfStream);
        Ok(())
    }

    /// Ends the lane with an error. A lane that already terminated keeps its
    /// first terminal signal.
    pub fn fail(&mut self) {
        self.terminal.get_or_insert(Terminal::Failed);
    }
}

/// The state of one RPC invocation.
#[derive(Clone, Debug)]
pub struct Call {
    convention: Convention,
    requests: Lane,
    responses: Lane,
}

impl Call {
    pub const fn new(convention: Convention) -> Self {
        Self {
            convention,
            requests: Lane::new(Direction::Requests, convention.streams_requests()),
            responses: Lane::new(Direction::Responses, convention.streams_responses()),
        }
    }

    /// Reassembles a call from lanes previously obtained with
    /// [`Call::split`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the lanes are swapped.
    pub fn join(convention: Convention, requests: Lane, responses: Lane) -> Result<Self> {
        if requests.direction != Direction::Requests || responses.direction != Direction::Responses
        {
            return Err(Error::protocol("lanes joined in the wrong order"));
        }
        Ok(Self {
            convention,
            requests,
            responses,
        })
    }

    /// Splits the call into its request and response lanes.
    pub fn split(self) -> (Lane, Lane) {
        (self.requests, self.responses)
    }

    pub const fn convention(&self) -> Convention {
        self.convention
    }

    pub const fn requests(&self) -> &Lane {
        &self.requests
    }

    pub const fn responses(&self) -> &Lane {
        &self.responses
    }

    pub const fn state(&self) -> CallState {
        match (self.requests.is_terminal(), self.responses.is_terminal()) {
            (false, false) => CallState::Open,
            (true, false) => CallState::SenderDone,
            (false, true) => CallState::ReceiverDone,
            (true, true) => CallState::Closed,
        }
    }

    pub const fn is_closed(&self) -> bool {
        matches!(self.state(), CallState::Closed)
    }

    /// Whether the call closed without any lane failing.
    pub fn succeeded(&self) -> bool {
        self.requests.terminal == Some(Terminal::EndOfStream)
            && self.responses.terminal == Some(Terminal::EndOfStream)
    }

    /// Records an inbound request.
    pub fn record_request(&mut self) -> Result<u64> {
        self.requests.record()
    }

    /// Marks the caller as done sending.
    pub fn half_close(&mut self) -> Result<()> {
        self.requests.end()
    }

    /// Records an outbound response, enforcing the ordering rules of the
    /// convention.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] when a unary, server-streaming or
    /// client-streaming handler responds before the request lane closed, or
    /// when a bidirectional handler emits more responses than requests it
    /// has observed.
    pub fn record_response(&mut self) -> Result<u64> {
        match self.convention {
            Convention::Bidirectional => {
                if self.responses.messages >= self.requests.messages {
                    return Err(Error::protocol(format!(
                        "unsolicited response {} after {} requests",
                        self.responses.messages + 1,
                        self.requests.messages
                    )));
                }
            }
            convention => {
                if !self.requests.is_terminal() {
                    return Err(Error::protocol(format!(
                        "{convention} response emitted before the request lane closed"
                    )));
                }
            }
        }
        self.responses.record()
    }

    /// Ends the response lane normally.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if a non-bidirectional call finishes
    /// before the caller half-closed, or if the response lane rejects the
    /// end (see [`Lane::end`]).
    pub fn finish(&mut self) -> Result<()> {
        if self.convention != Convention::Bidirectional && !self.requests.is_terminal() {
            return Err(Error::protocol(format!(
                "{} call finished before the request lane closed",
                self.convention
            )));
        }
        self.responses.end()
    }

    /// Terminates the response lane with a handler error. The request lane
    /// is left as is.
    pub fn reject(&mut self) {
        self.responses.fail();
    }

    /// Aborts both lanes after a transport failure.
    pub fn abort(&mut self) {
        self.requests.fail();
        self.responses.fail();
    }
}
