//! Error types for the quartet services.
//!
//! This module defines the central `Error` enum, which captures every
//! recoverable and reportable failure of a call. It implements
//! `From<Error>` for `tonic::Status` so handlers can propagate errors with
//! `?` and have them surface to clients with the matching status code.
//!
//! ## Error Cases
//! - `InvalidArgument`: malformed identifier or out-of-domain numeric input.
//! - `NotFound`: no record matched a read, update or delete.
//! - `Store`: the underlying document store failed.
//! - `ChannelError`: an internal send/receive between tasks failed.
//! - `Protocol`: a call broke the rules of its calling convention.
//! - `Aborted`: the transport failed mid-call.
//! - `RequestCancelled`: the client went away.
//! - `ServiceShutdown`: a call arrived or was still running during shutdown.
//! - `Rpc` / `Connect`: client-side wrappers around a status or a dial
//!   failure.

use tonic::{Code, Status};

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the quartet services and client driver.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// The request carried a malformed identifier or an out-of-domain value.
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// No record matched the requested identifier.
    #[error("Not found: {reason}")]
    NotFound { reason: String },

    /// The document store failed. The store's own error is flattened into
    /// `context` so store types never cross the adapter boundary.
    #[error("Store error: {context}")]
    Store { context: String },

    /// Internal channel send/receive failure (e.g., closed or full channel).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// A message was recorded against a lane that does not accept it.
    #[error("Protocol violation: {reason}")]
    Protocol { reason: String },

    /// The transport failed while the call was in flight.
    #[error("Call aborted: {reason}")]
    Aborted { reason: String },

    /// The client aborted the request.
    #[error("Request cancelled by client")]
    RequestCancelled,

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,

    /// A status returned by the remote end.
    #[error("RPC failed: {0}")]
    Rpc(#[from] Status),

    /// The client could not reach the server.
    #[error("Connection failed: {context}")]
    Connect { context: String },
}

impl Error {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound {
            reason: reason.into(),
        }
    }

    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
        }
    }

    /// The gRPC status code this error surfaces as.
    pub fn code(&self) -> Code {
        match self {
            Self::InvalidArgument { .. } => Code::InvalidArgument,
            Self::NotFound { .. } => Code::NotFound,
            Self::Store { .. } | Self::ChannelError { .. } | Self::Protocol { .. } => {
                Code::Internal
            }
            Self::Aborted { .. } => Code::Aborted,
            Self::RequestCancelled => Code::Cancelled,
            Self::ServiceShutdown | Self::Connect { .. } => Code::Unavailable,
            Self::Rpc(status) => status.code(),
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidArgument { reason } => Status::invalid_argument(reason),
            Error::NotFound { reason } => Status::not_found(reason),
            Error::Store { context } => Status::internal(format!("Store error: {context}")),
            Error::ChannelError { context } => {
                Status::internal(format!("Channel error: {context}"))
            }
            Error::Protocol { reason } => {
                Status::internal(format!("Protocol violation: {reason}"))
            }
            Error::Aborted { reason } => Status::aborted(reason),
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
            Error::Rpc(status) => status,
            Error::Connect { context } => Status::unavailable(context),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_kind() {
        let cases = [
            (Error::invalid_argument("bad id"), Code::InvalidArgument),
            (Error::not_found("no blog"), Code::NotFound),
            (
                Error::Store {
                    context: "disk full".into(),
                },
                Code::Internal,
            ),
            (Error::protocol("early response"), Code::Internal),
            (
                Error::Aborted {
                    reason: "reset".into(),
                },
                Code::Aborted,
            ),
            (Error::RequestCancelled, Code::Cancelled),
            (Error::ServiceShutdown, Code::Unavailable),
        ];

        for (err, code) in cases {
            assert_eq!(err.code(), code, "{err}");
            assert_eq!(Status::from(err).code(), code);
        }
    }

    #[test]
    fn invalid_argument_keeps_reason_as_message() {
        let status = Status::from(Error::invalid_argument("Cannot parse blog id"));
        assert_eq!(status.message(), "Cannot parse blog id");
    }

    #[test]
    fn remote_status_passes_through() {
        let err = Error::from(Status::not_found("Blog not found"));
        assert_eq!(err.code(), Code::NotFound);
        let status = Status::from(err);
        assert_eq!(status.code(), Code::NotFound);
        assert_eq!(status.message(), "Blog not found");
    }
}
