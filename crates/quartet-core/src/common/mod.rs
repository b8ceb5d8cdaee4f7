//! Shared protocol, state and error definitions.
//!
//! ## Submodules
//!
//! - [`call`] - Per-invocation state machine shared by the server
//!   coordinator and the client driver.
//! - [`error`] - Centralized error type and its mapping onto gRPC statuses.
//! - [`types`] - Domain types that sit in front of the generated messages.
//! - [`proto`] - Generated Protobuf messages and service bindings.

pub mod call;
pub mod error;
pub mod types;

pub use error::{Error, Result};

/// gRPC service and message definitions generated from
/// `proto/quartet.proto`.
///
/// ## Services
///
/// - `EntityService` - unary CRUD over blog posts.
/// - `ComputeService` - `Sum` (unary), `FindMaximum` (bidirectional),
///   `ComputeAverage` (client streaming), `DecomposeFactors` (server
///   streaming).
/// - `GreetService` - `Greet`, `GreetManyTimes`, `LongGreet`,
///   `GreetEveryone`, one per calling convention.
pub mod proto {
    tonic::include_proto!("quartet");

    /// Encoded descriptor set, registered with the reflection service.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("quartet_descriptor");
}
