//! gRPC service implementations.
//!
//! Each service is a thin shell: it unpacks the tonic request, picks the
//! handler from [`crate::server::handlers`] (or the [`EntityStore`]) and
//! hands both to the shared [`Coordinator`], which owns admission, lane
//! bookkeeping and cancellation.
//!
//! ## Structure
//!
//! - [`compute`] - `ComputeService` (`CalculatorService`).
//! - [`greet`] - `GreetService` (`GreeterService`).
//! - [`entity`] - `EntityService` (`BlogService`).

pub mod compute;
pub mod entity;
pub mod greet;

pub use compute::CalculatorService;
pub use entity::BlogService;
pub use greet::GreeterService;

use crate::server::{
    config::ServerConfig,
    lifecycle::Lifecycle,
    store::{DocumentStore, EntityStore},
    streaming::Coordinator,
};
use quartet_core::{
    Error,
    proto::{
        compute_service_server::ComputeServiceServer, entity_service_server::EntityServiceServer,
        greet_service_server::GreetServiceServer,
    },
};
use std::sync::Arc;
use tonic::codec::CompressionEncoding;

/// Every service of the process, sharing one lifecycle and one store
/// handle.
#[derive(Clone)]
pub struct Services {
    lifecycle: Arc<Lifecycle>,
    store: Arc<dyn DocumentStore>,
    compute: CalculatorService,
    greet: GreeterService,
    entity: BlogService,
}

impl Services {
    pub fn new(config: &ServerConfig, store: Arc<dyn DocumentStore>) -> Self {
        let lifecycle = Arc::new(Lifecycle::new(config.shutdown_timeout));
        let coordinator = Coordinator::new(Arc::clone(&lifecycle), config.stream_buffer_size);

        Self {
            compute: CalculatorService::new(coordinator.clone(), config.stream_interval),
            greet: GreeterService::new(coordinator.clone(), config.stream_interval),
            entity: BlogService::new(coordinator, EntityStore::new(Arc::clone(&store))),
            lifecycle,
            store,
        }
    }

    pub const fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    pub fn compute_server(&self) -> ComputeServiceServer<CalculatorService> {
        ComputeServiceServer::new(self.compute.clone())
            .send_compressed(CompressionEncoding::Zstd)
            .send_compressed(CompressionEncoding::Gzip)
            .send_compressed(CompressionEncoding::Deflate)
            .accept_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Gzip)
            .accept_compressed(CompressionEncoding::Deflate)
    }

    pub fn greet_server(&self) -> GreetServiceServer<GreeterService> {
        GreetServiceServer::new(self.greet.clone())
            .send_compressed(CompressionEncoding::Zstd)
            .send_compressed(CompressionEncoding::Gzip)
            .send_compressed(CompressionEncoding::Deflate)
            .accept_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Gzip)
            .accept_compressed(CompressionEncoding::Deflate)
    }

    pub fn entity_server(&self) -> EntityServiceServer<BlogService> {
        EntityServiceServer::new(self.entity.clone())
            .send_compressed(CompressionEncoding::Zstd)
            .send_compressed(CompressionEncoding::Gzip)
            .send_compressed(CompressionEncoding::Deflate)
            .accept_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Gzip)
            .accept_compressed(CompressionEncoding::Deflate)
    }

    /// Closes the store, then stops admitting calls, drains the ones in
    /// flight and cancels the rest.
    ///
    /// The lifecycle is shut down even if closing the store fails; the store
    /// error is returned afterwards.
    pub async fn shutdown(&self) -> Result<(), Error> {
        let closed = self.store.close().await;
        self.lifecycle.shutdown().await;
        closed.map_err(Error::from)
    }
}
