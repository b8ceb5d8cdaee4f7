//! Transport wiring: health, reflection, gRPC-Web and the ordered shutdown
//! sequence.

use crate::server::service::{BlogService, CalculatorService, GreeterService, Services};
use core::future::Future;
use futures::Stream;
use quartet_core::proto::{
    FILE_DESCRIPTOR_SET, compute_service_server::ComputeServiceServer,
    entity_service_server::EntityServiceServer, greet_service_server::GreetServiceServer,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tonic::transport::{Server, server::Connected};
use tonic_health::server::HealthReporter;
use tonic_reflection::server::Builder;
use tonic_web::GrpcWebLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

/// Serves every service on `incoming` until `signal` resolves, then runs
/// the shutdown sequence:
///
/// 1. Publish not-serving on the health service.
/// 2. Close the store, refuse new calls, drain and cancel in-flight calls.
/// 3. Let tonic stop accepting connections and close the listener.
pub async fn serve_with_incoming<I, IO, IE, F>(
    services: Services,
    incoming: I,
    signal: F,
) -> anyhow::Result<()>
where
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<tower::BoxError>,
    F: Future<Output = ()>,
{
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    set_serving(&health_reporter, true).await;

    let reflection = Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    Server::builder()
        .accept_http1(true)
        .http2_adaptive_window(Some(true))
        .layer(
            ServiceBuilder::new()
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(GrpcWebLayer::new()),
        )
        .add_service(health_service)
        .add_service(reflection)
        .add_service(services.entity_server())
        .add_service(services.compute_server())
        .add_service(services.greet_server())
        .serve_with_incoming_shutdown(
            incoming,
            shutdown_sequence(signal, services, health_reporter),
        )
        .await?;

    #[cfg(feature = "tracing")]
    tracing::info!("Service shut down successfully");
    Ok(())
}

async fn shutdown_sequence<F: Future<Output = ()>>(
    signal: F,
    services: Services,
    health_reporter: HealthReporter,
) {
    signal.await;

    #[cfg(feature = "tracing")]
    tracing::info!("Shutdown signal received, terminating gracefully...");

    // 1. Publish the status
    set_serving(&health_reporter, false).await;

    // 2. Close the store and drain calls
    if let Err(_e) = services.shutdown().await {
        #[cfg(feature = "tracing")]
        tracing::error!("Error during service shutdown: {:?}", _e);
    }
}

async fn set_serving(reporter: &HealthReporter, serving: bool) {
    if serving {
        reporter
            .set_serving::<EntityServiceServer<BlogService>>()
            .await;
        reporter
            .set_serving::<ComputeServiceServer<CalculatorService>>()
            .await;
        reporter
            .set_serving::<GreetServiceServer<GreeterService>>()
            .await;
    } else {
        reporter
            .set_not_serving::<EntityServiceServer<BlogService>>()
            .await;
        reporter
            .set_not_serving::<ComputeServiceServer<CalculatorService>>()
            .await;
        reporter
            .set_not_serving::<GreetServiceServer<GreeterService>>()
            .await;
    }
}
