use crate::server::{
    handlers::{GreetEveryone, LongGreeting, RepeatedGreeting, first_name, greet},
    streaming::{Coordinator, ResponseStream},
};
use core::time::Duration;
use quartet_core::proto::{
    GreetEveryoneRequest, GreetEveryoneResponse, GreetManyTimesRequest, GreetManyTimesResponse,
    GreetRequest, GreetResponse, LongGreetRequest, LongGreetResponse,
    greet_service_server::GreetService,
};
use tonic::{Request, Response, Status, Streaming};

/// Greeting service: the four calling conventions over names.
#[derive(Clone, Debug)]
pub struct GreeterService {
    coordinator: Coordinator,
    interval: Duration,
}

impl GreeterService {
    /// `interval` paces `GreetManyTimes`.
    pub const fn new(coordinator: Coordinator, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
        }
    }
}

#[tonic::async_trait]
impl GreetService for GreeterService {
    type GreetManyTimesStream = ResponseStream<GreetManyTimesResponse>;
    type GreetEveryoneStream = ResponseStream<GreetEveryoneResponse>;

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn greet(&self, req: Request<GreetRequest>) -> Result<Response<GreetResponse>, Status> {
        let response = self
            .coordinator
            .unary("Greet", req.into_inner(), |req| async move {
                greet(req.greeting)
            })
            .await?;
        Ok(Response::new(response))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn greet_many_times(
        &self,
        req: Request<GreetManyTimesRequest>,
    ) -> Result<Response<Self::GreetManyTimesStream>, Status> {
        // A missing greeting fails the call before any stream is opened.
        let name = first_name(req.into_inner().greeting).map_err(Status::from)?;
        let stream = self.coordinator.server_streaming(
            "GreetManyTimes",
            RepeatedGreeting::new(name, self.interval),
        )?;
        Ok(Response::new(stream))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn long_greet(
        &self,
        req: Request<Streaming<LongGreetRequest>>,
    ) -> Result<Response<LongGreetResponse>, Status> {
        let response = self
            .coordinator
            .client_streaming("LongGreet", req.into_inner(), LongGreeting::default())
            .await?;
        Ok(Response::new(response))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn greet_everyone(
        &self,
        req: Request<Streaming<GreetEveryoneRequest>>,
    ) -> Result<Response<Self::GreetEveryoneStream>, Status> {
        let stream =
            self.coordinator
                .bidirectional("GreetEveryone", req.into_inner(), GreetEveryone)?;
        Ok(Response::new(stream))
    }
}
