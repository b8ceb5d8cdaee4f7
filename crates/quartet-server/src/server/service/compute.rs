use crate::server::{
    handlers::{PrimeFactors, RunningAverage, RunningMaximum, sum},
    streaming::{Coordinator, ResponseStream},
};
use core::time::Duration;
use quartet_core::proto::{
    ComputeAverageRequest, ComputeAverageResponse, DecomposeFactorsRequest,
    DecomposeFactorsResponse, FindMaximumRequest, FindMaximumResponse, SumRequest, SumResponse,
    compute_service_server::ComputeService,
};
use tonic::{Request, Response, Status, Streaming};

/// Numeric service: one method per calling convention.
#[derive(Clone, Debug)]
pub struct CalculatorService {
    coordinator: Coordinator,
    interval: Duration,
}

impl CalculatorService {
    /// `interval` paces `DecomposeFactors`.
    pub const fn new(coordinator: Coordinator, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
        }
    }
}

#[tonic::async_trait]
impl ComputeService for CalculatorService {
    type FindMaximumStream = ResponseStream<FindMaximumResponse>;
    type DecomposeFactorsStream = ResponseStream<DecomposeFactorsResponse>;

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn sum(&self, req: Request<SumRequest>) -> Result<Response<SumResponse>, Status> {
        let response = self
            .coordinator
            .unary("Sum", req.into_inner(), |req| async move {
                sum(req.first, req.second).map(|result| SumResponse { result })
            })
            .await?;
        Ok(Response::new(response))
    }

    /// Emits each new running maximum as soon as it is observed.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn find_maximum(
        &self,
        req: Request<Streaming<FindMaximumRequest>>,
    ) -> Result<Response<Self::FindMaximumStream>, Status> {
        let stream =
            self.coordinator
                .bidirectional("FindMaximum", req.into_inner(), RunningMaximum::new())?;
        Ok(Response::new(stream))
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    async fn compute_average(
        &self,
        req: Request<Streaming<ComputeAverageRequest>>,
    ) -> Result<Response<ComputeAverageResponse>, Status> {
        let response = self
            .coordinator
            .client_streaming("ComputeAverage", req.into_inner(), RunningAverage::new())
            .await?;
        Ok(Response::new(response))
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip_all, fields(number = req.get_ref().number))
    )]
    async fn decompose_factors(
        &self,
        req: Request<DecomposeFactorsRequest>,
    ) -> Result<Response<Self::DecomposeFactorsStream>, Status> {
        let producer = PrimeFactors::new(req.into_inner().number).with_interval(self.interval);
        let stream = self
            .coordinator
            .server_streaming("DecomposeFactors", producer)?;
        Ok(Response::new(stream))
    }
}
