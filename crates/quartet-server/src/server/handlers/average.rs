use crate::server::streaming::Accumulator;
use quartet_core::{
    Error, Result,
    proto::{ComputeAverageRequest, ComputeAverageResponse},
};

/// Sum and count of every number received on a call. The mean is computed
/// once, after the caller half-closes.
#[derive(Debug, Default)]
pub struct RunningAverage {
    sum: i128,
    count: u64,
}

impl RunningAverage {
    pub const fn new() -> Self {
        Self { sum: 0, count: 0 }
    }

    pub fn push(&mut self, number: i64) -> Result<()> {
        self.sum = self
            .sum
            .checked_add(i128::from(number))
            .ok_or_else(|| Error::invalid_argument("running sum overflowed"))?;
        self.count += 1;
        Ok(())
    }

    pub const fn count(&self) -> u64 {
        self.count
    }

    /// `None` until at least one number was pushed.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / self.count as f64)
    }
}

impl Accumulator for RunningAverage {
    type Request = ComputeAverageRequest;
    type Output = ComputeAverageResponse;

    fn accept(&mut self, request: ComputeAverageRequest) -> Result<()> {
        self.push(request.number)
    }

    fn finish(self) -> Result<ComputeAverageResponse> {
        self.mean()
            .map(|average| ComputeAverageResponse { average })
            .ok_or_else(|| Error::invalid_argument("no numbers received"))
    }
}
