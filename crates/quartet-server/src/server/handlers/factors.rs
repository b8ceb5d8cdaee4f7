use crate::server::streaming::Producer;
use core::time::Duration;
use quartet_core::{Result, proto::DecomposeFactorsResponse};

/// Prime factors of a number by trial division, smallest first.
///
/// The divisor only moves on once it no longer divides the remainder, so
/// repeated factors come out once per multiplicity. Numbers `<= 1` have no
/// factors.
#[derive(Debug, Clone)]
pub struct PrimeFactors {
    remainder: i64,
    divisor: i64,
    interval: Duration,
}

impl PrimeFactors {
    pub const fn new(number: i64) -> Self {
        Self {
            remainder: number,
            divisor: 2,
            interval: Duration::ZERO,
        }
    }

    /// Delay between factors when driven as a stream.
    #[must_use]
    pub const fn with_interval(self, interval: Duration) -> Self {
        Self { interval, ..self }
    }
}

/// Candidate divisors tried between yields to the runtime.
const SEARCH_BATCH: u32 = 1 << 14;

enum Search {
    Found(i64),
    Exhausted,
    Budget,
}

impl PrimeFactors {
    /// Tries at most `budget` divisors.
    fn search(&mut self, budget: u32) -> Search {
        if self.remainder <= 1 {
            return Search::Exhausted;
        }
        for _ in 0..budget {
            // divisor² > remainder, written so it cannot overflow.
            if self.divisor > self.remainder / self.divisor {
                let prime = self.remainder;
                self.remainder = 1;
                return Search::Found(prime);
            }
            if self.remainder % self.divisor == 0 {
                self.remainder /= self.divisor;
                return Search::Found(self.divisor);
            }
            self.divisor += 1;
        }
        Search::Budget
    }
}

impl Iterator for PrimeFactors {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        loop {
            match self.search(u32::MAX) {
                Search::Found(factor) => return Some(factor),
                Search::Exhausted => return None,
                Search::Budget => {}
            }
        }
    }
}

impl Producer for PrimeFactors {
    type Item = DecomposeFactorsResponse;

    /// A large prime takes up to ~3·10⁹ divisions, so the search hands the
    /// worker back after every batch.
    async fn next_item(&mut self) -> Option<Result<DecomposeFactorsResponse>> {
        loop {
            match self.search(SEARCH_BATCH) {
                Search::Found(factor) => return Some(Ok(DecomposeFactorsResponse { factor })),
                Search::Exhausted => return None,
                Search::Budget => tokio::task::yield_now().await,
            }
        }
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}
