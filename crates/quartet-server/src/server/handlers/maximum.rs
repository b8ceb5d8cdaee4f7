use crate::server::streaming::Reactor;
use quartet_core::{
    Result,
    proto::{FindMaximumRequest, FindMaximumResponse},
};

/// Tracks the largest number seen so far on a call.
#[derive(Debug, Default)]
pub struct RunningMaximum {
    maximum: Option<i64>,
}

impl RunningMaximum {
    pub const fn new() -> Self {
        Self { maximum: None }
    }

    /// Feeds one number. Returns it when it becomes the new maximum, so the
    /// first number is always returned.
    pub fn observe(&mut self, number: i64) -> Option<i64> {
        match self.maximum {
            Some(current) if number <= current => None,
            _ => {
                self.maximum = Some(number);
                Some(number)
            }
        }
    }

    pub const fn maximum(&self) -> Option<i64> {
        self.maximum
    }
}

impl Reactor for RunningMaximum {
    type Request = FindMaximumRequest;
    type Response = FindMaximumResponse;

    fn react(&mut self, request: FindMaximumRequest) -> Result<Option<FindMaximumResponse>> {
        Ok(self
            .observe(request.number)
            .map(|maximum| FindMaximumResponse { maximum }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_each_new_maximum_once() {
        let mut max = RunningMaximum::new();
        let emitted: Vec<i64> = [1, 5, 3, 6, 2, 20]
            .into_iter()
            .filter_map(|n| max.observe(n))
            .collect();
        assert_eq!(emitted, vec![1, 5, 6, 20]);
        assert_eq!(max.maximum(), Some(20));
    }

    #[test]
    fn repeated_maximum_is_not_re_emitted() {
        let mut max = RunningMaximum::new();
        assert_eq!(max.observe(4), Some(4));
        assert_eq!(max.observe(4), None);
    }

    #[test]
    fn first_number_is_emitted_even_at_the_floor() {
        let mut max = RunningMaximum::new();
        assert_eq!(max.observe(i64::MIN), Some(i64::MIN));
        assert_eq!(max.observe(-1), Some(-1));
    }

    #[test]
    fn reacts_with_response_messages() {
        let mut max = RunningMaximum::new();
        let first = max.react(FindMaximumRequest { number: 9 }).unwrap();
        assert_eq!(first, Some(FindMaximumResponse { maximum: 9 }));
        assert_eq!(max.react(FindMaximumRequest { number: 2 }).unwrap(), None);
    }
}
