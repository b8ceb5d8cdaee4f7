use quartet_core::{Error, Result};

/// Adds two numbers, rejecting results that do not fit in an `i64`.
pub fn sum(first: i64, second: i64) -> Result<i64> {
    first
        .checked_add(second)
        .ok_or_else(|| Error::invalid_argument(format!("{first} + {second} overflows int64")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn adds() {
        assert_eq!(sum(3, 10).unwrap(), 13);
        assert_eq!(sum(-7, 2).unwrap(), -5);
    }

    #[test]
    fn overflow_is_invalid_argument() {
        assert_eq!(sum(i64::MAX, 1).unwrap_err().code(), Code::InvalidArgument);
        assert_eq!(sum(i64::MIN, -1).unwrap_err().code(), Code::InvalidArgument);
    }
}
