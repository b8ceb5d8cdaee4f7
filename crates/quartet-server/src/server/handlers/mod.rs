//! Per-call business logic.
//!
//! Handlers are plain synchronous state machines. They own the call-scoped
//! accumulator and know nothing about channels or statuses; the
//! [`Coordinator`](crate::server::streaming::Coordinator) drives them.
//!
//! | handler             | convention       | trait          |
//! |---------------------|------------------|----------------|
//! | [`sum`]             | unary            | -              |
//! | [`RunningMaximum`]  | bidirectional    | `Reactor`      |
//! | [`RunningAverage`]  | client streaming | `Accumulator`  |
//! | [`PrimeFactors`]    | server streaming | `Producer`     |
//! | [`greet`]           | unary            | -              |
//! | [`RepeatedGreeting`]| server streaming | `Producer`     |
//! | [`LongGreeting`]    | client streaming | `Accumulator`  |
//! | [`GreetEveryone`]   | bidirectional    | `Reactor`      |

mod average;
mod factors;
mod greet;
mod maximum;
mod sum;

pub use average::RunningAverage;
pub use factors::PrimeFactors;
pub use greet::{GREET_REPEAT, GreetEveryone, LongGreeting, RepeatedGreeting, first_name, greet};
pub use maximum::RunningMaximum;
pub use sum::sum;
