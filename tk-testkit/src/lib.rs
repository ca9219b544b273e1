//! Test doubles and fixture builders shared across the workspace's test
//! suites: deterministic clocks and random sources, and rule builders.

pub mod clock;
pub mod fixtures;
pub mod rng;

pub use clock::{FixedClock, SteppingClock};
pub use fixtures::{condition, condition_path, rule_with_groups, simple_rule};
pub use rng::{FixedRandomSource, SequenceRandomSource};
