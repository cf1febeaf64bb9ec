//! Queue provider implementations.

pub mod aws;
pub mod memory;

pub use aws::{AwsError, AwsSqsProvider};
pub use memory::{CallStats, InMemoryProvider};
