//! Port traits for infrastructure boundaries.
//!
//! Ports exist for:
//! - Object storage (SQLite today, anything relational tomorrow)
//! - Clock (for testing)

mod error;
mod repos;
mod testing;

pub use error::RepoError;
pub use repos::{ObjectRepo, PersistOutcome};
pub use testing::ClockPort;

#[cfg(test)]
pub use repos::MockObjectRepo;
#[cfg(test)]
pub use testing::MockClockPort;
