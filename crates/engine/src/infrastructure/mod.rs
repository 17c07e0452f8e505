//! Infrastructure implementations.
//!
//! Contains port trait implementations for external dependencies.

pub mod clock;
pub mod config;
pub mod id_allocator;
pub mod persistence;
pub mod ports;
