//! API layer - HTTP entry points.

pub mod http;
pub mod owner;

pub use owner::OwnerScope;
