//! Use cases - User story orchestration.
//!
//! Each module contains use cases for a specific area.
//! Use cases orchestrate across repository ports to fulfill user stories.

pub mod management;
pub mod transfer;

pub use management::{Managed, ManagementError, ManagementUseCases, ObjectCrud};
pub use transfer::{TransferError, TransferUseCases};
