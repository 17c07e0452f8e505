//! Taleweaver Shared - Wire types exchanged with the engine
//!
//! Pure data and serialization. Domain objects travel as plain JSON values so
//! clients do not need the domain crate to read a response or an export file.

pub mod responses;
pub mod transfer;

pub use responses::{ErrorBody, ErrorCode, ListResponse};
pub use transfer::{ExportBundle, ImportSummary, EXPORT_FORMAT_VERSION};
