//! Application state and composition.

use std::sync::Arc;

use crate::infrastructure::ports::{ClockPort, ObjectRepo};
use crate::use_cases::{ManagementUseCases, TransferUseCases};

/// Main application state.
///
/// Holds the repository port and the use cases built on it.
/// Passed to HTTP handlers via Axum state.
pub struct App {
    pub repositories: Repositories,
    pub use_cases: UseCases,
}

/// Container for repository ports.
pub struct Repositories {
    pub objects: Arc<dyn ObjectRepo>,
}

/// Container for all use cases.
pub struct UseCases {
    pub management: ManagementUseCases,
    pub transfer: TransferUseCases,
}

impl App {
    /// Create a new App with all dependencies wired up.
    pub fn new(objects: Arc<dyn ObjectRepo>, clock: Arc<dyn ClockPort>) -> Self {
        let use_cases = UseCases {
            management: ManagementUseCases::new(objects.clone()),
            transfer: TransferUseCases::new(objects.clone(), clock),
        };
        Self {
            repositories: Repositories { objects },
            use_cases,
        }
    }
}
