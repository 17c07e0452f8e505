//! Taleweaver Engine library.
//!
//! Persistence and CRUD for campaign data.
//!
//! ## Structure
//!
//! - `infrastructure/` - Identifier allocator, relational store, object mapper, config
//! - `use_cases/` - CRUD and import/export orchestration over the repository port
//! - `api/` - HTTP entry points
//! - `app` - Application composition

pub mod api;
pub mod app;
pub mod infrastructure;
pub mod use_cases;

pub use app::App;
