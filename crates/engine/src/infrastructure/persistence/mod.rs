//! Relational persistence for domain objects.
//!
//! Layers, bottom-up:
//! - `store`: SQLite pool, writer lock and units of work
//! - `schema`: DDL generated from the type registry
//! - `codec`: document values to and from SQL values
//! - `mapper`: persist / load / replace / delete of whole object trees
//! - `scope`: owner scoping on top of the mapper
//! - `object_repo`: the [`ObjectRepo`](crate::infrastructure::ports::ObjectRepo) adapter

mod codec;
mod mapper;
mod object_repo;
mod schema;
mod scope;
mod store;

pub use mapper::ObjectMapper;
pub use object_repo::SqliteObjectRepo;
pub use scope::ScopeGuard;
pub use store::{SqliteStore, UnitOfWork};
