//! Metadata persistence for media-owning entities
//!
//! `MetadataStore` is the record-level contract (create / find / update / delete / list
//! over JSON documents). `PgMetadataStore` keeps records in PostgreSQL; the in-memory
//! store serves development and tests. `EntityRepository` adds typed access on top.

pub mod memory;
pub mod postgres;
pub mod repository;
pub mod store;

pub use memory::InMemoryMetadataStore;
pub use postgres::PgMetadataStore;
pub use repository::{Entity, EntityRepository, Versioned};
pub use store::{MetadataStore, UpdateOutcome};
