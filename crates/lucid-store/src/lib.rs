//! # Lucid Store
//!
//! The sharded document-store port shared by every component.
//!
//! The core never embeds a storage engine: components program against the
//! [`DocumentStore`] trait and the typed [`Collection`] wrapper. Two adapters
//! ship with the workspace:
//!
//! - [`MemoryDocumentStore`]: full-semantics in-memory tables, used by unit
//!   and integration tests and as the engine behind the file adapter.
//! - [`FileDocumentStore`]: JSON-per-collection persistence under an
//!   exclusively locked directory, for single-node deployments.
//!
//! Each collection has exactly one writer component; readers are unrestricted.
//! Shard keys are declarative: adapters record them so a clustered backend
//! can route writes to the primary of the owning shard while reads may be
//! served from secondaries.

pub mod collection;
pub mod error;
pub mod file;
pub mod filter;
pub mod memory;
pub mod ports;

pub use collection::Collection;
pub use error::StoreError;
pub use file::FileDocumentStore;
pub use filter::{Filter, FindOptions, SortOrder};
pub use memory::MemoryDocumentStore;
pub use ports::{DocumentStore, GroupStats, IndexSpec};
