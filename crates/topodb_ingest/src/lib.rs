//! # topodb Ingest
//!
//! The topology ingestion and relationship-merge engine.
//!
//! A batch of entity and relationship change records becomes a plan of
//! deferred table operations, applied inside one database transaction:
//!
//! - entity merges are guarded upserts, reported only when a row actually
//!   changed;
//! - relationship merges branch on the type's storage location (join table
//!   or a column triple embedded in one endpoint's table), heal missing
//!   endpoints with placeholder rows, and reject id/endpoint-pair
//!   collisions;
//! - a final cardinality pass counts finite-bounded sides under the same
//!   transaction;
//! - the executor retries the whole transaction on transient contention
//!   with bounded attempts and fixed backoff.
//!
//! Either every operation of a batch commits, or none of them do.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use topodb_ingest::{Entity, ParsedBatch, Relationship, TopologyStore};
//!
//! let mut store = TopologyStore::open_in_memory(Arc::clone(&registry))?;
//! store.execute_ddl(&topodb_schema::generate_ddl(&registry))?;
//!
//! let batch = ParsedBatch {
//!     entities: vec![Entity::new("Node", "node-1")],
//!     relationships: vec![Relationship::new("NODE_OWNS_PORT", "rel-1", "node-1", "port-1")],
//! };
//! let results = store.merge_batch(&batch)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dispatch;
mod error;
mod event;
mod executor;
mod ops;
mod plan;
mod result;
mod store;
mod validation;
mod value;

pub use config::IngestConfig;
pub use dispatch::{source_id_urn, EventKind, SourceEntityDelete, TopologyEvent, SUPPORTED_SOURCE_TYPE};
pub use error::{IngestError, IngestResult};
pub use event::{Entity, ParsedBatch, Relationship};
pub use executor::{execute, RetryListener};
pub use ops::conflict;
pub use plan::{delete_plan, merge_plan, source_entity_delete_plan, DeferredOp, EntityMerge};
pub use result::{OperationResult, PROPERTY_A_SIDE, PROPERTY_B_SIDE};
pub use store::TopologyStore;

/// Version of the ingest crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
