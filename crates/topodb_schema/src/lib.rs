//! # topodb Schema
//!
//! Type registry and schema model for topodb.
//!
//! The registry is the immutable, process-wide description of a deployed
//! topology model: which entity types exist, which tables and columns hold
//! them, which relationship types connect them, where each relationship is
//! physically stored and how many partners each side allows. It is produced
//! once by an external modeling step, loaded at startup and injected into
//! the ingestion engine — never a global.
//!
//! ## Example
//!
//! ```rust
//! use topodb_schema::{
//!     AssociationDef, AttrType, EntityType, MaxCardinality, RelationTypeDef,
//!     SchemaRegistry, StorageLocation,
//! };
//!
//! let registry = SchemaRegistry::builder()
//!     .entity(EntityType::new("Node", "node").with_attribute("fdn", AttrType::Primitive))
//!     .entity(EntityType::new("Port", "port"))
//!     .relation(RelationTypeDef {
//!         name: "NODE_OWNS_PORT".into(),
//!         a_side: AssociationDef::new("Node", "owned-ports", MaxCardinality::Unbounded),
//!         b_side: AssociationDef::new("Port", "owner", MaxCardinality::One),
//!         storage: StorageLocation::BSide,
//!         table: None,
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert!(registry.entity_type("Node").is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod attr;
mod ddl;
mod entity;
mod error;
mod registry;
mod relation;

pub use attr::AttrType;
pub use ddl::{generate_ddl, quote_ident};
pub use entity::EntityType;
pub use error::{SchemaError, SchemaResult};
pub use registry::{SchemaDefinition, SchemaRegistry, SchemaRegistryBuilder};
pub use relation::{
    AssociationDef, AssociationEnd, MaxCardinality, RelationType, RelationTypeDef,
    RelationshipStorage, Side, StorageLocation,
};
