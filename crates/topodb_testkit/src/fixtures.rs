//! Fixture registry and store helpers.
//!
//! The fixture models a small radio network:
//!
//! - `MANAGEDELEMENT_MANAGES_RADIOFUNCTION` — embedded on the B side (every
//!   radio function has one managing element)
//! - `ANTENNAMODULE_INSTALLED_AT_SITE` — embedded on the A side (every
//!   antenna module sits at one site)
//! - `ANTENNAMODULE_SERVES_ANTENNACAPABILITY` — join table, at most two
//!   capabilities per module
//! - `RADIOFUNCTION_PROVIDES_ANTENNACAPABILITY` — join table, unbounded

use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use topodb_ingest::TopologyStore;
use topodb_schema::{
    generate_ddl, AssociationDef, AttrType, EntityType, MaxCardinality, RelationTypeDef,
    SchemaRegistry, StorageLocation,
};

/// Builds the radio-network fixture registry.
#[must_use]
pub fn radio_network_registry() -> Arc<SchemaRegistry> {
    let registry = SchemaRegistry::builder()
        .entity(
            EntityType::new("ManagedElement", "managed_element")
                .with_attribute("fdn", AttrType::Primitive)
                .with_attribute("cmId", AttrType::Container),
        )
        .entity(
            EntityType::new("RadioFunction", "radio_function")
                .with_attribute("fdn", AttrType::Primitive)
                .with_attribute("capacity", AttrType::BigInt),
        )
        .entity(
            EntityType::new("AntennaModule", "antenna_module")
                .with_attribute("serialNumber", AttrType::Primitive)
                .with_attribute("position", AttrType::Geographic)
                .with_attribute("tilt", AttrType::Decimal),
        )
        .entity(
            EntityType::new("AntennaCapability", "antenna_capability")
                .with_attribute("bands", AttrType::Container),
        )
        .entity(EntityType::new("Site", "site").with_attribute("name", AttrType::Primitive))
        .relation(RelationTypeDef {
            name: "MANAGEDELEMENT_MANAGES_RADIOFUNCTION".into(),
            a_side: AssociationDef::new("ManagedElement", "manages", MaxCardinality::Unbounded),
            b_side: AssociationDef::new("RadioFunction", "managed-by", MaxCardinality::One),
            storage: StorageLocation::BSide,
            table: None,
        })
        .relation(RelationTypeDef {
            name: "ANTENNAMODULE_INSTALLED_AT_SITE".into(),
            a_side: AssociationDef::new("AntennaModule", "installed-at", MaxCardinality::One),
            b_side: AssociationDef::new("Site", "installed-antennas", MaxCardinality::Unbounded),
            storage: StorageLocation::ASide,
            table: None,
        })
        .relation(RelationTypeDef {
            name: "ANTENNAMODULE_SERVES_ANTENNACAPABILITY".into(),
            a_side: AssociationDef::new("AntennaModule", "serves", MaxCardinality::Const(2)),
            b_side: AssociationDef::new(
                "AntennaCapability",
                "served-by",
                MaxCardinality::Unbounded,
            ),
            storage: StorageLocation::Relation,
            table: None,
        })
        .relation(RelationTypeDef {
            name: "RADIOFUNCTION_PROVIDES_ANTENNACAPABILITY".into(),
            a_side: AssociationDef::new("RadioFunction", "provides", MaxCardinality::Unbounded),
            b_side: AssociationDef::new(
                "AntennaCapability",
                "provided-by",
                MaxCardinality::Unbounded,
            ),
            storage: StorageLocation::Relation,
            table: None,
        })
        .build()
        .expect("fixture registry is valid");
    Arc::new(registry)
}

/// The fixture schema's DDL.
#[must_use]
pub fn fixture_ddl() -> String {
    generate_ddl(&radio_network_registry())
}

/// A test store with the fixture schema applied and automatic cleanup.
pub struct TestStore {
    /// The store under test.
    pub store: TopologyStore,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates an in-memory test store.
    #[must_use]
    pub fn memory() -> Self {
        let registry = radio_network_registry();
        let store =
            TopologyStore::open_in_memory(Arc::clone(&registry)).expect("open in-memory store");
        store
            .execute_ddl(&generate_ddl(&registry))
            .expect("apply fixture schema");
        Self {
            store,
            temp_dir: None,
        }
    }

    /// Creates a file-backed test store; other connections may open
    /// [`TestStore::path`] to contend with it.
    #[must_use]
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("create temp directory");
        let registry = radio_network_registry();
        let store = TopologyStore::open(&temp_dir.path().join("topology.db"), registry)
            .expect("open file store");
        store
            .execute_ddl(&fixture_ddl())
            .expect("apply fixture schema");
        Self {
            store,
            temp_dir: Some(temp_dir),
        }
    }

    /// The database path if file-backed, `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir
            .as_ref()
            .map(|dir| dir.path().join("topology.db"))
    }
}

impl Deref for TestStore {
    type Target = TopologyStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

impl DerefMut for TestStore {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.store
    }
}

/// Runs a test against a fresh in-memory store.
pub fn with_store<F, R>(f: F) -> R
where
    F: FnOnce(&mut TopologyStore) -> R,
{
    let mut test_store = TestStore::memory();
    f(&mut test_store.store)
}
