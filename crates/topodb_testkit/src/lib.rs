//! # topodb Testkit
//!
//! Test utilities for topodb.
//!
//! This crate provides:
//! - A fixture registry modeling a small radio network, covering every
//!   relationship storage location and cardinality shape
//! - Store helpers with automatic schema setup and cleanup
//! - Builders for typical entity and relationship change records
//!
//! The engine's cross-crate integration suites live in this crate's
//! `tests/` directory.
//!
//! ## Usage
//!
//! ```rust
//! use topodb_testkit::{builders, with_store};
//!
//! let results = with_store(|store| {
//!     store
//!         .merge_batch(&builders::batch(
//!             vec![builders::managed_element("me-1")],
//!             Vec::new(),
//!         ))
//!         .unwrap()
//! });
//! assert_eq!(results.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod builders;
pub mod fixtures;

pub use fixtures::{fixture_ddl, radio_network_registry, with_store, TestStore};
