//! # Photo Catalog Common Library
//!
//! Shared code for the catalog tools:
//! - Entity kinds and their static field maps
//! - Derived field rules (aspect ratio, orientation, sku, retail price)
//! - Database initialization and schema synchronization
//! - Configuration loading

pub mod catalog;
pub mod config;
pub mod db;
pub mod derived;
pub mod error;

pub use catalog::{CatalogEntity, EntityKind, FieldPatch, FieldValue};
pub use error::{Error, Result};
