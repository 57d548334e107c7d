//! Catalog sync services
//!
//! - `record_parser`: source file rows to typed import records
//! - `catalog_sync`: reconciliation of import records against the store
//! - `catalog_view`: JSON view of stored entities

pub mod catalog_sync;
pub mod catalog_view;
pub mod record_parser;

pub use catalog_sync::{partition, CatalogSync, Partition};
pub use catalog_view::entity_view;
pub use record_parser::{ImportRecord, ParsedBatch, RecordParser};
