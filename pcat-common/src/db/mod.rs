//! Catalog database setup

pub mod init;
pub mod schema_sync;

pub use init::*;
pub use schema_sync::*;
