//! Catalog entity model
//!
//! Entity kinds, their static field maps, typed field values and the
//! generic stored entity shared by the parser, the store and the sync engine.

pub mod entity;
pub mod kind;
pub mod schema;
pub mod value;

pub use entity::CatalogEntity;
pub use kind::EntityKind;
pub use schema::{
    DefaultValue, DerivedRule, EntitySchema, FieldSpec, FieldType, ForeignKeySpec, JoinSpec,
    PriceSpec, StoredColumn, IDENTITY_FIELD, NULL_TOKEN,
};
pub use value::{FieldPatch, FieldValue};
