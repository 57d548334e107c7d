//! Catalog entity kinds

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::schema::{self, EntitySchema};
use crate::Error;

/// Every entity kind that can be synchronized from a flat file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    ProductImage,
    PhotoImage,
    ShareImage,
    Photographer,
    Location,
    Subject,
    Tag,
    Collection,
    Print,
    Mat,
    Frame,
    Photo,
}

impl EntityKind {
    /// All kinds in dependency order: referenced kinds come before the
    /// kinds that reference them, so a full sync resolves every foreign key
    /// it can.
    pub const ALL: [EntityKind; 12] = [
        EntityKind::ProductImage,
        EntityKind::PhotoImage,
        EntityKind::ShareImage,
        EntityKind::Photographer,
        EntityKind::Location,
        EntityKind::Subject,
        EntityKind::Tag,
        EntityKind::Collection,
        EntityKind::Print,
        EntityKind::Mat,
        EntityKind::Frame,
        EntityKind::Photo,
    ];

    /// Kebab-case name used on the command line and in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::ProductImage => "product-image",
            EntityKind::PhotoImage => "photo-image",
            EntityKind::ShareImage => "share-image",
            EntityKind::Photographer => "photographer",
            EntityKind::Location => "location",
            EntityKind::Subject => "subject",
            EntityKind::Tag => "tag",
            EntityKind::Collection => "collection",
            EntityKind::Print => "print",
            EntityKind::Mat => "mat",
            EntityKind::Frame => "frame",
            EntityKind::Photo => "photo",
        }
    }

    /// Database table holding this kind
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::ProductImage => "product_images",
            EntityKind::PhotoImage => "photo_images",
            EntityKind::ShareImage => "share_images",
            EntityKind::Photographer => "photographers",
            EntityKind::Location => "locations",
            EntityKind::Subject => "subjects",
            EntityKind::Tag => "tags",
            EntityKind::Collection => "collections",
            EntityKind::Print => "prints",
            EntityKind::Mat => "mats",
            EntityKind::Frame => "frames",
            EntityKind::Photo => "photos",
        }
    }

    /// Fixed source file name inside the data directory
    pub fn file_name(&self) -> &'static str {
        match self {
            EntityKind::ProductImage => "product-images.csv",
            EntityKind::PhotoImage => "photo-images.csv",
            EntityKind::ShareImage => "share-images.csv",
            EntityKind::Photographer => "photographers.csv",
            EntityKind::Location => "locations.csv",
            EntityKind::Subject => "subjects.csv",
            EntityKind::Tag => "tags.csv",
            EntityKind::Collection => "collections.csv",
            EntityKind::Print => "prints.csv",
            EntityKind::Mat => "mats.csv",
            EntityKind::Frame => "frames.csv",
            EntityKind::Photo => "photos.csv",
        }
    }

    /// Field map, relations and derived rules for this kind
    pub fn schema(&self) -> &'static EntitySchema {
        schema::schema_for(*self)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        EntityKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == wanted || k.table().replace('_', "-") == wanted)
            .ok_or_else(|| Error::InvalidInput(format!("unknown entity kind '{}'", s)))
    }
}
