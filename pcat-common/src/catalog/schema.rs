//! Static field maps for every entity kind
//!
//! Single source of truth for:
//! - The typed columns each source file carries (parser type map)
//! - Column defaults applied on insert
//! - Single-valued foreign keys and multi-valued join lists
//! - Derived columns recomputed before every persist
//! - Retail price pairs computed on read

use super::kind::EntityKind;
use super::value::FieldValue;

/// Name of the identity column in every source file
pub const IDENTITY_FIELD: &str = "id";

/// Literal cell value that clears a nullable field during an update
pub const NULL_TOKEN: &str = "NULL";

/// Conversion applied to a raw cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Float,
    Bool,
    Text,
    /// Comma-joined strings, stored joined
    TextList,
}

impl FieldType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldType::Int | FieldType::Bool => "INTEGER",
            FieldType::Float => "REAL",
            FieldType::Text | FieldType::TextList => "TEXT",
        }
    }
}

/// Column default, usable in static tables
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(&'static str),
    TextList(&'static str),
}

impl DefaultValue {
    pub fn to_value(&self) -> FieldValue {
        match self {
            DefaultValue::Int(v) => FieldValue::Int(*v),
            DefaultValue::Float(v) => FieldValue::Float(*v),
            DefaultValue::Bool(v) => FieldValue::Bool(*v),
            DefaultValue::Text(v) => FieldValue::Text((*v).to_string()),
            DefaultValue::TextList(v) => FieldValue::TextList(
                v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
            ),
        }
    }

    /// SQL literal for a column DEFAULT clause
    pub fn sql_literal(&self) -> String {
        match self {
            DefaultValue::Int(v) => v.to_string(),
            DefaultValue::Float(v) => format!("{:?}", v),
            DefaultValue::Bool(v) => if *v { "1" } else { "0" }.to_string(),
            DefaultValue::Text(v) | DefaultValue::TextList(v) => {
                format!("'{}'", v.replace('\'', "''"))
            }
        }
    }
}

/// One scalar field of an entity kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    /// Header name in the source file
    pub name: &'static str,
    /// Database column
    pub column: &'static str,
    pub ty: FieldType,
    /// Accepts NULL (and the clear token)
    pub nullable: bool,
    pub default: Option<DefaultValue>,
    /// Inclusive bounds for integer fields
    pub range: Option<(i64, i64)>,
}

impl FieldSpec {
    pub const fn new(name: &'static str, column: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            column,
            ty,
            nullable: false,
            default: None,
            range: None,
        }
    }

    pub const fn nullable(self) -> Self {
        Self { nullable: true, ..self }
    }

    pub const fn default(self, value: DefaultValue) -> Self {
        Self { default: Some(value), ..self }
    }

    pub const fn range(self, min: i64, max: i64) -> Self {
        Self { range: Some((min, max)), ..self }
    }
}

/// Single-valued reference to another entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKeySpec {
    pub field: &'static str,
    pub column: &'static str,
    pub target: EntityKind,
}

/// Multi-valued association stored in a join table owned by the entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinSpec {
    pub field: &'static str,
    pub table: &'static str,
    pub owner_column: &'static str,
    pub target_column: &'static str,
    pub target: EntityKind,
}

/// Base price / modifier pair producing a retail price on read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceSpec {
    pub name: &'static str,
    pub base: &'static str,
    pub modifier: &'static str,
}

/// Which derived fields a kind carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedRule {
    None,
    /// aspectRatio from dimension1 / dimension2
    ProductDimensions,
    /// aspectRatio, isPortrait, isPanoramic from width / height
    ImageDimensions,
    /// sku and sortIndex from id and rating
    PhotoIdentity,
}

const ASPECT_RATIO: FieldSpec = FieldSpec::new("aspectRatio", "aspect_ratio", FieldType::Text).nullable();
const IS_PORTRAIT: FieldSpec =
    FieldSpec::new("isPortrait", "is_portrait", FieldType::Bool).default(DefaultValue::Bool(false));
const IS_PANORAMIC: FieldSpec =
    FieldSpec::new("isPanoramic", "is_panoramic", FieldType::Bool).default(DefaultValue::Bool(false));
const SKU: FieldSpec = FieldSpec::new("sku", "sku", FieldType::Int);
const PHOTO_SORT_INDEX: FieldSpec = FieldSpec::new("sortIndex", "sort_index", FieldType::Int);

impl DerivedRule {
    /// Stored columns this rule writes
    pub fn columns(&self) -> &'static [FieldSpec] {
        match self {
            DerivedRule::None => &[],
            DerivedRule::ProductDimensions => &[ASPECT_RATIO],
            DerivedRule::ImageDimensions => &[ASPECT_RATIO, IS_PORTRAIT, IS_PANORAMIC],
            DerivedRule::PhotoIdentity => &[SKU, PHOTO_SORT_INDEX],
        }
    }
}

/// One persisted column of an entity table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredColumn {
    /// Entity field name
    pub name: &'static str,
    pub column: &'static str,
    pub ty: FieldType,
}

/// Complete description of one entity kind
#[derive(Debug)]
pub struct EntitySchema {
    pub kind: EntityKind,
    pub fields: &'static [FieldSpec],
    pub foreign_keys: &'static [ForeignKeySpec],
    pub joins: &'static [JoinSpec],
    pub derived: DerivedRule,
    pub prices: &'static [PriceSpec],
    /// Entities missing from the import file are deleted
    pub delete_on_absence: bool,
}

impl EntitySchema {
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn foreign_key(&self, name: &str) -> Option<&'static ForeignKeySpec> {
        self.foreign_keys.iter().find(|f| f.field == name)
    }

    pub fn join(&self, name: &str) -> Option<&'static JoinSpec> {
        self.joins.iter().find(|j| j.field == name)
    }

    /// Whether a header name is a derived column (ignored on import)
    pub fn is_derived(&self, name: &str) -> bool {
        self.derived.columns().iter().any(|c| c.name == name)
            || self.prices.iter().any(|p| p.name == name)
    }

    /// All stored columns except the identity: scalars, foreign keys, derived
    pub fn stored_columns(&self) -> Vec<StoredColumn> {
        let scalar = |f: &FieldSpec| StoredColumn {
            name: f.name,
            column: f.column,
            ty: f.ty,
        };
        self.fields
            .iter()
            .map(scalar)
            .chain(self.foreign_keys.iter().map(|fk| StoredColumn {
                name: fk.field,
                column: fk.column,
                ty: FieldType::Int,
            }))
            .chain(self.derived.columns().iter().map(scalar))
            .collect()
    }
}

const SORT_INDEX: FieldSpec = FieldSpec::new("sortIndex", "sort_index", FieldType::Int);
const NAME: FieldSpec = FieldSpec::new("name", "name", FieldType::Text);
const DESCRIPTION: FieldSpec = FieldSpec::new("description", "description", FieldType::Text).nullable();
const DIMENSION1: FieldSpec = FieldSpec::new("dimension1", "dimension1", FieldType::Float);
const DIMENSION2: FieldSpec = FieldSpec::new("dimension2", "dimension2", FieldType::Float);
const COST: FieldSpec = FieldSpec::new("cost", "cost", FieldType::Float);
const BASE_PRICE: FieldSpec = FieldSpec::new("basePrice", "base_price", FieldType::Float);
const PRICE_MODIFIER: FieldSpec =
    FieldSpec::new("priceModifier", "price_modifier", FieldType::Float).default(DefaultValue::Float(1.0));
const PRODUCT_IMAGE_FK: ForeignKeySpec = ForeignKeySpec {
    field: "productImageId",
    column: "product_image_id",
    target: EntityKind::ProductImage,
};
const RETAIL_PRICE: PriceSpec = PriceSpec {
    name: "retailPrice",
    base: "basePrice",
    modifier: "priceModifier",
};

const fn image_size(name: &'static str, column: &'static str) -> FieldSpec {
    FieldSpec::new(name, column, FieldType::Int).default(DefaultValue::Int(0))
}

const fn sized_base_price(name: &'static str, column: &'static str) -> FieldSpec {
    FieldSpec::new(name, column, FieldType::Float)
}

const fn sized_modifier(name: &'static str, column: &'static str) -> FieldSpec {
    FieldSpec::new(name, column, FieldType::Float).default(DefaultValue::Float(1.0))
}

static COLLECTION: EntitySchema = EntitySchema {
    kind: EntityKind::Collection,
    fields: &[SORT_INDEX, NAME, DESCRIPTION],
    foreign_keys: &[],
    joins: &[],
    derived: DerivedRule::None,
    prices: &[],
    delete_on_absence: false,
};

static LOCATION: EntitySchema = EntitySchema {
    kind: EntityKind::Location,
    fields: &[
        SORT_INDEX,
        NAME,
        FieldSpec::new("tag", "tag", FieldType::Text),
        DESCRIPTION,
    ],
    foreign_keys: &[],
    joins: &[],
    derived: DerivedRule::None,
    prices: &[],
    delete_on_absence: false,
};

static SUBJECT: EntitySchema = EntitySchema {
    kind: EntityKind::Subject,
    fields: &[SORT_INDEX, NAME, DESCRIPTION],
    foreign_keys: &[],
    joins: &[],
    derived: DerivedRule::None,
    prices: &[],
    delete_on_absence: false,
};

static TAG: EntitySchema = EntitySchema {
    kind: EntityKind::Tag,
    fields: &[SORT_INDEX, NAME, DESCRIPTION],
    foreign_keys: &[],
    joins: &[],
    derived: DerivedRule::None,
    prices: &[],
    delete_on_absence: false,
};

static PHOTOGRAPHER: EntitySchema = EntitySchema {
    kind: EntityKind::Photographer,
    fields: &[
        NAME,
        FieldSpec::new("firstName", "first_name", FieldType::Text),
        FieldSpec::new("lastName", "last_name", FieldType::Text),
        FieldSpec::new("email", "email", FieldType::Text),
        FieldSpec::new("bio", "bio", FieldType::Text).nullable(),
    ],
    foreign_keys: &[ForeignKeySpec {
        field: "coverImageId",
        column: "cover_image_id",
        target: EntityKind::ProductImage,
    }],
    joins: &[],
    derived: DerivedRule::None,
    prices: &[],
    delete_on_absence: false,
};

static PRODUCT_IMAGE: EntitySchema = EntitySchema {
    kind: EntityKind::ProductImage,
    fields: &[
        FieldSpec::new("imageName", "image_name", FieldType::Text)
            .default(DefaultValue::Text("Product Image")),
        FieldSpec::new("fileExtension", "file_extension", FieldType::Text)
            .default(DefaultValue::Text("webp")),
        FieldSpec::new("imageUrl", "image_url", FieldType::Text).default(DefaultValue::Text("")),
        FieldSpec::new("altText", "alt_text", FieldType::Text)
            .default(DefaultValue::Text("product image")),
        FieldSpec::new("size", "size", FieldType::Text).default(DefaultValue::Text("XL")),
        image_size("width", "width"),
        image_size("height", "height"),
    ],
    foreign_keys: &[],
    joins: &[],
    derived: DerivedRule::ImageDimensions,
    prices: &[],
    delete_on_absence: false,
};

static PHOTO_IMAGE: EntitySchema = EntitySchema {
    kind: EntityKind::PhotoImage,
    fields: &[
        FieldSpec::new("imageName", "image_name", FieldType::Text)
            .default(DefaultValue::Text("New Image")),
        FieldSpec::new("jpegUrl", "jpeg_url", FieldType::Text).default(DefaultValue::Text("")),
        FieldSpec::new("webpUrl", "webp_url", FieldType::Text).default(DefaultValue::Text("")),
        FieldSpec::new("altText", "alt_text", FieldType::Text)
            .default(DefaultValue::Text("new image")),
        FieldSpec::new("size", "size", FieldType::Text).default(DefaultValue::Text("XL")),
        image_size("width", "width"),
        image_size("height", "height"),
    ],
    foreign_keys: &[],
    joins: &[],
    derived: DerivedRule::ImageDimensions,
    prices: &[],
    delete_on_absence: false,
};

static SHARE_IMAGE: EntitySchema = EntitySchema {
    kind: EntityKind::ShareImage,
    fields: &[
        FieldSpec::new("imageName", "image_name", FieldType::Text)
            .default(DefaultValue::Text("Share Image")),
        FieldSpec::new("imageUrl", "image_url", FieldType::Text).default(DefaultValue::Text("")),
        FieldSpec::new("altText", "alt_text", FieldType::Text)
            .default(DefaultValue::Text("share image")),
        FieldSpec::new("size", "size", FieldType::Text).default(DefaultValue::Text("XL")),
        image_size("width", "width"),
        image_size("height", "height"),
    ],
    foreign_keys: &[],
    joins: &[],
    derived: DerivedRule::ImageDimensions,
    prices: &[],
    delete_on_absence: true,
};

static PRINT: EntitySchema = EntitySchema {
    kind: EntityKind::Print,
    fields: &[
        FieldSpec::new("displayName", "display_name", FieldType::Text),
        DESCRIPTION,
        FieldSpec::new("type", "type", FieldType::Text),
        FieldSpec::new("printSku", "print_sku", FieldType::Text),
        DIMENSION1,
        DIMENSION2,
        COST,
        FieldSpec::new("shippingCost", "shipping_cost", FieldType::Float),
        BASE_PRICE,
        PRICE_MODIFIER,
    ],
    foreign_keys: &[],
    joins: &[],
    derived: DerivedRule::ProductDimensions,
    prices: &[RETAIL_PRICE],
    delete_on_absence: false,
};

static MAT: EntitySchema = EntitySchema {
    kind: EntityKind::Mat,
    fields: &[
        SORT_INDEX,
        FieldSpec::new("displayName", "display_name", FieldType::Text).nullable(),
        DESCRIPTION,
        FieldSpec::new("color", "color", FieldType::Text),
        FieldSpec::new("printType", "print_type", FieldType::Text),
        FieldSpec::new("matSku", "mat_sku", FieldType::Text),
        DIMENSION1,
        DIMENSION2,
        COST,
        BASE_PRICE,
        PRICE_MODIFIER,
    ],
    foreign_keys: &[PRODUCT_IMAGE_FK],
    joins: &[],
    derived: DerivedRule::ProductDimensions,
    prices: &[RETAIL_PRICE],
    delete_on_absence: false,
};

static FRAME: EntitySchema = EntitySchema {
    kind: EntityKind::Frame,
    fields: &[
        SORT_INDEX,
        FieldSpec::new("displayName", "display_name", FieldType::Text),
        DESCRIPTION,
        FieldSpec::new("material", "material", FieldType::Text),
        FieldSpec::new("color", "color", FieldType::Text),
        FieldSpec::new("printType", "print_type", FieldType::Text),
        FieldSpec::new("frameSku", "frame_sku", FieldType::Text),
        DIMENSION1,
        DIMENSION2,
        COST,
        BASE_PRICE,
        PRICE_MODIFIER,
    ],
    foreign_keys: &[PRODUCT_IMAGE_FK],
    joins: &[],
    derived: DerivedRule::ProductDimensions,
    prices: &[RETAIL_PRICE],
    delete_on_absence: false,
};

static PHOTO: EntitySchema = EntitySchema {
    kind: EntityKind::Photo,
    fields: &[
        FieldSpec::new("title", "title", FieldType::Text).default(DefaultValue::Text("Untitled")),
        FieldSpec::new("description", "description", FieldType::Text)
            .default(DefaultValue::Text("No description provided.")),
        FieldSpec::new("isFeatured", "is_featured", FieldType::Bool).default(DefaultValue::Bool(false)),
        FieldSpec::new("isLimitedEdition", "is_limited_edition", FieldType::Bool)
            .default(DefaultValue::Bool(false)),
        FieldSpec::new("isHidden", "is_hidden", FieldType::Bool).default(DefaultValue::Bool(false)),
        FieldSpec::new("rating", "rating", FieldType::Int)
            .default(DefaultValue::Int(5))
            .range(1, 10),
        FieldSpec::new("printTypes", "print_types", FieldType::TextList)
            .default(DefaultValue::TextList("PAPER,ALU")),
        sized_base_price("basePrice12", "base_price12"),
        sized_modifier("priceModifier12", "price_modifier12"),
        sized_base_price("basePrice16", "base_price16"),
        sized_modifier("priceModifier16", "price_modifier16"),
        sized_base_price("basePrice20", "base_price20"),
        sized_modifier("priceModifier20", "price_modifier20"),
        sized_base_price("basePrice24", "base_price24"),
        sized_modifier("priceModifier24", "price_modifier24"),
        sized_base_price("basePrice30", "base_price30"),
        sized_modifier("priceModifier30", "price_modifier30"),
    ],
    foreign_keys: &[
        ForeignKeySpec {
            field: "photographerId",
            column: "photographer_id",
            target: EntityKind::Photographer,
        },
        ForeignKeySpec {
            field: "locationId",
            column: "location_id",
            target: EntityKind::Location,
        },
        ForeignKeySpec {
            field: "photoImageId",
            column: "photo_image_id",
            target: EntityKind::PhotoImage,
        },
        ForeignKeySpec {
            field: "shareImageId",
            column: "share_image_id",
            target: EntityKind::ShareImage,
        },
    ],
    joins: &[
        JoinSpec {
            field: "subjectIds",
            table: "photo_subjects",
            owner_column: "photo_id",
            target_column: "subject_id",
            target: EntityKind::Subject,
        },
        JoinSpec {
            field: "tagIds",
            table: "photo_tags",
            owner_column: "photo_id",
            target_column: "tag_id",
            target: EntityKind::Tag,
        },
        JoinSpec {
            field: "collectionIds",
            table: "photo_collections",
            owner_column: "photo_id",
            target_column: "collection_id",
            target: EntityKind::Collection,
        },
    ],
    derived: DerivedRule::PhotoIdentity,
    prices: &[
        PriceSpec { name: "retailPrice12", base: "basePrice12", modifier: "priceModifier12" },
        PriceSpec { name: "retailPrice16", base: "basePrice16", modifier: "priceModifier16" },
        PriceSpec { name: "retailPrice20", base: "basePrice20", modifier: "priceModifier20" },
        PriceSpec { name: "retailPrice24", base: "basePrice24", modifier: "priceModifier24" },
        PriceSpec { name: "retailPrice30", base: "basePrice30", modifier: "priceModifier30" },
    ],
    delete_on_absence: true,
};

pub(crate) fn schema_for(kind: EntityKind) -> &'static EntitySchema {
    match kind {
        EntityKind::Collection => &COLLECTION,
        EntityKind::Location => &LOCATION,
        EntityKind::Subject => &SUBJECT,
        EntityKind::Tag => &TAG,
        EntityKind::Photographer => &PHOTOGRAPHER,
        EntityKind::ProductImage => &PRODUCT_IMAGE,
        EntityKind::PhotoImage => &PHOTO_IMAGE,
        EntityKind::ShareImage => &SHARE_IMAGE,
        EntityKind::Print => &PRINT,
        EntityKind::Mat => &MAT,
        EntityKind::Frame => &FRAME,
        EntityKind::Photo => &PHOTO,
    }
}
