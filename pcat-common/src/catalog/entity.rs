//! Persisted catalog entity

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use super::kind::EntityKind;
use super::schema::DerivedRule;
use super::value::FieldValue;
use crate::derived::{self, AspectRatio, ImageOrientation};
use crate::{Error, Result};

/// A stored entity of any kind
///
/// `fields` is keyed by source-file field name and holds scalar fields,
/// single-valued foreign keys and stored derived columns. A missing key is
/// a NULL column.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntity {
    pub kind: EntityKind,
    pub id: i64,
    pub fields: BTreeMap<&'static str, FieldValue>,
}

impl CatalogEntity {
    pub fn new(kind: EntityKind, id: i64) -> Self {
        Self {
            kind,
            id,
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: &'static str, value: FieldValue) {
        self.fields.insert(name, value);
    }

    pub fn clear(&mut self, name: &str) {
        self.fields.remove(name);
    }

    fn require_f64(&self, name: &str) -> Result<f64> {
        self.get(name).and_then(FieldValue::as_f64).ok_or_else(|| {
            Error::InvalidInput(format!("{} {} has no numeric {}", self.kind, self.id, name))
        })
    }

    fn require_i64(&self, name: &str) -> Result<i64> {
        self.get(name).and_then(FieldValue::as_i64).ok_or_else(|| {
            Error::InvalidInput(format!("{} {} has no integer {}", self.kind, self.id, name))
        })
    }

    /// Recompute every stored derived field from its inputs
    ///
    /// Called once per persist, after all imported values are applied, so
    /// derived columns always reflect the values being written.
    pub fn recompute_derived(&mut self) -> Result<()> {
        match self.kind.schema().derived {
            DerivedRule::None => {}
            DerivedRule::ProductDimensions => {
                let d1 = self.require_f64("dimension1")?;
                let d2 = self.require_f64("dimension2")?;
                let ratio = AspectRatio::classify(d1, d2)?;
                self.set("aspectRatio", FieldValue::Text(ratio.as_str().to_string()));
            }
            DerivedRule::ImageDimensions => {
                let width = self.require_i64("width")?;
                let height = self.require_i64("height")?;
                let ratio = AspectRatio::classify(width as f64, height as f64)?;
                let orientation = ImageOrientation::from_size(width, height);
                self.set("aspectRatio", FieldValue::Text(ratio.as_str().to_string()));
                self.set("isPortrait", FieldValue::Bool(orientation.is_portrait));
                self.set("isPanoramic", FieldValue::Bool(orientation.is_panoramic));
            }
            DerivedRule::PhotoIdentity => {
                let rating = self.require_i64("rating")?;
                let sku = derived::photo_sku(self.id)?;
                let sort_index = derived::photo_sort_index(rating, sku)?;
                self.set("sku", FieldValue::Int(sku));
                self.set("sortIndex", FieldValue::Int(sort_index));
            }
        }
        Ok(())
    }

    /// Stored aspect ratio class, if this kind carries one
    pub fn aspect_ratio(&self) -> Option<AspectRatio> {
        self.get("aspectRatio")
            .and_then(FieldValue::as_str)
            .and_then(|s| s.parse().ok())
    }

    /// Retail prices computed on read from each base price / modifier pair
    ///
    /// Pairs with a missing base price are omitted.
    pub fn retail_prices(&self) -> BTreeMap<&'static str, f64> {
        self.kind
            .schema()
            .prices
            .iter()
            .filter_map(|p| {
                let base = self.get(p.base).and_then(FieldValue::as_f64)?;
                let modifier = self.get(p.modifier).and_then(FieldValue::as_f64).unwrap_or(1.0);
                Some((p.name, derived::retail_price(base, modifier)))
            })
            .collect()
    }

    /// JSON view with identity, stored fields and on-read retail prices
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("kind".to_string(), json!(self.kind));
        map.insert("id".to_string(), json!(self.id));
        for (name, value) in &self.fields {
            map.insert((*name).to_string(), json!(value));
        }
        for (name, price) in self.retail_prices() {
            map.insert(name.to_string(), json!(price));
        }
        Value::Object(map)
    }
}
