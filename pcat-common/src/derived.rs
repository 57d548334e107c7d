//! Derived attribute calculations
//!
//! Pure functions for the fields every physical product and image carries
//! but never accepts from an import file:
//! - Aspect ratio classification from a dimension pair
//! - Retail price from base price and price modifier
//! - Portrait / panoramic orientation flags for images
//! - Photo SKU and sort index from identity and rating

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Offset added to a photo identity to form its SKU
pub const PHOTO_SKU_OFFSET: i64 = 1000;

/// Aspect ratio classes used to match photos with prints, mats and frames
///
/// Classification thresholds (short side / long side, first match wins):
/// - `< 0.30` → 1:4
/// - `< 0.40` → 1:3
/// - `< 0.60` → 1:2
/// - `< 0.72` → 2:3
/// - `< 0.94` → 4:5
/// - otherwise → 1:1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:4")]
    OneByFour,
    #[serde(rename = "1:3")]
    OneByThree,
    #[serde(rename = "1:2")]
    OneByTwo,
    #[serde(rename = "2:3")]
    TwoByThree,
    #[serde(rename = "4:5")]
    FourByFive,
    #[serde(rename = "1:1")]
    Square,
}

/// Upper bounds (exclusive) for each class, evaluated in order
const THRESHOLDS: [(f64, AspectRatio); 5] = [
    (0.30, AspectRatio::OneByFour),
    (0.40, AspectRatio::OneByThree),
    (0.60, AspectRatio::OneByTwo),
    (0.72, AspectRatio::TwoByThree),
    (0.94, AspectRatio::FourByFive),
];

impl AspectRatio {
    /// Classify a dimension pair
    ///
    /// The pair is ordered internally, so `classify(a, b) == classify(b, a)`.
    /// Equal dimensions are always square.
    ///
    /// # Errors
    /// `Error::InvalidDimension` when either value is negative or non-finite,
    /// or when the long side is zero.
    pub fn classify(dimension1: f64, dimension2: f64) -> Result<Self> {
        if !dimension1.is_finite() || !dimension2.is_finite() {
            return Err(Error::InvalidDimension(format!(
                "non-finite dimensions ({}, {})",
                dimension1, dimension2
            )));
        }
        if dimension1 < 0.0 || dimension2 < 0.0 {
            return Err(Error::InvalidDimension(format!(
                "negative dimensions ({}, {})",
                dimension1, dimension2
            )));
        }

        let short = dimension1.min(dimension2);
        let long = dimension1.max(dimension2);

        if long == 0.0 {
            return Err(Error::InvalidDimension(format!(
                "zero-length long side ({}, {})",
                dimension1, dimension2
            )));
        }

        if dimension1 == dimension2 {
            return Ok(AspectRatio::Square);
        }

        let ratio = short / long;
        Ok(THRESHOLDS
            .iter()
            .find(|(bound, _)| ratio < *bound)
            .map(|(_, class)| *class)
            .unwrap_or(AspectRatio::Square))
    }

    /// Stored string form ("2:3", "1:1", ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::OneByFour => "1:4",
            AspectRatio::OneByThree => "1:3",
            AspectRatio::OneByTwo => "1:2",
            AspectRatio::TwoByThree => "2:3",
            AspectRatio::FourByFive => "4:5",
            AspectRatio::Square => "1:1",
        }
    }

    /// All classes, narrowest first
    pub fn all_variants() -> &'static [AspectRatio] {
        &[
            AspectRatio::OneByFour,
            AspectRatio::OneByThree,
            AspectRatio::OneByTwo,
            AspectRatio::TwoByThree,
            AspectRatio::FourByFive,
            AspectRatio::Square,
        ]
    }
}

impl FromStr for AspectRatio {
    type Err = Error;

    /// Parse the stored string form ("4:5")
    fn from_str(s: &str) -> Result<Self> {
        AspectRatio::all_variants()
            .iter()
            .copied()
            .find(|v| v.as_str() == s.trim())
            .ok_or_else(|| Error::InvalidInput(format!("unknown aspect ratio '{}'", s)))
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retail price: `base_price × price_modifier`
///
/// Plain IEEE-754 multiply with no rounding. Prices in the catalog are
/// whole or near-whole currency units, so f64 is exact for every value the
/// source files carry.
pub fn retail_price(base_price: f64, price_modifier: f64) -> f64 {
    base_price * price_modifier
}

/// Orientation flags for image entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOrientation {
    /// Height exceeds width
    pub is_portrait: bool,
    /// Width is more than twice the height
    pub is_panoramic: bool,
}

impl ImageOrientation {
    pub fn from_size(width: i64, height: i64) -> Self {
        Self {
            is_portrait: height > width,
            is_panoramic: (width as f64) / 2.0 > height as f64,
        }
    }
}

/// Photo SKU: identity + 1000
pub fn photo_sku(id: i64) -> Result<i64> {
    id.checked_add(PHOTO_SKU_OFFSET)
        .ok_or_else(|| Error::InvalidInput(format!("photo id {} overflows sku", id)))
}

/// Photo sort index: decimal digits of the rating followed by the SKU
///
/// Rating 5 and SKU 1007 give 51007, so higher-rated photos sort later.
pub fn photo_sort_index(rating: i64, sku: i64) -> Result<i64> {
    format!("{}{}", rating, sku)
        .parse::<i64>()
        .map_err(|e| {
            Error::InvalidInput(format!(
                "sort index from rating {} and sku {}: {}",
                rating, sku, e
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_dimensions_are_square() {
        for d in [1.0, 8.5, 1000.0, 12345.678] {
            assert_eq!(AspectRatio::classify(d, d).unwrap(), AspectRatio::Square);
        }
    }

    #[test]
    fn test_classification_examples() {
        assert_eq!(AspectRatio::classify(1000.0, 1000.0).unwrap(), AspectRatio::Square);
        assert_eq!(AspectRatio::classify(1000.0, 1600.0).unwrap(), AspectRatio::TwoByThree);
        assert_eq!(AspectRatio::classify(1000.0, 3500.0).unwrap(), AspectRatio::OneByFour);
        assert_eq!(AspectRatio::classify(8.0, 10.0).unwrap(), AspectRatio::FourByFive);
        assert_eq!(AspectRatio::classify(12.0, 24.0).unwrap(), AspectRatio::OneByTwo);
        assert_eq!(AspectRatio::classify(10.0, 30.0).unwrap(), AspectRatio::OneByThree);
        assert_eq!(AspectRatio::classify(95.0, 100.0).unwrap(), AspectRatio::Square);
    }

    #[test]
    fn test_threshold_boundaries_are_exclusive() {
        // ratio exactly on a bound falls into the next class
        assert_eq!(AspectRatio::classify(30.0, 100.0).unwrap(), AspectRatio::OneByThree);
        assert_eq!(AspectRatio::classify(40.0, 100.0).unwrap(), AspectRatio::OneByTwo);
        assert_eq!(AspectRatio::classify(60.0, 100.0).unwrap(), AspectRatio::TwoByThree);
        assert_eq!(AspectRatio::classify(72.0, 100.0).unwrap(), AspectRatio::FourByFive);
        assert_eq!(AspectRatio::classify(94.0, 100.0).unwrap(), AspectRatio::Square);
    }

    #[test]
    fn test_classification_is_order_independent() {
        let pairs = [
            (1.0, 2.0),
            (3.0, 11.0),
            (16.0, 20.0),
            (24.0, 36.0),
            (1400.0, 933.0),
            (0.5, 7.25),
        ];
        for (a, b) in pairs {
            assert_eq!(
                AspectRatio::classify(a, b).unwrap(),
                AspectRatio::classify(b, a).unwrap(),
                "classification of ({}, {}) depends on order",
                a,
                b
            );
        }
    }

    #[test]
    fn test_invalid_dimensions() {
        assert!(matches!(AspectRatio::classify(0.0, 0.0), Err(Error::InvalidDimension(_))));
        assert!(matches!(AspectRatio::classify(-1.0, 10.0), Err(Error::InvalidDimension(_))));
        assert!(matches!(AspectRatio::classify(f64::NAN, 10.0), Err(Error::InvalidDimension(_))));
        assert!(matches!(
            AspectRatio::classify(10.0, f64::INFINITY),
            Err(Error::InvalidDimension(_))
        ));
    }

    #[test]
    fn test_zero_short_side_is_narrowest_class() {
        assert_eq!(AspectRatio::classify(0.0, 10.0).unwrap(), AspectRatio::OneByFour);
    }

    #[test]
    fn test_string_round_trip() {
        for class in AspectRatio::all_variants() {
            assert_eq!(class.as_str().parse::<AspectRatio>().unwrap(), *class);
        }
        assert_eq!(" 4:5 ".parse::<AspectRatio>().unwrap(), AspectRatio::FourByFive);
        assert!(matches!("16:9".parse::<AspectRatio>(), Err(Error::InvalidInput(_))));
        assert_eq!(format!("{}", AspectRatio::TwoByThree), "2:3");
    }

    #[test]
    fn test_retail_price() {
        assert_eq!(retail_price(120.0, 1.0), 120.0);
        assert_eq!(retail_price(140.0, 0.9), 126.0);
        assert_eq!(retail_price(250.0, 0.0), 0.0);
        assert_eq!(retail_price(99.5, 1.25), 99.5 * 1.25);
    }

    #[test]
    fn test_image_orientation() {
        let landscape = ImageOrientation::from_size(1400, 933);
        assert!(!landscape.is_portrait);
        assert!(!landscape.is_panoramic);

        let portrait = ImageOrientation::from_size(933, 1400);
        assert!(portrait.is_portrait);
        assert!(!portrait.is_panoramic);

        let pano = ImageOrientation::from_size(1400, 500);
        assert!(!pano.is_portrait);
        assert!(pano.is_panoramic);

        // exactly 2:1 is not panoramic
        assert!(!ImageOrientation::from_size(1400, 700).is_panoramic);
    }

    #[test]
    fn test_photo_sku_and_sort_index() {
        let sku = photo_sku(7).unwrap();
        assert_eq!(sku, 1007);
        assert_eq!(photo_sort_index(5, sku).unwrap(), 51007);
        assert_eq!(photo_sort_index(10, sku).unwrap(), 101007);
        assert!(photo_sku(i64::MAX).is_err());
    }
}
