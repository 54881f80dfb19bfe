//! Data models for truck load planning.
//!
//! This module defines the fundamental data structures shared by the calculator
//! and the placement grid:
//! - `ContainerSpec`: The cargo bay of the selected truck
//! - `ProductSpec`: A user-entered product row with optional dimensions
//! - `ItemFootprint`: The uniform box used to discretise the container into cells
//! - `TruckCatalog` / `ProductVariant`: The fixed catalogs offered to the user

use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::types::{Dimensional, Vec3, validation};

/// Identifier of a product row or of a placed item.
pub type ItemId = usize;

/// Validation error for container, footprint and catalog data.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    InvalidDimension(String),
    InvalidFootprint(String),
    UnknownTruck(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidDimension(msg) => write!(f, "Invalid dimension: {}", msg),
            ValidationError::InvalidFootprint(msg) => write!(f, "Invalid footprint: {}", msg),
            ValidationError::UnknownTruck(key) => write!(f, "Unknown truck size: '{}'", key),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Represents the cargo bay of a truck in meters.
///
/// Immutable once selected; replacing it invalidates every computed placement.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "width": 2.13, "height": 2.13, "length": 4.27 }))]
pub struct ContainerSpec {
    pub width: f64,
    pub height: f64,
    pub length: f64,
}

impl ContainerSpec {
    /// Creates a new container after validating every dimension.
    ///
    /// # Examples
    /// ```
    /// use load_planner::model::ContainerSpec;
    ///
    /// assert!(ContainerSpec::new(2.13, 2.13, 4.27).is_ok());
    /// assert!(ContainerSpec::new(0.0, 2.13, 4.27).is_err());
    /// ```
    pub fn new(width: f64, height: f64, length: f64) -> Result<Self, ValidationError> {
        let spec = Self {
            width,
            height,
            length,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Re-checks the dimensions, e.g. after deserialization.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_dimension(self.width, "Container width")
            .and_then(|_| validation::validate_dimension(self.height, "Container height"))
            .and_then(|_| validation::validate_dimension(self.length, "Container length"))
            .map_err(ValidationError::InvalidDimension)
    }
}

impl Dimensional for ContainerSpec {
    fn dimensions(&self) -> Vec3 {
        Vec3::new(self.length, self.height, self.width)
    }
}

/// A user-entered product row.
///
/// Dimensions stay optional because the form starts out blank; an unset,
/// non-positive or non-finite dimension makes the row count as zero fit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 1, "width": 1.0, "height": 1.0, "length": 1.0, "requested_quantity": 10
}))]
pub struct ProductSpec {
    pub id: ItemId,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub length: Option<f64>,
    #[serde(default)]
    pub requested_quantity: u64,
}

impl ProductSpec {
    pub fn new(id: ItemId, width: f64, height: f64, length: f64, requested_quantity: u64) -> Self {
        Self {
            id,
            width: Some(width),
            height: Some(height),
            length: Some(length),
            requested_quantity,
        }
    }

    /// A freshly added, still empty row.
    pub fn blank(id: ItemId) -> Self {
        Self {
            id,
            width: None,
            height: None,
            length: None,
            requested_quantity: 0,
        }
    }

    /// Returns the dimensions in world axis order when all three are usable.
    pub fn valid_dimensions(&self) -> Option<Vec3> {
        let dims = Vec3::new(self.length?, self.height?, self.width?);
        dims.is_valid_dimension().then_some(dims)
    }

    /// Volume of a single unit, `None` for rows with invalid dimensions.
    pub fn unit_volume(&self) -> Option<f64> {
        self.valid_dimensions().map(|dims| dims.volume())
    }
}

/// The uniform box used to discretise the container into grid cells.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "length": 1.0, "width": 1.0, "height": 1.0 }))]
pub struct ItemFootprint {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

impl ItemFootprint {
    pub const UNIT: ItemFootprint = ItemFootprint {
        length: 1.0,
        width: 1.0,
        height: 1.0,
    };

    /// Creates a footprint after validating the dimensions.
    pub fn new(length: f64, width: f64, height: f64) -> Result<Self, ValidationError> {
        let footprint = Self {
            length,
            width,
            height,
        };
        footprint.validate()?;
        Ok(footprint)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_dimension(self.length, "Footprint length")
            .and_then(|_| validation::validate_dimension(self.width, "Footprint width"))
            .and_then(|_| validation::validate_dimension(self.height, "Footprint height"))
            .map_err(ValidationError::InvalidFootprint)
    }
}

impl Default for ItemFootprint {
    fn default() -> Self {
        Self::UNIT
    }
}

impl Dimensional for ItemFootprint {
    fn dimensions(&self) -> Vec3 {
        Vec3::new(self.length, self.height, self.width)
    }
}

/// Named product presets offered by the placement view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ProductVariant {
    #[serde(rename = "Product A")]
    A,
    #[serde(rename = "Product B")]
    B,
    #[serde(rename = "Product C")]
    C,
}

impl ProductVariant {
    /// Resolves a preset by its display name. Unknown names fall back to Product A.
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "Product B" => ProductVariant::B,
            "Product C" => ProductVariant::C,
            _ => ProductVariant::A,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProductVariant::A => "Product A",
            ProductVariant::B => "Product B",
            ProductVariant::C => "Product C",
        }
    }

    pub fn footprint(&self) -> ItemFootprint {
        match self {
            ProductVariant::A => ItemFootprint::UNIT,
            ProductVariant::B => ItemFootprint {
                length: 0.5,
                width: 0.5,
                height: 0.5,
            },
            ProductVariant::C => ItemFootprint {
                length: 0.5,
                width: 0.3,
                height: 1.0,
            },
        }
    }
}

/// Entry of the truck catalog.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TruckSize {
    pub key: &'static str,
    pub container: ContainerSpec,
}

/// The fixed catalog of known truck sizes.
pub struct TruckCatalog;

impl TruckCatalog {
    pub const DEFAULT_KEY: &'static str = "14";

    const SIZES: [TruckSize; 4] = [
        TruckSize {
            key: "14",
            container: ContainerSpec {
                width: 2.13,
                height: 2.13,
                length: 4.27,
            },
        },
        TruckSize {
            key: "17",
            container: ContainerSpec {
                width: 2.29,
                height: 2.13,
                length: 5.18,
            },
        },
        TruckSize {
            key: "22",
            container: ContainerSpec {
                width: 2.43,
                height: 2.13,
                length: 6.71,
            },
        },
        TruckSize {
            key: "32",
            container: ContainerSpec {
                width: 2.44,
                height: 2.13,
                length: 9.75,
            },
        },
    ];

    /// All known truck sizes, in ascending size order.
    pub fn entries() -> &'static [TruckSize] {
        &Self::SIZES
    }

    /// Looks up the container for a truck key.
    ///
    /// # Examples
    /// ```
    /// use load_planner::model::TruckCatalog;
    ///
    /// let truck = TruckCatalog::lookup("17").unwrap();
    /// assert_eq!(truck.length, 5.18);
    /// assert!(TruckCatalog::lookup("99").is_err());
    /// ```
    pub fn lookup(key: &str) -> Result<ContainerSpec, ValidationError> {
        let key = key.trim();
        Self::SIZES
            .iter()
            .find(|size| size.key == key)
            .map(|size| size.container)
            .ok_or_else(|| ValidationError::UnknownTruck(key.to_string()))
    }

    pub fn contains(key: &str) -> bool {
        Self::lookup(key).is_ok()
    }
}
