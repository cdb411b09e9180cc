//! Catalog Models

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::uuids::TypedUuid;

/// Product id
pub type ProductId = TypedUuid<Product>;

/// A catalog product.
///
/// Pricing is either flat (`price` applies to every size) or per-size (each
/// size carries its own price). A product needs at least one color and one
/// size to be purchasable.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Markdown description, stored verbatim; rendering is the UI's concern.
    pub description: String,
    /// Flat price in won. `None` when every size is individually priced.
    pub price: Option<u64>,
    pub sizes: SmallVec<[SizeOption; 4]>,
    pub colors: SmallVec<[ColorOption; 4]>,
    pub shipping_fee_exempt: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

/// A selectable size, optionally with its own price.
///
/// Older catalog documents stored sizes as bare name strings; both shapes
/// deserialize, bare names meaning "flat price applies".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SizeOptionRepr")]
pub struct SizeOption {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SizeOptionRepr {
    Name(String),
    Priced {
        name: String,
        #[serde(default)]
        price: Option<u64>,
    },
}

impl From<SizeOptionRepr> for SizeOption {
    fn from(repr: SizeOptionRepr) -> Self {
        match repr {
            SizeOptionRepr::Name(name) => Self { name, price: None },
            SizeOptionRepr::Priced { name, price } => Self { name, price },
        }
    }
}

/// A selectable color with its image reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorOption {
    pub name: String,
    pub image: String,
}

impl Product {
    /// Resolve the unit price for `size`: the size-specific price when one
    /// exists, the flat price otherwise. `None` when the size is unknown or
    /// carries no resolvable price.
    #[must_use]
    pub fn unit_price(&self, size: &str) -> Option<u64> {
        let option = self.sizes.iter().find(|s| s.name == size)?;

        option.price.or(self.price)
    }

    #[must_use]
    pub fn has_color(&self, color: &str) -> bool {
        self.colors.iter().any(|c| c.name == color)
    }

    #[must_use]
    pub fn is_purchasable(&self) -> bool {
        !self.colors.is_empty() && !self.sizes.is_empty()
    }
}

/// New Product Data
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Option<u64>,
    pub sizes: SmallVec<[SizeOption; 4]>,
    pub colors: SmallVec<[ColorOption; 4]>,
    pub shipping_fee_exempt: bool,
}

/// Product Update Data
#[derive(Debug, Clone, PartialEq)]
pub struct ProductUpdate {
    pub name: String,
    pub description: String,
    pub price: Option<u64>,
    pub sizes: SmallVec<[SizeOption; 4]>,
    pub colors: SmallVec<[ColorOption; 4]>,
    pub shipping_fee_exempt: bool,
}
