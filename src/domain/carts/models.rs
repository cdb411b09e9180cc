//! Cart Models

use serde::{Deserialize, Serialize};

use crate::domain::catalog::models::ProductId;

/// The merge identity of a cart line: two lines with the same key are the
/// same line and their quantities sum.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantKey {
    pub product: ProductId,
    pub color: String,
    pub size: String,
}

/// A shopper's pick on a product page, before pricing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantSelection {
    pub product: ProductId,
    pub color: String,
    pub size: String,
    pub quantity: u32,
}

impl VariantSelection {
    #[must_use]
    pub fn key(&self) -> VariantKey {
        VariantKey {
            product: self.product,
            color: self.color.clone(),
            size: self.size.clone(),
        }
    }
}

/// One priced cart line. `unit_price` is the price resolved when the variant
/// was selected; later catalog edits do not reprice it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product: ProductId,
    pub name: String,
    pub color: String,
    pub size: String,
    pub unit_price: u64,
    pub quantity: u32,
}

impl CartLine {
    #[must_use]
    pub fn key(&self) -> VariantKey {
        VariantKey {
            product: self.product,
            color: self.color.clone(),
            size: self.size.clone(),
        }
    }

    #[must_use]
    pub fn line_total(&self) -> u64 {
        self.unit_price * u64::from(self.quantity)
    }
}

/// Sum of unit price × quantity over `lines`.
#[must_use]
pub fn line_subtotal(lines: &[CartLine]) -> u64 {
    lines.iter().map(CartLine::line_total).sum()
}

/// A point-in-time view of a cart: the ordered lines plus derived totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
}

impl CartSnapshot {
    #[must_use]
    pub const fn empty() -> Self {
        Self { lines: Vec::new() }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total quantity across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    #[must_use]
    pub fn subtotal(&self) -> u64 {
        line_subtotal(&self.lines)
    }
}
