//! Pure pricing rules.
//!
//! Everything here is side-effect free; the checkout service feeds these
//! functions with data it loaded inside its transaction.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::domain::{carts::models::CartLine, catalog::models::ProductId};

/// Flat shipping fee in won, charged once per order unless every product in
/// it is exempt.
pub const SHIPPING_FEE: u64 = 3_000;

/// Sum of unit price × quantity over `lines`.
#[must_use]
pub fn subtotal(lines: &[CartLine]) -> u64 {
    crate::domain::carts::models::line_subtotal(lines)
}

/// The shipping fee for an order with `lines`, given each product's
/// exemption flag as the catalog reported it.
///
/// Fails closed: a product missing from `exemptions` (not found, or the
/// lookup failed) counts as non-exempt and charges the fee. Zero is returned
/// only when every distinct product is positively known to be exempt.
#[must_use]
pub fn shipping_fee(lines: &[CartLine], exemptions: &FxHashMap<ProductId, bool>) -> u64 {
    if lines.is_empty() {
        return 0;
    }

    let products: FxHashSet<ProductId> = lines.iter().map(|line| line.product).collect();

    let all_exempt = products
        .iter()
        .all(|product| exemptions.get(product).copied().unwrap_or(false));

    if all_exempt { 0 } else { SHIPPING_FEE }
}

/// Grand total: subtotal plus shipping, net of the discount, floored at zero.
#[must_use]
pub fn grand_total(subtotal: u64, shipping_fee: u64, discount: u64) -> u64 {
    (subtotal + shipping_fee).saturating_sub(discount)
}
