//! Session cart.
//!
//! The guest flow's cart: an explicit, session-scoped value with the same
//! merge and quantity semantics as the server-backed cart. Callers hold it
//! by handle and read it through `snapshot()`; nothing about it is global.

use crate::domain::{
    carts::{
        errors::CartsServiceError,
        models::{CartLine, CartSnapshot, VariantKey},
    },
    catalog::models::Product,
};

#[derive(Debug, Clone, Default)]
pub struct SessionCart {
    lines: Vec<CartLine>,
}

impl SessionCart {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variant of `product`, resolving its unit price now. Merges into
    /// an existing line with the same (product, color, size) key.
    ///
    /// # Errors
    ///
    /// Returns [`CartsServiceError::InvalidQuantity`] for a zero quantity and
    /// [`CartsServiceError::UnknownVariant`] when the product has no such
    /// color or size.
    pub fn add_variant(
        &mut self,
        product: &Product,
        color: &str,
        size: &str,
        quantity: u32,
    ) -> Result<(), CartsServiceError> {
        if quantity == 0 {
            return Err(CartsServiceError::InvalidQuantity);
        }

        if !product.has_color(color) {
            return Err(CartsServiceError::UnknownVariant);
        }

        let unit_price = product
            .unit_price(size)
            .ok_or(CartsServiceError::UnknownVariant)?;

        let key = VariantKey {
            product: product.id,
            color: color.to_string(),
            size: size.to_string(),
        };

        if let Some(line) = self.lines.iter_mut().find(|line| line.key() == key) {
            line.quantity += quantity;
        } else {
            self.lines.push(CartLine {
                product: product.id,
                name: product.name.clone(),
                color: key.color,
                size: key.size,
                unit_price,
                quantity,
            });
        }

        Ok(())
    }

    /// Apply a quantity delta. A resulting quantity of zero or less removes
    /// the line; an unknown key is a no-op.
    pub fn change_quantity(&mut self, key: &VariantKey, delta: i32) {
        let Some(index) = self.lines.iter().position(|line| line.key() == *key) else {
            return;
        };

        let quantity = i64::from(self.lines[index].quantity) + i64::from(delta);

        if quantity >= 1 {
            self.lines[index].quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        } else {
            self.lines.remove(index);
        }
    }

    /// Remove a line unconditionally. An unknown key is a no-op.
    pub fn remove_variant(&mut self, key: &VariantKey) {
        self.lines.retain(|line| line.key() != *key);
    }

    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            lines: self.lines.clone(),
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use smallvec::smallvec;

    use crate::domain::catalog::models::{ColorOption, ProductId, SizeOption};

    use super::*;

    fn product(name: &str, price: u64) -> Product {
        Product {
            id: ProductId::new(),
            name: name.to_string(),
            description: String::new(),
            price: Some(price),
            sizes: smallvec![
                SizeOption {
                    name: "M".to_string(),
                    price: None,
                },
                SizeOption {
                    name: "L".to_string(),
                    price: None,
                },
            ],
            colors: smallvec![
                ColorOption {
                    name: "Black".to_string(),
                    image: "black.jpg".to_string(),
                },
                ColorOption {
                    name: "White".to_string(),
                    image: "white.jpg".to_string(),
                },
            ],
            shipping_fee_exempt: false,
            created_at: Timestamp::now(),
            updated_at: Timestamp::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn lines_merge_by_variant_key() -> Result<(), CartsServiceError> {
        let coat = product("Wool Coat", 89_000);
        let mut cart = SessionCart::new();

        cart.add_variant(&coat, "Black", "M", 1)?;
        cart.add_variant(&coat, "Black", "M", 2)?;
        cart.add_variant(&coat, "Black", "L", 1)?;

        let snapshot = cart.snapshot();

        assert_eq!(snapshot.lines.len(), 2);
        assert_eq!(snapshot.lines[0].quantity, 3);
        assert_eq!(snapshot.lines[1].quantity, 1);
        assert_eq!(snapshot.item_count(), 4);

        Ok(())
    }

    #[test]
    fn quantities_net_out_and_nonpositive_lines_vanish() -> Result<(), CartsServiceError> {
        let coat = product("Wool Coat", 89_000);
        let mut cart = SessionCart::new();

        cart.add_variant(&coat, "Black", "M", 2)?;
        let key = cart.snapshot().lines[0].key();

        cart.change_quantity(&key, 3);
        cart.change_quantity(&key, -1);
        assert_eq!(cart.snapshot().lines[0].quantity, 4);

        cart.change_quantity(&key, -4);
        assert!(cart.snapshot().is_empty());

        Ok(())
    }

    #[test]
    fn unknown_keys_are_no_ops() -> Result<(), CartsServiceError> {
        let coat = product("Wool Coat", 89_000);
        let mut cart = SessionCart::new();

        cart.add_variant(&coat, "Black", "M", 1)?;

        let missing = VariantKey {
            product: ProductId::new(),
            color: "Black".to_string(),
            size: "M".to_string(),
        };

        cart.change_quantity(&missing, 10);
        cart.remove_variant(&missing);

        assert_eq!(cart.snapshot().lines.len(), 1);
        assert_eq!(cart.snapshot().lines[0].quantity, 1);

        Ok(())
    }

    #[test]
    fn snapshot_subtotal_tracks_lines() -> Result<(), CartsServiceError> {
        let coat = product("Wool Coat", 20_000);
        let scarf = product("Silk Scarf", 5_000);
        let mut cart = SessionCart::new();

        cart.add_variant(&coat, "Black", "M", 2)?;
        cart.add_variant(&scarf, "White", "L", 1)?;

        assert_eq!(cart.snapshot().subtotal(), 45_000);

        Ok(())
    }

    #[test]
    fn unknown_variants_are_rejected() {
        let coat = product("Wool Coat", 89_000);
        let mut cart = SessionCart::new();

        assert!(matches!(
            cart.add_variant(&coat, "Red", "M", 1),
            Err(CartsServiceError::UnknownVariant)
        ));
        assert!(matches!(
            cart.add_variant(&coat, "Black", "XXS", 1),
            Err(CartsServiceError::UnknownVariant)
        ));
        assert!(matches!(
            cart.add_variant(&coat, "Black", "M", 0),
            Err(CartsServiceError::InvalidQuantity)
        ));
    }

    #[test]
    fn clear_resets_the_session() -> Result<(), CartsServiceError> {
        let coat = product("Wool Coat", 89_000);
        let mut cart = SessionCart::new();

        cart.add_variant(&coat, "Black", "M", 1)?;
        cart.clear();

        assert!(cart.snapshot().is_empty());

        Ok(())
    }
}
