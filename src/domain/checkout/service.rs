//! Checkout engine.
//!
//! Turns cart lines, an identity, and an optional coupon into a persisted
//! order. Pricing, coupon redemption, the order insert, and the cart clear
//! all happen inside one transaction; a failure anywhere leaves no trace.

use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use rand::Rng;
use rustc_hash::{FxHashMap, FxHashSet};
use sqlx::{Postgres, Transaction};
use tracing::{info, warn};

use crate::{
    auth::UserId,
    database::Db,
    domain::{
        carts::{
            PgCartRepository,
            models::{CartLine, CartSnapshot, VariantSelection},
        },
        catalog::{PgCatalogRepository, models::ProductId},
        checkout::{errors::CheckoutError, models::CheckoutRequest, pricing},
        coupons::PgCouponsRepository,
        orders::{
            PgOrdersRepository,
            models::{NewOrder, Order, OrderId, OrderItem},
        },
    },
    subscriptions::FeedRegistry,
};

#[derive(Debug, Clone)]
pub struct PgCheckoutService {
    db: Db,
    catalog: PgCatalogRepository,
    carts: PgCartRepository,
    coupons: PgCouponsRepository,
    orders: PgOrdersRepository,
    cart_feeds: Arc<FeedRegistry<UserId, CartSnapshot>>,
}

impl PgCheckoutService {
    #[must_use]
    pub fn new(db: Db, cart_feeds: Arc<FeedRegistry<UserId, CartSnapshot>>) -> Self {
        Self {
            db,
            catalog: PgCatalogRepository::new(),
            carts: PgCartRepository::new(),
            coupons: PgCouponsRepository::new(),
            orders: PgOrdersRepository::new(),
            cart_feeds,
        }
    }

    /// Look up each distinct product's exemption flag. A product that cannot
    /// be resolved is left out of the map and prices as non-exempt: the fee
    /// is charged rather than silently waived.
    async fn exemption_flags(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        lines: &[CartLine],
    ) -> FxHashMap<ProductId, bool> {
        let products: FxHashSet<_> = lines.iter().map(|line| line.product).collect();
        let mut flags = FxHashMap::default();

        for product in products {
            match self.catalog.shipping_fee_exempt(tx, product).await {
                Ok(Some(exempt)) => {
                    flags.insert(product, exempt);
                }
                Ok(None) => {
                    warn!(product_id = %product, "product missing during fee check; charging fee");
                }
                Err(error) => {
                    warn!(
                        product_id = %product,
                        %error,
                        "exemption lookup failed; charging fee"
                    );
                }
            }
        }

        flags
    }

    /// Price `lines` and persist the order. Runs inside the caller's
    /// transaction so the coupon redemption and the order insert commit or
    /// roll back together.
    async fn place_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: Option<UserId>,
        lines: Vec<CartLine>,
        request: &CheckoutRequest,
    ) -> Result<Order, CheckoutError> {
        let subtotal = pricing::subtotal(&lines);

        let exemptions = self.exemption_flags(tx, &lines).await;
        let shipping_fee = pricing::shipping_fee(&lines, &exemptions);

        let discount = match &request.coupon_code {
            Some(code) => {
                let user = user.ok_or(CheckoutError::AuthRequired)?;

                self.coupons
                    .redeem(tx, user, code, subtotal)
                    .await?
                    .discount
            }
            None => 0,
        };

        let total = pricing::grand_total(subtotal, shipping_fee, discount);

        let items = lines
            .into_iter()
            .map(|line| OrderItem {
                id: line.product,
                name: line.name,
                price: line.unit_price,
                color: line.color,
                size: line.size,
                quantity: line.quantity,
            })
            .collect();

        let order = self
            .orders
            .insert_order(
                tx,
                &NewOrder {
                    id: OrderId::new(),
                    reference: order_reference(),
                    user,
                    payer: request.payer.clone(),
                    phone: request.phone.clone(),
                    memo: request.memo.clone(),
                    items,
                    subtotal,
                    discount,
                    total,
                },
            )
            .await?;

        Ok(order)
    }
}

fn validate(request: &CheckoutRequest) -> Result<(), CheckoutError> {
    if request.payer.trim().is_empty() {
        return Err(CheckoutError::MissingField("payer"));
    }

    if request.phone.trim().is_empty() {
        return Err(CheckoutError::MissingField("phone"));
    }

    Ok(())
}

fn order_reference() -> String {
    let digits = rand::thread_rng().gen_range(0..10_000_000_u32);

    format!("#DPS-{digits:07}")
}

#[async_trait]
impl CheckoutService for PgCheckoutService {
    #[tracing::instrument(
        name = "checkout.service.checkout_cart",
        skip(self, request),
        fields(user = %user, coupon = request.coupon_code.is_some()),
        err
    )]
    async fn checkout_cart(
        &self,
        user: UserId,
        request: CheckoutRequest,
    ) -> Result<Order, CheckoutError> {
        validate(&request)?;

        let mut tx = self.db.begin_transaction().await?;

        let snapshot = self.carts.snapshot(&mut tx, user).await?;

        if snapshot.is_empty() {
            return Err(CheckoutError::EmptyOrder);
        }

        let order = self
            .place_order(&mut tx, Some(user), snapshot.lines, &request)
            .await?;

        self.carts.clear(&mut tx, user).await?;

        tx.commit().await?;

        self.cart_feeds.publish(user, CartSnapshot::empty());

        info!(order_id = %order.id, total = order.total, "placed cart order");

        Ok(order)
    }

    #[tracing::instrument(
        name = "checkout.service.checkout_express",
        skip(self, selection, request),
        fields(product_id = %selection.product),
        err
    )]
    async fn checkout_express(
        &self,
        user: Option<UserId>,
        selection: VariantSelection,
        request: CheckoutRequest,
    ) -> Result<Order, CheckoutError> {
        validate(&request)?;

        if selection.quantity == 0 {
            return Err(CheckoutError::InvalidQuantity);
        }

        let mut tx = self.db.begin_transaction().await?;

        let product = self.catalog.get_product(&mut tx, selection.product).await?;

        if !product.has_color(&selection.color) {
            return Err(CheckoutError::UnknownVariant);
        }

        let unit_price = product
            .unit_price(&selection.size)
            .ok_or(CheckoutError::UnknownVariant)?;

        let line = CartLine {
            product: product.id,
            name: product.name,
            color: selection.color,
            size: selection.size,
            unit_price,
            quantity: selection.quantity,
        };

        // The express item never entered the shared cart, so the shared cart
        // is not read or cleared here.
        let order = self.place_order(&mut tx, user, vec![line], &request).await?;

        tx.commit().await?;

        info!(order_id = %order.id, total = order.total, "placed express order");

        Ok(order)
    }

    #[tracing::instrument(
        name = "checkout.service.checkout_session",
        skip(self, cart, request),
        fields(lines = cart.lines.len()),
        err
    )]
    async fn checkout_session(
        &self,
        cart: &CartSnapshot,
        request: CheckoutRequest,
    ) -> Result<Order, CheckoutError> {
        validate(&request)?;

        if cart.is_empty() {
            return Err(CheckoutError::EmptyOrder);
        }

        let mut tx = self.db.begin_transaction().await?;

        let order = self
            .place_order(&mut tx, None, cart.lines.clone(), &request)
            .await?;

        tx.commit().await?;

        info!(order_id = %order.id, total = order.total, "placed guest order");

        Ok(order)
    }
}

#[automock]
#[async_trait]
pub trait CheckoutService: Send + Sync {
    /// Check out a signed-in shopper's server cart, clearing it on success.
    async fn checkout_cart(
        &self,
        user: UserId,
        request: CheckoutRequest,
    ) -> Result<Order, CheckoutError>;

    /// "Buy now": check out a single variant that bypasses the persistent
    /// cart entirely. Never touches or clears the shared cart.
    async fn checkout_express(
        &self,
        user: Option<UserId>,
        selection: VariantSelection,
        request: CheckoutRequest,
    ) -> Result<Order, CheckoutError>;

    /// Check out a guest's session cart. The order records no user id, and a
    /// coupon code is rejected with [`CheckoutError::AuthRequired`].
    async fn checkout_session(
        &self,
        cart: &CartSnapshot,
        request: CheckoutRequest,
    ) -> Result<Order, CheckoutError>;
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::{
        domain::{
            carts::{CartsService, SessionCart},
            catalog::CatalogService,
            coupons::{
                CouponsService, CouponsServiceError,
                models::{CouponId, NewCoupon},
            },
            orders::{OrdersService, status::OrderStatus},
        },
        test::TestContext,
    };

    use super::*;

    fn selection(product: ProductId, quantity: u32) -> VariantSelection {
        VariantSelection {
            product,
            color: "Black".to_string(),
            size: "M".to_string(),
            quantity,
        }
    }

    fn request() -> CheckoutRequest {
        CheckoutRequest::new("조승우", "010-1234-5678").with_memo("문앞에 놓아주세요")
    }

    async fn seed_coupon(ctx: &TestContext, code: &str, percentage: u8) -> TestResult {
        ctx.coupons
            .create_coupon(
                ctx.admin,
                NewCoupon {
                    id: CouponId::new(),
                    code: code.to_string(),
                    discount_percentage: percentage,
                    quantity: 10,
                },
            )
            .await?;

        Ok(())
    }

    #[tokio::test]
    async fn cart_checkout_prices_ships_discounts_and_clears() -> TestResult {
        let ctx = TestContext::new().await;

        let coat = ctx.seed_product("Wool Coat", 20_000, false).await?;
        let scarf = ctx.seed_product("Silk Scarf", 5_000, true).await?;
        seed_coupon(&ctx, "WELCOME10", 10).await?;

        ctx.carts
            .add_variant(ctx.shopper, selection(coat, 2))
            .await?;
        ctx.carts
            .add_variant(ctx.shopper, selection(scarf, 1))
            .await?;

        let order = ctx
            .checkout
            .checkout_cart(ctx.shopper, request().with_coupon("WELCOME10"))
            .await?;

        assert_eq!(order.subtotal, 45_000);
        assert_eq!(order.discount, 4_500);
        // 45,000 + 3,000 shipping (the coat is not exempt) - 4,500.
        assert_eq!(order.total, 43_500);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.user, Some(ctx.shopper));
        assert_eq!(order.items.len(), 2);

        let cart = ctx.carts.snapshot(ctx.shopper).await?;
        assert!(cart.is_empty(), "cart must be cleared after checkout");

        Ok(())
    }

    #[tokio::test]
    async fn fully_exempt_cart_pays_no_shipping() -> TestResult {
        let ctx = TestContext::new().await;
        let scarf = ctx.seed_product("Silk Scarf", 5_000, true).await?;

        ctx.carts
            .add_variant(ctx.shopper, selection(scarf, 2))
            .await?;

        let order = ctx.checkout.checkout_cart(ctx.shopper, request()).await?;

        assert_eq!(order.subtotal, 10_000);
        assert_eq!(order.total, 10_000);

        Ok(())
    }

    #[tokio::test]
    async fn empty_cart_is_rejected_before_any_write() -> TestResult {
        let ctx = TestContext::new().await;

        let result = ctx.checkout.checkout_cart(ctx.shopper, request()).await;

        assert!(
            matches!(result, Err(CheckoutError::EmptyOrder)),
            "expected EmptyOrder, got {result:?}"
        );

        let orders = ctx.orders.list_all_orders(ctx.admin).await?;
        assert!(orders.is_empty(), "no order may be written");

        Ok(())
    }

    #[tokio::test]
    async fn missing_payer_or_phone_is_rejected() -> TestResult {
        let ctx = TestContext::new().await;
        let coat = ctx.seed_product("Wool Coat", 20_000, false).await?;

        ctx.carts
            .add_variant(ctx.shopper, selection(coat, 1))
            .await?;

        let no_payer = CheckoutRequest::new("  ", "010-1234-5678");
        let result = ctx.checkout.checkout_cart(ctx.shopper, no_payer).await;
        assert!(
            matches!(result, Err(CheckoutError::MissingField("payer"))),
            "expected MissingField(payer), got {result:?}"
        );

        let no_phone = CheckoutRequest::new("조승우", "");
        let result = ctx.checkout.checkout_cart(ctx.shopper, no_phone).await;
        assert!(
            matches!(result, Err(CheckoutError::MissingField("phone"))),
            "expected MissingField(phone), got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn coupon_failure_rolls_back_the_whole_checkout() -> TestResult {
        let ctx = TestContext::new().await;
        let coat = ctx.seed_product("Wool Coat", 20_000, false).await?;

        ctx.carts
            .add_variant(ctx.shopper, selection(coat, 1))
            .await?;

        let result = ctx
            .checkout
            .checkout_cart(ctx.shopper, request().with_coupon("NOPE"))
            .await;

        assert!(
            matches!(
                result,
                Err(CheckoutError::Coupon(CouponsServiceError::NotFound))
            ),
            "expected Coupon(NotFound), got {result:?}"
        );

        let orders = ctx.orders.list_all_orders(ctx.admin).await?;
        assert!(orders.is_empty(), "failed checkout must write no order");

        let cart = ctx.carts.snapshot(ctx.shopper).await?;
        assert_eq!(cart.lines.len(), 1, "failed checkout must not clear cart");

        // Retrying without the coupon proceeds undiscounted.
        let order = ctx.checkout.checkout_cart(ctx.shopper, request()).await?;
        assert_eq!(order.discount, 0);

        Ok(())
    }

    #[tokio::test]
    async fn coupon_cannot_be_spent_across_two_checkouts() -> TestResult {
        let ctx = TestContext::new().await;
        let coat = ctx.seed_product("Wool Coat", 20_000, false).await?;
        seed_coupon(&ctx, "ONCE10", 10).await?;

        ctx.carts
            .add_variant(ctx.shopper, selection(coat, 1))
            .await?;
        ctx.checkout
            .checkout_cart(ctx.shopper, request().with_coupon("ONCE10"))
            .await?;

        ctx.carts
            .add_variant(ctx.shopper, selection(coat, 1))
            .await?;
        let result = ctx
            .checkout
            .checkout_cart(ctx.shopper, request().with_coupon("ONCE10"))
            .await;

        assert!(
            matches!(
                result,
                Err(CheckoutError::Coupon(CouponsServiceError::AlreadyUsed))
            ),
            "expected Coupon(AlreadyUsed), got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn express_checkout_never_touches_the_cart() -> TestResult {
        let ctx = TestContext::new().await;
        let coat = ctx.seed_product("Wool Coat", 20_000, false).await?;
        let scarf = ctx.seed_product("Silk Scarf", 5_000, true).await?;

        ctx.carts
            .add_variant(ctx.shopper, selection(coat, 1))
            .await?;

        let order = ctx
            .checkout
            .checkout_express(Some(ctx.shopper), selection(scarf, 1), request())
            .await?;

        assert_eq!(order.subtotal, 5_000);
        assert_eq!(order.total, 5_000, "scarf is exempt, no fee");
        assert_eq!(order.items.len(), 1);

        let cart = ctx.carts.snapshot(ctx.shopper).await?;
        assert_eq!(
            cart.lines.len(),
            1,
            "express checkout must leave the cart alone"
        );
        assert_eq!(cart.lines[0].product, coat);

        Ok(())
    }

    #[tokio::test]
    async fn express_checkout_works_for_guests() -> TestResult {
        let ctx = TestContext::new().await;
        let coat = ctx.seed_product("Wool Coat", 20_000, false).await?;

        let order = ctx
            .checkout
            .checkout_express(None, selection(coat, 1), request())
            .await?;

        assert_eq!(order.user, None);
        assert_eq!(order.total, 23_000);

        Ok(())
    }

    #[tokio::test]
    async fn express_checkout_rejects_unknown_variants() -> TestResult {
        let ctx = TestContext::new().await;
        let coat = ctx.seed_product("Wool Coat", 20_000, false).await?;

        let mut bad_color = selection(coat, 1);
        bad_color.color = "Chartreuse".to_string();

        let result = ctx
            .checkout
            .checkout_express(Some(ctx.shopper), bad_color, request())
            .await;

        assert!(
            matches!(result, Err(CheckoutError::UnknownVariant)),
            "expected UnknownVariant, got {result:?}"
        );

        let result = ctx
            .checkout
            .checkout_express(Some(ctx.shopper), selection(ProductId::new(), 1), request())
            .await;

        assert!(
            matches!(result, Err(CheckoutError::NotFound)),
            "expected NotFound, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn guest_session_checkout_records_no_user() -> TestResult {
        let ctx = TestContext::new().await;
        let coat = ctx.seed_product("Wool Coat", 20_000, false).await?;
        let product = ctx.catalog.get_product(coat).await?;

        let mut cart = SessionCart::new();
        cart.add_variant(&product, "Black", "M", 2)?;

        let order = ctx
            .checkout
            .checkout_session(&cart.snapshot(), request())
            .await?;

        assert_eq!(order.user, None);
        assert_eq!(order.subtotal, 40_000);
        assert_eq!(order.total, 43_000);

        Ok(())
    }

    #[tokio::test]
    async fn guest_coupons_are_rejected() -> TestResult {
        let ctx = TestContext::new().await;
        let coat = ctx.seed_product("Wool Coat", 20_000, false).await?;
        let product = ctx.catalog.get_product(coat).await?;
        seed_coupon(&ctx, "WELCOME10", 10).await?;

        let mut cart = SessionCart::new();
        cart.add_variant(&product, "Black", "M", 1)?;

        let result = ctx
            .checkout
            .checkout_session(&cart.snapshot(), request().with_coupon("WELCOME10"))
            .await;

        assert!(
            matches!(result, Err(CheckoutError::AuthRequired)),
            "expected AuthRequired, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn order_items_keep_their_purchase_price() -> TestResult {
        let ctx = TestContext::new().await;
        let coat = ctx.seed_product("Wool Coat", 20_000, false).await?;

        ctx.carts
            .add_variant(ctx.shopper, selection(coat, 1))
            .await?;

        let order = ctx.checkout.checkout_cart(ctx.shopper, request()).await?;

        ctx.reprice_product(coat, 99_000).await?;

        let stored = ctx.orders.get_order(order.id).await?;
        assert_eq!(
            stored.items[0].price, 20_000,
            "order snapshots the price at purchase time"
        );

        Ok(())
    }

    #[tokio::test]
    async fn deleted_product_in_cart_still_charges_the_fee() -> TestResult {
        let ctx = TestContext::new().await;
        // Exempt product: fee would be zero while it is resolvable.
        let scarf = ctx.seed_product("Silk Scarf", 5_000, true).await?;

        ctx.carts
            .add_variant(ctx.shopper, selection(scarf, 1))
            .await?;

        ctx.catalog.delete_product(ctx.admin, scarf).await?;

        let order = ctx.checkout.checkout_cart(ctx.shopper, request()).await?;

        // Fail closed: the flag can no longer be resolved, so the fee applies.
        assert_eq!(order.total, order.subtotal + pricing::SHIPPING_FEE);

        Ok(())
    }
}
