//! Checkout Data

/// What the payment page collects before an order can be placed.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Name the bank transfer will arrive under. Required.
    pub payer: String,
    /// Contact number. Required.
    pub phone: String,
    /// Free-text deposit memo. Optional.
    pub memo: String,
    /// Coupon code to apply, if any. Coupon failure aborts the checkout; the
    /// shopper retries without the code to proceed undiscounted.
    pub coupon_code: Option<String>,
}

impl CheckoutRequest {
    #[must_use]
    pub fn new(payer: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            payer: payer.into(),
            phone: phone.into(),
            memo: String::new(),
            coupon_code: None,
        }
    }

    #[must_use]
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    #[must_use]
    pub fn with_coupon(mut self, code: impl Into<String>) -> Self {
        self.coupon_code = Some(code.into());
        self
    }
}
