//! Checkout errors.

use sqlx::Error;
use thiserror::Error;

use crate::domain::coupons::CouponsServiceError;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("nothing to order")]
    EmptyOrder,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("quantity must be at least one")]
    InvalidQuantity,

    #[error("product not found")]
    NotFound,

    #[error("product has no such color or size")]
    UnknownVariant,

    #[error("sign in to use a coupon")]
    AuthRequired,

    #[error(transparent)]
    Coupon(CouponsServiceError),

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for CheckoutError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::NotFound;
        }

        Self::Sql(error)
    }
}

impl From<CouponsServiceError> for CheckoutError {
    fn from(error: CouponsServiceError) -> Self {
        match error {
            CouponsServiceError::Sql(e) => Self::Sql(e),
            other => Self::Coupon(other),
        }
    }
}
