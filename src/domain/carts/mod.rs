//! Carts

pub mod errors;
pub mod models;
mod repository;
pub mod service;
pub mod session;

pub(crate) use repository::PgCartRepository;

pub use errors::CartsServiceError;
pub use service::*;
pub use session::SessionCart;
