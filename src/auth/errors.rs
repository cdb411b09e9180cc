//! Authorization errors.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("authentication required")]
    AuthRequired,

    #[error("operation not permitted")]
    Forbidden,
}
