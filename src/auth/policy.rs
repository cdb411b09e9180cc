//! Admin capability policy.
//!
//! The source system re-checked a hardcoded admin id inline on every
//! privileged page. Here the check lives in one place: a policy maps an
//! identity to its capability set, and every privileged service method asks
//! the policy before acting.

use crate::{auth::errors::AuthError, uuids::TypedUuid};

/// Marker for shopper identities handed to us by the external auth provider.
#[derive(Debug, Clone, Copy)]
pub struct Shopper;

/// An authenticated shopper's opaque id.
pub type UserId = TypedUuid<Shopper>;

/// Privileged operations the console can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Create, update, and delete catalog products.
    ManageCatalog,
    /// Create and delete coupons.
    ManageCoupons,
    /// Advance order statuses.
    AdvanceOrders,
}

const ADMIN_CAPABILITIES: &[Capability] = &[
    Capability::ManageCatalog,
    Capability::ManageCoupons,
    Capability::AdvanceOrders,
];

/// Maps identities to capabilities. Exactly one allow-listed admin identity
/// holds every capability; everyone else holds none.
#[derive(Debug, Clone)]
pub struct AdminPolicy {
    admin: UserId,
}

impl AdminPolicy {
    #[must_use]
    pub fn new(admin: UserId) -> Self {
        Self { admin }
    }

    /// The capability set granted to `identity`.
    #[must_use]
    pub fn capabilities(&self, identity: UserId) -> &'static [Capability] {
        if identity == self.admin {
            ADMIN_CAPABILITIES
        } else {
            &[]
        }
    }

    /// Require `identity` to hold `capability`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Forbidden`] when the identity lacks the capability.
    pub fn require(&self, identity: UserId, capability: Capability) -> Result<(), AuthError> {
        if self.capabilities(identity).contains(&capability) {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}
