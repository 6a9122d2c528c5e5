//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing a `TenantId` where an
//! `AccountId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random ID using UUID v7 (time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

typed_id!(OrganizationId, "Unique identifier for an organization.");
typed_id!(UserId, "Unique identifier for a user (audit actor).");
typed_id!(
    AccountId,
    "Unique identifier for a chart of accounts entry."
);
typed_id!(JournalEntryId, "Unique identifier for a journal entry.");
typed_id!(PostingId, "Unique identifier for a posting line.");
typed_id!(
    AccountingPeriodId,
    "Unique identifier for an accounting period."
);
typed_id!(PropertyId, "Unique identifier for a property.");
typed_id!(UnitId, "Unique identifier for a rental unit.");
typed_id!(TenantId, "Unique identifier for a tenant.");
typed_id!(BillId, "Unique identifier for a vendor bill.");
typed_id!(SagaId, "Unique identifier for a saga instance.");
typed_id!(OutboxEventId, "Unique identifier for an outbox event.");
typed_id!(
    IdempotencyRecordId,
    "Unique identifier for an idempotency record."
);
typed_id!(ComplianceRuleId, "Unique identifier for a compliance rule.");

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(AccountId::new(), AccountId::new());
        assert_ne!(SagaId::new(), SagaId::new());
    }

    #[test]
    fn test_id_roundtrip_via_str() {
        let id = JournalEntryId::new();
        let parsed = JournalEntryId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_id_from_uuid() {
        let uuid = Uuid::now_v7();
        let id = OrganizationId::from_uuid(uuid);
        assert_eq!(id.into_inner(), uuid);
    }

    #[test]
    fn test_id_rejects_garbage() {
        assert!(AccountId::from_str("not-a-uuid").is_err());
    }
}
