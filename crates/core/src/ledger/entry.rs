//! Journal entry and posting domain types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trellis_shared::types::{
    AccountId, AccountingPeriodId, JournalEntryId, OrganizationId, PostingId, PropertyId,
    TenantId, UnitId,
};

/// Dimensional tags attached to a posting line.
///
/// Tags scope a posting to a property, unit, or tenant for dimensional
/// balance tracking. All tags are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionTags {
    /// The property this posting relates to.
    pub property_id: Option<PropertyId>,
    /// The unit this posting relates to.
    pub unit_id: Option<UnitId>,
    /// The tenant this posting relates to.
    pub tenant_id: Option<TenantId>,
}

impl DimensionTags {
    /// Returns true if no tag is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.property_id.is_none() && self.unit_id.is_none() && self.tenant_id.is_none()
    }

    /// Canonical key for the tag combination, used to address a
    /// dimensional balance row. Absent tags render as `-`.
    #[must_use]
    pub fn dimension_key(&self) -> String {
        let part = |id: Option<uuid::Uuid>| id.map_or_else(|| "-".to_string(), |u| u.to_string());
        format!(
            "p:{}|u:{}|t:{}",
            part(self.property_id.map(PropertyId::into_inner)),
            part(self.unit_id.map(UnitId::into_inner)),
            part(self.tenant_id.map(TenantId::into_inner)),
        )
    }
}

/// A single business event recorded in the journal.
///
/// Entries are created once, inside one atomic unit of work, and are never
/// updated afterwards except to stamp `reversed_by_entry_id`. A correction
/// is a new reversing entry, not a mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique identifier.
    pub id: JournalEntryId,
    /// Organization this entry belongs to.
    pub organization_id: OrganizationId,
    /// The accounting period the entry was posted into.
    pub period_id: AccountingPeriodId,
    /// The business date of the entry.
    pub entry_date: NaiveDate,
    /// Description of the business event.
    pub description: String,
    /// The idempotency key the entry was posted under.
    pub idempotency_key: String,
    /// Set when a later entry reverses this one.
    pub reversed_by_entry_id: Option<JournalEntryId>,
    /// Set on a reversing entry, pointing at the entry it reverses.
    pub reverses_entry_id: Option<JournalEntryId>,
    /// When the entry was recorded.
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Returns true if this entry has been reversed.
    #[must_use]
    pub fn is_reversed(&self) -> bool {
        self.reversed_by_entry_id.is_some()
    }

    /// Returns true if this entry is itself a reversal.
    #[must_use]
    pub fn is_reversal(&self) -> bool {
        self.reverses_entry_id.is_some()
    }
}

/// One line of a journal entry.
///
/// Owned exclusively by its entry; never created, updated, or deleted
/// independently of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Posting {
    /// Unique identifier.
    pub id: PostingId,
    /// The entry this posting belongs to.
    pub entry_id: JournalEntryId,
    /// The account affected.
    pub account_id: AccountId,
    /// Signed amount: positive debit, negative credit.
    pub signed_amount: Decimal,
    /// Optional memo.
    pub memo: Option<String>,
    /// Dimensional tags.
    pub tags: DimensionTags,
}

impl Posting {
    /// Returns true if this posting is a debit.
    #[must_use]
    pub fn is_debit(&self) -> bool {
        self.signed_amount.is_sign_positive() && !self.signed_amount.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_key_empty() {
        let tags = DimensionTags::default();
        assert!(tags.is_empty());
        assert_eq!(tags.dimension_key(), "p:-|u:-|t:-");
    }

    #[test]
    fn test_dimension_key_is_stable_per_combination() {
        let property = PropertyId::new();
        let tenant = TenantId::new();

        let a = DimensionTags {
            property_id: Some(property),
            unit_id: None,
            tenant_id: Some(tenant),
        };
        let b = a.clone();
        assert_eq!(a.dimension_key(), b.dimension_key());

        let c = DimensionTags {
            property_id: Some(property),
            unit_id: None,
            tenant_id: None,
        };
        assert_ne!(a.dimension_key(), c.dimension_key());
    }
}
