//! Compliance rule repository.
//!
//! Loads the externally maintained jurisdiction rule table and hands rows
//! to the core resolver. Rule values never originate from code.

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use trellis_core::compliance::{
    self, ComplianceError, ComplianceRule, Jurisdiction, RuleCategory, RuleParameters,
};
use trellis_shared::types::ComplianceRuleId;

use crate::entities::{compliance_rules, sea_orm_active_enums};

fn to_db_category(category: RuleCategory) -> sea_orm_active_enums::RuleCategory {
    match category {
        RuleCategory::LateFee => sea_orm_active_enums::RuleCategory::LateFee,
        RuleCategory::SecurityDeposit => sea_orm_active_enums::RuleCategory::SecurityDeposit,
        RuleCategory::NoticePeriod => sea_orm_active_enums::RuleCategory::NoticePeriod,
    }
}

fn to_core_category(category: &sea_orm_active_enums::RuleCategory) -> RuleCategory {
    match category {
        sea_orm_active_enums::RuleCategory::LateFee => RuleCategory::LateFee,
        sea_orm_active_enums::RuleCategory::SecurityDeposit => RuleCategory::SecurityDeposit,
        sea_orm_active_enums::RuleCategory::NoticePeriod => RuleCategory::NoticePeriod,
    }
}

fn to_core_rule(model: &compliance_rules::Model) -> Result<ComplianceRule, ComplianceError> {
    let parameters: RuleParameters = serde_json::from_value(model.parameters.clone())
        .map_err(|e| {
            ComplianceError::Database(format!("malformed rule parameters for {}: {e}", model.id))
        })?;
    Ok(ComplianceRule {
        id: ComplianceRuleId::from_uuid(model.id),
        category: to_core_category(&model.category),
        jurisdiction: Jurisdiction {
            state: model.state.clone(),
            city: model.city.clone(),
        },
        parameters,
        effective_from: model.effective_from,
        effective_to: model.effective_to,
    })
}

/// Compliance rule repository.
#[derive(Debug, Clone)]
pub struct ComplianceRepository {
    db: DatabaseConnection,
}

impl ComplianceRepository {
    /// Creates a new compliance repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts a rule row. Rules are versioned by effective date; a change
    /// is a new row, never an update.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn insert(
        &self,
        jurisdiction: Jurisdiction,
        parameters: RuleParameters,
        effective_from: NaiveDate,
        effective_to: Option<NaiveDate>,
    ) -> Result<compliance_rules::Model, ComplianceError> {
        let model = compliance_rules::ActiveModel {
            id: Set(ComplianceRuleId::new().into_inner()),
            category: Set(to_db_category(parameters.category())),
            state: Set(jurisdiction.state),
            city: Set(jurisdiction.city),
            parameters: Set(serde_json::to_value(&parameters)
                .map_err(|e| ComplianceError::Database(e.to_string()))?),
            effective_from: Set(effective_from),
            effective_to: Set(effective_to),
            created_at: Set(Utc::now().into()),
        };
        model
            .insert(&self.db)
            .await
            .map_err(|e| ComplianceError::Database(e.to_string()))
    }

    /// Resolves the parameters governing a category at a location, with the
    /// city → state → federal fallback applied by the core resolver.
    ///
    /// # Errors
    ///
    /// Returns `RULE_NOT_FOUND` when nothing applies.
    pub async fn resolve(
        &self,
        category: RuleCategory,
        location: &Jurisdiction,
        as_of: NaiveDate,
    ) -> Result<RuleParameters, ComplianceError> {
        let rows = compliance_rules::Entity::find()
            .filter(compliance_rules::Column::Category.eq(to_db_category(category)))
            .all(&self.db)
            .await
            .map_err(|e| ComplianceError::Database(e.to_string()))?;

        let rules = rows
            .iter()
            .map(to_core_rule)
            .collect::<Result<Vec<_>, _>>()?;

        compliance::resolve(category, location, as_of, &rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trellis_core::compliance::LateFeeType;
    use uuid::Uuid;

    #[test]
    fn test_category_mapping_roundtrip() {
        for c in [
            RuleCategory::LateFee,
            RuleCategory::SecurityDeposit,
            RuleCategory::NoticePeriod,
        ] {
            assert_eq!(to_core_category(&to_db_category(c)), c);
        }
    }

    #[test]
    fn test_to_core_rule_parses_parameters() {
        let params = RuleParameters::LateFee {
            fee_type: LateFeeType::LesserOf,
            max_percentage: Some(dec!(5)),
            max_flat_amount: Some(dec!(15)),
            grace_period_days: Some(5),
            stacking_allowed: false,
        };
        let model = compliance_rules::Model {
            id: Uuid::now_v7(),
            category: sea_orm_active_enums::RuleCategory::LateFee,
            state: Some("NC".to_string()),
            city: None,
            parameters: serde_json::to_value(&params).unwrap(),
            effective_from: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            effective_to: None,
            created_at: Utc::now().into(),
        };

        let rule = to_core_rule(&model).unwrap();
        assert_eq!(rule.category, RuleCategory::LateFee);
        assert_eq!(rule.jurisdiction, Jurisdiction::state("NC"));
        assert_eq!(rule.parameters, params);
    }

    #[test]
    fn test_to_core_rule_rejects_garbage_parameters() {
        let model = compliance_rules::Model {
            id: Uuid::now_v7(),
            category: sea_orm_active_enums::RuleCategory::LateFee,
            state: None,
            city: None,
            parameters: serde_json::json!({ "category": "not_a_category" }),
            effective_from: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            effective_to: None,
            created_at: Utc::now().into(),
        };

        assert!(to_core_rule(&model).is_err());
    }
}
