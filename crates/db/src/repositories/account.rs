//! Account repository for chart-of-accounts operations.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, Set,
};
use trellis_core::ledger::{AccountInfo, AccountType, LedgerError};
use trellis_shared::types::{AccountId, OrganizationId};
use uuid::Uuid;

use crate::entities::{accounts, postings, sea_orm_active_enums};

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct CreateAccountInput {
    /// Organization the account belongs to.
    pub organization_id: OrganizationId,
    /// Account code (unique per organization).
    pub code: String,
    /// Account name.
    pub name: String,
    /// Account classification.
    pub account_type: AccountType,
    /// Optional parent account.
    pub parent_account_id: Option<AccountId>,
}

/// Account repository.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
}

fn to_db_type(account_type: AccountType) -> sea_orm_active_enums::AccountType {
    match account_type {
        AccountType::Asset => sea_orm_active_enums::AccountType::Asset,
        AccountType::Liability => sea_orm_active_enums::AccountType::Liability,
        AccountType::Equity => sea_orm_active_enums::AccountType::Equity,
        AccountType::Revenue => sea_orm_active_enums::AccountType::Revenue,
        AccountType::Expense => sea_orm_active_enums::AccountType::Expense,
    }
}

/// Maps the storage enum back to the domain enum.
#[must_use]
pub fn to_core_type(account_type: &sea_orm_active_enums::AccountType) -> AccountType {
    match account_type {
        sea_orm_active_enums::AccountType::Asset => AccountType::Asset,
        sea_orm_active_enums::AccountType::Liability => AccountType::Liability,
        sea_orm_active_enums::AccountType::Equity => AccountType::Equity,
        sea_orm_active_enums::AccountType::Revenue => AccountType::Revenue,
        sea_orm_active_enums::AccountType::Expense => AccountType::Expense,
    }
}

/// Converts an account row into the validation view the ledger core uses.
#[must_use]
pub fn to_account_info(model: &accounts::Model) -> AccountInfo {
    AccountInfo {
        id: AccountId::from_uuid(model.id),
        organization_id: OrganizationId::from_uuid(model.organization_id),
        account_type: to_core_type(&model.account_type),
        is_active: model.is_active,
    }
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails (e.g. duplicate code).
    pub async fn create(&self, input: CreateAccountInput) -> Result<accounts::Model, DbErr> {
        let now = Utc::now().into();
        let account = accounts::ActiveModel {
            id: Set(AccountId::new().into_inner()),
            organization_id: Set(input.organization_id.into_inner()),
            code: Set(input.code),
            name: Set(input.name),
            account_type: Set(to_db_type(input.account_type)),
            parent_account_id: Set(input.parent_account_id.map(AccountId::into_inner)),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        account.insert(&self.db).await
    }

    /// Fetches an account scoped to an organization.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::AccountNotFound` if no such account exists.
    pub async fn get(
        &self,
        organization_id: OrganizationId,
        account_id: AccountId,
    ) -> Result<accounts::Model, LedgerError> {
        accounts::Entity::find_by_id(account_id.into_inner())
            .filter(accounts::Column::OrganizationId.eq(organization_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(|e| LedgerError::Database(e.to_string()))?
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    /// Renames an account. Name and parent are editable; the type is not
    /// once postings reference the account.
    ///
    /// # Errors
    ///
    /// Returns an error if the account is missing or the update fails.
    pub async fn rename(
        &self,
        organization_id: OrganizationId,
        account_id: AccountId,
        name: String,
    ) -> Result<accounts::Model, LedgerError> {
        let account = self.get(organization_id, account_id).await?;
        let mut active: accounts::ActiveModel = account.into();
        active.name = Set(name);
        active.updated_at = Set(Utc::now().into());
        active
            .update(&self.db)
            .await
            .map_err(|e| LedgerError::Database(e.to_string()))
    }

    /// Changes an account's type, refused once any posting references it.
    /// The storage trigger backs this check.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::AccountTypeImmutable` if the account has
    /// postings.
    pub async fn set_account_type(
        &self,
        organization_id: OrganizationId,
        account_id: AccountId,
        account_type: AccountType,
    ) -> Result<accounts::Model, LedgerError> {
        let has_postings = self
            .has_postings(&self.db, account_id)
            .await
            .map_err(|e| LedgerError::Database(e.to_string()))?;
        if has_postings {
            return Err(LedgerError::AccountTypeImmutable(account_id));
        }

        let account = self.get(organization_id, account_id).await?;
        let mut active: accounts::ActiveModel = account.into();
        active.account_type = Set(to_db_type(account_type));
        active.updated_at = Set(Utc::now().into());
        active
            .update(&self.db)
            .await
            .map_err(|e| LedgerError::Database(e.to_string()))
    }

    async fn has_postings<C: ConnectionTrait>(
        &self,
        conn: &C,
        account_id: AccountId,
    ) -> Result<bool, DbErr> {
        let count = postings::Entity::find()
            .filter(postings::Column::AccountId.eq(account_id.into_inner()))
            .count(conn)
            .await?;
        Ok(count > 0)
    }

    /// Loads the accounts referenced by a posting set, keyed by id, for the
    /// core validation closure.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn load_for_validation<C: ConnectionTrait>(
        conn: &C,
        organization_id: OrganizationId,
        account_ids: &[AccountId],
    ) -> Result<std::collections::HashMap<Uuid, accounts::Model>, DbErr> {
        let ids: Vec<Uuid> = account_ids.iter().map(|id| id.into_inner()).collect();
        let rows = accounts::Entity::find()
            .filter(accounts::Column::OrganizationId.eq(organization_id.into_inner()))
            .filter(accounts::Column::Id.is_in(ids))
            .all(conn)
            .await?;
        Ok(rows.into_iter().map(|m| (m.id, m)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mapping_roundtrip() {
        for t in [
            AccountType::Asset,
            AccountType::Liability,
            AccountType::Equity,
            AccountType::Revenue,
            AccountType::Expense,
        ] {
            assert_eq!(to_core_type(&to_db_type(t)), t);
        }
    }

    #[test]
    fn test_to_account_info() {
        let model = accounts::Model {
            id: Uuid::now_v7(),
            organization_id: Uuid::now_v7(),
            code: "1000".to_string(),
            name: "Operating Cash".to_string(),
            account_type: sea_orm_active_enums::AccountType::Asset,
            parent_account_id: None,
            is_active: true,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        };

        let info = to_account_info(&model);
        assert_eq!(info.id.into_inner(), model.id);
        assert_eq!(info.account_type, AccountType::Asset);
        assert!(info.is_active);
    }
}
