//! Row-level security session context.
//!
//! Restricted database roles only see rows whose `organization_id` matches
//! the `trellis.org_id` connection setting. Request-scoped code sets the
//! context before touching org-scoped tables; the owning role used by
//! migrations and background workers bypasses the policies.

use sea_orm::{ConnectionTrait, DbBackend, DbErr, Statement};
use trellis_shared::types::OrganizationId;

/// Sets the organization context for the current connection.
///
/// # Errors
///
/// Returns an error if the setting cannot be applied.
pub async fn set_org_context<C: ConnectionTrait>(
    conn: &C,
    organization_id: OrganizationId,
) -> Result<(), DbErr> {
    conn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT set_config('trellis.org_id', $1, false)",
        [organization_id.to_string().into()],
    ))
    .await?;
    Ok(())
}
