use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tasklane_application::{RoleStore, RoleWriteOperation};
use tasklane_core::{AppError, AppResult, NonEmptyString, TenantId};
use tasklane_domain::{Permission, RoleColor, RoleDefinition, RoleId};
use tokio::sync::{Mutex, watch};
use tracing::warn;

/// PostgreSQL-backed role document store.
///
/// Grouped writes run in one transaction, so the delete-compaction and
/// default-clearing steps of a role deletion are atomic. Subscription
/// pushes are re-published from an in-process registry after each write;
/// cross-process delivery would ride the backend's own change feed.
#[derive(Clone)]
pub struct PostgresRoleStore {
    pool: PgPool,
    watchers: Arc<Mutex<HashMap<TenantId, watch::Sender<Vec<RoleDefinition>>>>>,
}

impl PostgresRoleStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            watchers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn load_roles(&self, tenant_id: TenantId) -> AppResult<Vec<RoleDefinition>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                roles.id AS role_id,
                roles.name,
                roles.color,
                roles.position,
                roles.is_protected,
                grants.permission
            FROM workspace_roles AS roles
            LEFT JOIN workspace_role_grants AS grants
                ON grants.role_id = roles.id
            WHERE roles.tenant_id = $1
            ORDER BY roles.position, grants.permission
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to list roles: {error}")))?;

        aggregate_roles(rows, tenant_id)
    }

    /// Refreshes subscribers after a successful write.
    ///
    /// The write already committed, so a refresh failure is logged rather
    /// than surfaced; subscribers catch up on the next change.
    async fn publish(&self, tenant_id: TenantId) {
        let watchers = self.watchers.lock().await;
        let Some(sender) = watchers.get(&tenant_id) else {
            return;
        };

        match self.load_roles(tenant_id).await {
            Ok(roles) => {
                let _ = sender.send(roles);
            }
            Err(error) => {
                warn!(tenant_id = %tenant_id, %error, "failed to refresh role subscription");
            }
        }
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    role_id: uuid::Uuid,
    name: String,
    color: String,
    position: i64,
    is_protected: bool,
    permission: Option<String>,
}

#[async_trait]
impl RoleStore for PostgresRoleStore {
    async fn list_roles(&self, tenant_id: TenantId) -> AppResult<Vec<RoleDefinition>> {
        self.load_roles(tenant_id).await
    }

    async fn write_role(&self, tenant_id: TenantId, role: RoleDefinition) -> AppResult<()> {
        let mut transaction = begin(&self.pool).await?;
        upsert_role(&mut transaction, tenant_id, &role).await?;
        commit(transaction).await?;

        self.publish(tenant_id).await;
        Ok(())
    }

    async fn delete_role(&self, tenant_id: TenantId, role_id: RoleId) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM workspace_roles
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(role_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to delete role: {error}")))?;

        self.publish(tenant_id).await;
        Ok(())
    }

    async fn find_default_role(&self, tenant_id: TenantId) -> AppResult<Option<RoleId>> {
        let pointer = sqlx::query_scalar::<_, Option<uuid::Uuid>>(
            r#"
            SELECT default_role_id
            FROM tenants
            WHERE id = $1
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to read default role: {error}")))?;

        Ok(pointer.flatten().map(RoleId::from_uuid))
    }

    async fn write_default_role(
        &self,
        tenant_id: TenantId,
        role_id: Option<RoleId>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE tenants
            SET default_role_id = $2
            WHERE id = $1
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(role_id.map(|role_id| role_id.as_uuid()))
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to write default role: {error}")))?;

        Ok(())
    }

    async fn batch_write(
        &self,
        tenant_id: TenantId,
        operations: Vec<RoleWriteOperation>,
    ) -> AppResult<()> {
        let mut transaction = begin(&self.pool).await?;

        for operation in operations {
            match operation {
                RoleWriteOperation::UpsertRole(role) => {
                    upsert_role(&mut transaction, tenant_id, &role).await?;
                }
                RoleWriteOperation::SetPosition { role_id, position } => {
                    sqlx::query(
                        r#"
                        UPDATE workspace_roles
                        SET position = $3
                        WHERE tenant_id = $1 AND id = $2
                        "#,
                    )
                    .bind(tenant_id.as_uuid())
                    .bind(role_id.as_uuid())
                    .bind(i64::from(position))
                    .execute(&mut *transaction)
                    .await
                    .map_err(|error| {
                        AppError::Store(format!("failed to update role position: {error}"))
                    })?;
                }
                RoleWriteOperation::DeleteRole(role_id) => {
                    sqlx::query(
                        r#"
                        DELETE FROM workspace_roles
                        WHERE tenant_id = $1 AND id = $2
                        "#,
                    )
                    .bind(tenant_id.as_uuid())
                    .bind(role_id.as_uuid())
                    .execute(&mut *transaction)
                    .await
                    .map_err(|error| {
                        AppError::Store(format!("failed to delete role: {error}"))
                    })?;
                }
                RoleWriteOperation::ClearDefaultRole => {
                    sqlx::query(
                        r#"
                        UPDATE tenants
                        SET default_role_id = NULL
                        WHERE id = $1
                        "#,
                    )
                    .bind(tenant_id.as_uuid())
                    .execute(&mut *transaction)
                    .await
                    .map_err(|error| {
                        AppError::Store(format!("failed to clear default role: {error}"))
                    })?;
                }
            }
        }

        commit(transaction).await?;

        self.publish(tenant_id).await;
        Ok(())
    }

    async fn subscribe(
        &self,
        tenant_id: TenantId,
    ) -> AppResult<watch::Receiver<Vec<RoleDefinition>>> {
        let mut watchers = self.watchers.lock().await;
        if let Some(sender) = watchers.get(&tenant_id) {
            return Ok(sender.subscribe());
        }

        let (sender, receiver) = watch::channel(self.load_roles(tenant_id).await?);
        watchers.insert(tenant_id, sender);
        Ok(receiver)
    }
}

async fn begin(pool: &PgPool) -> AppResult<Transaction<'_, Postgres>> {
    pool.begin()
        .await
        .map_err(|error| AppError::Store(format!("failed to begin transaction: {error}")))
}

async fn commit(transaction: Transaction<'_, Postgres>) -> AppResult<()> {
    transaction
        .commit()
        .await
        .map_err(|error| AppError::Store(format!("failed to commit transaction: {error}")))
}

async fn upsert_role(
    transaction: &mut Transaction<'_, Postgres>,
    tenant_id: TenantId,
    role: &RoleDefinition,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO workspace_roles (id, tenant_id, name, color, position, is_protected)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (id) DO UPDATE
        SET name = EXCLUDED.name,
            color = EXCLUDED.color,
            position = EXCLUDED.position,
            is_protected = EXCLUDED.is_protected
        "#,
    )
    .bind(role.role_id().as_uuid())
    .bind(tenant_id.as_uuid())
    .bind(role.name().as_str())
    .bind(role.color().as_str())
    .bind(i64::from(role.position()))
    .bind(role.is_protected())
    .execute(&mut **transaction)
    .await
    .map_err(|error| AppError::Store(format!("failed to upsert role: {error}")))?;

    sqlx::query(
        r#"
        DELETE FROM workspace_role_grants
        WHERE role_id = $1
        "#,
    )
    .bind(role.role_id().as_uuid())
    .execute(&mut **transaction)
    .await
    .map_err(|error| AppError::Store(format!("failed to clear role grants: {error}")))?;

    for permission in role.permissions() {
        sqlx::query(
            r#"
            INSERT INTO workspace_role_grants (role_id, permission)
            VALUES ($1, $2)
            ON CONFLICT (role_id, permission) DO NOTHING
            "#,
        )
        .bind(role.role_id().as_uuid())
        .bind(permission.as_str())
        .execute(&mut **transaction)
        .await
        .map_err(|error| AppError::Store(format!("failed to persist role grants: {error}")))?;
    }

    Ok(())
}

fn aggregate_roles(rows: Vec<RoleRow>, tenant_id: TenantId) -> AppResult<Vec<RoleDefinition>> {
    let mut by_id: HashMap<uuid::Uuid, RoleDefinition> = HashMap::new();

    for row in rows {
        if !by_id.contains_key(&row.role_id) {
            let name = NonEmptyString::new(row.name.clone()).map_err(|error| {
                AppError::Internal(format!(
                    "invalid stored name for role '{}' in tenant '{tenant_id}': {error}",
                    row.role_id
                ))
            })?;
            let color = RoleColor::new(row.color.clone()).map_err(|error| {
                AppError::Internal(format!(
                    "invalid stored color for role '{}' in tenant '{tenant_id}': {error}",
                    row.role_id
                ))
            })?;
            let position = u32::try_from(row.position).map_err(|_| {
                AppError::Internal(format!(
                    "negative stored position for role '{}' in tenant '{tenant_id}'",
                    row.role_id
                ))
            })?;

            by_id.insert(
                row.role_id,
                RoleDefinition::new(
                    RoleId::from_uuid(row.role_id),
                    name,
                    color,
                    Default::default(),
                    position,
                    row.is_protected,
                ),
            );
        }

        if let Some(permission_value) = row.permission
            && let Some(role) = by_id.get_mut(&row.role_id)
        {
            let permission = Permission::from_str(permission_value.as_str()).map_err(|error| {
                AppError::Internal(format!(
                    "invalid stored permission '{permission_value}' in tenant '{tenant_id}': {error}"
                ))
            })?;

            let mut permissions = role.permissions().clone();
            permissions.insert(permission);
            role.set_permissions(permissions);
        }
    }

    Ok(by_id.into_values().collect())
}
