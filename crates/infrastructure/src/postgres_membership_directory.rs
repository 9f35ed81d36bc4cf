use async_trait::async_trait;
use sqlx::PgPool;
use tasklane_application::MembershipDirectory;
use tasklane_core::{AppError, AppResult, TenantId};
use tasklane_domain::{Membership, MembershipKind, RoleId};

/// PostgreSQL-backed membership directory.
#[derive(Clone)]
pub struct PostgresMembershipDirectory {
    pool: PgPool,
}

impl PostgresMembershipDirectory {
    /// Creates a directory with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts or replaces a member's record, including held roles.
    pub async fn upsert_membership(
        &self,
        tenant_id: TenantId,
        membership: &Membership,
    ) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Store(format!("failed to begin transaction: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO tenant_memberships (tenant_id, subject, rank_kind)
            VALUES ($1, $2, $3)
            ON CONFLICT (tenant_id, subject) DO UPDATE
            SET rank_kind = EXCLUDED.rank_kind
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(membership.subject())
        .bind(rank_kind_value(membership.kind()))
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Store(format!("failed to upsert membership: {error}")))?;

        sqlx::query(
            r#"
            DELETE FROM tenant_membership_roles
            WHERE tenant_id = $1 AND subject = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(membership.subject())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Store(format!("failed to clear held roles: {error}")))?;

        if let MembershipKind::Roles(role_ids) = membership.kind() {
            for role_id in role_ids {
                sqlx::query(
                    r#"
                    INSERT INTO tenant_membership_roles (tenant_id, subject, role_id)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (tenant_id, subject, role_id) DO NOTHING
                    "#,
                )
                .bind(tenant_id.as_uuid())
                .bind(membership.subject())
                .bind(role_id.as_uuid())
                .execute(&mut *transaction)
                .await
                .map_err(|error| {
                    AppError::Store(format!("failed to persist held role: {error}"))
                })?;
            }
        }

        transaction
            .commit()
            .await
            .map_err(|error| AppError::Store(format!("failed to commit transaction: {error}")))
    }
}

#[async_trait]
impl MembershipDirectory for PostgresMembershipDirectory {
    async fn find_membership(
        &self,
        tenant_id: TenantId,
        subject: &str,
    ) -> AppResult<Option<Membership>> {
        let rank_kind = sqlx::query_scalar::<_, String>(
            r#"
            SELECT rank_kind
            FROM tenant_memberships
            WHERE tenant_id = $1 AND subject = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(subject)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to read membership: {error}")))?;

        let Some(rank_kind) = rank_kind else {
            return Ok(None);
        };

        let kind = match rank_kind.as_str() {
            "owner" => MembershipKind::Owner,
            "admin" => MembershipKind::Admin,
            "member" => MembershipKind::Member,
            "roles" => {
                let role_ids = sqlx::query_scalar::<_, uuid::Uuid>(
                    r#"
                    SELECT role_id
                    FROM tenant_membership_roles
                    WHERE tenant_id = $1 AND subject = $2
                    "#,
                )
                .bind(tenant_id.as_uuid())
                .bind(subject)
                .fetch_all(&self.pool)
                .await
                .map_err(|error| {
                    AppError::Store(format!("failed to read held roles: {error}"))
                })?;

                MembershipKind::Roles(role_ids.into_iter().map(RoleId::from_uuid).collect())
            }
            other => {
                return Err(AppError::Internal(format!(
                    "invalid stored rank kind '{other}' for subject '{subject}' in tenant '{tenant_id}'"
                )));
            }
        };

        Ok(Some(Membership::new(subject, kind)))
    }

    async fn count_members_with_role(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
    ) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM tenant_membership_roles
            WHERE tenant_id = $1 AND role_id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(role_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Store(format!("failed to count role holders: {error}")))?;

        Ok(u64::try_from(count).unwrap_or(0))
    }
}

fn rank_kind_value(kind: &MembershipKind) -> &'static str {
    match kind {
        MembershipKind::Owner => "owner",
        MembershipKind::Admin => "admin",
        MembershipKind::Member => "member",
        MembershipKind::Roles(_) => "roles",
    }
}

#[cfg(test)]
mod tests {
    use sqlx::PgPool;
    use sqlx::migrate::Migrator;
    use sqlx::postgres::PgPoolOptions;
    use tasklane_application::{MembershipDirectory, RoleStore};
    use tasklane_core::{NonEmptyString, TenantId};
    use tasklane_domain::{Membership, MembershipKind, RoleColor, RoleDefinition, RoleId};

    use crate::PostgresRoleStore;

    use super::PostgresMembershipDirectory;

    static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

    async fn test_pool() -> Option<PgPool> {
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            return None;
        };

        let pool = match PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url.as_str())
            .await
        {
            Ok(pool) => pool,
            Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
        };

        if let Err(error) = MIGRATOR.run(&pool).await {
            panic!("failed to run migrations for postgres membership tests: {error}");
        }

        Some(pool)
    }

    async fn ensure_tenant(pool: &PgPool, tenant_id: TenantId, name: &str) {
        let insert = sqlx::query(
            r#"
            INSERT INTO tenants (id, name)
            VALUES ($1, $2)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(name)
        .execute(pool)
        .await;

        assert!(insert.is_ok());
    }

    #[tokio::test]
    async fn membership_roundtrips_with_held_roles() {
        let Some(pool) = test_pool().await else {
            return;
        };

        let tenant_id = TenantId::new();
        ensure_tenant(&pool, tenant_id, "Membership Tenant").await;

        let store = PostgresRoleStore::new(pool.clone());
        let Ok(name) = NonEmptyString::new("Editors") else {
            panic!("test role name must be non-empty");
        };
        let Ok(color) = RoleColor::new("#10b981") else {
            panic!("test color must be valid");
        };
        let role = RoleDefinition::new(RoleId::new(), name, color, Default::default(), 0, false);
        let role_id = role.role_id();
        let written = store.write_role(tenant_id, role).await;
        assert!(written.is_ok());

        let directory = PostgresMembershipDirectory::new(pool);
        let membership = Membership::new("alice", MembershipKind::Roles(vec![role_id]));
        let upserted = directory.upsert_membership(tenant_id, &membership).await;
        assert!(upserted.is_ok());

        let found = directory.find_membership(tenant_id, "alice").await;
        assert!(found.is_ok_and(|record| record == Some(membership)));

        let count = directory.count_members_with_role(tenant_id, role_id).await;
        assert!(count.is_ok_and(|count| count == 1));
    }
}
