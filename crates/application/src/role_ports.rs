use async_trait::async_trait;
use tasklane_core::{AppResult, TenantId};
use tasklane_domain::{Membership, RoleDefinition, RoleId};
use tokio::sync::watch;

/// Input payload for creating a custom role.
///
/// Permission keys arrive as raw catalog strings; unknown keys are dropped
/// permissively during creation to tolerate catalog version skew between
/// client and server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleInput {
    /// Display name, must be non-empty.
    pub name: String,
    /// Display color in `#rrggbb` form.
    pub color: String,
    /// Raw permission keys to grant.
    pub permissions: Vec<String>,
}

/// Field-level patch for an existing role.
///
/// `None` fields are left unchanged; position is never part of a patch and
/// only moves through reordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRolePatch {
    /// New display name, if renaming.
    pub name: Option<String>,
    /// New display color, if recoloring.
    pub color: Option<String>,
    /// Replacement permission keys, if regranting.
    pub permissions: Option<Vec<String>>,
}

/// One write in a grouped store application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleWriteOperation {
    /// Upserts a full role document.
    UpsertRole(RoleDefinition),
    /// Moves one role to a new hierarchy position.
    SetPosition {
        /// Role to move.
        role_id: RoleId,
        /// New position value.
        position: u32,
    },
    /// Removes a role document.
    DeleteRole(RoleId),
    /// Clears the tenant's default-role pointer.
    ClearDefaultRole,
}

/// Port over the tenant-scoped role document store.
///
/// The store offers atomic single-document writes and eventually-consistent
/// read subscriptions; `batch_write` groups multiple writes and is applied
/// transactionally where the backend supports it.
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Reads a snapshot of all role documents in the tenant.
    async fn list_roles(&self, tenant_id: TenantId) -> AppResult<Vec<RoleDefinition>>;

    /// Upserts one role document.
    async fn write_role(&self, tenant_id: TenantId, role: RoleDefinition) -> AppResult<()>;

    /// Removes one role document.
    async fn delete_role(&self, tenant_id: TenantId, role_id: RoleId) -> AppResult<()>;

    /// Reads the tenant's default-role pointer.
    async fn find_default_role(&self, tenant_id: TenantId) -> AppResult<Option<RoleId>>;

    /// Sets or clears the tenant's default-role pointer.
    async fn write_default_role(
        &self,
        tenant_id: TenantId,
        role_id: Option<RoleId>,
    ) -> AppResult<()>;

    /// Applies a group of writes, atomically where supported.
    async fn batch_write(
        &self,
        tenant_id: TenantId,
        operations: Vec<RoleWriteOperation>,
    ) -> AppResult<()>;

    /// Subscribes to the tenant's role list.
    ///
    /// The receiver yields the full current list whenever any role in the
    /// tenant changes; delivery order across documents is unspecified, so
    /// consumers sort by position.
    async fn subscribe(
        &self,
        tenant_id: TenantId,
    ) -> AppResult<watch::Receiver<Vec<RoleDefinition>>>;
}

/// Port for membership lookups backing rank resolution and in-use checks.
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    /// Finds a member's record in the tenant.
    async fn find_membership(
        &self,
        tenant_id: TenantId,
        subject: &str,
    ) -> AppResult<Option<Membership>>;

    /// Counts members currently holding the role.
    async fn count_members_with_role(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
    ) -> AppResult<u64>;
}
