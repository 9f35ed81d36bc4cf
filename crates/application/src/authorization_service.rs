use std::sync::Arc;

use tasklane_core::{AppError, AppResult, TenantId};
use tasklane_domain::{EffectivePermissions, Permission, RoleHierarchy};

use crate::{MembershipDirectory, RoleStore};

/// Application service for tenant-scoped permission checks.
///
/// Every permission-gated action elsewhere in the product funnels through
/// this reader; the role mutation service is the only writer of the role
/// documents it resolves against.
#[derive(Clone)]
pub struct AuthorizationService {
    store: Arc<dyn RoleStore>,
    directory: Arc<dyn MembershipDirectory>,
}

impl AuthorizationService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(store: Arc<dyn RoleStore>, directory: Arc<dyn MembershipDirectory>) -> Self {
        Self { store, directory }
    }

    /// Resolves a subject's effective permission set in the tenant.
    ///
    /// A subject without a membership record resolves to the empty set,
    /// never to an error: absence of standing means no access.
    pub async fn effective_permissions(
        &self,
        tenant_id: TenantId,
        subject: &str,
    ) -> AppResult<EffectivePermissions> {
        let Some(membership) = self.directory.find_membership(tenant_id, subject).await? else {
            return Ok(EffectivePermissions::Granted(Default::default()));
        };

        let hierarchy = RoleHierarchy::new(self.store.list_roles(tenant_id).await?);
        Ok(EffectivePermissions::resolve(membership.kind(), &hierarchy))
    }

    /// Returns whether the subject currently has the permission.
    pub async fn has_permission(
        &self,
        tenant_id: TenantId,
        subject: &str,
        permission: Permission,
    ) -> AppResult<bool> {
        Ok(self
            .effective_permissions(tenant_id, subject)
            .await?
            .contains(permission))
    }

    /// Ensures a subject has the required permission in the tenant scope.
    pub async fn require_permission(
        &self,
        tenant_id: TenantId,
        subject: &str,
        permission: Permission,
    ) -> AppResult<()> {
        if self.has_permission(tenant_id, subject, permission).await? {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "subject '{subject}' is missing permission '{}' in tenant '{tenant_id}'",
            permission.as_str()
        )))
    }
}
