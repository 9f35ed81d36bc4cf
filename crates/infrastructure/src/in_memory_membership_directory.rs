use std::collections::HashMap;

use async_trait::async_trait;
use tasklane_application::MembershipDirectory;
use tasklane_core::{AppResult, TenantId};
use tasklane_domain::{Membership, MembershipKind, RoleId};
use tokio::sync::RwLock;

/// In-memory membership directory implementation.
#[derive(Debug, Default)]
pub struct InMemoryMembershipDirectory {
    memberships: RwLock<HashMap<(TenantId, String), Membership>>,
}

impl InMemoryMembershipDirectory {
    /// Creates an empty in-memory directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a member's record.
    pub async fn upsert_membership(&self, tenant_id: TenantId, membership: Membership) {
        self.memberships
            .write()
            .await
            .insert((tenant_id, membership.subject().to_owned()), membership);
    }

    /// Removes a member's record.
    pub async fn remove_membership(&self, tenant_id: TenantId, subject: &str) {
        self.memberships
            .write()
            .await
            .remove(&(tenant_id, subject.to_owned()));
    }
}

#[async_trait]
impl MembershipDirectory for InMemoryMembershipDirectory {
    async fn find_membership(
        &self,
        tenant_id: TenantId,
        subject: &str,
    ) -> AppResult<Option<Membership>> {
        Ok(self
            .memberships
            .read()
            .await
            .get(&(tenant_id, subject.to_owned()))
            .cloned())
    }

    async fn count_members_with_role(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
    ) -> AppResult<u64> {
        Ok(self
            .memberships
            .read()
            .await
            .iter()
            .filter(|((stored_tenant_id, _), membership)| {
                stored_tenant_id == &tenant_id
                    && matches!(
                        membership.kind(),
                        MembershipKind::Roles(role_ids) if role_ids.contains(&role_id)
                    )
            })
            .count() as u64)
    }
}
