use std::collections::HashMap;

use async_trait::async_trait;
use tasklane_application::{RoleStore, RoleWriteOperation};
use tasklane_core::{AppResult, TenantId};
use tasklane_domain::{RoleDefinition, RoleId};
use tokio::sync::{RwLock, watch};

/// In-memory role store implementation.
///
/// Used by tests and local development. Batches apply under a single write
/// lock and publish one subscription update, so readers never observe a
/// half-applied group.
#[derive(Debug, Default)]
pub struct InMemoryRoleStore {
    roles: RwLock<HashMap<(TenantId, RoleId), RoleDefinition>>,
    defaults: RwLock<HashMap<TenantId, RoleId>>,
    watchers: RwLock<HashMap<TenantId, watch::Sender<Vec<RoleDefinition>>>>,
}

impl InMemoryRoleStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn tenant_roles(&self, tenant_id: TenantId) -> Vec<RoleDefinition> {
        self.roles
            .read()
            .await
            .iter()
            .filter_map(|((stored_tenant_id, _), role)| {
                (stored_tenant_id == &tenant_id).then(|| role.clone())
            })
            .collect()
    }

    async fn publish(&self, tenant_id: TenantId) {
        let roles = self.tenant_roles(tenant_id).await;
        if let Some(sender) = self.watchers.read().await.get(&tenant_id) {
            // A send failure only means every receiver is gone.
            let _ = sender.send(roles);
        }
    }
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn list_roles(&self, tenant_id: TenantId) -> AppResult<Vec<RoleDefinition>> {
        Ok(self.tenant_roles(tenant_id).await)
    }

    async fn write_role(&self, tenant_id: TenantId, role: RoleDefinition) -> AppResult<()> {
        self.roles
            .write()
            .await
            .insert((tenant_id, role.role_id()), role);
        self.publish(tenant_id).await;
        Ok(())
    }

    async fn delete_role(&self, tenant_id: TenantId, role_id: RoleId) -> AppResult<()> {
        self.roles.write().await.remove(&(tenant_id, role_id));
        self.publish(tenant_id).await;
        Ok(())
    }

    async fn find_default_role(&self, tenant_id: TenantId) -> AppResult<Option<RoleId>> {
        Ok(self.defaults.read().await.get(&tenant_id).copied())
    }

    async fn write_default_role(
        &self,
        tenant_id: TenantId,
        role_id: Option<RoleId>,
    ) -> AppResult<()> {
        let mut defaults = self.defaults.write().await;
        match role_id {
            Some(role_id) => {
                defaults.insert(tenant_id, role_id);
            }
            None => {
                defaults.remove(&tenant_id);
            }
        }
        Ok(())
    }

    async fn batch_write(
        &self,
        tenant_id: TenantId,
        operations: Vec<RoleWriteOperation>,
    ) -> AppResult<()> {
        {
            let mut roles = self.roles.write().await;
            for operation in operations {
                match operation {
                    RoleWriteOperation::UpsertRole(role) => {
                        roles.insert((tenant_id, role.role_id()), role);
                    }
                    RoleWriteOperation::SetPosition { role_id, position } => {
                        if let Some(role) = roles.get_mut(&(tenant_id, role_id)) {
                            role.set_position(position);
                        }
                    }
                    RoleWriteOperation::DeleteRole(role_id) => {
                        roles.remove(&(tenant_id, role_id));
                    }
                    RoleWriteOperation::ClearDefaultRole => {
                        self.defaults.write().await.remove(&tenant_id);
                    }
                }
            }
        }

        self.publish(tenant_id).await;
        Ok(())
    }

    async fn subscribe(
        &self,
        tenant_id: TenantId,
    ) -> AppResult<watch::Receiver<Vec<RoleDefinition>>> {
        let mut watchers = self.watchers.write().await;
        if let Some(sender) = watchers.get(&tenant_id) {
            return Ok(sender.subscribe());
        }

        let (sender, receiver) = watch::channel(self.tenant_roles(tenant_id).await);
        watchers.insert(tenant_id, sender);
        Ok(receiver)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use tasklane_application::{RoleStore, RoleWriteOperation};
    use tasklane_core::{NonEmptyString, TenantId};
    use tasklane_domain::{RoleColor, RoleDefinition, RoleHierarchy, RoleId};

    use super::InMemoryRoleStore;

    fn role(name: &str, position: u32) -> RoleDefinition {
        let Ok(name) = NonEmptyString::new(name) else {
            panic!("test role name must be non-empty");
        };
        let Ok(color) = RoleColor::new("#ef4444") else {
            panic!("test color must be valid");
        };
        RoleDefinition::new(RoleId::new(), name, color, BTreeSet::new(), position, false)
    }

    #[tokio::test]
    async fn write_and_list_are_tenant_scoped() {
        let store = InMemoryRoleStore::new();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();

        let result = store.write_role(tenant_a, role("A", 0)).await;
        assert!(result.is_ok());

        let listed_a = store.list_roles(tenant_a).await;
        assert!(listed_a.is_ok_and(|roles| roles.len() == 1));
        let listed_b = store.list_roles(tenant_b).await;
        assert!(listed_b.is_ok_and(|roles| roles.is_empty()));
    }

    #[tokio::test]
    async fn batch_applies_all_operations_at_once() {
        let store = InMemoryRoleStore::new();
        let tenant_id = TenantId::new();
        let a = role("A", 0);
        let b = role("B", 1);
        let c = role("C", 2);
        let b_id = b.role_id();
        let c_id = c.role_id();
        for entry in [a, b, c] {
            let result = store.write_role(tenant_id, entry).await;
            assert!(result.is_ok());
        }
        let set_default = store.write_default_role(tenant_id, Some(b_id)).await;
        assert!(set_default.is_ok());

        let result = store
            .batch_write(
                tenant_id,
                vec![
                    RoleWriteOperation::DeleteRole(b_id),
                    RoleWriteOperation::SetPosition {
                        role_id: c_id,
                        position: 1,
                    },
                    RoleWriteOperation::ClearDefaultRole,
                ],
            )
            .await;
        assert!(result.is_ok());

        let Ok(listed) = store.list_roles(tenant_id).await else {
            panic!("in-memory list cannot fail");
        };
        let hierarchy = RoleHierarchy::new(listed);
        assert_eq!(hierarchy.len(), 2);
        assert!(hierarchy.is_contiguous());

        let default = store.find_default_role(tenant_id).await;
        assert!(default.is_ok_and(|pointer| pointer.is_none()));
    }

    #[tokio::test]
    async fn subscription_delivers_the_full_list_on_change() {
        let store = InMemoryRoleStore::new();
        let tenant_id = TenantId::new();
        let Ok(mut receiver) = store.subscribe(tenant_id).await else {
            panic!("in-memory subscribe cannot fail");
        };

        let result = store.write_role(tenant_id, role("A", 0)).await;
        assert!(result.is_ok());

        assert!(receiver.changed().await.is_ok());
        assert_eq!(receiver.borrow_and_update().len(), 1);

        let result = store.write_role(tenant_id, role("B", 1)).await;
        assert!(result.is_ok());

        assert!(receiver.changed().await.is_ok());
        assert_eq!(receiver.borrow_and_update().len(), 2);
    }
}
