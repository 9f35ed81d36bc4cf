use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use tasklane_core::{ActorIdentity, AppError, AppResult, NonEmptyString};
use tasklane_domain::{
    AuditAction, EffectivePermissions, Permission, Rank, RoleColor, RoleDefinition,
    RoleHierarchy, RoleId, can_manage_roles, rank_of,
};
use tracing::{debug, info};

use crate::{
    AuditEvent, AuditRepository, CreateRoleInput, MembershipDirectory, RoleStore,
    RoleWriteOperation, UpdateRolePatch,
};

/// Application service owning every mutation of the role hierarchy.
///
/// This is the trust boundary: each operation re-runs the rank checks
/// against a role snapshot before anything reaches the store, regardless of
/// what the calling surface already checked for responsiveness.
#[derive(Clone)]
pub struct RoleService {
    store: Arc<dyn RoleStore>,
    directory: Arc<dyn MembershipDirectory>,
    audit_repository: Arc<dyn AuditRepository>,
}

impl RoleService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        store: Arc<dyn RoleStore>,
        directory: Arc<dyn MembershipDirectory>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            store,
            directory,
            audit_repository,
        }
    }

    /// Returns the tenant's roles sorted by position.
    pub async fn list_roles(&self, actor: &ActorIdentity) -> AppResult<Vec<RoleDefinition>> {
        let hierarchy = self.load_hierarchy(actor).await?;
        self.require_management(actor, &hierarchy).await?;
        Ok(hierarchy.roles().to_vec())
    }

    /// Creates a custom role appended at the bottom of the hierarchy.
    ///
    /// Unknown permission keys are dropped, not rejected; appending keeps
    /// the position sequence contiguous without touching existing roles.
    pub async fn create_role(
        &self,
        actor: &ActorIdentity,
        input: CreateRoleInput,
    ) -> AppResult<RoleDefinition> {
        let hierarchy = self.load_hierarchy(actor).await?;
        self.require_management(actor, &hierarchy).await?;

        let name = NonEmptyString::new(input.name)?;
        let color = RoleColor::new(input.color)?;
        let permissions = parse_permission_keys(&input.permissions);

        let role = RoleDefinition::new(
            RoleId::new(),
            name,
            color,
            permissions,
            hierarchy.next_position(),
            false,
        );

        self.store.write_role(actor.tenant_id(), role.clone()).await?;

        info!(
            tenant_id = %actor.tenant_id(),
            role_id = %role.role_id(),
            position = role.position(),
            "created workspace role"
        );

        self.append_audit(
            actor,
            AuditAction::RoleCreated,
            role.role_id().to_string(),
            format!("created role '{}'", role.name().as_str()),
        )
        .await?;

        Ok(role)
    }

    /// Applies a name/color/permissions patch to an existing role.
    ///
    /// Operates on the caller-supplied snapshot so the caller and the
    /// check see the same state; position never changes here.
    pub async fn update_role(
        &self,
        actor: &ActorIdentity,
        role_id: RoleId,
        patch: UpdateRolePatch,
        snapshot: &RoleHierarchy,
    ) -> AppResult<RoleDefinition> {
        let rank = self.require_management(actor, snapshot).await?;

        let target = snapshot
            .find(role_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' no longer exists")))?;

        if !rank.can_edit(target) {
            return Err(AppError::Forbidden(format!(
                "actor rank cannot edit role '{}'",
                target.name().as_str()
            )));
        }

        let mut updated = target.clone();
        if let Some(name) = patch.name {
            updated.rename(NonEmptyString::new(name)?);
        }
        if let Some(color) = patch.color {
            updated.set_color(RoleColor::new(color)?);
        }
        if let Some(permissions) = patch.permissions {
            updated.set_permissions(parse_permission_keys(&permissions));
        }

        self.store
            .write_role(actor.tenant_id(), updated.clone())
            .await?;

        self.append_audit(
            actor,
            AuditAction::RoleUpdated,
            role_id.to_string(),
            format!("updated role '{}'", updated.name().as_str()),
        )
        .await?;

        Ok(updated)
    }

    /// Deletes a role nobody holds and re-compacts the hierarchy.
    ///
    /// The delete, the position compaction of the remaining roles, and the
    /// default-pointer clearing ride a single store batch so no reader
    /// observes a gapped sequence or a dangling pointer.
    pub async fn delete_role(
        &self,
        actor: &ActorIdentity,
        role_id: RoleId,
        snapshot: &RoleHierarchy,
    ) -> AppResult<()> {
        let rank = self.require_management(actor, snapshot).await?;

        let target = snapshot
            .find(role_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' no longer exists")))?;

        if !rank.can_edit(target) {
            return Err(AppError::Forbidden(format!(
                "actor rank cannot delete role '{}'",
                target.name().as_str()
            )));
        }

        let holders = self
            .directory
            .count_members_with_role(actor.tenant_id(), role_id)
            .await?;
        if holders > 0 {
            return Err(AppError::InUse(format!(
                "role '{}' is still assigned to {holders} member(s)",
                target.name().as_str()
            )));
        }

        let target_name = target.name().as_str().to_owned();

        let mut operations = vec![RoleWriteOperation::DeleteRole(role_id)];
        for (shifted_id, position) in snapshot.compaction_after_remove(role_id)? {
            operations.push(RoleWriteOperation::SetPosition {
                role_id: shifted_id,
                position,
            });
        }
        if self.store.find_default_role(actor.tenant_id()).await? == Some(role_id) {
            operations.push(RoleWriteOperation::ClearDefaultRole);
        }

        self.store
            .batch_write(actor.tenant_id(), operations)
            .await?;

        info!(
            tenant_id = %actor.tenant_id(),
            role_id = %role_id,
            "deleted workspace role"
        );

        self.append_audit(
            actor,
            AuditAction::RoleDeleted,
            role_id.to_string(),
            format!("deleted role '{target_name}'"),
        )
        .await
    }

    /// Sets or clears the tenant's default-role pointer.
    ///
    /// Selecting the current default again clears it, so every call site
    /// gets the same toggle semantics. Returns the new pointer.
    pub async fn set_default_role(
        &self,
        actor: &ActorIdentity,
        role_id: Option<RoleId>,
    ) -> AppResult<Option<RoleId>> {
        let hierarchy = self.load_hierarchy(actor).await?;
        self.require_management(actor, &hierarchy).await?;

        let current = self.store.find_default_role(actor.tenant_id()).await?;
        let next = match role_id {
            Some(requested) => {
                if hierarchy.find(requested).is_none() {
                    return Err(AppError::NotFound(format!(
                        "role '{requested}' no longer exists"
                    )));
                }
                (current != Some(requested)).then_some(requested)
            }
            None => None,
        };

        self.store
            .write_default_role(actor.tenant_id(), next)
            .await?;

        let detail = match next {
            Some(role_id) => format!("default role set to '{role_id}'"),
            None => "default role cleared".to_owned(),
        };
        let resource_id = next
            .or(current)
            .map_or_else(|| "none".to_owned(), |role_id| role_id.to_string());
        self.append_audit(actor, AuditAction::DefaultRoleChanged, resource_id, detail)
            .await?;

        Ok(next)
    }

    /// Rewrites the hierarchy order from a full ordered id list.
    ///
    /// Only roles whose position actually changes are written, in one
    /// batch. The actor must out-rank every moved role at both its old and
    /// its new position; anything else would let a manager hoist a role
    /// above their own rank.
    pub async fn reorder_roles(
        &self,
        actor: &ActorIdentity,
        new_order: &[RoleId],
        snapshot: &RoleHierarchy,
    ) -> AppResult<Vec<RoleDefinition>> {
        let rank = self.require_management(actor, snapshot).await?;

        let changes = snapshot.reorder_diff(new_order)?;
        if changes.is_empty() {
            return Ok(snapshot.roles().to_vec());
        }

        for (role_id, position) in &changes {
            let Some(moved) = snapshot.find(*role_id) else {
                return Err(AppError::NotFound(format!(
                    "role '{role_id}' no longer exists"
                )));
            };
            if !rank.can_edit(moved) || !rank.outranks_position(*position) {
                return Err(AppError::Forbidden(format!(
                    "actor rank cannot reposition role '{}'",
                    moved.name().as_str()
                )));
            }
        }

        let operations = changes
            .iter()
            .map(|(role_id, position)| RoleWriteOperation::SetPosition {
                role_id: *role_id,
                position: *position,
            })
            .collect();
        self.store
            .batch_write(actor.tenant_id(), operations)
            .await?;

        info!(
            tenant_id = %actor.tenant_id(),
            moved = changes.len(),
            "reordered workspace roles"
        );

        self.append_audit(
            actor,
            AuditAction::RolesReordered,
            actor.tenant_id().to_string(),
            format!("moved {} role(s)", changes.len()),
        )
        .await?;

        let refreshed = self.store.list_roles(actor.tenant_id()).await?;
        Ok(RoleHierarchy::new(refreshed).roles().to_vec())
    }

    async fn load_hierarchy(&self, actor: &ActorIdentity) -> AppResult<RoleHierarchy> {
        Ok(RoleHierarchy::new(
            self.store.list_roles(actor.tenant_id()).await?,
        ))
    }

    /// Resolves the actor's rank and enforces the management gate.
    async fn require_management(
        &self,
        actor: &ActorIdentity,
        hierarchy: &RoleHierarchy,
    ) -> AppResult<Rank> {
        let membership = self
            .directory
            .find_membership(actor.tenant_id(), actor.subject())
            .await?
            .ok_or_else(|| {
                AppError::Forbidden(format!(
                    "subject '{}' is not a member of tenant '{}'",
                    actor.subject(),
                    actor.tenant_id()
                ))
            })?;

        let rank = rank_of(membership.kind(), hierarchy);
        let effective = EffectivePermissions::resolve(membership.kind(), hierarchy);
        if !can_manage_roles(rank, &effective) {
            return Err(AppError::Forbidden(format!(
                "subject '{}' may not manage roles in tenant '{}'",
                actor.subject(),
                actor.tenant_id()
            )));
        }

        Ok(rank)
    }

    async fn append_audit(
        &self,
        actor: &ActorIdentity,
        action: AuditAction,
        resource_id: String,
        detail: String,
    ) -> AppResult<()> {
        self.audit_repository
            .append_event(AuditEvent {
                tenant_id: actor.tenant_id(),
                subject: actor.subject().to_owned(),
                action,
                resource_type: "workspace_role".to_owned(),
                resource_id,
                detail: Some(detail),
            })
            .await
    }
}

/// Parses raw catalog keys, dropping unknown ones permissively.
fn parse_permission_keys(raw: &[String]) -> BTreeSet<Permission> {
    let mut granted = BTreeSet::new();
    for value in raw {
        match Permission::from_str(value) {
            Ok(permission) => {
                granted.insert(permission);
            }
            Err(_) => debug!(permission = value.as_str(), "dropping unknown permission key"),
        }
    }
    granted
}
