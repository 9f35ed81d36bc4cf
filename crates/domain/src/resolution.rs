use std::collections::BTreeSet;

use crate::{MembershipKind, Permission, RoleHierarchy};

/// The permission set a member effectively holds in a tenant.
///
/// Owner and admin resolve to the `All` wildcard without materializing the
/// catalog; everyone else gets the union of grants across the roles they
/// hold. A role id that no longer resolves contributes the empty set, so a
/// dangling reference fails toward no access, never toward full access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectivePermissions {
    /// Implicit grant of every permission, present and future.
    All,
    /// Union of grants from the member's resolvable roles.
    Granted(BTreeSet<Permission>),
}

impl EffectivePermissions {
    /// Resolves a member's effective permissions against a role snapshot.
    #[must_use]
    pub fn resolve(kind: &MembershipKind, hierarchy: &RoleHierarchy) -> Self {
        match kind {
            MembershipKind::Owner | MembershipKind::Admin => Self::All,
            MembershipKind::Member => Self::Granted(BTreeSet::new()),
            MembershipKind::Roles(role_ids) => {
                let mut granted = BTreeSet::new();
                for role_id in role_ids {
                    if let Some(role) = hierarchy.find(*role_id) {
                        granted.extend(role.permissions().iter().copied());
                    }
                }
                Self::Granted(granted)
            }
        }
    }

    /// Returns whether the permission is effectively held.
    #[must_use]
    pub fn contains(&self, permission: Permission) -> bool {
        match self {
            Self::All => true,
            Self::Granted(granted) => granted.contains(&permission),
        }
    }

    /// Returns whether this is the owner/admin wildcard.
    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use tasklane_core::NonEmptyString;

    use super::EffectivePermissions;
    use crate::{MembershipKind, Permission, RoleColor, RoleDefinition, RoleHierarchy, RoleId};

    fn role_with(position: u32, permissions: BTreeSet<Permission>) -> RoleDefinition {
        let Ok(name) = NonEmptyString::new(format!("role-{position}")) else {
            panic!("test role name must be non-empty");
        };
        let Ok(color) = RoleColor::new("#0ea5e9") else {
            panic!("test color must be valid");
        };
        RoleDefinition::new(RoleId::new(), name, color, permissions, position, false)
    }

    #[test]
    fn owner_and_admin_resolve_to_wildcard() {
        let hierarchy = RoleHierarchy::new(Vec::new());
        assert!(EffectivePermissions::resolve(&MembershipKind::Owner, &hierarchy).is_all());
        assert!(EffectivePermissions::resolve(&MembershipKind::Admin, &hierarchy).is_all());
    }

    #[test]
    fn plain_member_resolves_to_empty_set() {
        let hierarchy = RoleHierarchy::new(Vec::new());
        let resolved = EffectivePermissions::resolve(&MembershipKind::Member, &hierarchy);
        assert!(!resolved.contains(Permission::TaskView));
        assert!(!resolved.is_all());
    }

    #[test]
    fn multi_role_membership_unions_grants() {
        let tasks = role_with(
            0,
            BTreeSet::from([Permission::TaskView, Permission::TaskCreate]),
        );
        let issues = role_with(1, BTreeSet::from([Permission::IssueView]));
        let held = MembershipKind::Roles(vec![tasks.role_id(), issues.role_id()]);
        let hierarchy = RoleHierarchy::new(vec![tasks, issues]);

        let resolved = EffectivePermissions::resolve(&held, &hierarchy);
        assert!(resolved.contains(Permission::TaskView));
        assert!(resolved.contains(Permission::TaskCreate));
        assert!(resolved.contains(Permission::IssueView));
        assert!(!resolved.contains(Permission::IssueDelete));
    }

    #[test]
    fn dangling_role_reference_fails_closed() {
        let tasks = role_with(0, BTreeSet::from([Permission::TaskView]));
        let held = MembershipKind::Roles(vec![tasks.role_id(), RoleId::new()]);
        let hierarchy = RoleHierarchy::new(vec![tasks]);

        let resolved = EffectivePermissions::resolve(&held, &hierarchy);
        assert!(resolved.contains(Permission::TaskView));
        assert!(!resolved.is_all());
    }

    #[test]
    fn adding_a_grant_never_shrinks_the_effective_set() {
        let before_role = role_with(0, BTreeSet::from([Permission::TaskView]));
        let role_id = before_role.role_id();
        let held = MembershipKind::Roles(vec![role_id]);
        let before_hierarchy = RoleHierarchy::new(vec![before_role.clone()]);

        let mut after_role = before_role;
        let mut widened = after_role.permissions().clone();
        widened.insert(Permission::TaskEdit);
        after_role.set_permissions(widened);
        let after_hierarchy = RoleHierarchy::new(vec![after_role]);

        let before = EffectivePermissions::resolve(&held, &before_hierarchy);
        let after = EffectivePermissions::resolve(&held, &after_hierarchy);

        for permission in Permission::all() {
            if before.contains(*permission) {
                assert!(after.contains(*permission));
            }
        }
        assert!(after.contains(Permission::TaskEdit));
    }
}
