use serde::{Deserialize, Serialize};

/// Stable audit actions emitted by role management use-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when a custom role is created.
    RoleCreated,
    /// Emitted when a role's name, color, or grants change.
    RoleUpdated,
    /// Emitted when a custom role is deleted.
    RoleDeleted,
    /// Emitted when the hierarchy order changes.
    RolesReordered,
    /// Emitted when the tenant's default role pointer changes.
    DefaultRoleChanged,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleCreated => "role.created",
            Self::RoleUpdated => "role.updated",
            Self::RoleDeleted => "role.deleted",
            Self::RolesReordered => "roles.reordered",
            Self::DefaultRoleChanged => "default_role.changed",
        }
    }
}
