use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tasklane_core::AppError;

/// Permissions enforced by workspace policy checks.
///
/// The catalog is a closed enumeration: every key the product knows is a
/// variant here, so an unknown key is a detectable parse failure rather
/// than a silently accepted string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Allows viewing the project and its boards.
    ProjectView,
    /// Allows changing project-level settings.
    ProjectSettingsManage,
    /// Allows viewing tasks.
    TaskView,
    /// Allows creating tasks.
    TaskCreate,
    /// Allows editing tasks.
    TaskEdit,
    /// Allows assigning tasks to members.
    TaskAssign,
    /// Allows deleting tasks.
    TaskDelete,
    /// Allows viewing issues.
    IssueView,
    /// Allows creating issues.
    IssueCreate,
    /// Allows editing issues.
    IssueEdit,
    /// Allows deleting issues.
    IssueDelete,
    /// Allows viewing ideas.
    IdeaView,
    /// Allows creating ideas.
    IdeaCreate,
    /// Allows editing ideas.
    IdeaEdit,
    /// Allows deleting ideas.
    IdeaDelete,
    /// Allows viewing member groups.
    GroupView,
    /// Allows managing member groups.
    GroupManage,
    /// Allows managing custom roles and the hierarchy.
    RoleManage,
}

impl Permission {
    /// Returns a stable storage value for this permission.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectView => "project.view",
            Self::ProjectSettingsManage => "project.settings.manage",
            Self::TaskView => "task.view",
            Self::TaskCreate => "task.create",
            Self::TaskEdit => "task.edit",
            Self::TaskAssign => "task.assign",
            Self::TaskDelete => "task.delete",
            Self::IssueView => "issue.view",
            Self::IssueCreate => "issue.create",
            Self::IssueEdit => "issue.edit",
            Self::IssueDelete => "issue.delete",
            Self::IdeaView => "idea.view",
            Self::IdeaCreate => "idea.create",
            Self::IdeaEdit => "idea.edit",
            Self::IdeaDelete => "idea.delete",
            Self::GroupView => "group.view",
            Self::GroupManage => "group.manage",
            Self::RoleManage => "role.manage",
        }
    }

    /// Returns a human-readable label for catalog listings.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::ProjectView => "View project",
            Self::ProjectSettingsManage => "Manage project settings",
            Self::TaskView => "View tasks",
            Self::TaskCreate => "Create tasks",
            Self::TaskEdit => "Edit tasks",
            Self::TaskAssign => "Assign tasks",
            Self::TaskDelete => "Delete tasks",
            Self::IssueView => "View issues",
            Self::IssueCreate => "Create issues",
            Self::IssueEdit => "Edit issues",
            Self::IssueDelete => "Delete issues",
            Self::IdeaView => "View ideas",
            Self::IdeaCreate => "Create ideas",
            Self::IdeaEdit => "Edit ideas",
            Self::IdeaDelete => "Delete ideas",
            Self::GroupView => "View groups",
            Self::GroupManage => "Manage groups",
            Self::RoleManage => "Manage roles",
        }
    }

    /// Returns all known permissions in catalog order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Permission] = &[
            Permission::ProjectView,
            Permission::ProjectSettingsManage,
            Permission::TaskView,
            Permission::TaskCreate,
            Permission::TaskEdit,
            Permission::TaskAssign,
            Permission::TaskDelete,
            Permission::IssueView,
            Permission::IssueCreate,
            Permission::IssueEdit,
            Permission::IssueDelete,
            Permission::IdeaView,
            Permission::IdeaCreate,
            Permission::IdeaEdit,
            Permission::IdeaDelete,
            Permission::GroupView,
            Permission::GroupManage,
            Permission::RoleManage,
        ];

        ALL
    }

    /// Returns whether the key is part of the catalog.
    #[must_use]
    pub fn is_known(value: &str) -> bool {
        Self::from_str(value).is_ok()
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "project.view" => Ok(Self::ProjectView),
            "project.settings.manage" => Ok(Self::ProjectSettingsManage),
            "task.view" => Ok(Self::TaskView),
            "task.create" => Ok(Self::TaskCreate),
            "task.edit" => Ok(Self::TaskEdit),
            "task.assign" => Ok(Self::TaskAssign),
            "task.delete" => Ok(Self::TaskDelete),
            "issue.view" => Ok(Self::IssueView),
            "issue.create" => Ok(Self::IssueCreate),
            "issue.edit" => Ok(Self::IssueEdit),
            "issue.delete" => Ok(Self::IssueDelete),
            "idea.view" => Ok(Self::IdeaView),
            "idea.create" => Ok(Self::IdeaCreate),
            "idea.edit" => Ok(Self::IdeaEdit),
            "idea.delete" => Ok(Self::IdeaDelete),
            "group.view" => Ok(Self::GroupView),
            "group.manage" => Ok(Self::GroupManage),
            "role.manage" => Ok(Self::RoleManage),
            _ => Err(AppError::Validation(format!(
                "unknown permission value '{value}'"
            ))),
        }
    }
}

/// Display grouping of catalog permissions.
///
/// Ordering here is presentation-only and carries no authorization meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionCategory {
    /// Project-level settings and visibility.
    Project,
    /// Task board permissions.
    Tasks,
    /// Issue tracker permissions.
    Issues,
    /// Idea backlog permissions.
    Ideas,
    /// Member group permissions.
    Groups,
    /// Role hierarchy administration.
    RoleManagement,
}

impl PermissionCategory {
    /// Returns all categories in display order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[PermissionCategory] = &[
            PermissionCategory::Project,
            PermissionCategory::Tasks,
            PermissionCategory::Issues,
            PermissionCategory::Ideas,
            PermissionCategory::Groups,
            PermissionCategory::RoleManagement,
        ];

        ALL
    }

    /// Returns a stable key for this category.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Tasks => "tasks",
            Self::Issues => "issues",
            Self::Ideas => "ideas",
            Self::Groups => "groups",
            Self::RoleManagement => "role-management",
        }
    }

    /// Returns a human-readable label for this category.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Project => "Project",
            Self::Tasks => "Tasks",
            Self::Issues => "Issues",
            Self::Ideas => "Ideas",
            Self::Groups => "Groups",
            Self::RoleManagement => "Role management",
        }
    }

    /// Returns the category's permissions in display order.
    #[must_use]
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Self::Project => &[Permission::ProjectView, Permission::ProjectSettingsManage],
            Self::Tasks => &[
                Permission::TaskView,
                Permission::TaskCreate,
                Permission::TaskEdit,
                Permission::TaskAssign,
                Permission::TaskDelete,
            ],
            Self::Issues => &[
                Permission::IssueView,
                Permission::IssueCreate,
                Permission::IssueEdit,
                Permission::IssueDelete,
            ],
            Self::Ideas => &[
                Permission::IdeaView,
                Permission::IdeaCreate,
                Permission::IdeaEdit,
                Permission::IdeaDelete,
            ],
            Self::Groups => &[Permission::GroupView, Permission::GroupManage],
            Self::RoleManagement => &[Permission::RoleManage],
        }
    }
}

/// Named permission bundles offered when editing a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionPreset {
    /// Read-only access to every surface.
    Viewer,
    /// Day-to-day contributor access without destructive rights.
    Editor,
    /// Every permission in the catalog.
    All,
    /// No permissions at all.
    None,
}

impl PermissionPreset {
    /// Returns the permission set this preset expands to.
    #[must_use]
    pub fn permissions(&self) -> BTreeSet<Permission> {
        match self {
            Self::Viewer => BTreeSet::from([
                Permission::ProjectView,
                Permission::TaskView,
                Permission::IssueView,
                Permission::IdeaView,
                Permission::GroupView,
            ]),
            Self::Editor => BTreeSet::from([
                Permission::ProjectView,
                Permission::TaskView,
                Permission::TaskCreate,
                Permission::TaskEdit,
                Permission::TaskAssign,
                Permission::IssueView,
                Permission::IssueCreate,
                Permission::IssueEdit,
                Permission::IdeaView,
                Permission::IdeaCreate,
                Permission::IdeaEdit,
                Permission::GroupView,
            ]),
            Self::All => Permission::all().iter().copied().collect(),
            Self::None => BTreeSet::new(),
        }
    }
}
