use serde::{Deserialize, Serialize};

use crate::RoleId;

/// How a member is ranked inside a tenant.
///
/// Owner, admin, and member are built-in keywords, not stored role
/// documents; custom standing is a list of held role ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipKind {
    /// The tenant owner; implicit highest authority.
    Owner,
    /// Built-in administrator; above every custom role, below the owner.
    Admin,
    /// Plain member with no custom roles.
    Member,
    /// Holder of one or more custom roles.
    Roles(Vec<RoleId>),
}

/// Associates a user identity with its standing in one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    subject: String,
    kind: MembershipKind,
}

impl Membership {
    /// Creates a membership record.
    #[must_use]
    pub fn new(subject: impl Into<String>, kind: MembershipKind) -> Self {
        Self {
            subject: subject.into(),
            kind,
        }
    }

    /// Returns the member's stable subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns how the member is ranked.
    #[must_use]
    pub fn kind(&self) -> &MembershipKind {
        &self.kind
    }
}
