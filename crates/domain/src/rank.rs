use std::cmp::Ordering;

use crate::{EffectivePermissions, MembershipKind, Permission, RoleDefinition, RoleHierarchy};

/// A comparable authority level derived from a membership.
///
/// Comparison is defined only on this union: the owner sits above the
/// built-in admin, the admin above every custom position, and every custom
/// position above the member sentinel. Raw position numbers are never
/// compared across tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rank {
    /// Tenant owner; edits anything, including protected roles.
    Owner,
    /// Built-in administrator; above all custom roles.
    Admin,
    /// Holder of a custom role at this hierarchy position.
    Custom(u32),
    /// No custom rank; cannot touch role management.
    Member,
}

impl Rank {
    /// Collapses the union into a sortable key; lower sorts first and
    /// means higher authority.
    fn authority(&self) -> (u8, u32) {
        match self {
            Self::Owner => (0, 0),
            Self::Admin => (1, 0),
            Self::Custom(position) => (2, *position),
            Self::Member => (3, 0),
        }
    }

    /// Returns whether this rank sits strictly above the given position.
    ///
    /// A custom rank never out-ranks its own position, so a role can never
    /// edit itself or a peer.
    #[must_use]
    pub fn outranks_position(&self, position: u32) -> bool {
        match self {
            Self::Owner | Self::Admin => true,
            Self::Custom(own) => *own < position,
            Self::Member => false,
        }
    }

    /// Returns whether this rank sits strictly above the given role.
    #[must_use]
    pub fn outranks(&self, role: &RoleDefinition) -> bool {
        self.outranks_position(role.position())
    }

    /// Decides whether this rank may edit, delete, or reposition the role.
    ///
    /// The owner may touch anything. Protected roles reject everyone else.
    /// Otherwise the actor must out-rank the target.
    #[must_use]
    pub fn can_edit(&self, role: &RoleDefinition) -> bool {
        match self {
            Self::Owner => true,
            Self::Admin | Self::Custom(_) => !role.is_protected() && self.outranks(role),
            Self::Member => false,
        }
    }
}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.authority().cmp(&other.authority())
    }
}

/// Translates a membership into a comparable rank against a role snapshot.
///
/// Multi-role members rank at the best (lowest) position among the roles
/// they hold; role ids that no longer resolve contribute nothing, and a
/// membership whose ids all dangle ranks as a plain member.
#[must_use]
pub fn rank_of(kind: &MembershipKind, hierarchy: &RoleHierarchy) -> Rank {
    match kind {
        MembershipKind::Owner => Rank::Owner,
        MembershipKind::Admin => Rank::Admin,
        MembershipKind::Member => Rank::Member,
        MembershipKind::Roles(role_ids) => role_ids
            .iter()
            .filter_map(|role_id| hierarchy.find(*role_id))
            .map(RoleDefinition::position)
            .min()
            .map_or(Rank::Member, Rank::Custom),
    }
}

/// Decides whether the actor may use role management at all.
///
/// Owner and admin always may; a custom rank only when its own effective
/// permission set grants role management. This is the visibility gate;
/// the authoritative boundary stays [`Rank::can_edit`] on each mutation.
#[must_use]
pub fn can_manage_roles(rank: Rank, effective: &EffectivePermissions) -> bool {
    match rank {
        Rank::Owner | Rank::Admin => true,
        Rank::Custom(_) => effective.contains(Permission::RoleManage),
        Rank::Member => false,
    }
}
