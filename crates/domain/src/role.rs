use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tasklane_core::{AppError, AppResult, NonEmptyString};
use uuid::Uuid;

use crate::Permission;

/// Unique identifier for a custom role.
///
/// Assigned at creation time and never reused within a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(Uuid);

impl RoleId {
    /// Creates a new random role identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a role identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Validated display color in `#rrggbb` form.
///
/// Colors are presentation data only and never feed authorization
/// decisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleColor(String);

impl RoleColor {
    /// Creates a validated, lowercased hex color.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim();

        let Some(digits) = trimmed.strip_prefix('#') else {
            return Err(AppError::Validation(
                "color must start with '#'".to_owned(),
            ));
        };

        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AppError::Validation(format!(
                "color '{trimmed}' must be six hex digits"
            )));
        }

        Ok(Self(trimmed.to_lowercase()))
    }

    /// Returns the normalized color string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<RoleColor> for String {
    fn from(value: RoleColor) -> Self {
        value.0
    }
}

/// A named, colored, ordered bundle of permissions scoped to one tenant.
///
/// `position` defines rank in the hierarchy: lower is closer to the owner.
/// Within a tenant the positions of all custom roles form a contiguous
/// sequence `0..n`; the mutation service maintains that invariant on every
/// write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    role_id: RoleId,
    name: NonEmptyString,
    color: RoleColor,
    permissions: BTreeSet<Permission>,
    position: u32,
    is_protected: bool,
}

impl RoleDefinition {
    /// Creates a role from already-validated parts.
    #[must_use]
    pub fn new(
        role_id: RoleId,
        name: NonEmptyString,
        color: RoleColor,
        permissions: BTreeSet<Permission>,
        position: u32,
        is_protected: bool,
    ) -> Self {
        Self {
            role_id,
            name,
            color,
            permissions,
            position,
            is_protected,
        }
    }

    /// Returns the stable role identifier.
    #[must_use]
    pub fn role_id(&self) -> RoleId {
        self.role_id
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the display color.
    #[must_use]
    pub fn color(&self) -> &RoleColor {
        &self.color
    }

    /// Returns the granted permission set.
    #[must_use]
    pub fn permissions(&self) -> &BTreeSet<Permission> {
        &self.permissions
    }

    /// Returns the hierarchy position; lower is higher authority.
    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Returns whether this is a system-seeded protected role.
    #[must_use]
    pub fn is_protected(&self) -> bool {
        self.is_protected
    }

    /// Replaces the display name.
    pub fn rename(&mut self, name: NonEmptyString) {
        self.name = name;
    }

    /// Replaces the display color.
    pub fn set_color(&mut self, color: RoleColor) {
        self.color = color;
    }

    /// Replaces the granted permission set.
    pub fn set_permissions(&mut self, permissions: BTreeSet<Permission>) {
        self.permissions = permissions;
    }

    /// Moves the role to a new hierarchy position.
    pub fn set_position(&mut self, position: u32) {
        self.position = position;
    }
}

/// One tenant's custom roles, ordered by position.
///
/// Wraps the role list read from the store and owns the position-sequence
/// algorithms: next-position assignment, contiguity checks, compaction
/// after a delete, and the reorder diff. Keeping them here makes the
/// invariants pure functions of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleHierarchy {
    roles: Vec<RoleDefinition>,
}

impl RoleHierarchy {
    /// Builds a hierarchy from an unordered role list.
    ///
    /// Delivery order from the store subscription is unspecified, so the
    /// list is sorted by position here; transient position ties from
    /// racing writers order by role id until the next reorder heals them.
    #[must_use]
    pub fn new(mut roles: Vec<RoleDefinition>) -> Self {
        roles.sort_by(|left, right| {
            left.position()
                .cmp(&right.position())
                .then_with(|| left.role_id().cmp(&right.role_id()))
        });
        Self { roles }
    }

    /// Returns the roles sorted by position.
    #[must_use]
    pub fn roles(&self) -> &[RoleDefinition] {
        &self.roles
    }

    /// Returns the number of roles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Returns whether the tenant has no custom roles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Finds a role by id.
    #[must_use]
    pub fn find(&self, role_id: RoleId) -> Option<&RoleDefinition> {
        self.roles.iter().find(|role| role.role_id() == role_id)
    }

    /// Returns the append position for a newly created role.
    #[must_use]
    pub fn next_position(&self) -> u32 {
        self.roles
            .iter()
            .map(RoleDefinition::position)
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Returns whether positions form the sequence `0..n` without gaps or
    /// duplicates.
    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        self.roles
            .iter()
            .enumerate()
            .all(|(index, role)| role.position() as usize == index)
    }

    /// Computes the position shifts needed to keep the sequence contiguous
    /// after removing one role.
    ///
    /// Every remaining role positioned below the removed one shifts up by
    /// one. Returns only the roles whose position changes.
    pub fn compaction_after_remove(&self, role_id: RoleId) -> AppResult<Vec<(RoleId, u32)>> {
        let removed = self
            .find(role_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' does not exist")))?;
        let removed_position = removed.position();

        Ok(self
            .roles
            .iter()
            .filter(|role| role.role_id() != role_id && role.position() > removed_position)
            .map(|role| (role.role_id(), role.position() - 1))
            .collect())
    }

    /// Computes the minimal set of position writes for a full reorder.
    ///
    /// `new_order` must be a permutation of the current role ids; each id's
    /// new position is its index in the list. Returns only the roles whose
    /// position actually changes, so a reorder writes nothing for roles
    /// that stayed put.
    pub fn reorder_diff(&self, new_order: &[RoleId]) -> AppResult<Vec<(RoleId, u32)>> {
        if new_order.len() != self.roles.len() {
            return Err(AppError::Validation(format!(
                "reorder lists {} roles but the tenant has {}",
                new_order.len(),
                self.roles.len()
            )));
        }

        let mut seen = HashSet::with_capacity(new_order.len());
        for role_id in new_order {
            if !seen.insert(*role_id) {
                return Err(AppError::Validation(format!(
                    "reorder lists role '{role_id}' more than once"
                )));
            }
            if self.find(*role_id).is_none() {
                return Err(AppError::NotFound(format!(
                    "role '{role_id}' does not exist"
                )));
            }
        }

        let mut changes = Vec::new();
        for (index, role_id) in new_order.iter().enumerate() {
            let position = index as u32;
            if let Some(role) = self.find(*role_id) {
                if role.position() != position {
                    changes.push((*role_id, position));
                }
            }
        }

        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;
    use tasklane_core::NonEmptyString;

    use super::{RoleColor, RoleDefinition, RoleHierarchy, RoleId};

    fn role(name: &str, position: u32) -> RoleDefinition {
        let Ok(name) = NonEmptyString::new(name) else {
            panic!("test role name must be non-empty");
        };
        let Ok(color) = RoleColor::new("#3b82f6") else {
            panic!("test color must be valid");
        };
        RoleDefinition::new(RoleId::new(), name, color, BTreeSet::new(), position, false)
    }

    /// Applies a computed set of position writes to a plain role list.
    fn apply_positions(roles: &mut Vec<RoleDefinition>, changes: &[(RoleId, u32)]) {
        for (role_id, position) in changes {
            if let Some(entry) = roles.iter_mut().find(|entry| entry.role_id() == *role_id) {
                entry.set_position(*position);
            }
        }
    }

    #[test]
    fn color_is_normalized_to_lowercase() {
        let color = RoleColor::new("#3B82F6");
        assert!(color.is_ok_and(|value| value.as_str() == "#3b82f6"));
    }

    #[test]
    fn color_without_hash_is_rejected() {
        assert!(RoleColor::new("3b82f6").is_err());
    }

    #[test]
    fn color_with_wrong_length_is_rejected() {
        assert!(RoleColor::new("#fff").is_err());
        assert!(RoleColor::new("#3b82f6aa").is_err());
    }

    #[test]
    fn color_with_non_hex_digits_is_rejected() {
        assert!(RoleColor::new("#3b82zz").is_err());
    }

    #[test]
    fn hierarchy_sorts_by_position() {
        let c = role("C", 2);
        let a = role("A", 0);
        let b = role("B", 1);
        let hierarchy = RoleHierarchy::new(vec![c, a, b]);

        let names: Vec<&str> = hierarchy
            .roles()
            .iter()
            .map(|entry| entry.name().as_str())
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert!(hierarchy.is_contiguous());
    }

    #[test]
    fn next_position_appends_at_bottom() {
        let hierarchy = RoleHierarchy::new(vec![role("A", 0), role("B", 1)]);
        assert_eq!(hierarchy.next_position(), 2);
        assert_eq!(RoleHierarchy::new(Vec::new()).next_position(), 0);
    }

    #[test]
    fn compaction_shifts_roles_below_the_removed_one() {
        let a = role("A", 0);
        let b = role("B", 1);
        let c = role("C", 2);
        let b_id = b.role_id();
        let c_id = c.role_id();
        let hierarchy = RoleHierarchy::new(vec![a.clone(), b, c.clone()]);

        let changes = hierarchy.compaction_after_remove(b_id);
        assert!(changes.as_ref().is_ok_and(|list| list == &[(c_id, 1)]));

        let mut remaining = vec![a, c];
        if let Ok(changes) = changes {
            apply_positions(&mut remaining, &changes);
        }
        let compacted = RoleHierarchy::new(remaining);
        assert!(compacted.is_contiguous());
        assert_eq!(compacted.roles()[0].name().as_str(), "A");
        assert_eq!(compacted.roles()[1].name().as_str(), "C");
    }

    #[test]
    fn compaction_for_missing_role_is_not_found() {
        let hierarchy = RoleHierarchy::new(vec![role("A", 0)]);
        assert!(hierarchy.compaction_after_remove(RoleId::new()).is_err());
    }

    #[test]
    fn reorder_diff_writes_only_changed_positions() {
        let a = role("A", 0);
        let c = role("C", 1);
        let a_id = a.role_id();
        let c_id = c.role_id();
        let hierarchy = RoleHierarchy::new(vec![a, c]);

        let changes = hierarchy.reorder_diff(&[c_id, a_id]);
        assert!(
            changes.is_ok_and(|list| list.contains(&(c_id, 0)) && list.contains(&(a_id, 1)))
        );

        let unchanged = hierarchy.reorder_diff(&[a_id, c_id]);
        assert!(unchanged.is_ok_and(|list| list.is_empty()));
    }

    #[test]
    fn reorder_diff_rejects_incomplete_order() {
        let a = role("A", 0);
        let b = role("B", 1);
        let a_id = a.role_id();
        let hierarchy = RoleHierarchy::new(vec![a, b]);

        assert!(hierarchy.reorder_diff(&[a_id]).is_err());
        assert!(hierarchy.reorder_diff(&[a_id, a_id]).is_err());
        assert!(hierarchy.reorder_diff(&[a_id, RoleId::new()]).is_err());
    }

    proptest! {
        /// Any sequence of appends, deletes, and rotations keeps positions
        /// contiguous.
        #[test]
        fn position_sequence_stays_contiguous(operations in prop::collection::vec(0u8..=2, 1..24)) {
            let mut roles: Vec<RoleDefinition> = Vec::new();
            let mut counter = 0u32;

            for (step, operation) in operations.iter().enumerate() {
                let hierarchy = RoleHierarchy::new(roles.clone());
                match *operation {
                    0 => {
                        counter += 1;
                        roles.push(role(&format!("role-{counter}"), hierarchy.next_position()));
                    }
                    1 if !roles.is_empty() => {
                        let victim = hierarchy.roles()[step % hierarchy.len()].role_id();
                        let changes = hierarchy.compaction_after_remove(victim);
                        prop_assert!(changes.is_ok());
                        roles.retain(|entry| entry.role_id() != victim);
                        if let Ok(changes) = changes {
                            apply_positions(&mut roles, &changes);
                        }
                    }
                    2 if !roles.is_empty() => {
                        let mut order: Vec<RoleId> =
                            hierarchy.roles().iter().map(RoleDefinition::role_id).collect();
                        let len = order.len();
                        order.rotate_left(step % len);
                        let changes = hierarchy.reorder_diff(&order);
                        prop_assert!(changes.is_ok());
                        if let Ok(changes) = changes {
                            apply_positions(&mut roles, &changes);
                        }
                    }
                    _ => {}
                }

                prop_assert!(RoleHierarchy::new(roles.clone()).is_contiguous());
            }
        }
    }
}
