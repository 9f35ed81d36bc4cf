use tasklane_core::AppResult;
use tasklane_domain::{RoleDefinition, RoleHierarchy, RoleId};

/// Where a client-local reorder currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderPhase {
    /// Displaying the authoritative order from the store.
    Stable,
    /// Displaying a speculative local order not yet accepted.
    Dragging,
}

/// Client-side projection of one tenant's role list.
///
/// Feeds a reordering surface: during a drag the view shows the
/// speculative local order; authoritative pushes from the store
/// subscription always replace local state wholesale, never merge with a
/// draft. Commit folds the draft into the last known-good order; rollback
/// discards it.
#[derive(Debug, Clone)]
pub struct RoleListView {
    authoritative: RoleHierarchy,
    draft: Option<Vec<RoleId>>,
}

impl RoleListView {
    /// Creates a view over an initial authoritative snapshot.
    #[must_use]
    pub fn new(initial: RoleHierarchy) -> Self {
        Self {
            authoritative: initial,
            draft: None,
        }
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> ReorderPhase {
        if self.draft.is_some() {
            ReorderPhase::Dragging
        } else {
            ReorderPhase::Stable
        }
    }

    /// Returns the last known-good order from the store.
    #[must_use]
    pub fn authoritative(&self) -> &RoleHierarchy {
        &self.authoritative
    }

    /// Returns the roles in display order: the draft while dragging,
    /// otherwise the authoritative order.
    #[must_use]
    pub fn displayed(&self) -> Vec<&RoleDefinition> {
        match &self.draft {
            Some(order) => order
                .iter()
                .filter_map(|role_id| self.authoritative.find(*role_id))
                .collect(),
            None => self.authoritative.roles().iter().collect(),
        }
    }

    /// Starts a speculative local reorder.
    ///
    /// The order must be a permutation of the authoritative role ids; the
    /// view refuses drafts it could not hand to the mutation service.
    pub fn begin_drag(&mut self, order: Vec<RoleId>) -> AppResult<()> {
        self.authoritative.reorder_diff(&order)?;
        self.draft = Some(order);
        Ok(())
    }

    /// Accepts the draft as the new local order after the store confirmed
    /// the reorder; the next authoritative push carries the same order.
    pub fn commit(&mut self) {
        if let Some(order) = self.draft.take() {
            let mut roles = self.authoritative.roles().to_vec();
            for (index, role_id) in order.iter().enumerate() {
                if let Some(role) = roles.iter_mut().find(|role| role.role_id() == *role_id) {
                    role.set_position(index as u32);
                }
            }
            self.authoritative = RoleHierarchy::new(roles);
        }
    }

    /// Discards the draft and reverts to the last known-good order.
    pub fn roll_back(&mut self) {
        self.draft = None;
    }

    /// Replaces local state with an authoritative push from the store.
    ///
    /// Any in-flight draft is discarded, never merged: the store is the
    /// single source of truth once it speaks.
    pub fn apply_authoritative(&mut self, roles: Vec<RoleDefinition>) {
        self.authoritative = RoleHierarchy::new(roles);
        self.draft = None;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use tasklane_core::NonEmptyString;
    use tasklane_domain::{RoleColor, RoleDefinition, RoleHierarchy, RoleId};

    use super::{ReorderPhase, RoleListView};

    fn role(name: &str, position: u32) -> RoleDefinition {
        let Ok(name) = NonEmptyString::new(name) else {
            panic!("test role name must be non-empty");
        };
        let Ok(color) = RoleColor::new("#22c55e") else {
            panic!("test color must be valid");
        };
        RoleDefinition::new(RoleId::new(), name, color, BTreeSet::new(), position, false)
    }

    fn displayed_names(view: &RoleListView) -> Vec<String> {
        view.displayed()
            .iter()
            .map(|role| role.name().as_str().to_owned())
            .collect()
    }

    #[test]
    fn dragging_shows_the_draft_order() {
        let a = role("A", 0);
        let b = role("B", 1);
        let a_id = a.role_id();
        let b_id = b.role_id();
        let mut view = RoleListView::new(RoleHierarchy::new(vec![a, b]));
        assert_eq!(view.phase(), ReorderPhase::Stable);

        assert!(view.begin_drag(vec![b_id, a_id]).is_ok());
        assert_eq!(view.phase(), ReorderPhase::Dragging);
        assert_eq!(displayed_names(&view), vec!["B", "A"]);
    }

    #[test]
    fn rollback_restores_last_known_good_order() {
        let a = role("A", 0);
        let b = role("B", 1);
        let a_id = a.role_id();
        let b_id = b.role_id();
        let mut view = RoleListView::new(RoleHierarchy::new(vec![a, b]));

        assert!(view.begin_drag(vec![b_id, a_id]).is_ok());
        view.roll_back();

        assert_eq!(view.phase(), ReorderPhase::Stable);
        assert_eq!(displayed_names(&view), vec!["A", "B"]);
    }

    #[test]
    fn commit_folds_the_draft_into_the_authoritative_order() {
        let a = role("A", 0);
        let b = role("B", 1);
        let a_id = a.role_id();
        let b_id = b.role_id();
        let mut view = RoleListView::new(RoleHierarchy::new(vec![a, b]));

        assert!(view.begin_drag(vec![b_id, a_id]).is_ok());
        view.commit();

        assert_eq!(view.phase(), ReorderPhase::Stable);
        assert_eq!(displayed_names(&view), vec!["B", "A"]);
        assert!(view.authoritative().is_contiguous());
    }

    #[test]
    fn authoritative_push_discards_the_draft() {
        let a = role("A", 0);
        let b = role("B", 1);
        let a_id = a.role_id();
        let b_id = b.role_id();
        let mut view = RoleListView::new(RoleHierarchy::new(vec![a.clone(), b.clone()]));

        assert!(view.begin_drag(vec![b_id, a_id]).is_ok());

        let mut pushed_b = b;
        pushed_b.set_position(2);
        let c = role("C", 1);
        view.apply_authoritative(vec![a, c, pushed_b]);

        assert_eq!(view.phase(), ReorderPhase::Stable);
        assert_eq!(displayed_names(&view), vec!["A", "C", "B"]);
    }

    #[test]
    fn draft_must_be_a_permutation() {
        let a = role("A", 0);
        let a_id = a.role_id();
        let mut view = RoleListView::new(RoleHierarchy::new(vec![a, role("B", 1)]));

        assert!(view.begin_drag(vec![a_id]).is_err());
        assert_eq!(view.phase(), ReorderPhase::Stable);
    }
}
