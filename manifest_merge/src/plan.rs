//! Reconciliation of existing declarations against the desired set.
//!
//! Planning is a pure set-membership computation over value records: it
//! never touches the tree. Pairwise comparison is quadratic, which is fine
//! for the tens of declarations a manifest carries.

use crate::component::{DeclaredComponent, ExistingComponent, Ownership, RootNamespace};
use crate::config::ConflictPolicy;
use crate::error::{ManifestError, ManifestResult};
use crate::identity::{same_component, satisfies};

/// A desired declaration that shares its identity with a hand-authored one
/// but disagrees on the exported flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    desired: DeclaredComponent,
    hand_authored: DeclaredComponent,
}

impl Conflict {
    /// Declaration requested by the generator.
    #[must_use]
    pub const fn desired(&self) -> &DeclaredComponent {
        &self.desired
    }

    /// User-owned declaration it collides with.
    #[must_use]
    pub const fn hand_authored(&self) -> &DeclaredComponent {
        &self.hand_authored
    }
}

/// Additions and removals that bring the descriptor in line with the
/// desired set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
    to_add: Vec<DeclaredComponent>,
    to_remove: Vec<DeclaredComponent>,
    conflicts: Vec<Conflict>,
}

impl MergePlan {
    /// Desired declarations with no satisfying counterpart, in desired order.
    #[must_use]
    pub fn to_add(&self) -> &[DeclaredComponent] {
        &self.to_add
    }

    /// Generated declarations that are no longer wanted, in document order.
    #[must_use]
    pub fn to_remove(&self) -> &[DeclaredComponent] {
        &self.to_remove
    }

    /// Collisions with hand-authored declarations.
    #[must_use]
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// Returns `true` when applying the plan would change nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Applies the conflict policy to this plan.
    ///
    /// Under [`ConflictPolicy::Warn`] each conflict is logged and the plan
    /// proceeds unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Conflict`] for the first conflict under
    /// [`ConflictPolicy::Fail`].
    pub fn check_conflicts(&self, policy: ConflictPolicy) -> ManifestResult<()> {
        match (policy, self.conflicts.first()) {
            (_, None) => Ok(()),
            (ConflictPolicy::Fail, Some(conflict)) => Err(ManifestError::Conflict {
                name: conflict.desired.qualified_name().to_owned(),
                routing_key: conflict.desired.routing_key().to_owned(),
            }),
            (ConflictPolicy::Warn, Some(_)) => {
                for conflict in &self.conflicts {
                    tracing::warn!(
                        name = %conflict.desired.qualified_name(),
                        routing_key = %conflict.desired.routing_key(),
                        existing = %conflict.hand_authored,
                        "generated declaration collides with a hand-authored one"
                    );
                }
                Ok(())
            }
        }
    }
}

/// Computes the merge plan for `existing` against `desired`.
///
/// A desired declaration is added unless some existing declaration
/// satisfies it (identity and exported flag). A generated declaration is
/// removed unless it is the one kept for a desired declaration; when
/// several existing declarations satisfy the same desired one, a
/// hand-authored one is kept in preference, then the first in document
/// order, and surplus generated copies are removed. Hand-authored
/// declarations are never removed. Repeated desired entries are planned
/// once.
#[must_use]
pub fn plan(
    existing: &[ExistingComponent],
    desired: &[DeclaredComponent],
    namespace: &RootNamespace,
) -> MergePlan {
    let mut merge_plan = MergePlan::default();
    let mut kept = vec![false; existing.len()];
    let mut seen: Vec<&DeclaredComponent> = Vec::with_capacity(desired.len());

    for wanted in desired {
        if seen.iter().any(|earlier| satisfies(earlier, wanted, namespace)) {
            continue;
        }
        seen.push(wanted);

        match keeper_for(existing, wanted, namespace) {
            Some(index) => {
                if let Some(slot) = kept.get_mut(index) {
                    *slot = true;
                }
            }
            None => {
                merge_plan.to_add.push(wanted.clone());
                merge_plan
                    .conflicts
                    .extend(conflicts_for(existing, wanted, namespace));
            }
        }
    }

    merge_plan.to_remove = existing
        .iter()
        .zip(&kept)
        .filter(|(entry, is_kept)| entry.ownership().is_generated() && !**is_kept)
        .map(|(entry, _)| entry.component().clone())
        .collect();

    tracing::debug!(
        existing = existing.len(),
        desired = desired.len(),
        to_add = merge_plan.to_add.len(),
        to_remove = merge_plan.to_remove.len(),
        conflicts = merge_plan.conflicts.len(),
        "planned manifest merge"
    );
    merge_plan
}

fn keeper_for(
    existing: &[ExistingComponent],
    wanted: &DeclaredComponent,
    namespace: &RootNamespace,
) -> Option<usize> {
    let satisfying = |ownership: Ownership| {
        existing.iter().position(|entry| {
            entry.ownership() == ownership && satisfies(entry.component(), wanted, namespace)
        })
    };
    satisfying(Ownership::HandAuthored).or_else(|| satisfying(Ownership::Generated))
}

fn conflicts_for<'a>(
    existing: &'a [ExistingComponent],
    wanted: &'a DeclaredComponent,
    namespace: &'a RootNamespace,
) -> impl Iterator<Item = Conflict> + 'a {
    existing
        .iter()
        .filter(|entry| !entry.ownership().is_generated())
        .filter(move |entry| same_component(entry.component(), wanted, namespace))
        .map(move |entry| Conflict {
            desired: wanted.clone(),
            hand_authored: entry.component().clone(),
        })
}
