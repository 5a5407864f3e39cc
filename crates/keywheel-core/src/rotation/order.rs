use std::cmp::Ordering;

use keywheel_common::CredentialId;

use crate::credential::{Credential, VertexCredential};

/// Facts the ordering policy needs from a pool entry.
pub trait RotationEntry {
    fn id(&self) -> &CredentialId;
    fn priority(&self) -> i32;
    fn last_used_at(&self) -> Option<i64>;
}

impl RotationEntry for Credential {
    fn id(&self) -> &CredentialId {
        &self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn last_used_at(&self) -> Option<i64> {
        self.last_used_at
    }
}

impl RotationEntry for VertexCredential {
    fn id(&self) -> &CredentialId {
        &self.id
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn last_used_at(&self) -> Option<i64> {
        self.last_used_at
    }
}

/// Rotation order: least recently used first, with never-used entries ahead
/// of everything, then priority, then id. Deterministic for any snapshot of
/// the active set, which is what makes repeated selection cycle the whole
/// pool before any entry repeats.
pub fn rotation_order<E: RotationEntry>(a: &E, b: &E) -> Ordering {
    a.last_used_at()
        .cmp(&b.last_used_at())
        .then_with(|| a.priority().cmp(&b.priority()))
        .then_with(|| a.id().cmp(b.id()))
}

/// Index of the entry rotation picks next, if the pool is non-empty.
pub fn pick_next<E: RotationEntry>(entries: &[E]) -> Option<usize> {
    entries
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| rotation_order(*a, *b))
        .map(|(index, _)| index)
}

/// Stable 1-based "key N of M" rank: the entry's position in (priority, id)
/// order. Usage timestamps play no part, so the rank a user sees holds
/// still while rotation cycles underneath it.
pub fn display_rank<E: RotationEntry>(entries: &[E], selected: &E) -> usize {
    1 + entries
        .iter()
        .filter(|entry| (entry.priority(), entry.id()) < (selected.priority(), selected.id()))
        .count()
}
