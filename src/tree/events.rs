//! Change notifications emitted by the tree

use crate::core::types::SkillId;

/// Typed change message pushed to observers during a mutating call.
///
/// Delivery is synchronous and in-order. Cascaded forgets during a
/// stabilization sweep each fire their own `SkillLocked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeEvent {
    /// A skill gained a level (always 1 for single-shot skills)
    SkillUnlocked { skill: SkillId, level: u32 },
    /// A skill lost a level; 0 means fully locked again
    SkillLocked { skill: SkillId, level: u32 },
    /// The spendable or attribute balance changed
    PointsChanged,
}

/// Observer callback registered via [`crate::tree::SkillTree::subscribe`].
///
/// Fired in-line mid-mutation; observers must not re-enter mutating
/// operations on the same tree.
pub type TreeObserver = Box<dyn FnMut(&TreeEvent)>;
