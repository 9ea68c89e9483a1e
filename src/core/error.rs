use thiserror::Error;

use crate::core::types::SkillId;

/// Defect-level failures surfaced by the tree engine.
///
/// Routine outcomes (insufficient points, unmet requirements, maxed level,
/// target not unlocked) are reported through boolean results, not errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Skill not found in tree: {0:?}")]
    SkillNotFound(SkillId),

    #[error("Malformed level tables for skill {skill:?}: expected {expected} entries, cost table has {cost_entries}, attribute table has {attribute_entries}")]
    MalformedLevelTable {
        skill: SkillId,
        expected: usize,
        cost_entries: usize,
        attribute_entries: usize,
    },
}

pub type Result<T> = std::result::Result<T, TreeError>;
