//! Skill nodes: cost curves, gating thresholds, prerequisite links

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::core::error::{Result, TreeError};
use crate::core::types::SkillId;

/// Variant payload distinguishing one-shot skills from repeatable ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkillKind {
    /// Binary skill: locked or unlocked, never re-learnable once unlocked
    SingleShot { unlocked: bool },
    /// Repeatable skill with an integer level in `[0, max_level]`
    Leveled { level: u32, max_level: u32 },
}

/// A node in the skill tree.
///
/// Gating data (costs, thresholds, prerequisite edges) is freely editable by
/// the owning collaborator. Unlock state lives in [`SkillKind`] and is
/// mutated only by the tree through learn/forget operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    id: SkillId,
    pub name: String,
    pub description: String,
    /// Cost of each level step; length 1 for single-shot skills
    pub cost_per_level: Vec<u32>,
    /// Minimum points already spent tree-wide before this skill is eligible
    pub required_investment_total: u32,
    /// Attribute balance floor per level step; same length as `cost_per_level`
    pub required_attribute_per_level: Vec<u32>,
    /// Skills gating this one; semantics depend on the tree-wide mode
    pub prerequisites: AHashSet<SkillId>,
    kind: SkillKind,
}

impl Skill {
    /// Create a locked single-shot skill with cost 1 and no thresholds.
    pub fn new_single_shot(name: impl Into<String>) -> Self {
        Self {
            id: SkillId::new(),
            name: name.into(),
            description: String::new(),
            cost_per_level: vec![1],
            required_investment_total: 0,
            required_attribute_per_level: vec![0],
            prerequisites: AHashSet::new(),
            kind: SkillKind::SingleShot { unlocked: false },
        }
    }

    /// Create a leveled skill at level 0.
    ///
    /// Level tables start with cost 1 / threshold 0 for the first level and
    /// zero-filled entries beyond it, ready to be edited per level.
    pub fn new_leveled(name: impl Into<String>, max_level: u32) -> Self {
        let mut skill = Self {
            id: SkillId::new(),
            name: name.into(),
            description: String::new(),
            cost_per_level: vec![1],
            required_investment_total: 0,
            required_attribute_per_level: vec![0],
            prerequisites: AHashSet::new(),
            kind: SkillKind::Leveled { level: 0, max_level: 1 },
        };
        skill.set_max_level(max_level);
        skill
    }

    pub fn id(&self) -> SkillId {
        self.id
    }

    pub fn kind(&self) -> SkillKind {
        self.kind
    }

    /// Current level; single-shot skills report 0 or 1.
    pub fn level(&self) -> u32 {
        match self.kind {
            SkillKind::SingleShot { unlocked } => u32::from(unlocked),
            SkillKind::Leveled { level, .. } => level,
        }
    }

    /// Highest reachable level; 1 for single-shot skills.
    pub fn max_level(&self) -> u32 {
        match self.kind {
            SkillKind::SingleShot { .. } => 1,
            SkillKind::Leveled { max_level, .. } => max_level,
        }
    }

    /// Cost of the next level step, if one remains.
    pub fn next_cost(&self) -> Option<u32> {
        if self.level() >= self.max_level() {
            return None;
        }
        self.cost_per_level.get(self.level() as usize).copied()
    }

    /// Resize a leveled skill's level range.
    ///
    /// Both per-level tables keep their existing entries up to the smaller
    /// bound and zero-fill any new entries. No-op for single-shot skills.
    /// The current level is left untouched.
    pub fn set_max_level(&mut self, new_max: u32) {
        let SkillKind::Leveled { max_level, .. } = &mut self.kind else {
            return;
        };
        self.cost_per_level.resize(new_max as usize, 0);
        self.required_attribute_per_level.resize(new_max as usize, 0);
        *max_level = new_max;
    }

    /// Verify both per-level tables match the level range.
    ///
    /// A mismatch means the editing collaborator broke the shape invariant;
    /// every engine operation that consults the tables calls this first.
    pub(crate) fn check_level_tables(&self) -> Result<()> {
        let expected = match self.kind {
            SkillKind::SingleShot { .. } => 1,
            SkillKind::Leveled { max_level, .. } => max_level as usize,
        };
        if self.cost_per_level.len() != expected
            || self.required_attribute_per_level.len() != expected
        {
            return Err(self.malformed(expected));
        }
        Ok(())
    }

    pub(crate) fn cost_at(&self, index: usize) -> Result<u32> {
        self.cost_per_level
            .get(index)
            .copied()
            .ok_or_else(|| self.malformed(index + 1))
    }

    pub(crate) fn attribute_floor_at(&self, index: usize) -> Result<u32> {
        self.required_attribute_per_level
            .get(index)
            .copied()
            .ok_or_else(|| self.malformed(index + 1))
    }

    /// Raise the unlock state one step and return the new level.
    pub(crate) fn bump_level(&mut self) -> u32 {
        match &mut self.kind {
            SkillKind::SingleShot { unlocked } => {
                *unlocked = true;
                1
            }
            SkillKind::Leveled { level, .. } => {
                *level += 1;
                *level
            }
        }
    }

    /// Lower the unlock state one step and return the new level.
    pub(crate) fn drop_level(&mut self) -> u32 {
        match &mut self.kind {
            SkillKind::SingleShot { unlocked } => {
                *unlocked = false;
                0
            }
            SkillKind::Leveled { level, .. } => {
                *level = level.saturating_sub(1);
                *level
            }
        }
    }

    fn malformed(&self, expected: usize) -> TreeError {
        TreeError::MalformedLevelTable {
            skill: self.id,
            expected,
            cost_entries: self.cost_per_level.len(),
            attribute_entries: self.required_attribute_per_level.len(),
        }
    }
}
