//! The skill tree aggregate: unlock state, point economy, cascade rules
//!
//! `SkillTree` owns every skill, the unlocked set, and both currencies.
//! Mutation happens through learn/forget/reset and the point mutators; the
//! queries are side-effect free so collaborators can poll them every frame.
//!
//! Single-threaded by design: every operation, including the full
//! stabilization sweep after a forget, runs to completion before returning.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::core::error::{Result, TreeError};
use crate::core::types::SkillId;
use crate::tree::events::{TreeEvent, TreeObserver};
use crate::tree::skill::{Skill, SkillKind};

/// The owning aggregate for a whole skill graph and its player state.
#[derive(Serialize, Deserialize)]
pub struct SkillTree {
    skills: AHashMap<SkillId, Skill>,
    unlocked: AHashSet<SkillId>,
    skill_points: i64,
    skill_points_spent: i64,
    attribute_points: i64,
    /// When true every prerequisite must be unlocked; when false any single
    /// prerequisite or derived alternate suffices
    require_all_prerequisites: bool,
    #[serde(skip)]
    observers: Vec<TreeObserver>,
}

impl SkillTree {
    pub fn new() -> Self {
        Self {
            skills: AHashMap::new(),
            unlocked: AHashSet::new(),
            skill_points: 0,
            skill_points_spent: 0,
            attribute_points: 0,
            require_all_prerequisites: true,
            observers: Vec::new(),
        }
    }

    // === GRAPH STRUCTURE ===

    /// Register a skill with the tree and return its id.
    pub fn add_skill(&mut self, skill: Skill) -> SkillId {
        let id = skill.id();
        if skill.level() > 0 {
            self.unlocked.insert(id);
        } else {
            self.unlocked.remove(&id);
        }
        self.skills.insert(id, skill);
        id
    }

    /// Remove a skill, dropping its unlock state and every edge that
    /// references it. Balances are untouched: removal is an editor
    /// operation, not a refund.
    pub fn remove_skill(&mut self, id: SkillId) -> Option<Skill> {
        let skill = self.skills.remove(&id)?;
        self.unlocked.remove(&id);
        for other in self.skills.values_mut() {
            other.prerequisites.remove(&id);
        }
        Some(skill)
    }

    /// Add `requirement` as a prerequisite edge on `parent`.
    pub fn add_prerequisite(&mut self, parent: SkillId, requirement: SkillId) -> Result<()> {
        if !self.skills.contains_key(&requirement) {
            return Err(TreeError::SkillNotFound(requirement));
        }
        let parent = self
            .skills
            .get_mut(&parent)
            .ok_or(TreeError::SkillNotFound(parent))?;
        parent.prerequisites.insert(requirement);
        Ok(())
    }

    /// Remove the prerequisite edge `parent -> requirement` if present.
    pub fn remove_prerequisite(&mut self, parent: SkillId, requirement: SkillId) -> Result<()> {
        let parent = self
            .skills
            .get_mut(&parent)
            .ok_or(TreeError::SkillNotFound(parent))?;
        parent.prerequisites.remove(&requirement);
        Ok(())
    }

    pub fn skill(&self, id: SkillId) -> Option<&Skill> {
        self.skills.get(&id)
    }

    /// Mutable access for the editing collaborator. Unlock state still only
    /// moves through learn/forget; run [`SkillTree::stabilize`] after edits
    /// that tighten thresholds.
    pub fn skill_mut(&mut self, id: SkillId) -> Option<&mut Skill> {
        self.skills.get_mut(&id)
    }

    pub fn skills(&self) -> impl Iterator<Item = &Skill> {
        self.skills.values()
    }

    pub fn skill_count(&self) -> usize {
        self.skills.len()
    }

    pub fn unlocked_skills(&self) -> impl Iterator<Item = SkillId> + '_ {
        self.unlocked.iter().copied()
    }

    pub fn is_unlocked(&self, id: SkillId) -> bool {
        self.unlocked.contains(&id)
    }

    /// Prerequisite edges of a skill.
    pub fn prerequisites(&self, id: SkillId) -> Result<&AHashSet<SkillId>> {
        self.skills
            .get(&id)
            .map(|skill| &skill.prerequisites)
            .ok_or(TreeError::SkillNotFound(id))
    }

    /// Derived alternate prerequisites of a skill: every skill that lists it
    /// as a prerequisite. Empty in all-required mode. Computed from the
    /// primary edge set on demand, so it can never desync from it.
    pub fn alternate_prerequisites(&self, id: SkillId) -> Result<AHashSet<SkillId>> {
        if !self.skills.contains_key(&id) {
            return Err(TreeError::SkillNotFound(id));
        }
        if self.require_all_prerequisites {
            return Ok(AHashSet::new());
        }
        Ok(self
            .skills
            .values()
            .filter(|parent| parent.prerequisites.contains(&id))
            .map(|parent| parent.id())
            .collect())
    }

    // === REQUIREMENT MODE ===

    /// True when every prerequisite must be unlocked; false when any single
    /// prerequisite or derived alternate suffices.
    pub fn require_all_prerequisites(&self) -> bool {
        self.require_all_prerequisites
    }

    /// Toggle the tree-wide requirement mode. Satisfaction semantics and the
    /// derived alternate sets switch with the flag. Already-unlocked skills
    /// are not re-validated; call [`SkillTree::stabilize`] for that.
    pub fn set_require_all_prerequisites(&mut self, require_all: bool) {
        self.require_all_prerequisites = require_all;
    }

    // === ELIGIBILITY ===

    /// Whether the skill's next level could be unlocked right now, ignoring
    /// the point balance. Pure; safe to call every frame.
    pub fn can_unlock(&self, id: SkillId) -> Result<bool> {
        let skill = self.skills.get(&id).ok_or(TreeError::SkillNotFound(id))?;
        skill.check_level_tables()?;

        if i64::from(skill.required_investment_total) > self.skill_points_spent {
            return Ok(false);
        }
        match skill.kind() {
            SkillKind::Leveled { level, max_level } => {
                if level >= max_level {
                    return Ok(false);
                }
                if i64::from(skill.attribute_floor_at(level as usize)?) > self.attribute_points {
                    return Ok(false);
                }
            }
            SkillKind::SingleShot { .. } => {
                if i64::from(skill.attribute_floor_at(0)?) > self.attribute_points {
                    return Ok(false);
                }
            }
        }

        if self.unlocked.contains(&id) {
            // Leveled skills keep further levels available; single-shot
            // skills are never re-eligible.
            return Ok(matches!(skill.kind(), SkillKind::Leveled { .. }));
        }
        self.requirements_satisfied(id)
    }

    /// [`SkillTree::can_unlock`] plus a point-balance pre-check: the
    /// affordance collaborators use to render available / locked / maxed.
    pub fn can_unlock_with_cost(&self, id: SkillId) -> Result<bool> {
        let skill = self.skills.get(&id).ok_or(TreeError::SkillNotFound(id))?;
        skill.check_level_tables()?;

        let next_index = match skill.kind() {
            SkillKind::SingleShot { .. } => 0,
            SkillKind::Leveled { level, max_level } => {
                if level >= max_level {
                    return Ok(false);
                }
                level as usize
            }
        };
        if self.skill_points < i64::from(skill.cost_at(next_index)?) {
            return Ok(false);
        }
        self.can_unlock(id)
    }

    /// Mode-dependent prerequisite satisfaction for a not-yet-unlocked skill.
    fn requirements_satisfied(&self, id: SkillId) -> Result<bool> {
        let skill = self.skills.get(&id).ok_or(TreeError::SkillNotFound(id))?;
        if skill.prerequisites.is_empty() {
            return Ok(true);
        }
        if self.require_all_prerequisites {
            return Ok(skill
                .prerequisites
                .iter()
                .all(|prereq| self.unlocked.contains(prereq)));
        }
        if skill
            .prerequisites
            .iter()
            .any(|prereq| self.unlocked.contains(prereq))
        {
            return Ok(true);
        }
        // Alternate direction: an unlocked skill that lists this one as its
        // prerequisite satisfies it, enabling any-branch topologies.
        Ok(self.unlocked.iter().any(|unlocked_id| {
            self.skills
                .get(unlocked_id)
                .map_or(false, |parent| parent.prerequisites.contains(&id))
        }))
    }

    // === LEARN / FORGET ===

    /// Try to unlock the skill's next level, consuming its cost.
    ///
    /// Returns `Ok(false)` without touching state when the skill is
    /// ineligible or the balance is short - a routine outcome for callers to
    /// surface, not an error.
    pub fn learn_skill(&mut self, id: SkillId) -> Result<bool> {
        if !self.can_unlock(id)? {
            return Ok(false);
        }
        let skill = self.skills.get(&id).ok_or(TreeError::SkillNotFound(id))?;
        let cost = i64::from(skill.cost_at(skill.level() as usize)?);
        if self.skill_points < cost {
            return Ok(false);
        }

        self.skill_points -= cost;
        self.skill_points_spent += cost;
        self.emit(TreeEvent::PointsChanged);

        let skill = self.skills.get_mut(&id).ok_or(TreeError::SkillNotFound(id))?;
        let new_level = skill.bump_level();
        self.unlocked.insert(id);
        self.emit(TreeEvent::SkillUnlocked {
            skill: id,
            level: new_level,
        });
        tracing::debug!("Learned skill {:?} to level {}, cost {}", id, new_level, cost);
        Ok(true)
    }

    /// Forget one level of an unlocked skill, refunding its cost, then sweep
    /// the tree until every remaining unlocked skill still qualifies.
    ///
    /// No-op when the skill is not unlocked.
    pub fn forget_skill_refund(&mut self, id: SkillId) -> Result<()> {
        if !self.skills.contains_key(&id) {
            return Err(TreeError::SkillNotFound(id));
        }
        if !self.unlocked.contains(&id) {
            return Ok(());
        }
        self.refund_and_lock(id)?;
        self.stabilize()
    }

    /// Re-validate every unlocked skill, force-forgetting (with refund) any
    /// that fails its investment floor, attribute floor, or prerequisites,
    /// until a full pass forgets nothing.
    ///
    /// Eligibility only shrinks during the sweep, so the fixed point is
    /// deterministic regardless of iteration order. Running this on a stable
    /// tree forgets nothing. Collaborators that lower balances or tighten
    /// thresholds directly can call this to restore consistency.
    pub fn stabilize(&mut self) -> Result<()> {
        loop {
            let mut changed = false;

            let snapshot: Vec<SkillId> = self.unlocked.iter().copied().collect();
            for id in snapshot {
                if !self.unlocked.contains(&id) {
                    continue;
                }
                if self.fails_floors(id)? {
                    self.refund_and_lock(id)?;
                    changed = true;
                }
            }

            let snapshot: Vec<SkillId> = self.unlocked.iter().copied().collect();
            for id in snapshot {
                if !self.unlocked.contains(&id) {
                    continue;
                }
                if !self.requirements_satisfied(id)? {
                    self.refund_and_lock(id)?;
                    changed = true;
                }
            }

            if !changed {
                return Ok(());
            }
        }
    }

    /// Investment/attribute re-check for an unlocked skill's current level.
    ///
    /// The investment side tests `floor + cost[level-1] > spent`: the current
    /// level counts as still being paid for against the floor.
    fn fails_floors(&self, id: SkillId) -> Result<bool> {
        let skill = self.skills.get(&id).ok_or(TreeError::SkillNotFound(id))?;
        skill.check_level_tables()?;
        let level = skill.level();
        if level == 0 {
            return Ok(false);
        }
        let index = level as usize - 1;
        let investment_short = i64::from(skill.required_investment_total)
            + i64::from(skill.cost_at(index)?)
            > self.skill_points_spent;
        let attribute_short =
            i64::from(skill.attribute_floor_at(index)?) > self.attribute_points;
        Ok(investment_short || attribute_short)
    }

    /// Refund the current level's cost and lock one step. Assumes `id` is
    /// unlocked; emits points-changed then lock-changed.
    fn refund_and_lock(&mut self, id: SkillId) -> Result<()> {
        let skill = self.skills.get(&id).ok_or(TreeError::SkillNotFound(id))?;
        skill.check_level_tables()?;
        let level = skill.level();
        if level == 0 {
            self.unlocked.remove(&id);
            return Ok(());
        }
        let refund = i64::from(skill.cost_at(level as usize - 1)?);

        self.add_skill_points(refund);
        self.skill_points_spent -= refund;
        let new_level = self.lock_incomplete(id).unwrap_or(0);
        tracing::debug!(
            "Forgot skill {:?} to level {}, refunded {}",
            id,
            new_level,
            refund
        );
        Ok(())
    }

    /// Drop one level without touching balances and emit the lock event.
    fn lock_incomplete(&mut self, id: SkillId) -> Option<u32> {
        let skill = self.skills.get_mut(&id)?;
        let new_level = skill.drop_level();
        if new_level == 0 {
            self.unlocked.remove(&id);
        }
        self.emit(TreeEvent::SkillLocked {
            skill: id,
            level: new_level,
        });
        Some(new_level)
    }

    /// Lock every unlocked skill down to level 0 and zero all balances.
    ///
    /// A direct reset: levels drop without refund bookkeeping, then the
    /// balances are zeroed outright. Graph structure is untouched.
    pub fn reset_skill_tree(&mut self) {
        let snapshot: Vec<SkillId> = self.unlocked.iter().copied().collect();
        for id in snapshot {
            let mut levels = self.skills.get(&id).map_or(0, |skill| skill.level());
            while levels > 0 {
                let _ = self.lock_incomplete(id);
                levels -= 1;
            }
        }
        self.skill_points = 0;
        self.skill_points_spent = 0;
        self.attribute_points = 0;
        self.emit(TreeEvent::PointsChanged);
        tracing::debug!("Skill tree reset");
    }

    // === POINT ECONOMY ===

    pub fn skill_points(&self) -> i64 {
        self.skill_points
    }

    /// Net cumulative spend: grows on learn, shrinks on refund. Compared
    /// against each skill's investment floor.
    pub fn spent_skill_points(&self) -> i64 {
        self.skill_points_spent
    }

    pub fn attribute_points(&self) -> i64 {
        self.attribute_points
    }

    /// Add to the spendable balance. `amount` may be negative; the engine
    /// does not clamp.
    pub fn add_skill_points(&mut self, amount: i64) {
        self.skill_points += amount;
        self.emit(TreeEvent::PointsChanged);
    }

    /// Add to the attribute balance. `amount` may be negative.
    pub fn add_attribute_points(&mut self, amount: i64) {
        self.attribute_points += amount;
        self.emit(TreeEvent::PointsChanged);
    }

    /// Set the attribute balance outright, without notification.
    pub fn set_attribute_points(&mut self, amount: i64) {
        self.attribute_points = amount;
    }

    // === OBSERVERS ===

    /// Register an observer for tree events. Delivery is synchronous and
    /// in-order during the mutating call; observers must not re-enter
    /// mutating operations on this tree.
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(&TreeEvent) + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    fn emit(&mut self, event: TreeEvent) {
        for observer in &mut self.observers {
            observer(&event);
        }
    }
}

impl Default for SkillTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SkillTree {
    fn clone(&self) -> Self {
        // Observers are subscriptions, not state; clones start unsubscribed.
        Self {
            skills: self.skills.clone(),
            unlocked: self.unlocked.clone(),
            skill_points: self.skill_points,
            skill_points_spent: self.skill_points_spent,
            attribute_points: self.attribute_points,
            require_all_prerequisites: self.require_all_prerequisites,
            observers: Vec::new(),
        }
    }
}

impl std::fmt::Debug for SkillTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillTree")
            .field("skills", &self.skills)
            .field("unlocked", &self.unlocked)
            .field("skill_points", &self.skill_points)
            .field("skill_points_spent", &self.skill_points_spent)
            .field("attribute_points", &self.attribute_points)
            .field("require_all_prerequisites", &self.require_all_prerequisites)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with_points(points: i64) -> SkillTree {
        let mut tree = SkillTree::new();
        tree.add_skill_points(points);
        tree
    }

    #[test]
    fn test_learn_single_shot() {
        let mut tree = tree_with_points(2);
        let id = tree.add_skill(Skill::new_single_shot("Shield Wall"));

        assert!(tree.can_unlock_with_cost(id).unwrap());
        assert!(tree.learn_skill(id).unwrap());
        assert!(tree.is_unlocked(id));
        assert_eq!(tree.skill_points(), 1);
        assert_eq!(tree.spent_skill_points(), 1);
    }

    #[test]
    fn test_single_shot_not_relearnable() {
        let mut tree = tree_with_points(5);
        let id = tree.add_skill(Skill::new_single_shot("Shield Wall"));

        assert!(tree.learn_skill(id).unwrap());
        assert!(!tree.can_unlock(id).unwrap());
        assert!(!tree.learn_skill(id).unwrap());
        assert_eq!(tree.spent_skill_points(), 1);
    }

    #[test]
    fn test_learn_fails_without_points() {
        let mut tree = SkillTree::new();
        let id = tree.add_skill(Skill::new_single_shot("Shield Wall"));

        assert!(tree.can_unlock(id).unwrap());
        assert!(!tree.can_unlock_with_cost(id).unwrap());
        assert!(!tree.learn_skill(id).unwrap());
        assert!(!tree.is_unlocked(id));
        assert_eq!(tree.skill_points(), 0);
    }

    #[test]
    fn test_prerequisite_gates_unlock() {
        let mut tree = tree_with_points(5);
        let root = tree.add_skill(Skill::new_single_shot("Stance"));
        let branch = tree.add_skill(Skill::new_single_shot("Swing"));
        tree.add_prerequisite(branch, root).unwrap();

        assert!(!tree.can_unlock(branch).unwrap());
        assert!(tree.learn_skill(root).unwrap());
        assert!(tree.can_unlock(branch).unwrap());
        assert!(tree.learn_skill(branch).unwrap());
    }

    #[test]
    fn test_all_mode_requires_every_prerequisite() {
        let mut tree = tree_with_points(10);
        let a = tree.add_skill(Skill::new_single_shot("Stance"));
        let b = tree.add_skill(Skill::new_single_shot("Swing"));
        let joined = tree.add_skill(Skill::new_single_shot("Riposte"));
        tree.add_prerequisite(joined, a).unwrap();
        tree.add_prerequisite(joined, b).unwrap();

        tree.learn_skill(a).unwrap();
        assert!(!tree.can_unlock(joined).unwrap());

        tree.learn_skill(b).unwrap();
        assert!(tree.can_unlock(joined).unwrap());
    }

    #[test]
    fn test_any_mode_accepts_one_prerequisite() {
        let mut tree = tree_with_points(10);
        tree.set_require_all_prerequisites(false);
        let a = tree.add_skill(Skill::new_single_shot("Stance"));
        let b = tree.add_skill(Skill::new_single_shot("Swing"));
        let joined = tree.add_skill(Skill::new_single_shot("Riposte"));
        tree.add_prerequisite(joined, a).unwrap();
        tree.add_prerequisite(joined, b).unwrap();

        tree.learn_skill(a).unwrap();
        assert!(tree.can_unlock(joined).unwrap());
    }

    #[test]
    fn test_investment_floor_gates_unlock() {
        let mut tree = tree_with_points(5);
        let cheap = tree.add_skill(Skill::new_single_shot("Stance"));
        let mut elite = Skill::new_single_shot("Riposte");
        elite.required_investment_total = 1;
        let elite = tree.add_skill(elite);

        assert!(!tree.can_unlock(elite).unwrap());
        tree.learn_skill(cheap).unwrap();
        assert!(tree.can_unlock(elite).unwrap());
    }

    #[test]
    fn test_attribute_floor_gates_next_level() {
        let mut tree = tree_with_points(10);
        let mut skill = Skill::new_leveled("Swordplay", 2);
        skill.cost_per_level = vec![1, 1];
        skill.required_attribute_per_level = vec![0, 3];
        let id = tree.add_skill(skill);

        assert!(tree.learn_skill(id).unwrap());
        assert!(!tree.can_unlock(id).unwrap());

        tree.add_attribute_points(3);
        assert!(tree.can_unlock(id).unwrap());
        assert!(tree.learn_skill(id).unwrap());
        assert_eq!(tree.skill(id).unwrap().level(), 2);
    }

    #[test]
    fn test_leveled_skill_maxes_out() {
        let mut tree = tree_with_points(10);
        let mut skill = Skill::new_leveled("Swordplay", 2);
        skill.cost_per_level = vec![1, 1];
        let id = tree.add_skill(skill);

        assert!(tree.learn_skill(id).unwrap());
        assert!(tree.learn_skill(id).unwrap());
        assert!(!tree.can_unlock(id).unwrap());
        assert!(!tree.can_unlock_with_cost(id).unwrap());
        assert!(!tree.learn_skill(id).unwrap());
        assert_eq!(tree.skill(id).unwrap().level(), 2);
    }

    #[test]
    fn test_forget_refunds_current_level_cost() {
        let mut tree = tree_with_points(3);
        let mut skill = Skill::new_leveled("Swordplay", 2);
        skill.cost_per_level = vec![1, 2];
        let id = tree.add_skill(skill);

        tree.learn_skill(id).unwrap();
        tree.learn_skill(id).unwrap();
        assert_eq!(tree.skill_points(), 0);

        tree.forget_skill_refund(id).unwrap();
        assert_eq!(tree.skill(id).unwrap().level(), 1);
        assert_eq!(tree.skill_points(), 2);
        assert_eq!(tree.spent_skill_points(), 1);
    }

    #[test]
    fn test_forget_not_unlocked_is_noop() {
        let mut tree = tree_with_points(3);
        let id = tree.add_skill(Skill::new_single_shot("Stance"));

        tree.forget_skill_refund(id).unwrap();
        assert_eq!(tree.skill_points(), 3);
        assert_eq!(tree.spent_skill_points(), 0);
    }

    #[test]
    fn test_unknown_skill_is_an_error() {
        let mut tree = SkillTree::new();
        let stray = Skill::new_single_shot("Stray");
        let id = stray.id();

        assert_eq!(tree.can_unlock(id), Err(TreeError::SkillNotFound(id)));
        assert_eq!(tree.learn_skill(id), Err(TreeError::SkillNotFound(id)));
        assert_eq!(
            tree.forget_skill_refund(id),
            Err(TreeError::SkillNotFound(id))
        );
    }

    #[test]
    fn test_malformed_tables_are_an_error() {
        let mut tree = tree_with_points(5);
        let id = tree.add_skill(Skill::new_leveled("Swordplay", 2));
        tree.skill_mut(id).unwrap().cost_per_level.push(7);

        assert!(matches!(
            tree.can_unlock(id),
            Err(TreeError::MalformedLevelTable { .. })
        ));
        assert!(matches!(
            tree.learn_skill(id),
            Err(TreeError::MalformedLevelTable { .. })
        ));
    }

    #[test]
    fn test_remove_skill_strips_edges() {
        let mut tree = tree_with_points(5);
        let root = tree.add_skill(Skill::new_single_shot("Stance"));
        let branch = tree.add_skill(Skill::new_single_shot("Swing"));
        tree.add_prerequisite(branch, root).unwrap();

        tree.remove_skill(root);
        assert!(tree.prerequisites(branch).unwrap().is_empty());
        assert!(tree.can_unlock(branch).unwrap());
    }

    #[test]
    fn test_negative_point_grants_allowed() {
        let mut tree = SkillTree::new();
        tree.add_skill_points(-5);
        assert_eq!(tree.skill_points(), -5);
        tree.add_attribute_points(-2);
        assert_eq!(tree.attribute_points(), -2);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut tree = tree_with_points(5);
        let id = tree.add_skill(Skill::new_single_shot("Stance"));

        let mut copy = tree.clone();
        copy.learn_skill(id).unwrap();

        assert!(copy.is_unlocked(id));
        assert!(!tree.is_unlocked(id));
        assert_eq!(tree.skill_points(), 5);
    }
}
