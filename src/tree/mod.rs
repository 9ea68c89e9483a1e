//! Skill tree state engine
//!
//! Skills are nodes in a directed prerequisite graph. Unlocking costs points
//! from a spendable balance and is gated by cumulative investment, an
//! attribute threshold, and the prerequisite edges. Forgetting refunds the
//! cost and sweeps the tree until every remaining unlocked skill still
//! qualifies - a single forget can ripple through dependents transitively.

pub mod events;
pub mod skill;
pub mod skill_tree;

pub use events::{TreeEvent, TreeObserver};
pub use skill::{Skill, SkillKind};
pub use skill_tree::SkillTree;
