//! Skilltree - Skill Tree Progression Engine
//!
//! A state engine for skill trees: directed graphs of unlockable abilities
//! gated by prerequisite skills, a spendable point currency, and a secondary
//! attribute threshold. Learning spends points; forgetting refunds them and
//! cascades, re-locking any skill whose requirements no longer hold.
//!
//! Presentation (editors, node rendering, button wiring) lives outside this
//! crate and talks to [`tree::SkillTree`] through its queries and events.

pub mod core;
pub mod tree;
