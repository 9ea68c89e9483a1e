pub mod error;
pub mod types;

pub use error::{Result, TreeError};
pub use types::SkillId;
