//! Skill library and experience learning
//!
//! A skill is an ordered list of action templates with a usage record.
//! Quality is derived from that record and decides which applicable skill
//! a goal binds. The learner turns finished goal traces into new skills
//! and sends failing ones back for refinement.

pub mod learning;
pub mod library;
pub mod skill;

pub use learning::{sequence_similarity, Experience, ExperienceLearner, LearningEvent, LearningTask};
pub use library::SkillLibrary;
pub use skill::{quality_score, Skill, SkillSource};
