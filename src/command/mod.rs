//! Inbound request surface
//!
//! External actors hand the agent work either as free text or as a ready
//! goal; both become a requested goal in the planner.

pub mod request;

pub use request::{classify, TaskRequest};
