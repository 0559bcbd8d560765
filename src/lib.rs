//! Arc Mind - tick-driven decision core for autonomous agents
//!
//! Each agent runs a layered scheduler over a prioritized goal queue,
//! tiered memory, a skill library that learns from finished goals and a
//! spatial knowledge store. Agents coordinate through a shared board.

pub mod actions;
pub mod brain;
pub mod command;
pub mod coordination;
pub mod core;
pub mod goals;
pub mod llm;
pub mod memory;
pub mod persistence;
pub mod registry;
pub mod skills;
pub mod spatial;
pub mod world;
