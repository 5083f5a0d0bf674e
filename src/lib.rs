//! # branchrl
//!
//! Learned branching control for branch-and-bound search: at every node
//! that needs a branching decision, a DQN agent observes the normalized
//! optimality gap and picks which branching strategy to apply, learning
//! online a policy that closes the gap in fewer nodes.
//!
//! ## Modules
//!
//! - [`protocol`] — Synchronous decision channel (`READY`/`CHOICE`/`DONE`)
//! - [`solver`] — Branch-and-bound engine, knapsack models, callback surface
//! - [`branching`] — Branch decision point, strategies, decision records
//! - [`env`] — Search episode controller (`reset`/`step` contract)
//! - [`agent`] — DQN: replay memory, behavior/target networks, soft updates
//! - [`training`] — Epoch loop, reward statistics
//! - [`checkpoint`] — Best-agent persistence
//! - [`export`] — CSV tables and the loss-curve figure
//! - [`config`] — TOML configuration loading and validation
//! - [`error`] — Structured error types

pub mod agent;
pub mod branching;
pub mod checkpoint;
pub mod config;
pub mod env;
pub mod error;
pub mod export;
pub mod protocol;
pub mod solver;
pub mod training;
