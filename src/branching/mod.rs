//! Branch decision point: the solver-side half of the adaptive control loop.
//!
//! At every node that needs a branching decision the decision point computes
//! the normalized optimality gap, rendezvous with the control context over
//! the decision channel, applies the chosen strategy, and appends an audit
//! record.

mod decision;
mod record;
mod strategy;

pub use decision::{normalized_gap, BranchDecisionPoint, GAP_CEILING};
pub use record::{DecisionLog, DecisionRecord};
pub use strategy::{most_fractional, random_infeasible, BranchStrategy, ACTION_COUNT};
