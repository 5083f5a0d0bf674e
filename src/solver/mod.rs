//! Branch-and-bound solver collaborator.
//!
//! The engine is a deliberately small maximization solver for bounded-integer
//! models with nonnegative `≤` rows (the multi-knapsack family). It exists to
//! exercise the branching protocol: node-level queries, an explicit branching
//! operation, and a selectable variable-selection mode are the whole surface
//! the rest of the crate relies on.

mod instances;
mod model;
mod relaxation;
mod search;

pub use instances::KnapsackInstance;
pub use model::{LinearRow, MipModel};
pub use relaxation::{Relaxation, RelaxedSolution, Relaxer};
pub use search::{
    BoundChange, BranchCallback, BranchContext, BranchDirection, DefaultBranching, SearchConfig,
    SearchEngine, SearchOutcome, SearchStats, VarFeasibility, VariableSelectMode,
};
