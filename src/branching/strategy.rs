use rand::rngs::StdRng;
use rand::Rng;

use crate::solver::{VarFeasibility, VariableSelectMode};

/// Number of strategies the agent can choose from.
pub const ACTION_COUNT: usize = 7;

/// A branching strategy, selected per decision by the agent's action id.
///
/// The first two pick a concrete variable at the current node; the rest
/// switch the solver's variable-selection mode and let its own split apply.
/// `Automatic` is not part of the action set: it is the fallback for ids
/// outside `[0, ACTION_COUNT)` and resets the solver to its default mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchStrategy {
    MostFractional,
    RandomVariable,
    MinInfeasibility,
    MaxInfeasibility,
    PseudoCost,
    Strong,
    PseudoReducedCost,
    Automatic,
}

impl BranchStrategy {
    /// Map an action id to its strategy; `None` when out of range.
    pub fn from_action(action: usize) -> Option<Self> {
        match action {
            0 => Some(BranchStrategy::MostFractional),
            1 => Some(BranchStrategy::RandomVariable),
            2 => Some(BranchStrategy::MinInfeasibility),
            3 => Some(BranchStrategy::MaxInfeasibility),
            4 => Some(BranchStrategy::PseudoCost),
            5 => Some(BranchStrategy::Strong),
            6 => Some(BranchStrategy::PseudoReducedCost),
            _ => None,
        }
    }

    /// True for the strategies that pick a branching variable themselves.
    pub fn is_variable_level(&self) -> bool {
        matches!(
            self,
            BranchStrategy::MostFractional | BranchStrategy::RandomVariable
        )
    }

    /// The solver mode realized by a mode-level strategy.
    pub fn mode(&self) -> Option<VariableSelectMode> {
        match self {
            BranchStrategy::MostFractional | BranchStrategy::RandomVariable => None,
            BranchStrategy::MinInfeasibility => Some(VariableSelectMode::MinInfeasibility),
            BranchStrategy::MaxInfeasibility => Some(VariableSelectMode::MaxInfeasibility),
            BranchStrategy::PseudoCost => Some(VariableSelectMode::PseudoCost),
            BranchStrategy::Strong => Some(VariableSelectMode::Strong),
            BranchStrategy::PseudoReducedCost => Some(VariableSelectMode::PseudoReducedCost),
            BranchStrategy::Automatic => Some(VariableSelectMode::Automatic),
        }
    }
}

/// Most-fractional selection: among infeasible variables, the one whose
/// fractional part is closest to 0.5 (largest distance to an integer), with
/// equal-or-larger `|objective coefficient|` breaking exact distance ties in
/// favor of the later variable. Returns `None` when nothing is infeasible.
pub fn most_fractional(
    values: &[f64],
    feasibilities: &[VarFeasibility],
    objective: &[f64],
) -> Option<usize> {
    let mut best: Option<usize> = None;
    let mut max_inf = f64::NEG_INFINITY;
    let mut max_obj = f64::NEG_INFINITY;
    for j in 0..values.len() {
        if feasibilities[j] != VarFeasibility::Infeasible {
            continue;
        }
        let mut inf = values[j] - values[j].floor();
        if inf > 0.5 {
            inf = 1.0 - inf;
        }
        if inf >= max_inf && (inf > max_inf || objective[j].abs() >= max_obj) {
            best = Some(j);
            max_inf = inf;
            max_obj = objective[j].abs();
        }
    }
    best
}

/// Uniform choice among infeasible variables; `None` when there are none.
pub fn random_infeasible(feasibilities: &[VarFeasibility], rng: &mut StdRng) -> Option<usize> {
    let candidates: Vec<usize> = feasibilities
        .iter()
        .enumerate()
        .filter(|(_, &f)| f == VarFeasibility::Infeasible)
        .map(|(j, _)| j)
        .collect();
    if candidates.is_empty() {
        return None;
    }
    let idx = rng.random_range(0..candidates.len());
    Some(candidates[idx])
}
