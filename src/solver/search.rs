use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::{ProtocolError, SolverError};
use crate::solver::model::MipModel;
use crate::solver::relaxation::{Relaxation, RelaxedSolution, Relaxer};

const BOUND_EPS: f64 = 1e-6;
const STRONG_CANDIDATE_LIMIT: usize = 8;

/// Variable-selection mode used when a branch is requested without an
/// explicit variable (the mode-level strategies and the engine's own default
/// splits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableSelectMode {
    /// Engine default (pseudo-cost driven).
    Automatic,
    /// Fractional variable closest to an integer.
    MinInfeasibility,
    /// Fractional variable farthest from an integer.
    MaxInfeasibility,
    /// Historical bound-degradation estimates.
    PseudoCost,
    /// Tentatively relax both children of each candidate.
    Strong,
    /// Objective-magnitude-weighted infeasibility.
    PseudoReducedCost,
}

/// Integrality classification of one variable in the node relaxation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarFeasibility {
    /// Integral in the relaxed solution.
    Feasible,
    /// Fractional in the relaxed solution.
    Infeasible,
}

/// A single bound tightening applied to a child node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundChange {
    /// Bound the variable above at the given value ("down" child).
    UpperAt(u32),
    /// Bound the variable below at the given value ("up" child).
    LowerAt(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchDirection {
    Down,
    Up,
}

/// Search tuning knobs.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Safety valve on processed nodes; the search reports completion when
    /// it is reached.
    pub node_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig { node_limit: 100_000 }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStats {
    pub nodes_processed: u64,
    pub branch_callbacks: u64,
    pub incumbent_updates: u64,
}

/// Result of one full solve.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best_objective: Option<f64>,
    pub best_solution: Option<Vec<u32>>,
    pub stats: SearchStats,
    /// False when the node limit cut the search short.
    pub exhausted: bool,
}

/// Callback invoked at every node that needs a branching decision.
///
/// Implementations may create children through the context, change the
/// variable-selection mode, or do nothing; when no child was created the
/// engine falls back to its own mode-driven split.
pub trait BranchCallback {
    fn on_branch(&mut self, ctx: &mut BranchContext<'_>) -> Result<(), ProtocolError>;
}

/// Leaves every decision to the engine's variable-selection mode.
pub struct DefaultBranching;

impl BranchCallback for DefaultBranching {
    fn on_branch(&mut self, _ctx: &mut BranchContext<'_>) -> Result<(), ProtocolError> {
        Ok(())
    }
}

enum ChildSpec {
    Bounds(Vec<(usize, BoundChange)>),
    ModeSplit(BranchDirection),
}

struct PendingChild {
    id: u64,
    spec: ChildSpec,
}

/// Node-level view handed to the branch callback: the relaxed solution,
/// the surrounding search state, and the branching operations.
pub struct BranchContext<'a> {
    node_id: u64,
    values: &'a [f64],
    feasibilities: &'a [VarFeasibility],
    objective: &'a [f64],
    objective_value: f64,
    best_bound: f64,
    incumbent_value: f64,
    cutoff: f64,
    mode: &'a mut VariableSelectMode,
    next_id: &'a mut u64,
    children: Vec<PendingChild>,
    mode_splits: u8,
}

impl BranchContext<'_> {
    pub fn node_id(&self) -> u64 {
        self.node_id
    }

    /// Fractional solution values of the node relaxation.
    pub fn values(&self) -> &[f64] {
        self.values
    }

    /// Per-variable integrality classification.
    pub fn feasibilities(&self) -> &[VarFeasibility] {
        self.feasibilities
    }

    pub fn objective_coefficients(&self) -> &[f64] {
        self.objective
    }

    /// Relaxed objective value at this node.
    pub fn objective_value(&self) -> f64 {
        self.objective_value
    }

    /// Best known dual bound across the whole tree.
    pub fn best_bound(&self) -> f64 {
        self.best_bound
    }

    /// Objective of the best known feasible solution (0 before any exists).
    pub fn incumbent_value(&self) -> f64 {
        self.incumbent_value
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    /// Create one child node. With explicit bound changes the child inherits
    /// the node box tightened by them; with an empty slice the engine splits
    /// on the variable chosen by the current selection mode (first call gets
    /// the down side, second the up side).
    pub fn make_branch(&mut self, bounds: &[(usize, BoundChange)]) -> u64 {
        let id = *self.next_id;
        *self.next_id += 1;
        let spec = if bounds.is_empty() {
            let side = if self.mode_splits == 0 {
                BranchDirection::Down
            } else {
                BranchDirection::Up
            };
            self.mode_splits += 1;
            ChildSpec::ModeSplit(side)
        } else {
            ChildSpec::Bounds(bounds.to_vec())
        };
        self.children.push(PendingChild { id, spec });
        id
    }

    /// Switch the engine's variable-selection mode.
    pub fn set_variable_select_mode(&mut self, mode: VariableSelectMode) {
        *self.mode = mode;
    }
}

struct BranchOrigin {
    var: usize,
    direction: BranchDirection,
    parent_bound: f64,
    distance: f64,
}

struct NodeEntry {
    id: u64,
    bound: f64,
    lower: Vec<u32>,
    upper: Vec<u32>,
    origin: Option<BranchOrigin>,
}

impl PartialEq for NodeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NodeEntry {}

impl PartialOrd for NodeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeEntry {
    // Best-first: larger bound wins, older node breaks ties.
    fn cmp(&self, other: &Self) -> Ordering {
        self.bound
            .total_cmp(&other.bound)
            .then_with(|| other.id.cmp(&self.id))
    }
}

#[derive(Clone, Copy, Default)]
struct CostCell {
    sum: f64,
    count: u32,
}

impl CostCell {
    fn estimate(&self) -> f64 {
        if self.count == 0 {
            1.0
        } else {
            self.sum / f64::from(self.count)
        }
    }
}

struct PseudoCosts {
    down: Vec<CostCell>,
    up: Vec<CostCell>,
}

impl PseudoCosts {
    fn new(n: usize) -> Self {
        PseudoCosts {
            down: vec![CostCell::default(); n],
            up: vec![CostCell::default(); n],
        }
    }

    fn record(&mut self, var: usize, direction: BranchDirection, degradation: f64, distance: f64) {
        if distance <= 1e-12 {
            return;
        }
        let cell = match direction {
            BranchDirection::Down => &mut self.down[var],
            BranchDirection::Up => &mut self.up[var],
        };
        cell.sum += (degradation / distance).max(0.0);
        cell.count += 1;
    }

    fn score(&self, var: usize, frac: f64) -> f64 {
        let down = self.down[var].estimate() * frac;
        let up = self.up[var].estimate() * (1.0 - frac);
        down.max(1e-6) * up.max(1e-6)
    }
}

struct Incumbent {
    objective: f64,
    solution: Vec<u32>,
}

/// Best-first branch-and-bound over one [`MipModel`].
///
/// One engine instance is one search session: it owns the model, frontier,
/// incumbent and selection mode, and is handed explicitly to whoever needs
/// node access (no ambient shared state).
pub struct SearchEngine {
    model: MipModel,
    relaxer: Relaxer,
    config: SearchConfig,
    frontier: BinaryHeap<NodeEntry>,
    incumbent: Option<Incumbent>,
    mode: VariableSelectMode,
    pseudo: PseudoCosts,
    next_id: u64,
    best_bound: f64,
    stats: SearchStats,
}

impl SearchEngine {
    pub fn new(model: MipModel, config: SearchConfig) -> Self {
        let relaxer = Relaxer::new(&model);
        let n = model.num_vars();
        SearchEngine {
            model,
            relaxer,
            config,
            frontier: BinaryHeap::new(),
            incumbent: None,
            mode: VariableSelectMode::Automatic,
            pseudo: PseudoCosts::new(n),
            next_id: 0,
            best_bound: f64::INFINITY,
            stats: SearchStats::default(),
        }
    }

    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    fn incumbent_value(&self) -> f64 {
        self.incumbent.as_ref().map_or(0.0, |inc| inc.objective)
    }

    /// Nodes whose bound falls below the cutoff cannot improve on the
    /// incumbent (integral objective data assumed).
    fn cutoff(&self) -> f64 {
        self.incumbent
            .as_ref()
            .map_or(f64::NEG_INFINITY, |inc| inc.objective + 1.0)
    }

    /// Run the search to completion, invoking `callback` at every node that
    /// requires a branching decision.
    pub fn solve(&mut self, callback: &mut dyn BranchCallback) -> Result<SearchOutcome, SolverError> {
        let root = NodeEntry {
            id: self.alloc_id(),
            bound: f64::INFINITY,
            lower: vec![0; self.model.num_vars()],
            upper: self.model.upper.clone(),
            origin: None,
        };
        self.frontier.push(root);

        let mut exhausted = true;
        while let Some(entry) = self.frontier.pop() {
            if self.stats.nodes_processed >= self.config.node_limit as u64 {
                exhausted = false;
                break;
            }
            self.stats.nodes_processed += 1;
            if entry.bound < self.cutoff() - BOUND_EPS {
                continue;
            }

            let sol = match self.relaxer.solve(&self.model, &entry.lower, &entry.upper) {
                Relaxation::Infeasible => continue,
                Relaxation::Solved(sol) => sol,
            };
            self.best_bound = self.best_bound.min(entry.bound);
            if let Some(origin) = &entry.origin {
                let degradation = origin.parent_bound - sol.objective;
                self.pseudo
                    .record(origin.var, origin.direction, degradation, origin.distance);
            }
            if sol.objective < self.cutoff() - BOUND_EPS {
                continue;
            }

            if sol.is_integral() {
                let x = sol.rounded();
                if self.model.is_feasible(&x) {
                    let objective = self.model.objective_value(&x);
                    if objective > self.incumbent_value() || self.incumbent.is_none() {
                        self.incumbent = Some(Incumbent {
                            objective,
                            solution: x,
                        });
                        self.stats.incumbent_updates += 1;
                        log::debug!(
                            "incumbent improved to {objective} after {} nodes",
                            self.stats.nodes_processed
                        );
                    }
                } else {
                    // Integral for the surrogate but violating a real row:
                    // repair internally by splitting a free variable.
                    self.split_infeasible(&entry, &sol);
                }
                continue;
            }

            self.stats.branch_callbacks += 1;
            let pending = self.run_callback(callback, &entry, &sol)?;
            if pending.is_empty() {
                self.default_split(&entry, &sol);
            } else {
                self.materialize(&entry, &sol, pending);
            }
        }

        Ok(SearchOutcome {
            best_objective: self.incumbent.as_ref().map(|inc| inc.objective),
            best_solution: self.incumbent.as_ref().map(|inc| inc.solution.clone()),
            stats: self.stats,
            exhausted,
        })
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn run_callback(
        &mut self,
        callback: &mut dyn BranchCallback,
        entry: &NodeEntry,
        sol: &RelaxedSolution,
    ) -> Result<Vec<PendingChild>, SolverError> {
        let mut feasibilities = vec![VarFeasibility::Feasible; self.model.num_vars()];
        for &j in &sol.fractional {
            feasibilities[j] = VarFeasibility::Infeasible;
        }
        let incumbent_value = self.incumbent_value();
        let cutoff = self.cutoff();
        let best_bound = if self.best_bound.is_finite() {
            self.best_bound
        } else {
            sol.objective
        };
        let mut ctx = BranchContext {
            node_id: entry.id,
            values: &sol.values,
            feasibilities: &feasibilities,
            objective: &self.model.objective,
            objective_value: sol.objective,
            best_bound,
            incumbent_value,
            cutoff,
            mode: &mut self.mode,
            next_id: &mut self.next_id,
            children: Vec::new(),
            mode_splits: 0,
        };
        callback.on_branch(&mut ctx)?;
        Ok(ctx.children)
    }

    fn materialize(&mut self, entry: &NodeEntry, sol: &RelaxedSolution, pending: Vec<PendingChild>) {
        let mut mode_pick: Option<(usize, u32)> = None;
        for child in pending {
            let mut lower = entry.lower.clone();
            let mut upper = entry.upper.clone();
            let origin = match child.spec {
                ChildSpec::Bounds(changes) => {
                    let mut origin = None;
                    for &(var, change) in &changes {
                        match change {
                            BoundChange::UpperAt(v) => upper[var] = upper[var].min(v),
                            BoundChange::LowerAt(v) => lower[var] = lower[var].max(v),
                        }
                    }
                    if let [(var, change)] = changes[..] {
                        let frac = sol.values[var] - sol.values[var].floor();
                        origin = Some(match change {
                            BoundChange::UpperAt(_) => BranchOrigin {
                                var,
                                direction: BranchDirection::Down,
                                parent_bound: sol.objective,
                                distance: frac,
                            },
                            BoundChange::LowerAt(_) => BranchOrigin {
                                var,
                                direction: BranchDirection::Up,
                                parent_bound: sol.objective,
                                distance: 1.0 - frac,
                            },
                        });
                    }
                    origin
                }
                ChildSpec::ModeSplit(side) => {
                    let (var, floor) =
                        *mode_pick.get_or_insert_with(|| self.select_by_mode_inner(entry, sol));
                    let frac = sol.values[var] - sol.values[var].floor();
                    match side {
                        BranchDirection::Down => {
                            upper[var] = upper[var].min(floor);
                            Some(BranchOrigin {
                                var,
                                direction: BranchDirection::Down,
                                parent_bound: sol.objective,
                                distance: frac,
                            })
                        }
                        BranchDirection::Up => {
                            lower[var] = lower[var].max(floor + 1);
                            Some(BranchOrigin {
                                var,
                                direction: BranchDirection::Up,
                                parent_bound: sol.objective,
                                distance: 1.0 - frac,
                            })
                        }
                    }
                }
            };
            self.frontier.push(NodeEntry {
                id: child.id,
                bound: sol.objective,
                lower,
                upper,
                origin,
            });
        }
    }

    /// Split on the mode-selected variable when the callback made no decision.
    fn default_split(&mut self, entry: &NodeEntry, sol: &RelaxedSolution) {
        let (var, floor) = self.select_by_mode_inner(entry, sol);
        let frac = sol.values[var] - sol.values[var].floor();

        let mut down_upper = entry.upper.clone();
        down_upper[var] = down_upper[var].min(floor);
        let down = NodeEntry {
            id: self.alloc_id(),
            bound: sol.objective,
            lower: entry.lower.clone(),
            upper: down_upper,
            origin: Some(BranchOrigin {
                var,
                direction: BranchDirection::Down,
                parent_bound: sol.objective,
                distance: frac,
            }),
        };

        let mut up_lower = entry.lower.clone();
        up_lower[var] = up_lower[var].max(floor + 1);
        let up = NodeEntry {
            id: self.alloc_id(),
            bound: sol.objective,
            lower: up_lower,
            upper: entry.upper.clone(),
            origin: Some(BranchOrigin {
                var,
                direction: BranchDirection::Up,
                parent_bound: sol.objective,
                distance: 1.0 - frac,
            }),
        };

        self.frontier.push(down);
        self.frontier.push(up);
    }

    /// Pick the branching variable for a fractional node per the current
    /// selection mode. Returns the variable and the floor of its value.
    fn select_by_mode_inner(&self, entry: &NodeEntry, sol: &RelaxedSolution) -> (usize, u32) {
        debug_assert!(!sol.fractional.is_empty());
        let distance = |j: usize| {
            let frac = sol.values[j] - sol.values[j].floor();
            frac.min(1.0 - frac)
        };
        let var = match self.mode {
            VariableSelectMode::MinInfeasibility => sol
                .fractional
                .iter()
                .copied()
                .min_by(|&a, &b| distance(a).total_cmp(&distance(b)))
                .unwrap_or(sol.fractional[0]),
            VariableSelectMode::MaxInfeasibility => sol
                .fractional
                .iter()
                .copied()
                .max_by(|&a, &b| distance(a).total_cmp(&distance(b)))
                .unwrap_or(sol.fractional[0]),
            VariableSelectMode::Automatic | VariableSelectMode::PseudoCost => sol
                .fractional
                .iter()
                .copied()
                .max_by(|&a, &b| {
                    let fa = sol.values[a] - sol.values[a].floor();
                    let fb = sol.values[b] - sol.values[b].floor();
                    self.pseudo
                        .score(a, fa)
                        .total_cmp(&self.pseudo.score(b, fb))
                })
                .unwrap_or(sol.fractional[0]),
            VariableSelectMode::Strong => self.select_strong(entry, sol),
            VariableSelectMode::PseudoReducedCost => sol
                .fractional
                .iter()
                .copied()
                .max_by(|&a, &b| {
                    let sa = self.model.objective[a].abs() * distance(a);
                    let sb = self.model.objective[b].abs() * distance(b);
                    sa.total_cmp(&sb)
                })
                .unwrap_or(sol.fractional[0]),
        };
        (var, sol.values[var].floor() as u32)
    }

    /// Tentatively relax both children of the most fractional candidates and
    /// keep the variable with the largest degradation product.
    fn select_strong(&self, entry: &NodeEntry, sol: &RelaxedSolution) -> usize {
        let mut candidates: Vec<usize> = sol.fractional.clone();
        candidates.sort_by(|&a, &b| {
            let da = {
                let f = sol.values[a] - sol.values[a].floor();
                f.min(1.0 - f)
            };
            let db = {
                let f = sol.values[b] - sol.values[b].floor();
                f.min(1.0 - f)
            };
            db.total_cmp(&da).then(a.cmp(&b))
        });
        candidates.truncate(STRONG_CANDIDATE_LIMIT);

        let mut best = candidates[0];
        let mut best_score = f64::NEG_INFINITY;
        for &j in &candidates {
            let floor = sol.values[j].floor() as u32;
            let mut down_upper = entry.upper.clone();
            down_upper[j] = down_upper[j].min(floor);
            let down = self.child_bound(&entry.lower, &down_upper, sol.objective);

            let mut up_lower = entry.lower.clone();
            up_lower[j] = up_lower[j].max(floor + 1);
            let up = self.child_bound(&up_lower, &entry.upper, sol.objective);

            let score = (sol.objective - down).max(1e-6) * (sol.objective - up).max(1e-6);
            if score > best_score {
                best_score = score;
                best = j;
            }
        }
        best
    }

    fn child_bound(&self, lower: &[u32], upper: &[u32], parent_bound: f64) -> f64 {
        match self.relaxer.solve(&self.model, lower, upper) {
            // Infeasible children prune outright; treat as maximal degradation.
            Relaxation::Infeasible => f64::NEG_INFINITY,
            Relaxation::Solved(sol) => sol.objective.min(parent_bound),
        }
    }

    /// The surrogate solution is integral but violates a real row. Split the
    /// widest still-free variable of the first violated row so the children
    /// strictly shrink the box; no branching decision is involved.
    fn split_infeasible(&mut self, entry: &NodeEntry, sol: &RelaxedSolution) {
        let x = sol.rounded();
        let violated = self.model.rows.iter().find(|row| {
            let used: f64 = row.coeffs.iter().map(|&(j, a)| a * f64::from(x[j])).sum();
            used > row.rhs + 1e-9
        });
        let Some(row) = violated else {
            return;
        };
        let Some(&(var, _)) = row
            .coeffs
            .iter()
            .filter(|&&(j, _)| entry.lower[j] < entry.upper[j])
            .max_by_key(|&&(j, _)| entry.upper[j] - entry.lower[j])
        else {
            return;
        };
        let mid = entry.lower[var] + (entry.upper[var] - entry.lower[var]) / 2;

        let mut down_upper = entry.upper.clone();
        down_upper[var] = mid;
        self.frontier.push(NodeEntry {
            id: self.alloc_id(),
            bound: sol.objective,
            lower: entry.lower.clone(),
            upper: down_upper,
            origin: None,
        });

        let mut up_lower = entry.lower.clone();
        up_lower[var] = mid + 1;
        self.frontier.push(NodeEntry {
            id: self.alloc_id(),
            bound: sol.objective,
            lower: up_lower,
            upper: entry.upper.clone(),
            origin: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::instances::KnapsackInstance;

    fn solve_default(instance: KnapsackInstance) -> SearchOutcome {
        let mut engine = SearchEngine::new(instance.build_model(), SearchConfig::default());
        engine.solve(&mut DefaultBranching).unwrap()
    }

    #[test]
    fn test_toy_instance_optimum() {
        let outcome = solve_default(KnapsackInstance::toy());
        // Capacity 9: three copies of the 3-weight item beat two of the
        // denser 4-weight item.
        assert_eq!(outcome.best_objective, Some(21.0));
        assert!(outcome.exhausted);
    }

    #[test]
    fn test_demo_instance_optimum() {
        let outcome = solve_default(KnapsackInstance::demo());
        // Item of value 18 / weight 5 fills capacity 15 exactly.
        assert_eq!(outcome.best_objective, Some(54.0));
    }

    #[test]
    fn test_single_item_solves_at_root() {
        let instance = KnapsackInstance::new("unit", vec![1], vec![1], vec![10], 10);
        let outcome = solve_default(instance);
        assert_eq!(outcome.best_objective, Some(10.0));
        assert_eq!(outcome.stats.branch_callbacks, 0);
    }

    #[test]
    fn test_callback_variable_branching() {
        struct FirstFractional;
        impl BranchCallback for FirstFractional {
            fn on_branch(&mut self, ctx: &mut BranchContext<'_>) -> Result<(), ProtocolError> {
                let j = ctx
                    .feasibilities()
                    .iter()
                    .position(|&f| f == VarFeasibility::Infeasible)
                    .unwrap();
                let floor = ctx.values()[j].floor() as u32;
                ctx.make_branch(&[(j, BoundChange::UpperAt(floor))]);
                ctx.make_branch(&[(j, BoundChange::LowerAt(floor + 1))]);
                Ok(())
            }
        }
        let mut engine =
            SearchEngine::new(KnapsackInstance::toy().build_model(), SearchConfig::default());
        let outcome = engine.solve(&mut FirstFractional).unwrap();
        assert_eq!(outcome.best_objective, Some(21.0));
        assert!(outcome.stats.branch_callbacks > 0);
    }

    #[test]
    fn test_callback_mode_branching() {
        struct StrongEverywhere;
        impl BranchCallback for StrongEverywhere {
            fn on_branch(&mut self, ctx: &mut BranchContext<'_>) -> Result<(), ProtocolError> {
                ctx.set_variable_select_mode(VariableSelectMode::Strong);
                ctx.make_branch(&[]);
                ctx.make_branch(&[]);
                Ok(())
            }
        }
        let mut engine =
            SearchEngine::new(KnapsackInstance::toy().build_model(), SearchConfig::default());
        let outcome = engine.solve(&mut StrongEverywhere).unwrap();
        assert_eq!(outcome.best_objective, Some(21.0));
    }

    #[test]
    fn test_callback_error_aborts_solve() {
        struct Failing;
        impl BranchCallback for Failing {
            fn on_branch(&mut self, _ctx: &mut BranchContext<'_>) -> Result<(), ProtocolError> {
                Err(ProtocolError::Disconnected)
            }
        }
        let mut engine =
            SearchEngine::new(KnapsackInstance::toy().build_model(), SearchConfig::default());
        assert!(engine.solve(&mut Failing).is_err());
    }

    #[test]
    fn test_node_limit_stops_search() {
        let mut engine = SearchEngine::new(
            KnapsackInstance::toy().build_model(),
            SearchConfig { node_limit: 1 },
        );
        let outcome = engine.solve(&mut DefaultBranching).unwrap();
        assert!(!outcome.exhausted);
    }
}
