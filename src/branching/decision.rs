use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::branching::record::{DecisionLog, DecisionRecord};
use crate::branching::strategy::{most_fractional, random_infeasible, BranchStrategy};
use crate::error::ProtocolError;
use crate::protocol::SearchEndpoint;
use crate::solver::{BoundChange, BranchCallback, BranchContext};

/// Upper end of the observation range; published when the gap is undefined
/// (no incumbent yet) and used to clamp runaway ratios.
pub const GAP_CEILING: f64 = 1e5;

/// Normalized optimality gap `(objval − incumbent) / incumbent`, clamped to
/// the observation range. With no incumbent the ratio is undefined and the
/// ceiling is published instead.
pub fn normalized_gap(objval: f64, incumbent: f64) -> f64 {
    if incumbent.abs() < f64::EPSILON {
        return GAP_CEILING;
    }
    ((objval - incumbent) / incumbent).clamp(0.0, GAP_CEILING)
}

/// The solver-invoked branch decision point.
///
/// On every callback it publishes a `READY` frame with the node gap, blocks
/// until the control context answers with a strategy id, dispatches that
/// strategy, and appends a [`DecisionRecord`]. Out-of-range ids fall back to
/// the automatic strategy and are counted as anomalies rather than failing
/// the search.
pub struct BranchDecisionPoint {
    endpoint: SearchEndpoint,
    log: DecisionLog,
    rng: StdRng,
    times_called: u64,
    anomalies: u64,
}

impl BranchDecisionPoint {
    pub fn new(endpoint: SearchEndpoint, log: DecisionLog, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        BranchDecisionPoint {
            endpoint,
            log,
            rng,
            times_called: 0,
            anomalies: 0,
        }
    }

    pub fn times_called(&self) -> u64 {
        self.times_called
    }

    /// Out-of-range actions absorbed so far.
    pub fn anomalies(&self) -> u64 {
        self.anomalies
    }

    pub fn log(&self) -> &DecisionLog {
        &self.log
    }

    /// Flush the log and signal completion to the control context.
    pub fn finish(mut self) -> Result<(), ProtocolError> {
        self.log.flush();
        self.endpoint.send_done()
    }

    /// Flush the log without a completion signal (aborted run).
    pub fn abort(self) {
        self.log.flush();
    }

    fn resolve_strategy(&mut self, action: usize) -> BranchStrategy {
        match BranchStrategy::from_action(action) {
            Some(strategy) => strategy,
            None => {
                self.anomalies += 1;
                log::warn!(
                    "action {action} is outside the strategy range, using automatic selection"
                );
                BranchStrategy::Automatic
            }
        }
    }
}

impl BranchCallback for BranchDecisionPoint {
    fn on_branch(&mut self, ctx: &mut BranchContext<'_>) -> Result<(), ProtocolError> {
        self.times_called += 1;

        let gap = normalized_gap(ctx.objective_value(), ctx.incumbent_value());
        self.endpoint.send_ready(gap)?;
        let action = self.endpoint.recv_choice()?;
        let strategy = self.resolve_strategy(action);

        let picked = if strategy.is_variable_level() {
            let picked = match strategy {
                BranchStrategy::MostFractional => most_fractional(
                    ctx.values(),
                    ctx.feasibilities(),
                    ctx.objective_coefficients(),
                ),
                BranchStrategy::RandomVariable => {
                    random_infeasible(ctx.feasibilities(), &mut self.rng)
                }
                _ => unreachable!(),
            };
            match picked {
                Some(j) => Some(j),
                // Nothing is infeasible: leave the node to the solver.
                None => return Ok(()),
            }
        } else {
            if let Some(mode) = strategy.mode() {
                ctx.set_variable_select_mode(mode);
            }
            None
        };

        let (branch_down, branch_up) = match picked {
            Some(j) => {
                let floor = ctx.values()[j].floor() as u32;
                let down = ctx.make_branch(&[(j, BoundChange::UpperAt(floor))]);
                let up = ctx.make_branch(&[(j, BoundChange::LowerAt(floor + 1))]);
                (down, up)
            }
            None => (ctx.make_branch(&[]), ctx.make_branch(&[])),
        };

        self.log.append(DecisionRecord {
            node_id: ctx.node_id(),
            branch_down,
            branch_up,
            best_objval: ctx.best_bound(),
            objval: ctx.objective_value(),
            incumbent: ctx.incumbent_value(),
            cutoff: ctx.cutoff(),
            gap,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{self, SearchSignal};
    use crate::solver::{KnapsackInstance, SearchConfig, SearchEngine};

    /// Drive a full solve from the control side, always answering with
    /// `action`. Returns (decisions answered, times called, anomalies).
    fn drive_solve(action: usize) -> (usize, u64, u64) {
        let (search_ep, mut control_ep) = protocol::channel();
        let mut engine =
            SearchEngine::new(KnapsackInstance::toy().build_model(), SearchConfig::default());
        let mut dp = BranchDecisionPoint::new(search_ep, DecisionLog::in_memory(), Some(11));

        let worker = std::thread::spawn(move || {
            engine.solve(&mut dp).unwrap();
            let counters = (dp.times_called(), dp.anomalies());
            dp.finish().unwrap();
            counters
        });

        let mut decisions = 0;
        loop {
            match control_ep.recv_signal().unwrap() {
                SearchSignal::Ready(gap) => {
                    assert!(gap >= 0.0);
                    control_ep.send_choice(action).unwrap();
                    decisions += 1;
                }
                SearchSignal::Done => break,
            }
        }
        let (times_called, anomalies) = worker.join().unwrap();
        (decisions, times_called, anomalies)
    }

    #[test]
    fn test_most_fractional_episode_completes() {
        let (decisions, times_called, anomalies) = drive_solve(0);
        assert!(decisions > 0);
        assert_eq!(decisions as u64, times_called);
        assert_eq!(anomalies, 0);
    }

    #[test]
    fn test_every_strategy_completes() {
        for action in 0..crate::branching::ACTION_COUNT {
            let (decisions, _, anomalies) = drive_solve(action);
            assert!(decisions > 0, "strategy {action} made no decisions");
            assert_eq!(anomalies, 0);
        }
    }

    #[test]
    fn test_out_of_range_action_falls_back_to_automatic() {
        let (decisions, _, anomalies) = drive_solve(42);
        assert!(decisions > 0);
        assert_eq!(anomalies, decisions as u64);
    }

    #[test]
    fn test_gap_ceiling_when_no_incumbent() {
        assert_eq!(normalized_gap(22.5, 0.0), GAP_CEILING);
    }

    #[test]
    fn test_gap_normalization() {
        assert!((normalized_gap(22.5, 20.0) - 0.125).abs() < 1e-12);
        assert_eq!(normalized_gap(1e12, 1.0), GAP_CEILING);
    }
}
