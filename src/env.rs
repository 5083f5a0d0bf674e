//! Search episode controller: one branch-and-bound solve as one episode.
//!
//! The controller owns the control-side channel endpoint and a background
//! search thread, and exposes the two-operation environment contract the
//! training loop consumes: `reset()` starts a fresh solve and blocks until
//! the first decision point (or completion), `step(action)` answers the
//! pending decision and blocks until the next one (or completion).

use std::path::PathBuf;
use std::thread::JoinHandle;

use crate::branching::{BranchDecisionPoint, DecisionLog, ACTION_COUNT, GAP_CEILING};
use crate::error::ProtocolError;
use crate::export::ExportConfig;
use crate::protocol::{self, SearchSignal};
use crate::solver::{KnapsackInstance, SearchConfig, SearchEngine};

/// Number of strategies the agent chooses among.
pub const ACTIONS: usize = ACTION_COUNT;
/// Observation range of the scalar gap.
pub const OBSERVATION_HIGH: f64 = GAP_CEILING;

/// State returned by `reset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub state: f64,
    pub done: bool,
}

/// Result of one `step`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub state: f64,
    pub reward: f64,
    pub done: bool,
}

/// Reward for a gap change: 100 for strict decrease, 0 for strict increase,
/// 1 when unchanged. The three cases are mutually exclusive.
pub fn step_reward(previous_gap: f64, current_gap: f64) -> f64 {
    if current_gap < previous_gap {
        100.0
    } else if current_gap > previous_gap {
        0.0
    } else {
        1.0
    }
}

/// Episode controller over repeated solver runs on one instance.
pub struct SearchEnv {
    instance: KnapsackInstance,
    search_config: SearchConfig,
    decision_log_path: Option<PathBuf>,
    decision_flush_interval: usize,
    base_seed: Option<u64>,
    episodes_started: usize,
    endpoint: Option<protocol::ControlEndpoint>,
    worker: Option<JoinHandle<()>>,
    state: f64,
    done: bool,
}

impl SearchEnv {
    pub fn new(
        instance: KnapsackInstance,
        search_config: SearchConfig,
        export: &ExportConfig,
        base_seed: Option<u64>,
    ) -> Self {
        SearchEnv {
            instance,
            search_config,
            decision_log_path: Some(export.out_dir.join("decisions.csv")),
            decision_flush_interval: export.decision_flush_interval,
            base_seed,
            episodes_started: 0,
            endpoint: None,
            worker: None,
            state: 0.0,
            done: true,
        }
    }

    /// Disable the decision-record CSV (tests, throwaway runs).
    pub fn without_decision_log(mut self) -> Self {
        self.decision_log_path = None;
        self
    }

    /// Start a fresh solver run on a background thread and block until its
    /// first branch decision (returns its state) or completion with no
    /// decisions taken (returns a terminal observation).
    pub fn reset(&mut self) -> Result<Observation, ProtocolError> {
        self.teardown();

        let (search_ep, control_ep) = protocol::channel();
        let model = self.instance.build_model();
        let mut engine = SearchEngine::new(model, self.search_config.clone());
        let log = DecisionLog::new(
            self.decision_log_path.clone(),
            self.decision_flush_interval,
        );
        let seed = self
            .base_seed
            .map(|seed| episode_seed(seed, self.episodes_started));
        let mut decision_point = BranchDecisionPoint::new(search_ep, log, seed);
        self.episodes_started += 1;

        let worker = std::thread::spawn(move || match engine.solve(&mut decision_point) {
            Ok(outcome) => {
                let stats = outcome.stats;
                log::info!(
                    "search finished: best {:?}, {} nodes, {} decisions",
                    outcome.best_objective,
                    stats.nodes_processed,
                    stats.branch_callbacks
                );
                if let Err(e) = decision_point.finish() {
                    log::debug!("completion signal not delivered: {e}");
                }
            }
            Err(e) => {
                log::warn!("search aborted: {e}");
                decision_point.abort();
            }
        });

        self.worker = Some(worker);
        let mut endpoint = control_ep;
        let observation = match endpoint.recv_signal()? {
            SearchSignal::Ready(gap) => {
                self.state = gap;
                self.done = false;
                Observation {
                    state: gap,
                    done: false,
                }
            }
            SearchSignal::Done => {
                self.done = true;
                Observation {
                    state: self.state,
                    done: true,
                }
            }
        };
        self.endpoint = Some(endpoint);
        Ok(observation)
    }

    /// Answer the pending decision with `action`; block until the next
    /// decision point (reward per the gap rule) or completion (zero reward,
    /// terminal).
    pub fn step(&mut self, action: usize) -> Result<Step, ProtocolError> {
        let endpoint = self
            .endpoint
            .as_mut()
            .ok_or(ProtocolError::Disconnected)?;
        endpoint.send_choice(action)?;
        match endpoint.recv_signal()? {
            SearchSignal::Ready(gap) => {
                let reward = step_reward(self.state, gap);
                self.state = gap;
                Ok(Step {
                    state: gap,
                    reward,
                    done: false,
                })
            }
            SearchSignal::Done => {
                self.done = true;
                Ok(Step {
                    state: self.state,
                    reward: 0.0,
                    done: true,
                })
            }
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Drop the channel (waking a blocked search thread) and join it.
    fn teardown(&mut self) {
        self.endpoint = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("search thread panicked during teardown");
            }
        }
        self.done = true;
    }
}

impl Drop for SearchEnv {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Derive a deterministic seed for a given episode index.
pub fn episode_seed(base_seed: u64, episode_index: usize) -> u64 {
    // FNV-1a-inspired mixing for deterministic, well-distributed seeds
    let mut hash = base_seed ^ 0x517cc1b727220a95;
    let index = episode_index as u64;
    hash = hash.wrapping_mul(0x100000001b3);
    hash ^= index;
    hash = hash.wrapping_mul(0x100000001b3);
    hash ^= index >> 32;
    hash
}
