use std::path::{Path, PathBuf};

use burn::backend::{Autodiff, NdArray};
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::record::DefaultRecorder;
use burn::tensor::TensorData;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::agent::network::{self, QNetwork, QNetworkConfig};
use crate::agent::replay::{ReplayMemory, Transition};
use crate::branching::ACTION_COUNT;
use crate::error::PersistError;
use crate::export;

type InferBackend = NdArray<f32>;
type TrainBackend = Autodiff<InferBackend>;

/// DQN hyperparameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DqnConfig {
    pub learning_rate: f64,
    pub gamma: f64,
    pub epsilon_start: f64,
    pub epsilon_min: f64,
    /// Multiplicative decay applied on every action selection.
    pub epsilon_decay: f64,
    /// Polyak coefficient for the target-network blend.
    pub tau: f64,
    pub batch_size: usize,
    pub replay_capacity: usize,
}

impl Default for DqnConfig {
    fn default() -> Self {
        DqnConfig {
            learning_rate: 1e-3,
            gamma: 0.99,
            epsilon_start: 1.0,
            epsilon_min: 0.01,
            epsilon_decay: 0.99999,
            tau: 0.125,
            batch_size: 32,
            replay_capacity: 500_000,
        }
    }
}

/// Where to flush the loss history, and how often.
#[derive(Debug, Clone)]
pub struct LossExport {
    pub dir: PathBuf,
    pub interval: usize,
}

/// Epsilon-greedy DQN agent with behavior + target networks and a bounded
/// transition memory.
///
/// The target network always holds the Polyak average of the behavior
/// parameters; the two start identical and the target is never hard-copied
/// afterwards.
pub struct DqnAgent {
    q_network: QNetwork<TrainBackend>,
    target_network: QNetwork<InferBackend>,
    optimizer: burn::optim::adaptor::OptimizerAdaptor<
        burn::optim::Adam,
        QNetwork<TrainBackend>,
        TrainBackend,
    >,
    memory: ReplayMemory,
    config: DqnConfig,
    device: <TrainBackend as Backend>::Device,
    epsilon: f64,
    fit_count: usize,
    loss_history: Vec<f32>,
    loss_export: Option<LossExport>,
    rng: StdRng,
}

impl DqnAgent {
    /// Build an agent. A seed makes weight initialization, exploration and
    /// minibatch sampling reproducible.
    pub fn new(config: DqnConfig, seed: Option<u64>) -> Self {
        if let Some(seed) = seed {
            TrainBackend::seed(seed);
        }
        let device = Default::default();
        let q_network: QNetwork<TrainBackend> = QNetworkConfig::default().init(&device);
        // Both networks start identical; every later target change is a blend.
        let target_network: QNetwork<InferBackend> = q_network.valid();
        let optimizer = AdamConfig::new().init();

        let memory = match seed {
            Some(seed) => ReplayMemory::with_seed(config.replay_capacity, seed ^ 0x9e3779b9),
            None => ReplayMemory::new(config.replay_capacity),
        };
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let epsilon = config.epsilon_start;
        DqnAgent {
            q_network,
            target_network,
            optimizer,
            memory,
            config,
            device,
            epsilon,
            fit_count: 0,
            loss_history: Vec::new(),
            loss_export: None,
            rng,
        }
    }

    pub fn with_loss_export(mut self, export: LossExport) -> Self {
        self.loss_export = Some(export);
        self
    }

    /// Epsilon-greedy action selection. The exploration rate decays
    /// multiplicatively before the draw and never falls below the floor.
    pub fn select_action(&mut self, state: f64) -> usize {
        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);
        if self.rng.random::<f64>() < self.epsilon {
            return self.rng.random_range(0..ACTION_COUNT);
        }
        let q_values = self.predict(state);
        argmax(&q_values)
    }

    /// Behavior-network action values for one state.
    pub fn predict(&self, state: f64) -> Vec<f32> {
        let input =
            Tensor::<InferBackend, 1>::from_data(TensorData::from([state as f32]), &self.device)
                .reshape([1, 1]);
        self.q_network
            .valid()
            .forward(input)
            .into_data()
            .to_vec()
            .expect("f32 tensor data extraction")
    }

    /// Append a transition to the replay memory.
    pub fn remember(&mut self, transition: Transition) {
        self.memory.push(transition);
    }

    /// One minibatch update of the behavior network. No-op until the memory
    /// holds a full minibatch. Returns the MSE loss of the step.
    pub fn learn(&mut self) -> Option<f32> {
        if self.memory.len() < self.config.batch_size {
            return None;
        }
        let batch = self.memory.sample(self.config.batch_size);
        let n = batch.len();
        let a = ACTION_COUNT;

        let states: Vec<f32> = batch.iter().map(|t| t.state as f32).collect();
        let next_states: Vec<f32> = batch.iter().map(|t| t.next_state as f32).collect();

        // Target-network predictions for both state columns, pulled to the
        // host once; targets are assembled per sample.
        let state_t =
            Tensor::<InferBackend, 1>::from_data(TensorData::from(states.as_slice()), &self.device)
                .reshape([n as i32, 1]);
        let q_state: Vec<f32> = self
            .target_network
            .forward(state_t)
            .into_data()
            .to_vec()
            .expect("f32 tensor data extraction");

        let next_t = Tensor::<InferBackend, 1>::from_data(
            TensorData::from(next_states.as_slice()),
            &self.device,
        )
        .reshape([n as i32, 1]);
        let q_next: Vec<f32> = self
            .target_network
            .forward(next_t)
            .into_data()
            .to_vec()
            .expect("f32 tensor data extraction");

        let mut targets = q_state;
        for (i, t) in batch.iter().enumerate() {
            let value = if t.terminal {
                t.reward as f32
            } else {
                let max_next = q_next[i * a..(i + 1) * a]
                    .iter()
                    .fold(f32::NEG_INFINITY, |m, &v| m.max(v));
                t.reward as f32 + self.config.gamma as f32 * max_next
            };
            targets[i * a + t.action] = value;
        }

        // One MSE gradient step of the behavior network toward the targets.
        let input =
            Tensor::<TrainBackend, 1>::from_data(TensorData::from(states.as_slice()), &self.device)
                .reshape([n as i32, 1]);
        let target_t = Tensor::<TrainBackend, 1>::from_data(
            TensorData::from(targets.as_slice()),
            &self.device,
        )
        .reshape([n as i32, a as i32]);

        let prediction = self.q_network.forward(input);
        let diff = prediction - target_t;
        let loss = (diff.clone() * diff).mean();
        let loss_val: f32 = loss
            .clone()
            .into_data()
            .to_vec::<f32>()
            .expect("f32 loss tensor extraction")[0];

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.q_network);
        self.q_network =
            self.optimizer
                .step(self.config.learning_rate, self.q_network.clone(), grads);

        self.fit_count += 1;
        self.loss_history.push(loss_val);
        if let Some(export) = &self.loss_export {
            if self.fit_count % export.interval == 0 {
                self.flush_loss(&export.dir);
            }
        }
        Some(loss_val)
    }

    /// Polyak update of the target network toward the behavior network.
    pub fn sync_target(&mut self) {
        let source = self.q_network.valid();
        self.target_network =
            network::soft_update(self.target_network.clone(), &source, self.config.tau);
    }

    /// Serialize the behavior network's parameters under `dir`.
    pub fn persist(&self, dir: &Path) -> Result<(), PersistError> {
        std::fs::create_dir_all(dir)?;
        let recorder = DefaultRecorder::default();
        self.q_network
            .clone()
            .valid()
            .save_file(dir.join("q_network"), &recorder)
            .map_err(|e| PersistError::Record(e.to_string()))
    }

    fn flush_loss(&self, dir: &Path) {
        if let Err(e) = export::write_loss_history(&dir.join("loss.csv"), &self.loss_history) {
            log::warn!("failed to flush loss history: {e}");
        }
        let figure = dir.join(format!("loss_{}.svg", self.fit_count));
        if let Err(e) = export::render_loss_curve(&figure, &self.loss_history) {
            log::warn!("failed to render loss curve: {e}");
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Set epsilon directly (e.g. 0.0 for pure greedy runs).
    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon;
    }

    pub fn fit_count(&self) -> usize {
        self.fit_count
    }

    pub fn memory(&self) -> &ReplayMemory {
        &self.memory
    }

    pub fn config(&self) -> &DqnConfig {
        &self.config
    }
}

fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (i, &v) in values.iter().enumerate() {
        if v > best_value {
            best_value = v;
            best = i;
        }
    }
    best
}
