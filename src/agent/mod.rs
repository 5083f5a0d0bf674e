//! Learning agent: epsilon-greedy DQN over the branching strategy set.

mod dqn;
mod network;
mod replay;

pub use dqn::{DqnAgent, DqnConfig, LossExport};
pub use network::{QNetwork, QNetworkConfig, STATE_DIM};
pub use replay::{ReplayMemory, Transition};
