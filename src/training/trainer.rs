use std::path::PathBuf;
use std::time::Instant;

use crate::agent::{DqnAgent, Transition};
use crate::checkpoint::{BestAgentCheckpoint, CheckpointMetadata};
use crate::env::SearchEnv;
use crate::error::TrainingError;
use crate::export::{self, ExportConfig};
use crate::training::metrics::{EpochRecord, RewardStats};

/// Trainer configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Number of episodes to run.
    pub epochs: usize,
    /// Decision-cycle cap per episode.
    pub iteration_cap: usize,
    pub checkpoint_dir: PathBuf,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            epochs: 500,
            iteration_cap: 5000,
            checkpoint_dir: PathBuf::from("checkpoints"),
        }
    }
}

/// Summary of a finished training run.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub epochs_run: usize,
    pub best_mean_reward: f64,
    pub history: Vec<EpochRecord>,
}

/// Drives repeated search episodes against the learning agent.
pub struct Trainer {
    config: TrainerConfig,
    reward_history_path: PathBuf,
    checkpoint: BestAgentCheckpoint,
}

impl Trainer {
    pub fn new(config: TrainerConfig, export: &ExportConfig) -> Self {
        let checkpoint = BestAgentCheckpoint::new(config.checkpoint_dir.clone());
        Trainer {
            config,
            reward_history_path: export.out_dir.join("reward_history.csv"),
            checkpoint,
        }
    }

    /// Run the full training loop: one episode per epoch, learning after
    /// every decision, reward history flushed every epoch, best agent saved
    /// whenever the epoch's mean reward improves.
    pub fn train(
        &self,
        agent: &mut DqnAgent,
        env: &mut SearchEnv,
    ) -> Result<TrainingReport, TrainingError> {
        let mut history: Vec<EpochRecord> = Vec::with_capacity(self.config.epochs);
        let mut best_mean_reward = f64::NEG_INFINITY;

        println!(
            "Starting training for {} epochs (iteration cap {})...",
            self.config.epochs, self.config.iteration_cap
        );
        println!("-------------------------------------------");

        for epoch in 0..self.config.epochs {
            let start = Instant::now();
            let observation = env.reset()?;
            let mut state = observation.state;
            let mut done = observation.done;
            let mut rewards: Vec<f64> = Vec::new();

            let mut iterations = 0;
            while !done && iterations < self.config.iteration_cap {
                iterations += 1;
                let action = agent.select_action(state);
                let step = env.step(action)?;
                agent.remember(Transition {
                    state,
                    action,
                    reward: step.reward,
                    next_state: step.state,
                    terminal: step.done,
                });
                agent.learn();
                agent.sync_target();
                state = step.state;
                done = step.done;
                rewards.push(step.reward);
            }

            let seconds = start.elapsed().as_secs_f64();
            let stats = RewardStats::from_rewards(&rewards);
            history.push(EpochRecord {
                epoch,
                mean_reward: stats.mean,
                std_dev: stats.std_dev,
                steps: rewards.len(),
                seconds,
            });
            export::write_reward_history(&self.reward_history_path, &history)?;

            println!(
                "Epoch {}/{} | {} iterations in {:.3}s | avg reward: {:.2} | dev: {:.2} | eps: {:.4}",
                epoch + 1,
                self.config.epochs,
                rewards.len(),
                seconds,
                stats.mean,
                stats.std_dev,
                agent.epsilon(),
            );

            if stats.mean > best_mean_reward {
                best_mean_reward = stats.mean;
                let metadata = CheckpointMetadata::new(epoch, &stats, rewards.len(), agent);
                match self.checkpoint.save(agent, &metadata) {
                    Ok(path) => println!("  >> Saving new best agent: {}", path.display()),
                    Err(e) => eprintln!("  >> Checkpoint failed: {e}"),
                }
            }
        }

        println!("-------------------------------------------");
        println!(
            "Training complete. Best mean reward: {:.2}",
            best_mean_reward
        );

        Ok(TrainingReport {
            epochs_run: self.config.epochs,
            best_mean_reward,
            history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::DqnConfig;
    use crate::solver::{KnapsackInstance, SearchConfig};

    #[test]
    fn test_training_smoke_run() {
        let dir = tempfile::tempdir().unwrap();
        let export = ExportConfig {
            out_dir: dir.path().join("artifacts"),
            ..Default::default()
        };
        let trainer_config = TrainerConfig {
            epochs: 2,
            iteration_cap: 50,
            checkpoint_dir: dir.path().join("checkpoints"),
        };
        let dqn_config = DqnConfig {
            batch_size: 4,
            ..Default::default()
        };

        let mut env = SearchEnv::new(
            KnapsackInstance::toy(),
            SearchConfig::default(),
            &export,
            Some(5),
        );
        let mut agent = DqnAgent::new(dqn_config, Some(5));
        let trainer = Trainer::new(trainer_config, &export);

        let report = trainer.train(&mut agent, &mut env).unwrap();
        assert_eq!(report.epochs_run, 2);
        assert_eq!(report.history.len(), 2);
        assert!(report.best_mean_reward.is_finite());
        assert!(export.out_dir.join("reward_history.csv").exists());
        assert!(dir.path().join("checkpoints").join("best").exists());
    }

    #[test]
    fn test_zero_step_episode_is_complete() {
        // LP-integral instance: the solve finishes before any decision.
        let dir = tempfile::tempdir().unwrap();
        let export = ExportConfig {
            out_dir: dir.path().join("artifacts"),
            ..Default::default()
        };
        let trainer_config = TrainerConfig {
            epochs: 1,
            iteration_cap: 50,
            checkpoint_dir: dir.path().join("checkpoints"),
        };

        let instance = KnapsackInstance::new("unit", vec![1], vec![1], vec![10], 10);
        let mut env = SearchEnv::new(instance, SearchConfig::default(), &export, Some(5));
        let mut agent = DqnAgent::new(DqnConfig::default(), Some(5));
        let trainer = Trainer::new(trainer_config, &export);

        let report = trainer.train(&mut agent, &mut env).unwrap();
        assert_eq!(report.history[0].steps, 0);
        assert_eq!(report.history[0].mean_reward, 0.0);
    }
}
