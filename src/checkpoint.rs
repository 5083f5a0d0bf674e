//! Best-agent persistence.
//!
//! A single `best/` directory holds the behavior network's weights plus a
//! metadata JSON; it is overwritten (via atomic rename) whenever a new best
//! mean reward is reached.

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::agent::{DqnAgent, DqnConfig};
use crate::error::PersistError;
use crate::training::RewardStats;

/// Metadata stored next to the serialized weights.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CheckpointMetadata {
    pub epoch: usize,
    pub mean_reward: f64,
    pub std_dev: f64,
    pub steps: usize,
    pub timestamp: u64,
    pub hyperparameters: DqnConfig,
}

impl CheckpointMetadata {
    pub fn new(epoch: usize, stats: &RewardStats, steps: usize, agent: &DqnAgent) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        CheckpointMetadata {
            epoch,
            mean_reward: stats.mean,
            std_dev: stats.std_dev,
            steps,
            timestamp,
            hyperparameters: agent.config().clone(),
        }
    }
}

/// Saves the current best agent under `<dir>/best`.
pub struct BestAgentCheckpoint {
    dir: PathBuf,
}

impl BestAgentCheckpoint {
    pub fn new(dir: PathBuf) -> Self {
        fs::create_dir_all(&dir).ok();
        BestAgentCheckpoint { dir }
    }

    /// Write weights + metadata into a temp directory, then swap it in.
    pub fn save(
        &self,
        agent: &DqnAgent,
        metadata: &CheckpointMetadata,
    ) -> Result<PathBuf, PersistError> {
        let tmp_dir = self.dir.join("best.tmp");
        let final_dir = self.dir.join("best");

        if tmp_dir.exists() {
            fs::remove_dir_all(&tmp_dir)?;
        }
        fs::create_dir_all(&tmp_dir)?;

        agent.persist(&tmp_dir)?;
        let meta_json = serde_json::to_string_pretty(metadata)?;
        fs::write(tmp_dir.join("metadata.json"), meta_json)?;

        if final_dir.exists() {
            fs::remove_dir_all(&final_dir)?;
        }
        fs::rename(&tmp_dir, &final_dir)?;
        Ok(final_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_creates_weights_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = BestAgentCheckpoint::new(dir.path().join("checkpoints"));
        let agent = DqnAgent::new(DqnConfig::default(), Some(1));
        let stats = RewardStats {
            mean: 42.5,
            std_dev: 3.0,
        };
        let metadata = CheckpointMetadata::new(7, &stats, 120, &agent);

        let saved = checkpoint.save(&agent, &metadata).unwrap();
        assert!(saved.join("metadata.json").exists());
        let meta: CheckpointMetadata = serde_json::from_str(
            &std::fs::read_to_string(saved.join("metadata.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(meta.epoch, 7);
        assert_eq!(meta.mean_reward, 42.5);
    }

    #[test]
    fn test_save_overwrites_previous_best() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint = BestAgentCheckpoint::new(dir.path().join("checkpoints"));
        let agent = DqnAgent::new(DqnConfig::default(), Some(1));
        let stats = RewardStats {
            mean: 1.0,
            std_dev: 0.0,
        };

        checkpoint
            .save(&agent, &CheckpointMetadata::new(0, &stats, 5, &agent))
            .unwrap();
        let saved = checkpoint
            .save(&agent, &CheckpointMetadata::new(1, &stats, 9, &agent))
            .unwrap();
        let meta: CheckpointMetadata = serde_json::from_str(
            &std::fs::read_to_string(saved.join("metadata.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(meta.epoch, 1);
    }
}
