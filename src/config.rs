//! Configuration structures for training
//!
//! This module provides the training hyperparameter configuration parsed from
//! JSON files, so runs can be tuned without recompiling the driver.

use serde::Deserialize;
use std::error::Error;
use std::fs;

/// Configuration for a training run.
///
/// # Example
///
/// ```json
/// {
///   "epochs": 10,
///   "batch_size": 32,
///   "learning_rate": 0.1,
///   "seed": 0
/// }
/// ```
///
/// The learning rate is the per-minibatch rate; the driver divides it by
/// `batch_size` when applying updates because the engine's accumulators are
/// sums over samples, not means. A seed of 0 selects the generator's fixed
/// default state.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    /// Number of passes over the training set
    pub epochs: usize,

    /// Samples accumulated between parameter updates
    pub batch_size: usize,

    /// Learning rate before minibatch scaling
    pub learning_rate: f64,

    /// RNG seed for weight initialization and sample selection (default 0)
    pub seed: Option<u64>,
}

/// Loads a training configuration from a JSON file.
///
/// Reads the file at `path` and deserializes its JSON contents into a
/// `TrainingConfig`.
///
/// # Returns
///
/// `Ok(TrainingConfig)` on success, or an error if the file cannot be read,
/// the JSON is invalid, or a hyperparameter is out of range.
///
/// # Examples
///
/// ```no_run
/// use chainnet::config::load_config;
///
/// let cfg = load_config("config/training/mnist_cnn.json").unwrap();
/// assert!(cfg.epochs > 0);
/// ```
pub fn load_config(path: &str) -> Result<TrainingConfig, Box<dyn Error>> {
    let contents = fs::read_to_string(path)?;
    let config: TrainingConfig = serde_json::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &TrainingConfig) -> Result<(), Box<dyn Error>> {
    if config.epochs == 0 {
        return Err(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "epochs must be greater than 0",
        )));
    }

    if config.batch_size == 0 {
        return Err(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "batch_size must be greater than 0",
        )));
    }

    if config.learning_rate <= 0.0 {
        return Err(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "learning_rate must be positive",
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_defaults() {
        let config = TrainingConfig {
            epochs: 10,
            batch_size: 32,
            learning_rate: 0.1,
            seed: None,
        };
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_epochs() {
        let config = TrainingConfig {
            epochs: 0,
            batch_size: 32,
            learning_rate: 0.1,
            seed: Some(1),
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_nonpositive_rate() {
        let config = TrainingConfig {
            epochs: 1,
            batch_size: 1,
            learning_rate: 0.0,
            seed: None,
        };
        assert!(validate_config(&config).is_err());
    }
}
