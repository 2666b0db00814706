//! Offline training of the anomaly model on synthetic healthy-device data.

use crate::errors::{Error, Result};
use crate::forest::{ForestParams, IsolationForest};
use crate::scorer::ModelArtifact;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, Poisson};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingConfig {
    pub samples: usize,
    pub n_estimators: usize,
    pub contamination: f64,
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            samples: 1000,
            n_estimators: 100,
            contamination: 0.01,
            seed: 42,
        }
    }
}

fn normal(mean: f64, std_dev: f64) -> Result<Normal<f64>> {
    Normal::new(mean, std_dev).map_err(|e| Error::Training(e.to_string()))
}

/// Draws `samples` rows of normal operating data, one column per model feature.
pub fn generate_synthetic_data(samples: usize, seed: u64) -> Result<Vec<Vec<f64>>> {
    let mut rng = StdRng::seed_from_u64(seed);

    let motor_current = normal(2.5, 0.2)?;
    let motor_rpm = normal(3000.0, 100.0)?;
    let vibration_level = normal(0.05, 0.01)?;
    let device_temperature = normal(37.0, 0.5)?;
    let battery_voltage = normal(12.0, 0.1)?;
    let error_count = Poisson::new(0.1).map_err(|e| Error::Training(e.to_string()))?;

    let rows = (0..samples)
        .map(|_| {
            vec![
                motor_current.sample(&mut rng),
                motor_rpm.sample(&mut rng),
                vibration_level.sample(&mut rng),
                device_temperature.sample(&mut rng),
                battery_voltage.sample(&mut rng),
                error_count.sample(&mut rng),
            ]
        })
        .collect();

    Ok(rows)
}

pub fn train(config: &TrainingConfig) -> Result<ModelArtifact> {
    info!(
        "Generating {} synthetic samples (seed {})",
        config.samples, config.seed
    );
    let data = generate_synthetic_data(config.samples, config.seed)?;

    info!(
        "Training isolation forest: {} trees, contamination {}",
        config.n_estimators, config.contamination
    );
    let forest = IsolationForest::fit(
        &data,
        ForestParams {
            n_estimators: config.n_estimators,
            contamination: config.contamination,
            seed: config.seed,
        },
    )?;

    Ok(ModelArtifact::new(forest, config.samples))
}
