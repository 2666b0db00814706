use crate::errors::{Error, Result};
use crate::forest::IsolationForest;
use crate::model::{SensorFeatures, FEATURE_NAMES};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Serialized model file produced by `backend train`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub feature_names: Vec<String>,
    pub trained_at: DateTime<Utc>,
    pub training_samples: usize,
    pub forest: IsolationForest,
}

impl ModelArtifact {
    pub fn new(forest: IsolationForest, training_samples: usize) -> Self {
        Self {
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            trained_at: Utc::now(),
            training_samples,
            forest,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_vec(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ModelUnavailable(format!(
                "no model artifact at {}",
                path.display()
            )));
        }

        let bytes = std::fs::read(path)?;
        let artifact: ModelArtifact = serde_json::from_slice(&bytes)
            .map_err(|e| Error::ModelUnavailable(format!("unreadable model artifact: {}", e)))?;

        if artifact.feature_names != FEATURE_NAMES
            || artifact.forest.n_features() != FEATURE_NAMES.len()
        {
            return Err(Error::ModelUnavailable(format!(
                "model expects features {:?}, serving provides {:?}",
                artifact.feature_names, FEATURE_NAMES
            )));
        }

        Ok(artifact)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub is_anomaly: bool,
    pub score: f64,
}

impl Score {
    pub const NORMAL: Score = Score {
        is_anomaly: false,
        score: 0.0,
    };
}

/// Read-only scorer shared by all request handlers.
///
/// Without a model every reading scores as normal with score 0.
#[derive(Debug, Clone, Default)]
pub struct AnomalyScorer {
    forest: Option<IsolationForest>,
}

impl AnomalyScorer {
    pub fn new(forest: IsolationForest) -> Self {
        Self {
            forest: Some(forest),
        }
    }

    pub fn disabled() -> Self {
        Self { forest: None }
    }

    /// Loads the artifact at `path`, degrading to a disabled scorer when it is
    /// missing or unusable.
    pub fn load_or_disabled(path: &Path) -> Self {
        match ModelArtifact::load(path) {
            Ok(artifact) => {
                info!(
                    "Loaded anomaly model from {} ({} trees, trained {})",
                    path.display(),
                    artifact.forest.n_estimators(),
                    artifact.trained_at
                );
                Self::new(artifact.forest)
            }
            Err(e) => {
                warn!("{}; every reading will be scored as normal", e);
                Self::disabled()
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.forest.is_some()
    }

    pub fn score(&self, features: &SensorFeatures) -> Score {
        let Some(forest) = &self.forest else {
            return Score::NORMAL;
        };

        let vector = features.to_vector();
        let score = forest.decision_function(&vector);
        Score {
            is_anomaly: score < 0.0,
            score,
        }
    }
}
