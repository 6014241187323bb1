use chrono::{DateTime, Local};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::dataset::Sample;
use crate::util::mean_squared_error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model has not been calibrated")]
    NotCalibrated,
    #[error("no samples to calibrate against")]
    EmptyDataset,
    #[error("failed to access model file: {0}")]
    Io(#[from] io::Error),
    #[error("malformed model file: {0}")]
    Json(#[from] serde_json::Error),
}

/// height_cm = a * total_ms + b * interval_ms + c
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl LinearModel {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    pub fn predict(&self, total_ms: f64, interval_ms: f64) -> f64 {
        self.a * total_ms + self.b * interval_ms + self.c
    }

    pub fn predict_samples(&self, samples: &[Sample]) -> Vec<f64> {
        samples
            .iter()
            .map(|s| self.predict(s.total_ms, s.interval_ms))
            .collect()
    }

    /// Mean squared error against the samples' recorded heights
    pub fn score(&self, samples: &[Sample]) -> Option<f64> {
        let targets = samples.iter().map(|s| s.height_cm).collect::<Vec<f64>>();
        mean_squared_error(&self.predict_samples(samples), &targets)
    }
}

/// Best parameters found so far and how well they fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub params: LinearModel,
    pub mse: f64,
    pub calibrated_at: DateTime<Local>,
}

/// Random search over [-1, 1]^3, keeping the lowest MSE.
/// `previous` seeds the search, re-scored against `samples` since it may
/// have been fitted to a different dataset.
pub fn calibrate<R: Rng>(
    samples: &[Sample],
    iterations: usize,
    rng: &mut R,
    previous: Option<&Calibration>,
) -> Result<Calibration, ModelError> {
    if samples.is_empty() {
        return Err(ModelError::EmptyDataset);
    }

    let mut best: Option<(LinearModel, f64)> = previous.map(|p| {
        let mse = p.params.score(samples).unwrap_or(f64::INFINITY);
        debug!(saved_mse = p.mse, mse, "re-scored previous calibration");
        (p.params, mse)
    });

    for _ in 0..iterations {
        let candidate = LinearModel::new(
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
        );
        let mse = candidate.score(samples).ok_or(ModelError::EmptyDataset)?;

        if best.map_or(true, |(_, best_mse)| mse < best_mse) {
            debug!(mse, ?candidate, "improved calibration");
            best = Some((candidate, mse));
        }
    }

    let (params, mse) = best.ok_or(ModelError::NotCalibrated)?;
    info!(mse, samples = samples.len(), iterations, "calibration finished");

    Ok(Calibration {
        params,
        mse,
        calibrated_at: Local::now(),
    })
}

/// JSON file holding the current calibration
#[derive(Debug, Clone)]
pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when nothing has been saved yet
    pub fn load(&self) -> Result<Option<Calibration>, ModelError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, calibration: &Calibration) -> Result<(), ModelError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(calibration)?)?;
        Ok(())
    }
}
