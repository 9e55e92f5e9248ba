//! Model fit/predict capability.
//!
//! This module provides:
//! - `ModelProvider`: the trait the executor trains and predicts through
//! - `ModelParams`: hyperparameters passed to every fit
//! - `RidgeRegressor` / `LinearModel`: the built-in provider, a standardised
//!   ridge regression solved by SVD on the penalty-augmented design matrix
//!
//! Providers must be `Send + Sync`: a single provider instance is shared by
//! every worker, and trained models are shared through the model cache.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::features::FeatureFrame;

/// Hyperparameters passed to [`ModelProvider::fit`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    /// L2 penalty on standardised coefficients
    pub ridge_penalty: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self { ridge_penalty: 1.0 }
    }
}

impl ModelParams {
    /// Returns a list of problems, empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !self.ridge_penalty.is_finite() || self.ridge_penalty < 0.0 {
            errors.push(format!(
                "model.ridge_penalty must be finite and >= 0, got {}",
                self.ridge_penalty
            ));
        }
        errors
    }
}

/// Train/predict capability used by the executor.
///
/// `fit` may be slow and may fail transiently (see
/// [`Retryable`](crate::error::Retryable)); `predict` must return exactly one
/// value per frame row.
pub trait ModelProvider: Send + Sync {
    /// Trained model type.
    type Model: Send + Sync;

    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Trains on `frame` with labels `target`.
    fn fit(&self, frame: &FeatureFrame, target: &[f64], params: &ModelParams) -> Result<Self::Model, ModelError>;

    /// Predicts one value per row of `frame`.
    fn predict(&self, model: &Self::Model, frame: &FeatureFrame) -> Result<Vec<f64>, ModelError>;
}

impl<P: ModelProvider + ?Sized> ModelProvider for std::sync::Arc<P> {
    type Model = P::Model;

    fn name(&self) -> &str {
        (**self).name()
    }

    fn fit(&self, frame: &FeatureFrame, target: &[f64], params: &ModelParams) -> Result<Self::Model, ModelError> {
        (**self).fit(frame, target, params)
    }

    fn predict(&self, model: &Self::Model, frame: &FeatureFrame) -> Result<Vec<f64>, ModelError> {
        (**self).predict(model, frame)
    }
}

/// A fitted linear model on standardised columns.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearModel {
    schema_hash: String,
    means: Vec<f64>,
    scales: Vec<f64>,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LinearModel {
    /// Coefficients in original column units.
    pub fn coefficients(&self) -> Vec<f64> {
        self.coefficients
            .iter()
            .zip(&self.scales)
            .map(|(b, s)| b / s)
            .collect()
    }

    /// Intercept in original units.
    pub fn intercept(&self) -> f64 {
        self.intercept
            - self
                .coefficients()
                .iter()
                .zip(&self.means)
                .map(|(b, m)| b * m)
                .sum::<f64>()
    }

    /// Schema the model was trained on.
    pub fn schema_hash(&self) -> &str {
        &self.schema_hash
    }
}

/// Ridge regression provider.
#[derive(Clone, Copy, Debug, Default)]
pub struct RidgeRegressor;

/// Solves a least squares problem using SVD with progressively looser tolerances.
fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }
    None
}

fn column_stats(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let sd = var.sqrt();
    // Constant columns standardise to zero and drop out of the fit.
    (mean, if sd > 1e-12 { sd } else { 1.0 })
}

impl ModelProvider for RidgeRegressor {
    type Model = LinearModel;

    fn name(&self) -> &str {
        "ridge"
    }

    fn fit(&self, frame: &FeatureFrame, target: &[f64], params: &ModelParams) -> Result<LinearModel, ModelError> {
        let n = frame.n_rows();
        let p = frame.n_cols();
        if target.len() != n {
            return Err(ModelError::ShapeMismatch {
                expected: n,
                actual: target.len(),
            });
        }
        if n == 0 {
            return Err(ModelError::fit("empty training frame"));
        }

        let (means, scales): (Vec<f64>, Vec<f64>) = (0..p).map(|j| column_stats(frame.column_at(j))).unzip();
        let y_mean = target.iter().sum::<f64>() / n as f64;

        let penalty = params.ridge_penalty.max(0.0).sqrt();
        let mut x = DMatrix::<f64>::zeros(n + p, p);
        for j in 0..p {
            let col = frame.column_at(j);
            for i in 0..n {
                x[(i, j)] = (col[i] - means[j]) / scales[j];
            }
            x[(n + j, j)] = penalty;
        }
        let mut y = DVector::<f64>::zeros(n + p);
        for (i, t) in target.iter().enumerate() {
            y[i] = t - y_mean;
        }

        let beta = solve_least_squares(&x, &y).ok_or_else(|| ModelError::fit("least squares solve did not converge"))?;
        Ok(LinearModel {
            schema_hash: frame.schema_hash().to_string(),
            means,
            scales,
            coefficients: beta.iter().copied().collect(),
            intercept: y_mean,
        })
    }

    fn predict(&self, model: &LinearModel, frame: &FeatureFrame) -> Result<Vec<f64>, ModelError> {
        if frame.n_cols() != model.coefficients.len() {
            return Err(ModelError::ShapeMismatch {
                expected: model.coefficients.len(),
                actual: frame.n_cols(),
            });
        }
        if frame.schema_hash() != model.schema_hash {
            return Err(ModelError::predict("feature schema differs from training schema"));
        }
        let mut out = vec![model.intercept; frame.n_rows()];
        for (j, b) in model.coefficients.iter().enumerate() {
            let col = frame.column_at(j);
            let (m, s) = (model.means[j], model.scales[j]);
            for (o, v) in out.iter_mut().zip(col) {
                *o += b * (v - m) / s;
            }
        }
        Ok(out)
    }
}
