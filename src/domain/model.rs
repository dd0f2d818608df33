//! Regression models used to score cross-sections.
//!
//! Models implement [`Regressor`]. New kinds are added by registering a
//! constructor in [`MODEL_REGISTRY`]; the walk-forward loop only sees the trait.

use crate::domain::error::LsquantError;
use ndarray::{Array1, Array2, Axis};

/// Errors raised while fitting or applying a model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("model has not been fitted yet")]
    NotFitted,

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("invalid alpha value: {0}")]
    InvalidAlpha(f64),

    #[error("empty training set")]
    EmptyTrainingSet,

    #[error("normal equations are not positive definite")]
    NotPositiveDefinite,
}

/// A supervised regressor over a dense feature matrix.
pub trait Regressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError>;
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError>;
}

/// Hyperparameters passed to model constructors.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    /// L2 penalty coefficient.
    pub alpha: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self { alpha: 10.0 }
    }
}

type ModelConstructor = fn(&ModelParams) -> Box<dyn Regressor>;

/// Registered model kinds.
pub const MODEL_REGISTRY: &[(&str, ModelConstructor)] = &[("ridge", ridge as ModelConstructor)];

fn ridge(params: &ModelParams) -> Box<dyn Regressor> {
    Box::new(StandardizedRidge::new(params.alpha))
}

pub fn supported_models() -> impl Iterator<Item = &'static str> {
    MODEL_REGISTRY.iter().map(|(name, _)| *name)
}

/// Resolve `kind` against the registry and construct an unfitted model.
pub fn build_model(kind: &str, params: &ModelParams) -> Result<Box<dyn Regressor>, LsquantError> {
    let kind = kind.trim().to_lowercase();
    MODEL_REGISTRY
        .iter()
        .find(|(name, _)| *name == kind)
        .map(|(_, ctor)| ctor(params))
        .ok_or(LsquantError::UnsupportedModel { kind })
}

/// Per-column standardization, fitted on training data.
///
/// Zero-variance columns keep a unit scale so they map to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(x: &Array2<f64>) -> Result<Self, ModelError> {
        let mean = x.mean_axis(Axis(0)).ok_or(ModelError::EmptyTrainingSet)?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s < 1e-12 { 1.0 } else { s });
        Ok(Self { mean, scale })
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        if x.ncols() != self.mean.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.mean.len(),
                got: x.ncols(),
            });
        }
        Ok((x - &self.mean) / &self.scale)
    }
}

/// Ridge regression on standardized inputs with an unpenalized intercept.
///
/// Minimizes ||y - Zβ - b||² + α||β||² where Z is the scaled design matrix,
/// solved in closed form through a Cholesky factorization of Z'Z + αI.
/// `α` must be strictly positive so that Z'Z + αI stays positive definite
/// on rank-deficient windows (constant or collinear columns).
#[derive(Debug, Clone, PartialEq)]
pub struct StandardizedRidge {
    alpha: f64,
    fitted: Option<RidgeFit>,
}

#[derive(Debug, Clone, PartialEq)]
struct RidgeFit {
    scaler: StandardScaler,
    coefficients: Array1<f64>,
    intercept: f64,
}

impl StandardizedRidge {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            fitted: None,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Coefficients in the standardized feature space.
    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.fitted.as_ref().map(|f| &f.coefficients)
    }

    pub fn intercept(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.intercept)
    }
}

impl Regressor for StandardizedRidge {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        if !(self.alpha > 0.0) || !self.alpha.is_finite() {
            return Err(ModelError::InvalidAlpha(self.alpha));
        }
        if x.nrows() == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        if x.nrows() != y.len() {
            return Err(ModelError::DimensionMismatch {
                expected: x.nrows(),
                got: y.len(),
            });
        }

        let scaler = StandardScaler::fit(x)?;
        let z = scaler.transform(x)?;
        let y_mean = y.mean().ok_or(ModelError::EmptyTrainingSet)?;
        let y_centered = y - y_mean;

        let mut gram = z.t().dot(&z);
        for i in 0..gram.nrows() {
            gram[[i, i]] += self.alpha;
        }
        let rhs = z.t().dot(&y_centered);
        let coefficients = cholesky_solve(&gram, &rhs)?;

        self.fitted = Some(RidgeFit {
            scaler,
            coefficients,
            intercept: y_mean,
        });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let fit = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        let z = fit.scaler.transform(x)?;
        Ok(z.dot(&fit.coefficients) + fit.intercept)
    }
}

/// Solve `a · x = b` for symmetric positive-definite `a`.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>, ModelError> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return Err(ModelError::NotPositiveDefinite);
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * z[j]).sum();
        z[i] = (b[i] - sum) / l[[i, i]];
    }

    // L' x = z
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = (i + 1..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (z[i] - sum) / l[[i, i]];
    }

    Ok(x)
}
