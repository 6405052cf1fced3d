//! Maximum-likelihood logistic regression for the hesitancy outcome
//!
//! Newton-Raphson on the log-likelihood with step halving. Standard errors come
//! from the inverse observed information at the optimum; odds ratios and 95%
//! Wald intervals are exponentiated coefficients.

use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView1, Zip};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};

use crate::algorithm::encoding::{FeatureMatrix, INTERCEPT_COLUMN};
use crate::config::{ModelConfig, WALD_Z};
use crate::error::{AnalysisError, Result};

/// Fitted probabilities this close to the outcome count as perfect prediction
const SEPARATION_TOLERANCE: f64 = 1e-10;
/// Step halvings tried before accepting a non-improving step
const MAX_STEP_HALVINGS: usize = 30;

/// Numerically stable logistic function
#[inline]
#[must_use]
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^z)` without overflow
#[inline]
fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

fn log_likelihood(x: &Array2<f64>, y: &Array1<f64>, beta: &Array1<f64>) -> f64 {
    let eta = x.dot(beta);
    Zip::from(&eta)
        .and(y)
        .fold(0.0, |acc, &e, &yi| acc + yi * e - softplus(e))
}

/// Convert a square ndarray matrix for factorization
fn to_dmatrix(m: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(m.nrows(), m.ncols(), |i, j| m[[i, j]])
}

/// Observed information `XᵀWX` at `p`
fn information(x: &Array2<f64>, p: &Array1<f64>) -> Array2<f64> {
    let mut weighted = x.clone();
    for (mut row, &pi) in weighted.rows_mut().into_iter().zip(p) {
        row *= pi * (1.0 - pi);
    }
    x.t().dot(&weighted)
}

/// One row of the odds-ratio table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsRatioRow {
    /// Design column name
    pub feature: String,
    /// Estimated coefficient
    pub coefficient: f64,
    /// `exp(coefficient)`
    pub odds_ratio: f64,
    /// `exp(coefficient - 1.96·SE)`
    pub conf_int_lower: f64,
    /// `exp(coefficient + 1.96·SE)`
    pub conf_int_upper: f64,
    /// Two-sided Wald p-value
    pub p_value: f64,
}

impl OddsRatioRow {
    /// Whether the factor raises the odds of hesitancy
    #[must_use]
    pub fn increases_odds(&self) -> bool {
        self.coefficient > 0.0
    }
}

/// Absolute effect sizes, largest coefficient first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportanceRow {
    /// Design column name
    pub feature: String,
    /// `|coefficient|`
    pub coefficient: f64,
    /// `|odds_ratio|`
    pub odds_ratio: f64,
    /// `|conf_int_lower|`
    pub conf_int_lower: f64,
    /// `|conf_int_upper|`
    pub conf_int_upper: f64,
    /// p-value
    pub p_value: f64,
}

/// An immutable fitted model
#[derive(Debug, Clone)]
pub struct FittedModel {
    features: Vec<String>,
    coefficients: Array1<f64>,
    std_errors: Array1<f64>,
    z_values: Array1<f64>,
    p_values: Array1<f64>,
    log_likelihood: f64,
    null_log_likelihood: f64,
    n_obs: usize,
    iterations: usize,
}

impl FittedModel {
    /// Design column names in coefficient order
    #[must_use]
    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Fitted coefficients in design column order
    #[must_use]
    pub const fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    /// Wald standard errors
    #[must_use]
    pub const fn std_errors(&self) -> &Array1<f64> {
        &self.std_errors
    }

    /// Wald z statistics
    #[must_use]
    pub const fn z_values(&self) -> &Array1<f64> {
        &self.z_values
    }

    /// Two-sided Wald p-values
    #[must_use]
    pub const fn p_values(&self) -> &Array1<f64> {
        &self.p_values
    }

    /// Coefficient for a named design column
    #[must_use]
    pub fn coefficient(&self, feature: &str) -> Option<f64> {
        self.features
            .iter()
            .position(|f| f == feature)
            .map(|idx| self.coefficients[idx])
    }

    /// Log-likelihood at the optimum
    #[must_use]
    pub const fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    /// Log-likelihood of the intercept-only model
    #[must_use]
    pub const fn null_log_likelihood(&self) -> f64 {
        self.null_log_likelihood
    }

    /// Rows used in the fit
    #[must_use]
    pub const fn n_obs(&self) -> usize {
        self.n_obs
    }

    /// Newton iterations used
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.iterations
    }

    /// Number of estimated parameters
    #[must_use]
    pub fn n_params(&self) -> usize {
        self.coefficients.len()
    }

    /// Model degrees of freedom (parameters excluding the intercept)
    #[must_use]
    pub fn df_model(&self) -> usize {
        self.n_params().saturating_sub(1)
    }

    /// Residual degrees of freedom
    #[must_use]
    pub fn df_resid(&self) -> usize {
        self.n_obs.saturating_sub(self.n_params())
    }

    /// Akaike information criterion
    #[must_use]
    pub fn aic(&self) -> f64 {
        2.0 * self.n_params() as f64 - 2.0 * self.log_likelihood
    }

    /// Bayesian information criterion
    #[must_use]
    pub fn bic(&self) -> f64 {
        (self.n_obs as f64).ln() * self.n_params() as f64 - 2.0 * self.log_likelihood
    }

    /// McFadden pseudo R²
    #[must_use]
    pub fn pseudo_r_squared(&self) -> f64 {
        1.0 - self.log_likelihood / self.null_log_likelihood
    }

    /// Likelihood-ratio statistic against the null model
    #[must_use]
    pub fn llr(&self) -> f64 {
        2.0 * (self.log_likelihood - self.null_log_likelihood)
    }

    /// p-value of the likelihood-ratio test; `None` for an intercept-only model
    #[must_use]
    pub fn llr_p_value(&self) -> Option<f64> {
        let df = self.df_model();
        if df == 0 {
            return None;
        }
        ChiSquared::new(df as f64).ok().map(|dist| dist.sf(self.llr()))
    }

    /// One row per design column, in design order
    #[must_use]
    pub fn odds_ratios(&self) -> Vec<OddsRatioRow> {
        self.features
            .iter()
            .enumerate()
            .map(|(i, feature)| {
                let coefficient = self.coefficients[i];
                let margin = WALD_Z * self.std_errors[i];
                OddsRatioRow {
                    feature: feature.clone(),
                    coefficient,
                    odds_ratio: coefficient.exp(),
                    conf_int_lower: (coefficient - margin).exp(),
                    conf_int_upper: (coefficient + margin).exp(),
                    p_value: self.p_values[i],
                }
            })
            .collect()
    }

    /// Non-intercept factors with `p < alpha`, highest odds ratio first
    #[must_use]
    pub fn significant_factors(&self, alpha: f64) -> Vec<OddsRatioRow> {
        let mut rows: Vec<OddsRatioRow> = self
            .odds_ratios()
            .into_iter()
            .filter(|row| row.feature != INTERCEPT_COLUMN && row.p_value < alpha)
            .collect();
        rows.sort_by(|a, b| b.odds_ratio.total_cmp(&a.odds_ratio));
        rows
    }

    /// Absolute odds-ratio table ordered by `|coefficient|` descending
    #[must_use]
    pub fn feature_importance(&self) -> Vec<FeatureImportanceRow> {
        let mut rows: Vec<FeatureImportanceRow> = self
            .odds_ratios()
            .into_iter()
            .map(|row| FeatureImportanceRow {
                feature: row.feature,
                coefficient: row.coefficient.abs(),
                odds_ratio: row.odds_ratio.abs(),
                conf_int_lower: row.conf_int_lower.abs(),
                conf_int_upper: row.conf_int_upper.abs(),
                p_value: row.p_value.abs(),
            })
            .collect();
        rows.sort_by(|a, b| b.coefficient.total_cmp(&a.coefficient));
        rows
    }

    /// Predicted probability of hesitancy for each row of a matrix encoded with the same manifest
    ///
    /// # Errors
    /// `ModelFit` when the matrix columns differ from the fitted ones
    pub fn predict_proba(&self, matrix: &FeatureMatrix) -> Result<Array1<f64>> {
        if matrix.columns != self.features {
            return Err(AnalysisError::ModelFit(format!(
                "design columns [{}] do not match fitted columns [{}]",
                matrix.columns.join(", "),
                self.features.join(", ")
            )));
        }
        Ok(matrix.values.dot(&self.coefficients).mapv(sigmoid))
    }
}

/// Logistic regression estimator
#[derive(Debug, Clone, Default)]
pub struct HesitancyModel {
    config: ModelConfig,
}

impl HesitancyModel {
    #[must_use]
    pub const fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Fit the model by maximum likelihood
    ///
    /// # Errors
    /// `ModelFit` on a malformed outcome, a single outcome class, a rank-deficient
    /// design, perfect separation, non-convergence or non-finite estimates
    pub fn fit(&self, matrix: &FeatureMatrix, outcome: &Array1<f64>) -> Result<FittedModel> {
        let x = &matrix.values;
        let (n, k) = x.dim();

        validate_inputs(matrix, outcome)?;
        check_rank(matrix)?;

        let mut beta = Array1::<f64>::zeros(k);
        let mut ll = log_likelihood(x, outcome, &beta);
        let mut converged = false;
        let mut iterations = 0;

        while iterations < self.config.max_iterations {
            iterations += 1;
            let p = x.dot(&beta).mapv(sigmoid);
            if is_separated(p.view(), outcome.view()) {
                return Err(separation_error());
            }

            let gradient = x.t().dot(&(outcome - &p));
            let step = solve_information(&information(x, &p), &gradient, &matrix.columns)?;

            let mut scale = 1.0;
            let mut candidate = &beta + &step;
            let mut candidate_ll = log_likelihood(x, outcome, &candidate);
            let mut halvings = 0;
            while !(candidate_ll.is_finite() && candidate_ll >= ll) && halvings < MAX_STEP_HALVINGS {
                scale *= 0.5;
                candidate = &beta + &(&step * scale);
                candidate_ll = log_likelihood(x, outcome, &candidate);
                halvings += 1;
            }

            let change = (&candidate - &beta)
                .iter()
                .fold(0.0_f64, |acc, d| acc.max(d.abs()));
            debug!(
                "Newton iteration {iterations}: log-likelihood {candidate_ll:.6}, max change {change:.3e}, halvings {halvings}"
            );

            beta = candidate;
            ll = candidate_ll;
            if !ll.is_finite() || beta.iter().any(|b| !b.is_finite()) {
                return Err(AnalysisError::ModelFit(
                    "log-likelihood diverged to a non-finite value".to_string(),
                ));
            }
            if change < self.config.tolerance {
                converged = true;
                break;
            }
        }

        let p = x.dot(&beta).mapv(sigmoid);
        if is_separated(p.view(), outcome.view()) {
            return Err(separation_error());
        }
        if !converged {
            return Err(AnalysisError::ModelFit(format!(
                "failed to converge after {iterations} iterations; check for quasi-separation or rescale continuous features"
            )));
        }

        let covariance = invert_information(&information(x, &p), &matrix.columns)?;
        let std_errors: Array1<f64> = covariance.diag().mapv(f64::sqrt);
        if std_errors.iter().any(|s| !s.is_finite()) {
            return Err(AnalysisError::ModelFit(
                "standard errors are not finite; the information matrix is near-singular".to_string(),
            ));
        }

        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| AnalysisError::ModelFit(format!("normal distribution: {e}")))?;
        let z_values = &beta / &std_errors;
        let p_values = z_values.mapv(|z| 2.0 * normal.sf(z.abs()));

        let y_mean = outcome.mean().unwrap_or(0.0);
        let null_log_likelihood =
            n as f64 * (y_mean * y_mean.ln() + (1.0 - y_mean) * (1.0 - y_mean).ln());

        let model = FittedModel {
            features: matrix.columns.clone(),
            coefficients: beta,
            std_errors,
            z_values,
            p_values,
            log_likelihood: ll,
            null_log_likelihood,
            n_obs: n,
            iterations,
        };
        info!(
            "Logit converged in {} iterations: log-likelihood {:.3}, AIC {:.2}, pseudo R² {:.3}",
            model.iterations(),
            model.log_likelihood(),
            model.aic(),
            model.pseudo_r_squared()
        );
        Ok(model)
    }
}

fn validate_inputs(matrix: &FeatureMatrix, outcome: &Array1<f64>) -> Result<()> {
    let (n, k) = matrix.values.dim();
    if outcome.len() != n {
        return Err(AnalysisError::ModelFit(format!(
            "outcome has {} values but the design has {n} rows",
            outcome.len()
        )));
    }
    if matrix.columns.len() != k {
        return Err(AnalysisError::ModelFit(format!(
            "{} column names for {k} design columns",
            matrix.columns.len()
        )));
    }
    if n <= k {
        return Err(AnalysisError::ModelFit(format!(
            "{n} observations cannot identify {k} parameters"
        )));
    }
    if matrix.values.iter().any(|v| !v.is_finite()) {
        return Err(AnalysisError::ModelFit(
            "design matrix contains non-finite values".to_string(),
        ));
    }
    if outcome.iter().any(|&v| v != 0.0 && v != 1.0) {
        return Err(AnalysisError::ModelFit(
            "outcome must be coded 0/1".to_string(),
        ));
    }
    let positives = outcome.sum();
    if positives == 0.0 || positives == n as f64 {
        return Err(AnalysisError::ModelFit(
            "perfect separation: the outcome has a single class".to_string(),
        ));
    }
    Ok(())
}

/// Reject rank-deficient designs before iterating
fn check_rank(matrix: &FeatureMatrix) -> Result<()> {
    let x = &matrix.values;
    let (n, k) = x.dim();
    let xtx = to_dmatrix(&x.t().dot(x));
    let singular = xtx.svd(false, false).singular_values;
    let max_s = singular.iter().copied().fold(0.0_f64, f64::max);
    let tolerance = max_s * n.max(k) as f64 * f64::EPSILON;
    let rank = singular.iter().filter(|&&s| s > tolerance).count();
    if rank == k {
        return Ok(());
    }

    let constant: Vec<&str> = matrix
        .columns
        .iter()
        .enumerate()
        .filter(|(j, name)| {
            name.as_str() != INTERCEPT_COLUMN && is_constant(x.column(*j))
        })
        .map(|(_, name)| name.as_str())
        .collect();
    let detail = if constant.is_empty() {
        String::new()
    } else {
        format!("; constant columns: {}", constant.join(", "))
    };
    Err(AnalysisError::ModelFit(format!(
        "design matrix is rank deficient (rank {rank} < {k} columns); features are collinear{detail}"
    )))
}

fn is_constant(column: ArrayView1<'_, f64>) -> bool {
    column
        .first()
        .is_none_or(|first| column.iter().all(|v| v == first))
}

fn is_separated(p: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> bool {
    Zip::from(p)
        .and(y)
        .all(|&pi, &yi| (pi - yi).abs() < SEPARATION_TOLERANCE)
}

fn separation_error() -> AnalysisError {
    AnalysisError::ModelFit(
        "perfect separation: fitted probabilities reproduce the outcome exactly".to_string(),
    )
}

fn singular_error(columns: &[String]) -> AnalysisError {
    AnalysisError::ModelFit(format!(
        "information matrix is not positive definite; collinear features among [{}]",
        columns.join(", ")
    ))
}

fn solve_information(
    info: &Array2<f64>,
    gradient: &Array1<f64>,
    columns: &[String],
) -> Result<Array1<f64>> {
    let chol = to_dmatrix(info)
        .cholesky()
        .ok_or_else(|| singular_error(columns))?;
    let step = chol.solve(&DVector::from_iterator(gradient.len(), gradient.iter().copied()));
    Ok(Array1::from_iter(step.iter().copied()))
}

fn invert_information(info: &Array2<f64>, columns: &[String]) -> Result<Array2<f64>> {
    let inverse = to_dmatrix(info)
        .cholesky()
        .ok_or_else(|| singular_error(columns))?
        .inverse();
    let k = inverse.nrows();
    Ok(Array2::from_shape_fn((k, k), |(i, j)| inverse[(i, j)]))
}
