//! Confidence interval around the composite, from a one-factor latent model
//! fit over a reference population of historical assessments.
//!
//! Strict path: standardize the reference matrix, take the dominant
//! eigenvector of its correlation matrix (power iteration, fixed seed) as
//! factor loadings, regress observed composites on the factor score, and use
//! the OLS prediction error at the company's factor score. The standard
//! error is stepped up by Spearman-Brown reliability before the 1.96 band.
//!
//! Whenever the reference is too thin or the fit degenerates, the estimator
//! runs the fallback instead: a deterministic width from average dimension
//! confidence. The method label always says which path produced the
//! interval.

use serde::Serialize;

use crate::config::SemSettings;
use crate::dimension::{clamp, Dimension, DimensionScore};
use crate::error::InsufficientEvidence;
use crate::evidence::ReferencePopulation;
use crate::score::SemMethod;

const Z_95: f64 = 1.96;
const POWER_ITERATION_ROUNDS: usize = 256;
const CONVERGENCE_EPS: f64 = 1e-12;
const DEGENERATE_EPS: f64 = 1e-9;

const K: usize = Dimension::COUNT;

#[derive(Debug, Clone, Serialize)]
pub struct SemInterval {
    pub method: SemMethod,
    pub standard_error: f64,
    pub lower: f64,
    pub upper: f64,
    /// Spearman-Brown stepped-up reliability; absent on the fallback path.
    pub reliability: Option<f64>,
}

/// Diagnostics of a successful fit, kept for audit snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct FitDiagnostics {
    pub reference_rows: usize,
    pub r_squared: f64,
    pub residual_sigma: f64,
    pub reliability: f64,
    pub mean_inter_correlation: f64,
}

#[derive(Debug, Clone)]
struct FittedFactorModel {
    col_means: [f64; K],
    col_stds: [f64; K],
    loadings: [f64; K],
    residual_sigma: f64,
    /// Sum of squared factor scores over the reference (their mean is zero).
    sxx: f64,
    n: usize,
    reliability: f64,
    r_squared: f64,
    mean_inter_correlation: f64,
}

/// Fit once per run, then ask for intervals per company.
#[derive(Debug, Clone)]
pub struct SemEstimator {
    settings: SemSettings,
    model: Option<FittedFactorModel>,
}

impl SemEstimator {
    /// Fits the factor model when the reference allows it; otherwise arms the
    /// fallback. Never fails: thin or degenerate references are a documented
    /// degradation, not an error.
    pub fn fit(reference: &ReferencePopulation, settings: &SemSettings) -> Self {
        match FittedFactorModel::fit(reference, settings) {
            Ok(model) => Self {
                settings: settings.clone(),
                model: Some(model),
            },
            Err(e) => {
                tracing::info!(
                    what = e.what,
                    have = e.have,
                    need = e.need,
                    "confidence model using fallback"
                );
                Self {
                    settings: settings.clone(),
                    model: None,
                }
            }
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    pub fn diagnostics(&self) -> Option<FitDiagnostics> {
        self.model.as_ref().map(|m| FitDiagnostics {
            reference_rows: m.n,
            r_squared: m.r_squared,
            residual_sigma: m.residual_sigma,
            reliability: m.reliability,
            mean_inter_correlation: m.mean_inter_correlation,
        })
    }

    /// Interval centered on the composite, clamped to <0, 100>.
    pub fn interval(&self, composite: f64, scores: &[DimensionScore]) -> SemInterval {
        match &self.model {
            Some(model) => {
                let se = model.prediction_se(scores);
                SemInterval {
                    method: SemMethod::OneFactor,
                    standard_error: se,
                    lower: clamp(composite - Z_95 * se, 0.0, 100.0),
                    upper: clamp(composite + Z_95 * se, 0.0, 100.0),
                    reliability: Some(model.reliability),
                }
            }
            None => {
                let avg_confidence = if scores.is_empty() {
                    0.0
                } else {
                    scores.iter().map(|s| s.confidence).sum::<f64>() / scores.len() as f64
                };
                // Multiplier spans [0.5, 1.5]: full confidence halves the
                // base width, zero confidence grows it by half.
                let se = self.settings.fallback_base_se * (1.5 - avg_confidence);
                SemInterval {
                    method: SemMethod::ConfidenceFallback,
                    standard_error: se,
                    lower: clamp(composite - Z_95 * se, 0.0, 100.0),
                    upper: clamp(composite + Z_95 * se, 0.0, 100.0),
                    reliability: None,
                }
            }
        }
    }
}

impl FittedFactorModel {
    fn fit(
        reference: &ReferencePopulation,
        settings: &SemSettings,
    ) -> Result<Self, InsufficientEvidence> {
        let n = reference.len();
        if n < settings.min_reference_observations {
            return Err(InsufficientEvidence {
                what: "sem reference rows",
                have: n,
                need: settings.min_reference_observations,
            });
        }
        // Residual degrees of freedom for the regression.
        if n < 3 {
            return Err(InsufficientEvidence {
                what: "sem reference rows",
                have: n,
                need: 3,
            });
        }

        let rows = &reference.dimension_rows[..n];
        let composites = &reference.composites[..n];

        let (col_means, col_stds) = column_stats(rows);
        let degenerate_cols = col_stds.iter().filter(|s| **s < DEGENERATE_EPS).count();
        if degenerate_cols > 0 {
            return Err(InsufficientEvidence {
                what: "sem reference column variance",
                have: K - degenerate_cols,
                need: K,
            });
        }

        // Standardized matrix and its correlation matrix.
        let z: Vec<[f64; K]> = rows
            .iter()
            .map(|row| {
                let mut out = [0.0; K];
                for j in 0..K {
                    out[j] = (row[j] - col_means[j]) / col_stds[j];
                }
                out
            })
            .collect();

        let corr = correlation(&z);
        let loadings = match dominant_loadings(&corr) {
            Some(l) => l,
            None => {
                return Err(InsufficientEvidence {
                    what: "sem factor convergence",
                    have: 0,
                    need: 1,
                })
            }
        };

        // Factor scores; their mean is zero because every column of z is.
        let eta: Vec<f64> = z.iter().map(|row| dot(row, &loadings)).collect();
        let sxx: f64 = eta.iter().map(|e| e * e).sum();
        if sxx < DEGENERATE_EPS {
            return Err(InsufficientEvidence {
                what: "sem factor variance",
                have: 0,
                need: 1,
            });
        }

        let y_mean = composites.iter().sum::<f64>() / n as f64;
        let sst: f64 = composites.iter().map(|y| (y - y_mean).powi(2)).sum();
        if sst < DEGENERATE_EPS {
            return Err(InsufficientEvidence {
                what: "sem composite variance",
                have: 0,
                need: 1,
            });
        }

        // OLS of composite on factor score.
        let sxy: f64 = eta
            .iter()
            .zip(composites.iter())
            .map(|(e, y)| e * (y - y_mean))
            .sum();
        let slope = sxy / sxx;
        let intercept = y_mean;

        let sse: f64 = eta
            .iter()
            .zip(composites.iter())
            .map(|(e, y)| {
                let fitted = intercept + slope * e;
                (y - fitted).powi(2)
            })
            .sum();
        let residual_sigma = (sse / (n - 2) as f64).sqrt();
        let r_squared = 1.0 - sse / sst;

        let mean_inter_correlation = mean_off_diagonal(&corr);
        let reliability =
            spearman_brown(mean_inter_correlation).clamp(settings.reliability_floor, 1.0);

        Ok(Self {
            col_means,
            col_stds,
            loadings,
            residual_sigma,
            sxx,
            n,
            reliability,
            r_squared,
            mean_inter_correlation,
        })
    }

    /// OLS prediction standard error at this company's factor score, widened
    /// by the reliability step-up.
    fn prediction_se(&self, scores: &[DimensionScore]) -> f64 {
        let mut z = [0.0; K];
        for ds in scores {
            let j = ds.dimension.index();
            z[j] = (ds.score - self.col_means[j]) / self.col_stds[j];
        }
        let eta0 = dot(&z, &self.loadings);

        let n = self.n as f64;
        let se_fit = self.residual_sigma * (1.0 + 1.0 / n + eta0 * eta0 / self.sxx).sqrt();
        se_fit / self.reliability.sqrt()
    }
}

/* ---- small numeric helpers (K = 7 keeps everything on the stack) ---- */

fn column_stats(rows: &[[f64; K]]) -> ([f64; K], [f64; K]) {
    let n = rows.len() as f64;
    let mut means = [0.0; K];
    for row in rows {
        for j in 0..K {
            means[j] += row[j];
        }
    }
    for m in means.iter_mut() {
        *m /= n;
    }

    let mut stds = [0.0; K];
    for row in rows {
        for j in 0..K {
            let d = row[j] - means[j];
            stds[j] += d * d;
        }
    }
    for s in stds.iter_mut() {
        *s = (*s / n).sqrt();
    }
    (means, stds)
}

fn correlation(z: &[[f64; K]]) -> [[f64; K]; K] {
    let n = z.len() as f64;
    let mut corr = [[0.0; K]; K];
    for row in z {
        for i in 0..K {
            for j in 0..K {
                corr[i][j] += row[i] * row[j];
            }
        }
    }
    for row in corr.iter_mut() {
        for v in row.iter_mut() {
            *v /= n;
        }
    }
    corr
}

/// Dominant eigenvector by power iteration from a fixed uniform seed, then
/// sign-aligned, clamped non-negative, and L1-normalized into loadings.
fn dominant_loadings(corr: &[[f64; K]; K]) -> Option<[f64; K]> {
    let mut v = [1.0 / (K as f64).sqrt(); K];
    let mut converged = false;

    for _ in 0..POWER_ITERATION_ROUNDS {
        let mut next = [0.0; K];
        for i in 0..K {
            for j in 0..K {
                next[i] += corr[i][j] * v[j];
            }
        }
        let norm = next.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm < DEGENERATE_EPS {
            return None;
        }
        for x in next.iter_mut() {
            *x /= norm;
        }
        let delta = next
            .iter()
            .zip(v.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        v = next;
        if delta < CONVERGENCE_EPS {
            converged = true;
            break;
        }
    }
    if !converged {
        return None;
    }

    // Eigenvector sign is arbitrary; point it at the positive orthant.
    if v.iter().sum::<f64>() < 0.0 {
        for x in v.iter_mut() {
            *x = -*x;
        }
    }
    for x in v.iter_mut() {
        if *x < 0.0 {
            *x = 0.0;
        }
    }
    let total: f64 = v.iter().sum();
    if total < DEGENERATE_EPS {
        return None;
    }
    for x in v.iter_mut() {
        *x /= total;
    }
    Some(v)
}

fn dot(a: &[f64; K], b: &[f64; K]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn mean_off_diagonal(corr: &[[f64; K]; K]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for i in 0..K {
        for j in 0..K {
            if i != j {
                sum += corr[i][j];
                count += 1;
            }
        }
    }
    sum / count as f64
}

/// Stepped-up reliability of the 7-item composite from the mean inter-item
/// correlation.
fn spearman_brown(mean_r: f64) -> f64 {
    let k = K as f64;
    let denom = 1.0 + (k - 1.0) * mean_r;
    if denom.abs() < DEGENERATE_EPS {
        return 0.0;
    }
    (k * mean_r / denom).clamp(0.0, 1.0)
}
