use super::ModelError;
use crate::models::MODEL_KIND;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Eigenvalues of the normalized Gram matrix below this fraction of the
/// largest one are treated as zero (rank deficiency).
const RELATIVE_EIGEN_CUTOFF: f64 = 1e-12;

const MAX_JACOBI_SWEEPS: usize = 100;

/// Ordinary least squares with an intercept.
///
/// Rank-deficient designs (constant columns, exact collinearity) resolve to
/// the minimum-norm solution, so a constant placeholder column simply gets a
/// zero coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    pub model_type: String,
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearRegression {
    /// Fit `y ≈ x · coefficients + intercept`.
    ///
    /// `x` is (rows × features), `y` has one entry per row.
    pub fn fit(
        feature_names: &[String],
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<Self, ModelError> {
        let (n_rows, n_features) = x.dim();

        if n_rows == 0 {
            return Err(ModelError::EmptyDataset);
        }
        if y.len() != n_rows {
            return Err(ModelError::DimensionMismatch {
                expected: n_rows,
                actual: y.len(),
            });
        }
        if feature_names.len() != n_features {
            return Err(ModelError::DimensionMismatch {
                expected: n_features,
                actual: feature_names.len(),
            });
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite);
        }

        let x_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_features));
        let y_mean = y.mean().unwrap_or(0.0);

        let centered = x - &x_mean;
        let y_centered = y - y_mean;

        // Column norms; zero-variance columns drop out of the solve
        let scales: Vec<f64> = centered
            .axis_iter(Axis(1))
            .map(|col| col.dot(&col).sqrt())
            .collect();
        let tolerance = f64::EPSILON * (n_rows as f64).sqrt();
        let active: Vec<usize> = (0..n_features)
            .filter(|&j| scales[j] > tolerance * (1.0 + x_mean[j].abs()))
            .collect();

        let mut coefficients = vec![0.0; n_features];

        if !active.is_empty() {
            let k = active.len();
            let mut z = Array2::<f64>::zeros((n_rows, k));
            for (slot, &j) in active.iter().enumerate() {
                let scaled = centered.column(j).mapv(|v| v / scales[j]);
                z.column_mut(slot).assign(&scaled);
            }

            let gram = z.t().dot(&z);
            let rhs = z.t().dot(&y_centered);
            let solution = min_norm_solve(gram, rhs.view());

            for (slot, &j) in active.iter().enumerate() {
                coefficients[j] = solution[slot] / scales[j];
            }
        }

        let intercept = y_mean
            - coefficients
                .iter()
                .zip(x_mean.iter())
                .map(|(c, m)| c * m)
                .sum::<f64>();

        Ok(Self {
            model_type: MODEL_KIND.to_string(),
            feature_names: feature_names.to_vec(),
            coefficients,
            intercept,
        })
    }

    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    /// Predict a single row
    pub fn predict_one(&self, features: &[f64]) -> Result<f64, ModelError> {
        if features.len() != self.coefficients.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.coefficients.len(),
                actual: features.len(),
            });
        }

        Ok(self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(c, x)| c * x)
                .sum::<f64>())
    }

    /// Predict every row of `x`
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        if x.ncols() != self.coefficients.len() {
            return Err(ModelError::DimensionMismatch {
                expected: self.coefficients.len(),
                actual: x.ncols(),
            });
        }

        let coefficients = Array1::from(self.coefficients.clone());
        Ok(x.dot(&coefficients) + self.intercept)
    }
}

/// Minimum-norm solution of the symmetric positive semi-definite system
/// `gram · w = rhs`, via its eigen-decomposition.
fn min_norm_solve(gram: Array2<f64>, rhs: ArrayView1<f64>) -> Array1<f64> {
    let (eigenvalues, eigenvectors) = symmetric_eigen(gram);

    let max_eigen = eigenvalues.iter().cloned().fold(0.0_f64, f64::max);
    let cutoff = RELATIVE_EIGEN_CUTOFF * max_eigen;

    let mut solution = Array1::<f64>::zeros(rhs.len());
    for (i, &lambda) in eigenvalues.iter().enumerate() {
        if lambda <= cutoff || lambda <= 0.0 {
            continue;
        }
        let v = eigenvectors.column(i);
        let weight = v.dot(&rhs) / lambda;
        solution.scaled_add(weight, &v);
    }
    solution
}

/// Cyclic Jacobi eigen-decomposition of a symmetric matrix.
///
/// Returns eigenvalues and the matrix whose columns are the eigenvectors.
fn symmetric_eigen(mut a: Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut v = Array2::<f64>::eye(n);

    let total: f64 = a.iter().map(|x| x * x).sum();
    if total == 0.0 {
        return (Array1::zeros(n), v);
    }

    for _ in 0..MAX_JACOBI_SWEEPS {
        let mut off_diagonal = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                off_diagonal += a[[p, q]] * a[[p, q]];
            }
        }
        if off_diagonal <= total * 1e-30 {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }

                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    (a.diag().to_owned(), v)
}
