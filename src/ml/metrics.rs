//! In-sample goodness-of-fit statistics.

use ndarray::Array1;

/// R² at or above this is flagged as suspiciously high
pub const OVERFIT_R2: f64 = 0.95;

/// R² below this is flagged as a weak fit
pub const WEAK_FIT_R2: f64 = 0.5;

/// Mean squared residual
pub fn mean_squared_error(actual: &Array1<f64>, predicted: &Array1<f64>) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let residuals = actual - predicted;
    residuals.dot(&residuals) / actual.len() as f64
}

/// Coefficient of determination, `1 - SS_res / SS_tot`.
///
/// A constant target has `SS_tot = 0`; the score is then 1.0 for an exact
/// fit and 0.0 otherwise.
pub fn r2_score(actual: &Array1<f64>, predicted: &Array1<f64>) -> f64 {
    let mean = actual.mean().unwrap_or(0.0);
    let residuals = actual - predicted;
    let ss_res = residuals.dot(&residuals);
    let deviations = actual - mean;
    let ss_tot = deviations.dot(&deviations);

    if ss_tot == 0.0 {
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    }
}

/// One-line reading of an R² value for humans
pub fn interpret_r2(r2: f64) -> &'static str {
    if r2 >= OVERFIT_R2 {
        "R² very close to 1.0, which might indicate overfitting."
    } else if r2 < WEAK_FIT_R2 {
        "R² below 0.5, model may not be explaining data well."
    } else {
        "R² in reasonable range."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_mse() {
        let actual = array![1.0, 2.0, 3.0];
        let predicted = array![1.0, 2.0, 5.0];
        assert!((mean_squared_error(&actual, &predicted) - 4.0 / 3.0).abs() < 1e-12);
        assert_eq!(mean_squared_error(&Array1::zeros(0), &Array1::zeros(0)), 0.0);
    }

    #[test]
    fn test_r2_perfect_and_mean_predictor() {
        let actual = array![1.0, 2.0, 3.0, 4.0];
        assert_eq!(r2_score(&actual, &actual.clone()), 1.0);

        let mean_only = array![2.5, 2.5, 2.5, 2.5];
        assert!(r2_score(&actual, &mean_only).abs() < 1e-12);
    }

    #[test]
    fn test_r2_constant_target() {
        let actual = array![5.0, 5.0];
        assert_eq!(r2_score(&actual, &array![5.0, 5.0]), 1.0);
        assert_eq!(r2_score(&actual, &array![4.0, 6.0]), 0.0);
    }

    #[test]
    fn test_interpretation_bands() {
        assert!(interpret_r2(0.99).contains("overfitting"));
        assert!(interpret_r2(0.95).contains("overfitting"));
        assert!(interpret_r2(0.3).contains("below 0.5"));
        assert_eq!(interpret_r2(0.7), "R² in reasonable range.");
        assert_eq!(interpret_r2(0.5), "R² in reasonable range.");
    }
}
