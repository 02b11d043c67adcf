use serde::Serialize;
use thiserror::Error;

use super::filter::View;
use super::model::Measure;

/// Number of evenly spaced samples used to draw a fitted line.
pub const FIT_CURVE_SAMPLES: usize = 100;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum RegressionError {
    #[error("not enough data points for regression ({usable} usable, need at least 2)")]
    InsufficientData { usable: usize },

    /// Every usable x is the same value, so no slope exists.
    #[error("all x values equal {x}; the slope is undefined")]
    ConstantX { x: f64 },
}

// ---------------------------------------------------------------------------
// LineFit
// ---------------------------------------------------------------------------

/// Ordinary least-squares fit of `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineFit {
    pub x: Measure,
    pub y: Measure,
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination. NaN when every y is identical.
    pub r_squared: f64,
    /// Rows that had both values and took part in the fit.
    pub usable: usize,
    pub x_min: f64,
    pub x_max: f64,
}

impl LineFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    /// `samples` evenly spaced points along the line over `[x_min, x_max]`,
    /// both ends included.
    pub fn curve(&self, samples: usize) -> Vec<[f64; 2]> {
        match samples {
            0 => Vec::new(),
            1 => vec![[self.x_min, self.predict(self.x_min)]],
            _ => {
                let step = (self.x_max - self.x_min) / (samples - 1) as f64;
                (0..samples)
                    .map(|i| {
                        let x = if i == samples - 1 {
                            self.x_max
                        } else {
                            self.x_min + step * i as f64
                        };
                        [x, self.predict(x)]
                    })
                    .collect()
            }
        }
    }

    /// Human-readable model, e.g.
    /// `Percent Affordable = 1.234 + 0.00567 × Total Assisted Units`.
    pub fn equation(&self) -> String {
        format!(
            "{} = {:.3} + {:.5} × {}",
            self.y, self.intercept, self.slope, self.x
        )
    }
}

// ---------------------------------------------------------------------------
// Fitting
// ---------------------------------------------------------------------------

/// Fit `y` against `x` over the rows of `view` that have both values.
pub fn fit_line(view: &View<'_>, x: Measure, y: Measure) -> Result<LineFit, RegressionError> {
    let points: Vec<(f64, f64)> = view
        .iter()
        .filter_map(|obs| Some((x.value(obs)?, y.value(obs)?)))
        .collect();
    fit_points(&points, x, y)
}

/// Closed-form OLS on mean-centred sums.
fn fit_points(points: &[(f64, f64)], x: Measure, y: Measure) -> Result<LineFit, RegressionError> {
    let usable = points.len();
    if usable < 2 {
        return Err(RegressionError::InsufficientData { usable });
    }

    let n = usable as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut ss_tot = 0.0;
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    for &(xi, yi) in points {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        ss_tot += dy * dy;
        x_min = x_min.min(xi);
        x_max = x_max.max(xi);
    }

    // Compare the extremes: rounding in `mean_x` can leave `sxx` a hair above zero.
    if x_min == x_max {
        return Err(RegressionError::ConstantX { x: x_min });
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let ss_res: f64 = points
        .iter()
        .map(|&(xi, yi)| {
            let resid = yi - (intercept + slope * xi);
            resid * resid
        })
        .sum();
    let r_squared = if ss_tot == 0.0 {
        f64::NAN
    } else {
        1.0 - ss_res / ss_tot
    };

    Ok(LineFit {
        x,
        y,
        slope,
        intercept,
        r_squared,
        usable,
        x_min,
        x_max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::{by_year, View};
    use crate::data::model::{HousingDataset, Observation};
    use crate::data::test_support::sample_dataset;

    const X: Measure = Measure::TotalAssistedUnits;
    const Y: Measure = Measure::PercentAffordable;

    fn dataset(points: &[(Option<f64>, Option<f64>)]) -> HousingDataset {
        HousingDataset::from_observations(
            points
                .iter()
                .enumerate()
                .map(|(i, &(x, y))| {
                    Observation::new(format!("Town {i}"), 2015)
                        .with(X, x)
                        .with(Y, y)
                })
                .collect(),
        )
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn perfectly_linear_points() {
        let ds = dataset(&[(Some(1.0), Some(2.0)), (Some(2.0), Some(4.0)), (Some(3.0), Some(6.0))]);
        let fit = fit_line(&View::all(&ds), X, Y).unwrap();
        assert!(close(fit.slope, 2.0));
        assert!(close(fit.intercept, 0.0));
        assert!(close(fit.r_squared, 1.0));
        assert_eq!(fit.usable, 3);
        assert_eq!((fit.x, fit.y), (X, Y));
    }

    #[test]
    fn constant_y_reports_nan_r_squared() {
        let ds = dataset(&[(Some(1.0), Some(5.0)), (Some(2.0), Some(5.0)), (Some(3.0), Some(5.0))]);
        let fit = fit_line(&View::all(&ds), X, Y).unwrap();
        assert!(close(fit.slope, 0.0));
        assert!(close(fit.intercept, 5.0));
        assert!(fit.r_squared.is_nan());
    }

    #[test]
    fn single_usable_row_is_insufficient() {
        let ds = dataset(&[(Some(1.0), Some(2.0)), (None, Some(4.0)), (Some(3.0), None)]);
        assert_eq!(
            fit_line(&View::all(&ds), X, Y),
            Err(RegressionError::InsufficientData { usable: 1 })
        );
        assert_eq!(
            fit_line(&View::default(), X, Y),
            Err(RegressionError::InsufficientData { usable: 0 })
        );
    }

    #[test]
    fn constant_x_is_rejected() {
        let ds = dataset(&[(Some(4.0), Some(1.0)), (Some(4.0), Some(3.0))]);
        assert_eq!(
            fit_line(&View::all(&ds), X, Y),
            Err(RegressionError::ConstantX { x: 4.0 })
        );
    }

    #[test]
    fn repeated_fractional_x_is_rejected() {
        let ds = dataset(&[
            (Some(0.1), Some(1.0)),
            (Some(0.1), Some(2.0)),
            (Some(0.1), Some(4.0)),
        ]);
        assert_eq!(
            fit_line(&View::all(&ds), X, Y),
            Err(RegressionError::ConstantX { x: 0.1 })
        );
    }

    #[test]
    fn rows_with_missing_values_are_excluded() {
        let ds = dataset(&[
            (Some(0.0), Some(1.0)),
            (Some(1.0), None),
            (None, Some(100.0)),
            (Some(2.0), Some(5.0)),
        ]);
        let fit = fit_line(&View::all(&ds), X, Y).unwrap();
        assert_eq!(fit.usable, 2);
        assert!(close(fit.slope, 2.0));
        assert!(close(fit.intercept, 1.0));
    }

    #[test]
    fn noisy_fit_has_r_squared_between_zero_and_one() {
        let ds = dataset(&[
            (Some(1.0), Some(1.0)),
            (Some(2.0), Some(3.0)),
            (Some(3.0), Some(2.0)),
            (Some(4.0), Some(5.0)),
        ]);
        let fit = fit_line(&View::all(&ds), X, Y).unwrap();
        // SS_res = 2.7, SS_tot = 8.75
        assert!(close(fit.slope, 1.1));
        assert!(close(fit.intercept, 0.0));
        assert!(close(fit.r_squared, 1.0 - 2.7 / 8.75));
    }

    #[test]
    fn curve_spans_observed_x_range() {
        let ds = dataset(&[(Some(10.0), Some(1.0)), (Some(30.0), Some(3.0)), (Some(20.0), Some(2.5))]);
        let fit = fit_line(&View::all(&ds), X, Y).unwrap();
        let curve = fit.curve(FIT_CURVE_SAMPLES);
        assert_eq!(curve.len(), 100);
        assert_eq!(curve[0][0], 10.0);
        assert_eq!(curve[99][0], 30.0);
        assert!(curve.windows(2).all(|w| w[0][0] < w[1][0]));
        assert!(curve.iter().all(|&[x, y]| close(y, fit.predict(x))));
        assert!(fit.curve(0).is_empty());
    }

    #[test]
    fn equation_formats_coefficients() {
        let ds = dataset(&[(Some(1.0), Some(2.0)), (Some(2.0), Some(4.0))]);
        let fit = fit_line(&View::all(&ds), X, Y).unwrap();
        assert_eq!(
            fit.equation(),
            "Percent Affordable = 0.000 + 2.00000 × Total Assisted Units"
        );
    }

    #[test]
    fn fits_a_real_year() {
        let ds = sample_dataset();
        let fit = fit_line(&by_year(&ds, 2019), X, Y).unwrap();
        assert_eq!(fit.usable, by_year(&ds, 2019).len());
        assert!(fit.r_squared.is_finite());
        assert!(fit.x_min <= fit.x_max);
    }
}
