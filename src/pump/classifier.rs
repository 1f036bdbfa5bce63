// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use log::debug;
use nalgebra::storage::Owned;
use nalgebra::{DMatrix, DVector, Dyn, OMatrix, Vector2, U2};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Growth class assigned to a series of `(subject length, cost)`
/// measurements.  The classifier fits four competing models and
/// labels the series with the winner, provided the winner explains
/// the data well enough (R-squared above 0.95).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Classification {
    /// Cost grows linearly; carries the p-value of the slope.
    Linear { p_value: f64 },
    /// Cost fits an integer-degree polynomial.  `should_break` is set
    /// when the fitted curve predicts at least 10^9 cost for a
    /// 100,000-character subject -- the signal that pumping further
    /// is pointless and the pumper should stop early.
    Polynomial {
        r_squared: f64,
        degree: u32,
        leading_coefficient: f64,
        should_break: bool,
    },
    /// Cost grows exponentially.
    Exponential { r_squared: f64 },
    /// No model explained the data.
    Unknown,
}

impl Classification {
    /// Whether this classification should terminate the pump search
    /// immediately: either an exponential shape, or a polynomial
    /// whose horizon prediction crossed the break threshold.
    pub fn is_fastbreak(&self) -> bool {
        match self {
            Classification::Exponential { .. } => true,
            Classification::Polynomial { should_break, .. } => *should_break,
            _ => false,
        }
    }
}

/// Fit linear, power, polynomial and log-linear models to the given
/// points and select a growth class.
///
/// The power fit is the gateway to the polynomial fit but is itself
/// too permissive to emit directly; the polynomial fit both confirms
/// the integer-degree shape and supplies the leading coefficient used
/// for tie-breaking between candidate pump sites.  The exponential
/// fit is guarded against flat models (`exp(slope) < 0.001`).  Linear
/// wins outright only at a very tight fit, since a polynomial of
/// degree one is also linear.
pub fn classify(xs: &[f64], ys: &[f64]) -> Classification {
    // Filter out zeros, which the logarithmic models cannot handle.
    let (xs, ys): (Vec<f64>, Vec<f64>) = xs
        .iter()
        .zip(ys)
        .filter(|(x, y)| **x != 0.0 && **y != 0.0)
        .map(|(x, y)| (*x, *y))
        .unzip();
    if xs.len() < 4 {
        return Classification::Unknown;
    }
    // Log-linear fit (for exponential growth).
    let ys_log: Vec<f64> = ys.iter().map(|y| y.ln()).collect();
    let (slope, intercept, _, _) = linregress(&xs, &ys_log);
    let yhat: Vec<f64> = xs.iter().map(|x| intercept.exp() * (slope * x).exp()).collect();
    let mut r_sq_exp = r_squared(&ys, &yhat);
    if slope.exp() < 0.001 {
        // Probably not a great model.
        r_sq_exp = 0.0;
    }
    // Power fit, with its horizon prediction.
    let mut r_sq_power = 0.0;
    let mut power_exponent = 0.0;
    let mut should_break = false;
    if let Some((a, b)) = fit_power(&xs, &ys) {
        let yhat: Vec<f64> = xs.iter().map(|x| a * x.powf(b)).collect();
        r_sq_power = r_squared(&ys, &yhat);
        power_exponent = b;
        if a * 100_000f64.powf(b) > 1e9 {
            should_break = true;
        }
    }
    // If power regression seemed really good, try a polynomial fit of
    // the rounded degree.
    let mut r_sq_poly = 0.0;
    let mut degree = 0i64;
    let mut leading_coefficient = 0.0;
    let rounded = power_exponent.round() as i64;
    if r_sq_power > 0.95 && rounded >= 1 {
        degree = rounded;
        if let Some(coefficients) = fit_polynomial(&xs, &ys, degree as usize) {
            let yhat: Vec<f64> = xs.iter().map(|x| eval_polynomial(&coefficients, *x)).collect();
            r_sq_poly = r_squared(&ys, &yhat);
            leading_coefficient = coefficients[degree as usize];
        }
    }
    // Linear regression.
    let (_, _, r_lin, p_lin) = linregress(&xs, &ys);
    let r_sq_lin = r_lin * r_lin;
    debug!(
        "fits: lin={:.4} poly={:.4} exp={:.4} power={:.4}",
        r_sq_lin, r_sq_poly, r_sq_exp, r_sq_power
    );
    if r_sq_lin > 0.9999 {
        return Classification::Linear { p_value: p_lin };
    }
    if r_sq_lin.max(r_sq_poly).max(r_sq_exp) > 0.95 {
        if r_sq_exp > r_sq_poly && r_sq_exp > r_sq_lin {
            return Classification::Exponential { r_squared: r_sq_exp };
        }
        if r_sq_poly > r_sq_exp && r_sq_poly > r_sq_lin && degree > 1 {
            return Classification::Polynomial {
                r_squared: r_sq_poly,
                degree: degree as u32,
                leading_coefficient,
                should_break,
            };
        }
        return Classification::Linear { p_value: p_lin };
    }
    Classification::Unknown
}

// ============================================================================
// Ordinary least squares
// ============================================================================

/// Ordinary least squares of `ys` against `xs`.  Returns `(slope,
/// intercept, r, p)` where `r` is the correlation coefficient and `p`
/// the two-sided p-value for a non-zero slope, computed from the
/// Student t distribution with `n - 2` degrees of freedom.
fn linregress(xs: &[f64], ys: &[f64]) -> (f64, f64, f64, f64) {
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let mut ss_xx = 0.0;
    let mut ss_yy = 0.0;
    let mut ss_xy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        ss_xx += (x - mean_x) * (x - mean_x);
        ss_yy += (y - mean_y) * (y - mean_y);
        ss_xy += (x - mean_x) * (y - mean_y);
    }
    if ss_xx == 0.0 {
        // A vertical series carries no slope information.
        return (0.0, mean_y, 0.0, 1.0);
    }
    let slope = ss_xy / ss_xx;
    let intercept = mean_y - slope * mean_x;
    let r = if ss_yy == 0.0 {
        0.0
    } else {
        ss_xy / (ss_xx * ss_yy).sqrt()
    };
    let df = n - 2.0;
    let denominator = 1.0 - r * r;
    let p = if df <= 0.0 {
        1.0
    } else if denominator <= f64::EPSILON {
        // A perfect fit leaves nothing for the null hypothesis.
        0.0
    } else {
        let t = r * (df / denominator).sqrt();
        let dist = StudentsT::new(0.0, 1.0, df).expect("valid t distribution");
        2.0 * (1.0 - dist.cdf(t.abs()))
    };
    (slope, intercept, r, p)
}

/// Coefficient of determination of a prediction against the observed
/// values.  A constant series carries no information about growth, so
/// it scores zero rather than dividing by zero.
fn r_squared(ys: &[f64], yhat: &[f64]) -> f64 {
    let n = ys.len() as f64;
    let mean_y = ys.iter().sum::<f64>() / n;
    let ss_res: f64 = ys.iter().zip(yhat).map(|(y, p)| (y - p) * (y - p)).sum();
    let ss_tot: f64 = ys.iter().map(|y| (y - mean_y) * (y - mean_y)).sum();
    if ss_tot == 0.0 {
        0.0
    } else {
        1.0 - ss_res / ss_tot
    }
}

// ============================================================================
// Power fit (non-linear least squares)
// ============================================================================

/// The model `y = a * x^b`, fitted by Levenberg-Marquardt from the
/// initial guess `(a, b) = (1, 2)`.
struct PowerFit {
    xs: DVector<f64>,
    ys: DVector<f64>,
    params: Vector2<f64>,
}

impl LeastSquaresProblem<f64, Dyn, U2> for PowerFit {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, U2>;
    type ParameterStorage = Owned<f64, U2>;

    fn set_params(&mut self, params: &Vector2<f64>) {
        self.params = *params;
    }

    fn params(&self) -> Vector2<f64> {
        self.params
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let (a, b) = (self.params[0], self.params[1]);
        Some(DVector::from_fn(self.xs.nrows(), |i, _| {
            a * self.xs[i].powf(b) - self.ys[i]
        }))
    }

    fn jacobian(&self) -> Option<OMatrix<f64, Dyn, U2>> {
        let (a, b) = (self.params[0], self.params[1]);
        let mut jacobian = OMatrix::<f64, Dyn, U2>::zeros(self.xs.nrows());
        for i in 0..self.xs.nrows() {
            let xb = self.xs[i].powf(b);
            jacobian[(i, 0)] = xb;
            jacobian[(i, 1)] = a * xb * self.xs[i].ln();
        }
        Some(jacobian)
    }
}

/// Fit `y = a * x^b`, returning `None` when the optimiser fails to
/// converge (which the caller treats as a zero R-squared, never as an
/// error).
fn fit_power(xs: &[f64], ys: &[f64]) -> Option<(f64, f64)> {
    let problem = PowerFit {
        xs: DVector::from_column_slice(xs),
        ys: DVector::from_column_slice(ys),
        params: Vector2::new(1.0, 2.0),
    };
    let (problem, report) = LevenbergMarquardt::new().minimize(problem);
    if !report.termination.was_successful() {
        return None;
    }
    let (a, b) = (problem.params[0], problem.params[1]);
    if !a.is_finite() || !b.is_finite() {
        return None;
    }
    Some((a, b))
}

// ============================================================================
// Polynomial fit
// ============================================================================

/// Least-squares fit of a polynomial with the given degree, returning
/// its coefficients in ascending order of power.
fn fit_polynomial(xs: &[f64], ys: &[f64], degree: usize) -> Option<Vec<f64>> {
    if xs.len() < degree + 1 {
        return None;
    }
    let vandermonde = DMatrix::from_fn(xs.len(), degree + 1, |i, j| xs[i].powi(j as i32));
    let y = DVector::from_column_slice(ys);
    let coefficients = vandermonde.svd(true, true).solve(&y, f64::EPSILON).ok()?;
    Some(coefficients.iter().copied().collect())
}

fn eval_polynomial(coefficients: &[f64], x: f64) -> f64 {
    coefficients
        .iter()
        .rev()
        .fold(0.0, |acc, c| acc * x + c)
}
