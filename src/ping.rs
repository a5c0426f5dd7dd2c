//! Ping testing: convergence-rate verification of analytic gradients.
//!
//! # The problem
//!
//! Hand-written gradient code is the classic silent-failure zone of numerical
//! software: an off-by-one in an index or a dropped chain-rule factor produces
//! a gradient that is *plausible* but wrong, and downstream optimizers simply
//! converge to the wrong place.  Comparing against a finite difference at a
//! single step size is the obvious check, but it forces an impossible
//! tolerance choice: too tight and well-conditioned correct code still fails
//! on hard inputs; too loose and scaled-by-2 bugs slip through.
//!
//! # The rate test
//!
//! Central differencing
//!
//! ```text
//!   fd(h) = (f(x + h) - f(x - h)) / (2h)
//! ```
//!
//! is second-order accurate: its error against the true derivative shrinks
//! like `h^2`.  So instead of asking "is the finite difference close to the
//! analytic value?", ping testing asks "does the finite-difference error
//! *shrink at the right rate* as h shrinks?"  With errors `e1`, `e2` at steps
//! `h1 > h2`, the empirical rate is
//!
//! ```text
//!   rate = ln(e1 / e2) / ln(h1 / h2)
//! ```
//!
//! and should be near 2.  A correct gradient exhibits the rate no matter how
//! large the truncation error is in absolute terms.  An incorrect gradient
//! leaves a constant offset in both errors, so the rate collapses to ~0.
//! This makes the test nearly scale-free.
//!
//! # False positives
//!
//! Two effects can break the rate for *correct* gradients, and the
//! classification in [`ping_derivative`] is built to absorb them:
//!
//! - **Insignificant entries.** When a gradient entry is negligible relative
//!   to its input, both errors sit in the rounding noise and the rate is
//!   meaningless.  Such entries are skipped (`input_output_ratio`).
//! - **Roundoff-dominated errors.** When the truncation error is smaller than
//!   the roundoff of the difference quotient itself (exactly what happens for
//!   locally linear or quadratic dependence, where central differencing is
//!   exact), the entry passes rather than being judged on noise.
//! - **Mild ill-conditioning.** Entries whose rate falls short of 2 by more
//!   than `rate_fine` but less than `rate_relaxed` pass under the relaxed
//!   classification.
//!
//! The skip/relax logic trades a few true positives for a near-zero false
//! positive rate; certainty comes from pinging many random input matrices
//! (see [`crate::fixture`]), not from any single one.

use thiserror::Error;

/// Step sizes suggested as a starting point for [`ping_derivative`].
///
/// Small enough that second-order truncation dominates for order-1 inputs,
/// large enough that the difference quotient stays clear of roundoff.  The
/// more ill-conditioned the function under test, the larger these (and the
/// rate tolerances) will need to be.
pub const SUGGESTED_STEP_SIZES: [f64; 2] = [5.0e-3, 1.0e-3];

// Central differencing is second-order accurate.
const EXPECTED_RATE: f64 = 2.0;

// Multiplier on the estimated roundoff of a difference quotient below which
// an error is treated as pure noise.  Covers summation-error accumulation in
// implementers that reduce over many input entries.
const NOISE_MARGIN: f64 = 256.0;

/// The capability contract a function-under-test implements to be pingable.
///
/// Models functions of the form `f_k = f(X_{d,i})`: a matrix-shaped input
/// `X` with `num_rows` rows (`d`, typically a spatial dimension) and
/// `num_cols` columns (`i`, typically a point index), mapped to `num_outputs`
/// values `f_k`.  Gradients are taken with respect to every input entry:
/// `grad[d][i][k] = df_k / dX_{d,i}`.
///
/// Input matrices are passed as flat slices in column-major order: column
/// (point) `i` occupies `input[i * num_rows .. (i + 1) * num_rows]`.
///
/// The reported shape must be stable for the lifetime of an instance;
/// [`ping_derivative`] reads it once and sizes every evaluation off it.
pub trait Pingable {
    /// Shape `(num_rows, num_cols)` of the expected input matrix.
    fn input_shape(&self) -> (usize, usize);

    /// Number of outputs of the function, i.e. the length of `f_k`.
    fn output_len(&self) -> usize;

    /// Evaluates `f_k = f(X)`, returning all `num_outputs` values.
    ///
    /// Must not depend on any prior [`evaluate_gradient`] call.
    ///
    /// [`evaluate_gradient`]: Pingable::evaluate_gradient
    fn evaluate(&self, input: &[f64]) -> Vec<f64>;

    /// Evaluates the full analytic gradient at `input`.
    ///
    /// Returns an owned [`GradientTensor`] so there is no stored-state
    /// protocol to get wrong: the tensor is valid for exactly the `input` it
    /// was computed from, and the caller owns it.
    fn evaluate_gradient(&self, input: &[f64]) -> GradientTensor;
}

/// An owned `num_rows x num_cols x num_outputs` gradient tensor.
///
/// Entry `(row, col, output)` is the partial derivative of output `output`
/// with respect to input entry `(row, col)`.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientTensor {
    num_rows: usize,
    num_cols: usize,
    num_outputs: usize,
    values: Vec<f64>,
}

impl GradientTensor {
    /// Builds a tensor from flat values laid out as
    /// `values[(row * num_cols + col) * num_outputs + output]`.
    ///
    /// Fails with [`PingError::GradientSizeMismatch`] unless
    /// `values.len() == num_rows * num_cols * num_outputs`.
    pub fn new(
        num_rows: usize,
        num_cols: usize,
        num_outputs: usize,
        values: Vec<f64>,
    ) -> Result<Self, PingError> {
        let expected = num_rows * num_cols * num_outputs;
        if values.len() != expected {
            return Err(PingError::GradientSizeMismatch {
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            num_rows,
            num_cols,
            num_outputs,
            values,
        })
    }

    /// A tensor of the given shape with every entry zero.
    pub fn zeros(num_rows: usize, num_cols: usize, num_outputs: usize) -> Self {
        Self {
            num_rows,
            num_cols,
            num_outputs,
            values: vec![0.0; num_rows * num_cols * num_outputs],
        }
    }

    /// Shape as `(num_rows, num_cols, num_outputs)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.num_rows, self.num_cols, self.num_outputs)
    }

    /// Total number of stored partial derivatives.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Is the tensor empty (any dimension zero)?
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The partial derivative of output `output` with respect to input entry
    /// `(row, col)`.
    pub fn entry(&self, row: usize, col: usize, output: usize) -> f64 {
        debug_assert!(row < self.num_rows);
        debug_assert!(col < self.num_cols);
        debug_assert!(output < self.num_outputs);
        self.values[(row * self.num_cols + col) * self.num_outputs + output]
    }

    /// Mutable access to the flat values (layout documented on [`new`]).
    ///
    /// [`new`]: GradientTensor::new
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }
}

/// Tolerances controlling the skip / pass / relax / fail classification.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PingTolerances {
    /// Allowed shortfall of the empirical convergence rate below 2 for a
    /// clean pass.
    pub rate_fine: f64,
    /// Maximum allowed shortfall before an entry is declared a failure.
    /// Entries between `rate_fine` and `rate_relaxed` pass under relaxed
    /// classification, absorbing mild ill-conditioning.
    pub rate_relaxed: f64,
    /// Entries whose gradient magnitude (analytic and both finite-difference
    /// estimates alike) falls below this fraction of the input magnitude are
    /// numerically insignificant and skipped.  Values around machine
    /// precision (1e-15 to 1e-18) are appropriate.
    pub input_output_ratio: f64,
}

impl Default for PingTolerances {
    /// Representative magnitudes: `rate_fine = 1e-2`, `rate_relaxed = 1e-1`,
    /// `input_output_ratio = 1e-15`.
    fn default() -> Self {
        Self {
            rate_fine: 1.0e-2,
            rate_relaxed: 1.0e-1,
            input_output_ratio: 1.0e-15,
        }
    }
}

/// Errors surfaced when the implementer or the call arguments break the
/// pinging contract.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PingError {
    /// The input slice does not match the shape the implementer reports.
    #[error("input has {actual} entries but implementer reports {num_rows} x {num_cols}")]
    InputSizeMismatch {
        num_rows: usize,
        num_cols: usize,
        actual: usize,
    },
    /// Step sizes must be finite, positive, and strictly decreasing.
    #[error("invalid step sizes: coarse={coarse}, fine={fine} (need coarse > fine > 0)")]
    InvalidStepSize { coarse: f64, fine: f64 },
    /// A gradient tensor was built with the wrong number of values.
    #[error("gradient tensor has {actual} values, expected {expected}")]
    GradientSizeMismatch { expected: usize, actual: usize },
    /// The implementer returned a gradient tensor whose shape disagrees with
    /// its reported input shape and output count.
    #[error("gradient tensor shape {actual:?} disagrees with reported shape {expected:?}")]
    GradientShapeMismatch {
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },
    /// An evaluation returned the wrong number of outputs.
    #[error("evaluation returned {actual} outputs, implementer reports {expected}")]
    OutputLengthMismatch { expected: usize, actual: usize },
}

/// Pings every gradient entry of `f` at the input matrix `points`.
///
/// For each input entry `(row, col)` and output `k`, computes central
/// finite-difference estimates of `df_k / dX_{row,col}` at both step sizes
/// (`steps[0] > steps[1]`), compares them against the analytic entry, and
/// classifies the entry as skipped, passed (fine or relaxed), or failed by
/// the empirical convergence rate (see the module docs).  Superconvergent
/// entries (rate above 2, e.g. from symmetric error cancellation) always
/// pass; only a rate *shortfall* is evidence of a wrong gradient.
///
/// `points` is column-major (`points[col * num_rows + row]`) with entries
/// expected to be of order 1 in magnitude, e.g. drawn from
/// [`crate::fixture::FixtureEnvironment`]; wildly scaled inputs degrade the
/// finite differences.  Costs four function evaluations per `(row, col)`
/// input entry, shared across all outputs.
///
/// Returns the number of failing entries.  Zero means the analytic gradient
/// is consistent with second-order convergence everywhere checked.  Each
/// failing entry writes a multi-line diagnostic report (indices, estimates,
/// the analytic value, the rate) to stderr, roughly ten lines per failure.
///
/// ```
/// use gradping::ping::{ping_derivative, GradientTensor, Pingable, PingTolerances, SUGGESTED_STEP_SIZES};
///
/// /// f(X) = sum of cubes, single output; gradient is 3 X^2 entrywise.
/// struct SumOfCubes;
///
/// impl Pingable for SumOfCubes {
///     fn input_shape(&self) -> (usize, usize) { (2, 3) }
///     fn output_len(&self) -> usize { 1 }
///     fn evaluate(&self, input: &[f64]) -> Vec<f64> {
///         vec![input.iter().map(|&x| x * x * x).sum()]
///     }
///     fn evaluate_gradient(&self, input: &[f64]) -> GradientTensor {
///         let (rows, cols) = self.input_shape();
///         let mut g = GradientTensor::zeros(rows, cols, 1);
///         for col in 0..cols {
///             for row in 0..rows {
///                 let x = input[col * rows + row];
///                 g.values_mut()[row * cols + col] = 3.0 * x * x;
///             }
///         }
///         g
///     }
/// }
///
/// let points = [1.5, -2.0, 0.5, 3.0, -1.0, 2.5];
/// let failures = ping_derivative(
///     &SumOfCubes,
///     &points,
///     SUGGESTED_STEP_SIZES,
///     &PingTolerances::default(),
/// ).unwrap();
/// assert_eq!(failures, 0);
/// ```
pub fn ping_derivative(
    f: &dyn Pingable,
    points: &[f64],
    steps: [f64; 2],
    tol: &PingTolerances,
) -> Result<usize, PingError> {
    let (num_rows, num_cols) = f.input_shape();
    let num_outputs = f.output_len();

    if points.len() != num_rows * num_cols {
        return Err(PingError::InputSizeMismatch {
            num_rows,
            num_cols,
            actual: points.len(),
        });
    }
    let [h_coarse, h_fine] = steps;
    if !h_coarse.is_finite() || !h_fine.is_finite() || h_fine <= 0.0 || h_coarse <= h_fine {
        return Err(PingError::InvalidStepSize {
            coarse: h_coarse,
            fine: h_fine,
        });
    }

    let gradient = f.evaluate_gradient(points);
    if gradient.shape() != (num_rows, num_cols, num_outputs) {
        return Err(PingError::GradientShapeMismatch {
            expected: (num_rows, num_cols, num_outputs),
            actual: gradient.shape(),
        });
    }

    let mut scratch = points.to_vec();
    let mut failures = 0;

    for col in 0..num_cols {
        for row in 0..num_rows {
            let idx = col * num_rows + row;
            let x = points[idx];

            // Four evaluations per input entry, shared across all outputs:
            // (fd estimate, worst |f| seen) for each step size.
            let (fd_coarse, mag_coarse) =
                central_difference(f, &mut scratch, idx, x, h_coarse, num_outputs)?;
            let (fd_fine, mag_fine) =
                central_difference(f, &mut scratch, idx, x, h_fine, num_outputs)?;

            for k in 0..num_outputs {
                let analytic = gradient.entry(row, col, k);

                // Skip policy: nothing observable is happening at this entry
                // relative to the input scale, analytically or numerically.
                // The finite-difference estimates must participate here, or a
                // gradient wrongly reporting zero would be skipped instead of
                // failed.
                let magnitude = analytic.abs().max(fd_coarse[k].abs()).max(fd_fine[k].abs());
                if magnitude < tol.input_output_ratio * x.abs().max(1.0) {
                    continue;
                }

                let err_coarse = (fd_coarse[k] - analytic).abs();
                let err_fine = (fd_fine[k] - analytic).abs();

                // Exact agreement at either step: central differencing is
                // exact for dependence up to quadratic, no rate to measure.
                if err_coarse == 0.0 || err_fine == 0.0 {
                    continue;
                }

                // Roundoff floor of a difference quotient: eps * |f| / (2h).
                // When both errors are down at that level the truncation
                // signal is gone and any rate estimate is noise.
                let noise_coarse = f64::EPSILON * mag_coarse[k] / (2.0 * h_coarse);
                let noise_fine = f64::EPSILON * mag_fine[k] / (2.0 * h_fine);
                if err_coarse <= NOISE_MARGIN * noise_coarse
                    && err_fine <= NOISE_MARGIN * noise_fine
                {
                    continue;
                }

                let rate = (err_coarse / err_fine).ln() / (h_coarse / h_fine).ln();
                let shortfall = EXPECTED_RATE - rate;
                if shortfall <= tol.rate_fine {
                    continue;
                }
                if shortfall <= tol.rate_relaxed {
                    // Still a pass; one line so ill-conditioning trends stay
                    // visible across large runs.
                    eprintln!(
                        "ping relaxed pass at (row={row}, col={col}, output={k}): \
                         rate {rate:.6} (expected {EXPECTED_RATE})"
                    );
                    continue;
                }

                failures += 1;
                report_failure(
                    row, col, k, x, analytic, h_coarse, fd_coarse[k], err_coarse, h_fine,
                    fd_fine[k], err_fine, rate, tol,
                );
            }
        }
    }

    Ok(failures)
}

/// One central-difference pass over all outputs for a single input entry.
///
/// Returns the per-output difference quotients and, for the roundoff-floor
/// estimate, the larger of `|f(x+h)|` and `|f(x-h)|` per output.
fn central_difference(
    f: &dyn Pingable,
    scratch: &mut [f64],
    idx: usize,
    x: f64,
    h: f64,
    num_outputs: usize,
) -> Result<(Vec<f64>, Vec<f64>), PingError> {
    scratch[idx] = x + h;
    let f_plus = f.evaluate(scratch);
    scratch[idx] = x - h;
    let f_minus = f.evaluate(scratch);
    scratch[idx] = x;

    if f_plus.len() != num_outputs || f_minus.len() != num_outputs {
        return Err(PingError::OutputLengthMismatch {
            expected: num_outputs,
            actual: f_plus.len().min(f_minus.len()),
        });
    }

    let mut fd = Vec::with_capacity(num_outputs);
    let mut mag = Vec::with_capacity(num_outputs);
    for (&fp, &fm) in f_plus.iter().zip(f_minus.iter()) {
        fd.push((fp - fm) / (2.0 * h));
        mag.push(fp.abs().max(fm.abs()));
    }
    Ok((fd, mag))
}

#[allow(clippy::too_many_arguments)]
fn report_failure(
    row: usize,
    col: usize,
    output: usize,
    x: f64,
    analytic: f64,
    h_coarse: f64,
    fd_coarse: f64,
    err_coarse: f64,
    h_fine: f64,
    fd_fine: f64,
    err_fine: f64,
    rate: f64,
    tol: &PingTolerances,
) {
    eprintln!("ping failure at gradient entry (row={row}, col={col}, output={output}):");
    eprintln!("  input entry          : {x:+.12e}");
    eprintln!("  analytic gradient    : {analytic:+.12e}");
    eprintln!("  fd estimate, h={h_coarse:.3e} : {fd_coarse:+.12e}");
    eprintln!("  fd estimate, h={h_fine:.3e} : {fd_fine:+.12e}");
    eprintln!("  error at coarse step : {err_coarse:.6e}");
    eprintln!("  error at fine step   : {err_fine:.6e}");
    eprintln!("  empirical rate       : {rate:.6} (expected {EXPECTED_RATE})");
    eprintln!(
        "  rate tolerances      : fine={}, relaxed={}",
        tol.rate_fine, tol.rate_relaxed
    );
}
