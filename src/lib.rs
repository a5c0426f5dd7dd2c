//! Ping testing primitives for verifying analytic gradient implementations.
//!
//! "Pinging" a derivative means comparing an analytically computed gradient
//! against central finite-difference approximations at two step sizes and
//! checking that the approximation error shrinks at the expected second-order
//! rate. A correct gradient passes at tight tolerance; an incorrect one cannot
//! fake the convergence rate.
//!
//! The crate has three parts:
//!
//! - Scalar/matrix comparison predicates and a residual norm (this module).
//! - [`ping::Pingable`], the capability contract a function-under-test
//!   implements, and [`ping::ping_derivative`], the classification engine.
//! - [`fixture::FixtureEnvironment`], a seeded uniform generator for the
//!   random input arrays that ping tests are meant to be run over.
//!
//! Ping testing is statistical: a single input matrix proves little, but a
//! correct implementation returns zero failures across many random matrices
//! while a wrong one fails on nearly every entry it touches.

pub mod fixture;
pub mod ping;

pub use fixture::FixtureEnvironment;
pub use ping::{
    ping_derivative, GradientTensor, PingError, PingTolerances, Pingable, SUGGESTED_STEP_SIZES,
};

/// Checks exact equality of two signed 64-bit integers.
///
/// Exists for symmetry with the floating-point predicates so test code can
/// route every comparison through one vocabulary.
#[must_use]
pub fn check_int_equals(value: i64, truth: i64) -> bool {
    value == truth
}

/// Checks `|value - truth| <= tolerance` (absolute error).
///
/// ```
/// use gradping::check_f64_within;
///
/// assert!(check_f64_within(1.0 + 1e-12, 1.0, 1e-9));
/// assert!(check_f64_within(5.0, 5.0, 0.0));
/// assert!(!check_f64_within(1.1, 1.0, 1e-3));
/// ```
#[must_use]
pub fn check_f64_within(value: f64, truth: f64, tolerance: f64) -> bool {
    (value - truth).abs() <= tolerance
}

/// Checks `|value - truth| / |truth| <= tolerance` (relative error).
///
/// Relative error is undefined at `truth == 0`; in that case this falls back
/// to the absolute check [`check_f64_within`].
///
/// ```
/// use gradping::check_f64_within_relative;
///
/// // 1% relative error against truth = 200.0 allows a difference of 2.0.
/// assert!(check_f64_within_relative(201.0, 200.0, 0.01));
/// assert!(!check_f64_within_relative(203.0, 200.0, 0.01));
/// ```
#[must_use]
pub fn check_f64_within_relative(value: f64, truth: f64, tolerance: f64) -> bool {
    if truth == 0.0 {
        return check_f64_within(value, truth, tolerance);
    }
    ((value - truth) / truth).abs() <= tolerance
}

/// Checks `||A - B||_F <= tolerance` for two `size_m x size_n` matrices.
///
/// Both matrices are row-major flat slices of length `size_m * size_n`.
///
/// The Frobenius norm grows with dimension (`||I||_F = sqrt(n)`), so callers
/// wanting a scale-free comparison should multiply `tolerance` by
/// `sqrt(size_m * size_n)` first.
#[must_use]
pub fn check_matrix_norm_within(
    matrix1: &[f64],
    matrix2: &[f64],
    size_m: usize,
    size_n: usize,
    tolerance: f64,
) -> bool {
    debug_assert_eq!(matrix1.len(), size_m * size_n);
    debug_assert_eq!(matrix2.len(), size_m * size_n);

    let norm_sq: f64 = matrix1
        .iter()
        .zip(matrix2.iter())
        .map(|(&a, &b)| (a - b) * (a - b))
        .sum();
    norm_sq.sqrt() <= tolerance
}

/// Computes `||b - A*x||_2` for a square `size x size` system.
///
/// `a` is row-major. The residual measures how well `x` solves `A*x = b`;
/// coupled with knowledge of the solver, a small residual norm is a useful
/// correctness signal. This is *not* a least-squares residual: `A` must be
/// square.
///
/// ```
/// use gradping::residual_norm;
///
/// // A = [[2, 0], [0, 3]], x = [1, 1], b = A*x = [2, 3]: residual is 0.
/// let a = [2.0, 0.0, 0.0, 3.0];
/// assert_eq!(residual_norm(&a, &[1.0, 1.0], &[2.0, 3.0], 2), 0.0);
/// ```
#[must_use]
pub fn residual_norm(a: &[f64], x: &[f64], b: &[f64], size: usize) -> f64 {
    debug_assert_eq!(a.len(), size * size);
    debug_assert_eq!(x.len(), size);
    debug_assert_eq!(b.len(), size);

    let mut norm_sq = 0.0;
    for i in 0..size {
        let row = &a[i * size..(i + 1) * size];
        let ax: f64 = row.iter().zip(x.iter()).map(|(&aij, &xj)| aij * xj).sum();
        let r = b[i] - ax;
        norm_sq += r * r;
    }
    norm_sq.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ====================================================================
    // Scalar predicates
    // ====================================================================

    #[test]
    fn int_equals_is_exact() {
        assert!(check_int_equals(0, 0));
        assert!(check_int_equals(-7, -7));
        assert!(check_int_equals(i64::MAX, i64::MAX));
        assert!(!check_int_equals(1, 2));
    }

    #[test]
    fn within_zero_tolerance_is_reflexive() {
        for v in [-3.5, 0.0, 1e-300, 1e300] {
            assert!(check_f64_within(v, v, 0.0), "value {v} not within itself");
        }
    }

    #[test]
    fn within_is_symmetric_in_value_and_truth() {
        assert_eq!(
            check_f64_within(1.0, 1.5, 0.6),
            check_f64_within(1.5, 1.0, 0.6)
        );
    }

    #[test]
    fn relative_falls_back_to_absolute_at_zero_truth() {
        // Against truth = 0 the relative check must behave exactly like the
        // absolute check, for any tolerance.
        for v in [0.0, 1e-12, 0.5, -2.0] {
            for tol in [0.0, 1e-9, 1.0] {
                assert_eq!(
                    check_f64_within_relative(v, 0.0, tol),
                    check_f64_within(v, 0.0, tol),
                    "mismatch at value={v}, tol={tol}"
                );
            }
        }
    }

    #[test]
    fn relative_scales_with_truth_magnitude() {
        // 1% of 1e6 is 1e4; an absolute difference of 5000 passes relatively
        // but would need a huge absolute tolerance.
        assert!(check_f64_within_relative(1.0e6 + 5.0e3, 1.0e6, 0.01));
        assert!(!check_f64_within(1.0e6 + 5.0e3, 1.0e6, 0.01));
    }

    #[test]
    fn relative_handles_negative_truth() {
        assert!(check_f64_within_relative(-201.0, -200.0, 0.01));
        assert!(!check_f64_within_relative(-210.0, -200.0, 0.01));
    }

    // ====================================================================
    // Matrix norm
    // ====================================================================

    #[test]
    fn identical_matrices_within_zero() {
        let m = [1.0, -2.0, 3.5, 0.0, 4.0, -1.0];
        assert!(check_matrix_norm_within(&m, &m, 2, 3, 0.0));
    }

    #[test]
    fn matrix_norm_is_frobenius() {
        // Difference is all-ones 2x2: Frobenius norm = sqrt(4) = 2.
        let a = [1.0, 1.0, 1.0, 1.0];
        let b = [0.0, 0.0, 0.0, 0.0];
        assert!(check_matrix_norm_within(&a, &b, 2, 2, 2.0));
        assert!(!check_matrix_norm_within(&a, &b, 2, 2, 2.0 - 1e-12));
    }

    // ====================================================================
    // Residual norm
    // ====================================================================

    #[test]
    fn exact_solution_has_zero_residual() {
        // b computed exactly as A*x must give residual exactly 0
        // (the subtraction cancels bit-for-bit).
        let a = [2.0, 1.0, 0.0, 0.5, 3.0, 1.0, 1.0, 0.0, 4.0];
        let x = [1.0, 2.0, 3.0];
        let size = 3;
        let mut b = [0.0; 3];
        for (i, slot) in b.iter_mut().enumerate() {
            *slot = (0..size).map(|j| a[i * size + j] * x[j]).sum();
        }
        assert_eq!(residual_norm(&a, &x, &b, size), 0.0);
    }

    #[test]
    fn residual_invariant_under_sign_flip() {
        // Negating A and b together leaves b - A*x negated elementwise,
        // so the 2-norm is unchanged.
        let a = [1.0, 2.0, 3.0, 4.0];
        let x = [0.5, -1.5];
        let b = [2.0, 1.0];
        let neg_a: Vec<f64> = a.iter().map(|v| -v).collect();
        let neg_b: Vec<f64> = b.iter().map(|v| -v).collect();

        let r1 = residual_norm(&a, &x, &b, 2);
        let r2 = residual_norm(&neg_a, &x, &neg_b, 2);
        assert!((r1 - r2).abs() < 1e-15, "r1={r1}, r2={r2}");
    }

    #[test]
    fn residual_of_identity_system() {
        // A = I: residual is just ||b - x||_2.
        let a = [1.0, 0.0, 0.0, 1.0];
        let x = [1.0, 2.0];
        let b = [4.0, 6.0];
        // b - x = (3, 4), norm 5.
        assert!((residual_norm(&a, &x, &b, 2) - 5.0).abs() < 1e-15);
    }
}
