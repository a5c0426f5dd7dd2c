//! Ping-testing walkthrough: verify a correct gradient, then watch a planted
//! bug get caught.
//!
//! The function under test is f(X) = sum of squares over a 3 x 4 input matrix
//! with the analytic gradient 2X. We ping it over a batch of random matrices
//! (zero failures expected), then re-run with the gradient scaled by 1.1 to
//! show the convergence-rate check catching a bug that a single-step
//! finite-difference comparison at loose tolerance would miss.
//!
//! Run: `cargo run --example ping_quadratic`

use gradping::{
    ping_derivative, FixtureEnvironment, GradientTensor, PingTolerances, Pingable,
    SUGGESTED_STEP_SIZES,
};

struct SumOfSquares {
    rows: usize,
    cols: usize,
    gradient_scale: f64,
}

impl Pingable for SumOfSquares {
    fn input_shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn output_len(&self) -> usize {
        1
    }

    fn evaluate(&self, input: &[f64]) -> Vec<f64> {
        vec![input.iter().map(|&x| x * x).sum()]
    }

    fn evaluate_gradient(&self, input: &[f64]) -> GradientTensor {
        let mut g = GradientTensor::zeros(self.rows, self.cols, 1);
        for col in 0..self.cols {
            for row in 0..self.rows {
                let x = input[col * self.rows + row];
                g.values_mut()[row * self.cols + col] = self.gradient_scale * 2.0 * x;
            }
        }
        g
    }
}

fn main() {
    let rows = 3;
    let cols = 4;
    let num_matrices = 50;
    let tolerances = PingTolerances::default();

    println!("=== Ping Testing: f(X) = sum X^2, gradient 2X ===\n");
    println!(
        "shape: {rows} x {cols}, steps: {:?}, tolerances: fine={}, relaxed={}, ratio={}\n",
        SUGGESTED_STEP_SIZES,
        tolerances.rate_fine,
        tolerances.rate_relaxed,
        tolerances.input_output_ratio
    );

    // ---------------------------------------------------------------
    // Correct gradient over many random matrices
    // ---------------------------------------------------------------
    let correct = SumOfSquares {
        rows,
        cols,
        gradient_scale: 1.0,
    };
    let mut env = FixtureEnvironment::new();

    let mut total_failures = 0;
    for _ in 0..num_matrices {
        env.initialize(rows, cols, 0);
        total_failures += ping_derivative(
            &correct,
            env.points_to_sample(),
            SUGGESTED_STEP_SIZES,
            &tolerances,
        )
        .expect("shape contract holds");
    }
    println!(
        "correct gradient : {total_failures} failures across {num_matrices} random matrices \
         ({} entries pinged)",
        num_matrices * rows * cols
    );

    // ---------------------------------------------------------------
    // Planted bug: gradient scaled by 1.1
    // ---------------------------------------------------------------
    let buggy = SumOfSquares {
        rows,
        cols,
        gradient_scale: 1.1,
    };
    env.initialize(rows, cols, 0);
    let failures = ping_derivative(
        &buggy,
        env.points_to_sample(),
        SUGGESTED_STEP_SIZES,
        &tolerances,
    )
    .expect("shape contract holds");
    println!(
        "gradient * 1.1   : {failures} of {} entries failed on a single matrix",
        rows * cols
    );
    println!("\n(per-entry diagnostics for the failures were written to stderr)");
}
