//! Benchmarks for the linear and nonlinear solvers.

use algeq_core::{DenseMatrix, Diagnostics, EquationSystemSpec, ResidualFn};
use algeq_solver::linear::solve_dense;
use algeq_solver::{NonlinearOptions, NonlinearSolveDriver, SolveSeed, SolveWorkspace};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use nalgebra::DVector;

fn bench_solve_dense(c: &mut Criterion) {
    let mut group = c.benchmark_group("solve_dense");

    for size in [10, 50, 100] {
        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &size,
            |bencher, &size| {
                // Create a diagonally dominant matrix (guaranteed non-singular)
                let a = DenseMatrix::from_fn(size, size, |i, j| {
                    if i == j {
                        (size as f64) + 1.0
                    } else {
                        1.0 / ((i as f64 - j as f64).abs() + 1.0)
                    }
                });
                let rhs = DVector::from_fn(size, |i, _| (i + 1) as f64);

                bencher.iter(|| solve_dense(black_box(&a), black_box(&rhs)).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_nonlinear_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("nonlinear_solve");
    let options = NonlinearOptions {
        diagnostics: Diagnostics::silent(),
        ..NonlinearOptions::default()
    };
    let driver = NonlinearSolveDriver::new(options);

    for size in [2, 8, 32] {
        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &size,
            |bencher, &size| {
                // Discrete Bratu-like chain: x_i^3 + 2 x_i - x_{i-1} - x_{i+1} = 1
                let residual = ResidualFn(|x: &DVector<f64>, f: &mut DVector<f64>| {
                    let n = x.len();
                    for i in 0..n {
                        let left = if i > 0 { x[i - 1] } else { 0.0 };
                        let right = if i + 1 < n { x[i + 1] } else { 0.0 };
                        f[i] = x[i].powi(3) + 2.0 * x[i] - left - right - 1.0;
                    }
                });
                let spec = EquationSystemSpec::derivative_free(0, "chain", size);
                let seed = SolveSeed::from_guess(DVector::zeros(size));
                let mut ws = SolveWorkspace::new(size);

                bencher.iter(|| {
                    let result = driver.solve(&spec, &residual, &mut ws, black_box(&seed), 0.0);
                    black_box(result.status)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_solve_dense, bench_nonlinear_solve);
criterion_main!(benches);
