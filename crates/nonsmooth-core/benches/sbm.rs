//! Benchmarks for sparse block products.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use nalgebra::DMatrix;
use nonsmooth_core::{NumericMatrix, SparseBlockMatrix};

/// Block tridiagonal matrix of `n` 3x3 blocks, as produced by chains of contacts.
fn block_tridiagonal(n: usize) -> SparseBlockMatrix {
    let sizes = vec![3; n];
    let dense = DMatrix::from_fn(3 * n, 3 * n, |i, j| {
        let (bi, bj) = (i / 3, j / 3);
        if bi == bj {
            if i == j { 10.0 } else { 1.0 }
        } else if bi.abs_diff(bj) == 1 {
            0.5
        } else {
            0.0
        }
    });
    SparseBlockMatrix::from_dense(&dense, &sizes, &sizes).unwrap()
}

fn bench_sbm_gemv(c: &mut Criterion) {
    let mut group = c.benchmark_group("sbm_gemv");

    for contacts in [10, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(contacts),
            &contacts,
            |bencher, &contacts| {
                let sbm = block_tridiagonal(contacts);
                let x = vec![1.0; 3 * contacts];
                let mut y = vec![0.0; 3 * contacts];
                bencher.iter(|| sbm.gemv(1.0, black_box(&x), 0.0, black_box(&mut y)).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_dense_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("numeric_solve");

    for contacts in [5, 20, 50] {
        group.bench_with_input(
            BenchmarkId::from_parameter(contacts),
            &contacts,
            |bencher, &contacts| {
                let dense = block_tridiagonal(contacts).to_dense();
                let rhs: Vec<f64> = (0..3 * contacts).map(|i| (i + 1) as f64).collect();
                bencher.iter(|| {
                    let mut m = NumericMatrix::dense(dense.clone());
                    let mut b = rhs.clone();
                    m.solve_in_place(black_box(&mut b)).unwrap();
                    b
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_sbm_gemv, bench_dense_solve);
criterion_main!(benches);
