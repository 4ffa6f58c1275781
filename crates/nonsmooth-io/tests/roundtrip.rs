//! Write/read round trips through files on disk.

use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use nonsmooth_core::{NumericMatrix, SparseBlockMatrix, StorageKind};
use nonsmooth_io::{
    Error, load_friction_contact, load_lcp, read_lcp, save_friction_contact, save_lcp,
};
use nonsmooth_solver::{
    FrictionContactProblem, LemkeOptions, LinearComplementarityProblem, NsgsOptions, friction,
    lcp,
};
use tempfile::tempdir;

fn awkward_values(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| match i % 4 {
            0 => 0.1 * (i as f64 + 1.0),
            1 => -1.0 / 3.0,
            2 => 1e-300 * i as f64,
            _ => std::f64::consts::PI * 1e12,
        })
        .collect()
}

fn assert_same_matrix(a: &NumericMatrix, b: &NumericMatrix) {
    assert_eq!(a.shape(), b.shape());
    assert_eq!(a.to_dense(), b.to_dense());
}

#[test]
fn dense_lcp_round_trip_is_exact() {
    let n = 5;
    let values = awkward_values(n * n);
    let m = NumericMatrix::from_column_major(n, n, &values).unwrap();
    let problem = LinearComplementarityProblem::new(m, awkward_values(n)).unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("lcp.dat");
    save_lcp(&path, &problem).unwrap();
    let loaded = load_lcp(&path).unwrap();

    assert_eq!(loaded.m().kind(), StorageKind::Dense);
    assert_same_matrix(problem.m(), loaded.m());
    assert_eq!(problem.q(), loaded.q());
}

#[test]
fn triplet_lcp_round_trip() {
    let mut coo = CooMatrix::new(4, 4);
    coo.push(0, 0, 2.0);
    coo.push(1, 1, 2.5);
    coo.push(2, 2, 1.0 / 7.0);
    coo.push(3, 3, 4.0);
    coo.push(0, 3, -0.25);
    let problem = LinearComplementarityProblem::new(
        NumericMatrix::sparse(CsrMatrix::from(&coo)),
        vec![-1.0, 0.5, -2.0, 1e-17],
    )
    .unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("sparse.dat");
    save_lcp(&path, &problem).unwrap();
    let loaded = load_lcp(&path).unwrap();

    assert_eq!(loaded.m().kind(), StorageKind::Sparse);
    assert_same_matrix(problem.m(), loaded.m());
    assert_eq!(problem.q(), loaded.q());
}

#[test]
fn sparse_block_friction_round_trip() {
    let contacts = 4;
    let dense = DMatrix::from_fn(3 * contacts, 3 * contacts, |i, j| {
        let (bi, bj) = (i / 3, j / 3);
        if bi == bj {
            if i == j { 10.0 } else { 0.1 * (i + j) as f64 }
        } else if bj == bi + 1 {
            -1.0 / 3.0
        } else {
            0.0
        }
    });
    let sizes = vec![3; contacts];
    let sbm = SparseBlockMatrix::from_dense(&dense, &sizes, &sizes).unwrap();
    let problem = FrictionContactProblem::new(
        3,
        NumericMatrix::sparse_block(sbm),
        awkward_values(3 * contacts),
        vec![0.1, 0.3, 0.7, 0.0],
    )
    .unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("fc3d.dat");
    save_friction_contact(&path, &problem).unwrap();
    let loaded = load_friction_contact(&path).unwrap();

    assert_eq!(loaded.dimension(), 3);
    assert_eq!(loaded.number_of_contacts(), contacts);
    assert_eq!(loaded.m().kind(), StorageKind::SparseBlock);
    assert_same_matrix(problem.m(), loaded.m());
    assert_eq!(problem.q(), loaded.q());
    assert_eq!(problem.mu(), loaded.mu());
}

#[test]
fn loaded_problems_solve_like_the_originals() {
    let lcp_text = "\
# M = [[2, 1], [1, 2]], q = [-5, -6]
2
0
2 2
2 1
1 2
-5 -6
";
    let problem = read_lcp(lcp_text.as_bytes()).unwrap();
    let (mut z, mut w) = ([0.0; 2], [0.0; 2]);
    let outcome = lcp::lemke(&problem, &mut z, &mut w, &LemkeOptions::default()).unwrap();
    assert!(outcome.is_converged());
    assert!((z[0] - 4.0 / 3.0).abs() < 1e-10 && (z[1] - 7.0 / 3.0).abs() < 1e-10);

    let fc = FrictionContactProblem::new(
        2,
        NumericMatrix::identity(2),
        vec![-1.0, 1.0],
        vec![0.5],
    )
    .unwrap();
    let dir = tempdir().unwrap();
    let path = dir.path().join("fc2d.dat");
    save_friction_contact(&path, &fc).unwrap();
    let loaded = load_friction_contact(&path).unwrap();
    let (mut r, mut u) = ([0.0; 2], [0.0; 2]);
    let options = NsgsOptions {
        tolerance: 1e-12,
        ..NsgsOptions::default()
    };
    assert!(friction::nsgs(&loaded, &mut r, &mut u, &options).unwrap().is_converged());
    assert!((r[0] - 1.0).abs() < 1e-10 && (r[1] + 0.5).abs() < 1e-10);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let result = load_lcp(dir.path().join("absent.dat"));
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn truncated_file_is_a_parse_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("truncated.dat");
    std::fs::write(&path, "3\n0\n3 3\n1 0 0\n0 1 0\n").unwrap();
    match load_lcp(&path) {
        Err(Error::Parse { line, message }) => {
            assert_eq!(line, 5);
            assert!(message.contains("end of file"));
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}
