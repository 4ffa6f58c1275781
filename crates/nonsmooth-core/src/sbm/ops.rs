//! Products, sums and permutations over sparse block matrices.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use nalgebra::DMatrix;

use super::{SharedBlock, SparseBlockMatrix};
use crate::error::{Error, Result};
use crate::grid::{cumulative, locate, sizes};
use crate::matrix::scale_vector;
use crate::version::next_version;

/// `y += alpha * block * x` for one dense block.
#[inline]
fn block_gemv(alpha: f64, block: &DMatrix<f64>, x: &[f64], y: &mut [f64]) {
    for j in 0..block.ncols() {
        let xj = alpha * x[j];
        if xj == 0.0 {
            continue;
        }
        for (i, yi) in y.iter_mut().enumerate().take(block.nrows()) {
            *yi += block[(i, j)] * xj;
        }
    }
}

fn check_permutation(perm: &[usize], n: usize) -> Result<Vec<usize>> {
    if perm.len() != n {
        return Err(Error::shape("block permutation", (n, 1), (perm.len(), 1)));
    }
    let mut inverse = vec![usize::MAX; n];
    for (new, &old) in perm.iter().enumerate() {
        if old >= n || inverse[old] != usize::MAX {
            return Err(Error::BlockIndexOutOfRange {
                block_row: new,
                block_col: old,
                block_rows: n,
                block_cols: n,
            });
        }
        inverse[old] = new;
    }
    Ok(inverse)
}

impl SparseBlockMatrix {
    /// Stored handles with repeats removed, for in-place block updates.
    fn unique_blocks(&self) -> Vec<&SharedBlock> {
        let mut seen = std::collections::HashSet::new();
        self.blocks
            .iter()
            .filter(|b| seen.insert(Rc::as_ptr(b)))
            .collect()
    }

    fn check_gemv(&self, x: &[f64], y: &[f64]) -> Result<()> {
        if x.len() != self.ncols() || y.len() != self.nrows() {
            return Err(Error::shape(
                "sparse block gemv",
                (self.nrows(), self.ncols()),
                (y.len(), x.len()),
            ));
        }
        Ok(())
    }

    /// `y = alpha * A x + beta * y`, visiting stored blocks only.
    pub fn gemv(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]) -> Result<()> {
        self.check_gemv(x, y)?;
        if self.is_uniform(3) {
            return self.gemv_3x3(alpha, x, beta, y);
        }
        scale_vector(y, beta);
        for r in 0..self.block_rows() {
            let (r0, rs) = self.row_span(r);
            for (b, c) in self.row_blocks(r) {
                let (c0, cs) = self.col_span(c);
                let block = self.blocks[b].borrow();
                block_gemv(alpha, &block, &x[c0..c0 + cs], &mut y[r0..r0 + rs]);
            }
        }
        Ok(())
    }

    /// Whether every block row and column has size `n`.
    pub fn is_uniform(&self, n: usize) -> bool {
        let uniform = |offsets: &[usize]| {
            offsets
                .iter()
                .enumerate()
                .all(|(k, &end)| end == (k + 1) * n)
        };
        uniform(&self.row_offsets) && uniform(&self.col_offsets)
    }

    /// Unrolled gemv for matrices made only of 3x3 blocks.
    pub fn gemv_3x3(&self, alpha: f64, x: &[f64], beta: f64, y: &mut [f64]) -> Result<()> {
        self.check_gemv(x, y)?;
        if !self.is_uniform(3) {
            return Err(Error::Unsupported {
                operation: "gemv_3x3",
                kind: "non-uniform sparse block",
            });
        }
        scale_vector(y, beta);
        for r in 0..self.block_rows() {
            let r0 = 3 * r;
            let (mut y0, mut y1, mut y2) = (0.0, 0.0, 0.0);
            for (b, c) in self.row_blocks(r) {
                let c0 = 3 * c;
                let blk = self.blocks[b].borrow();
                let (x0, x1, x2) = (x[c0], x[c0 + 1], x[c0 + 2]);
                y0 += blk[(0, 0)] * x0 + blk[(0, 1)] * x1 + blk[(0, 2)] * x2;
                y1 += blk[(1, 0)] * x0 + blk[(1, 1)] * x1 + blk[(1, 2)] * x2;
                y2 += blk[(2, 0)] * x0 + blk[(2, 1)] * x1 + blk[(2, 2)] * x2;
            }
            y[r0] += alpha * y0;
            y[r0 + 1] += alpha * y1;
            y[r0 + 2] += alpha * y2;
        }
        Ok(())
    }

    fn row_prod_impl(&self, r: usize, x: &[f64], y: &mut [f64], init: bool, skip_diag: bool) -> Result<()> {
        if r >= self.block_rows() {
            return Err(Error::BlockIndexOutOfRange {
                block_row: r,
                block_col: 0,
                block_rows: self.block_rows(),
                block_cols: self.block_cols(),
            });
        }
        let rs = self.row_span(r).1;
        if x.len() != self.ncols() || y.len() != rs {
            return Err(Error::shape("sparse block row product", (rs, self.ncols()), (y.len(), x.len())));
        }
        if init {
            y.iter_mut().for_each(|v| *v = 0.0);
        }
        for (b, c) in self.row_blocks(r) {
            if skip_diag && c == r {
                continue;
            }
            let (c0, cs) = self.col_span(c);
            block_gemv(1.0, &self.blocks[b].borrow(), &x[c0..c0 + cs], y);
        }
        Ok(())
    }

    /// `y (+)= A[r, :] x` for block row `r`; `y` has the height of that row.
    pub fn row_prod(&self, r: usize, x: &[f64], y: &mut [f64], init: bool) -> Result<()> {
        self.row_prod_impl(r, x, y, init, false)
    }

    /// Like [`row_prod`](Self::row_prod) but skipping the diagonal block.
    pub fn row_prod_no_diag(&self, r: usize, x: &[f64], y: &mut [f64], init: bool) -> Result<()> {
        self.row_prod_impl(r, x, y, init, true)
    }

    /// Dot product of scalar row `row` with `x`, over the stored blocks of
    /// its block row only.
    pub fn row_dot(&self, row: usize, x: &[f64]) -> Result<f64> {
        if x.len() != self.ncols() {
            return Err(Error::shape("sparse block row dot", (1, self.ncols()), (1, x.len())));
        }
        let (r, i) = locate(&self.row_offsets, row).ok_or(Error::IndexOutOfRange {
            row,
            col: 0,
            rows: self.nrows(),
            cols: self.ncols(),
        })?;
        let mut sum = 0.0;
        for (b, c) in self.row_blocks(r) {
            let (c0, cs) = self.col_span(c);
            let block = self.blocks[b].borrow();
            sum += block
                .row(i)
                .iter()
                .zip(&x[c0..c0 + cs])
                .map(|(a, xj)| a * xj)
                .sum::<f64>();
        }
        Ok(sum)
    }

    /// `C = alpha * A B + beta * C` into the blocks `C` already stores.
    ///
    /// Every block of the product must already exist in `c`; nothing is
    /// allocated or removed. A missing block is reported before `c` is
    /// touched.
    pub fn gemm_without_allocation(
        alpha: f64,
        a: &SparseBlockMatrix,
        b: &SparseBlockMatrix,
        beta: f64,
        c: &mut SparseBlockMatrix,
    ) -> Result<()> {
        if a.col_offsets != b.row_offsets {
            return Err(Error::shape("sparse block gemm inner grid", (a.nrows(), a.ncols()), (b.nrows(), b.ncols())));
        }
        if c.row_offsets != a.row_offsets || c.col_offsets != b.col_offsets {
            return Err(Error::shape("sparse block gemm output grid", (a.nrows(), b.ncols()), (c.nrows(), c.ncols())));
        }

        let mut plan = Vec::new();
        for r in 0..a.block_rows() {
            for (ab, k) in a.row_blocks(r) {
                for (bb, j) in b.row_blocks(k) {
                    let Some(cb) = c.find_block(r, j) else {
                        let expected = (c.row_span(r).1, c.col_span(j).1);
                        return Err(Error::shape(
                            "gemm_without_allocation: product block missing from output",
                            expected,
                            (0, 0),
                        ));
                    };
                    plan.push((ab, bb, cb));
                }
            }
        }

        for block in c.unique_blocks() {
            let mut block = block.borrow_mut();
            if beta == 0.0 {
                block.fill(0.0);
            } else if beta != 1.0 {
                *block *= beta;
            }
        }
        for (ab, bb, cb) in plan {
            let product = &*a.blocks[ab].borrow() * &*b.blocks[bb].borrow();
            *c.blocks[cb].borrow_mut() += product * alpha;
        }
        c.version = next_version();
        Ok(())
    }

    /// Allocating product `A B`.
    pub fn multiply(a: &SparseBlockMatrix, b: &SparseBlockMatrix) -> Result<SparseBlockMatrix> {
        if a.col_offsets != b.row_offsets {
            return Err(Error::shape("sparse block multiply", (a.nrows(), a.ncols()), (b.nrows(), b.ncols())));
        }
        let mut map: BTreeMap<(usize, usize), DMatrix<f64>> = BTreeMap::new();
        for r in 0..a.block_rows() {
            for (ab, k) in a.row_blocks(r) {
                for (bb, j) in b.row_blocks(k) {
                    let product = &*a.blocks[ab].borrow() * &*b.blocks[bb].borrow();
                    map.entry((r, j))
                        .and_modify(|acc| *acc += &product)
                        .or_insert(product);
                }
            }
        }
        Ok(Self::from_block_map(
            a.row_offsets.clone(),
            b.col_offsets.clone(),
            map.into_iter()
                .map(|(k, m)| (k, Rc::new(RefCell::new(m))))
                .collect(),
        ))
    }

    /// Allocating `alpha * A + beta * B` over identical block grids.
    pub fn add(a: &SparseBlockMatrix, b: &SparseBlockMatrix, alpha: f64, beta: f64) -> Result<SparseBlockMatrix> {
        if a.row_offsets != b.row_offsets || a.col_offsets != b.col_offsets {
            return Err(Error::shape("sparse block add", (a.nrows(), a.ncols()), (b.nrows(), b.ncols())));
        }
        let mut map: BTreeMap<(usize, usize), DMatrix<f64>> = BTreeMap::new();
        for (m, factor) in [(a, alpha), (b, beta)] {
            for r in 0..m.block_rows() {
                for (blk, c) in m.row_blocks(r) {
                    let scaled = &*m.blocks[blk].borrow() * factor;
                    map.entry((r, c))
                        .and_modify(|acc| *acc += &scaled)
                        .or_insert(scaled);
                }
            }
        }
        Ok(Self::from_block_map(
            a.row_offsets.clone(),
            a.col_offsets.clone(),
            map.into_iter()
                .map(|(k, m)| (k, Rc::new(RefCell::new(m))))
                .collect(),
        ))
    }

    /// Scale every stored block in place.
    pub fn scale(&mut self, alpha: f64) {
        for block in self.unique_blocks() {
            *block.borrow_mut() *= alpha;
        }
        self.version = next_version();
    }

    /// Copying transpose.
    pub fn transpose(&self) -> SparseBlockMatrix {
        let mut map = BTreeMap::new();
        for r in 0..self.block_rows() {
            for (b, c) in self.row_blocks(r) {
                map.insert((c, r), Rc::new(RefCell::new(self.blocks[b].borrow().transpose())));
            }
        }
        Self::from_block_map(self.col_offsets.clone(), self.row_offsets.clone(), map)
    }

    /// New block row `i` is old block row `perm[i]`. Blocks are shared.
    pub fn row_permutation(&self, perm: &[usize]) -> Result<SparseBlockMatrix> {
        check_permutation(perm, self.block_rows())?;
        let old_sizes = sizes(&self.row_offsets);
        let new_sizes: Vec<usize> = perm.iter().map(|&old| old_sizes[old]).collect();
        let mut map: BTreeMap<(usize, usize), SharedBlock> = BTreeMap::new();
        for (new, &old) in perm.iter().enumerate() {
            for (b, c) in self.row_blocks(old) {
                map.insert((new, c), Rc::clone(&self.blocks[b]));
            }
        }
        Ok(Self::from_block_map(
            cumulative(&new_sizes),
            self.col_offsets.clone(),
            map,
        ))
    }

    /// New block column `j` is old block column `perm[j]`. Blocks are shared.
    pub fn column_permutation(&self, perm: &[usize]) -> Result<SparseBlockMatrix> {
        let inverse = check_permutation(perm, self.block_cols())?;
        let old_sizes = sizes(&self.col_offsets);
        let new_sizes: Vec<usize> = perm.iter().map(|&old| old_sizes[old]).collect();
        let mut map: BTreeMap<(usize, usize), SharedBlock> = BTreeMap::new();
        for r in 0..self.block_rows() {
            for (b, c) in self.row_blocks(r) {
                map.insert((r, inverse[c]), Rc::clone(&self.blocks[b]));
            }
        }
        Ok(Self::from_block_map(
            self.row_offsets.clone(),
            cumulative(&new_sizes),
            map,
        ))
    }

    /// Maximum absolute row sum.
    pub fn norm_inf(&self) -> f64 {
        let mut sums = vec![0.0; self.nrows()];
        for r in 0..self.block_rows() {
            let (r0, _) = self.row_span(r);
            for (b, _) in self.row_blocks(r) {
                let block = self.blocks[b].borrow();
                for j in 0..block.ncols() {
                    for i in 0..block.nrows() {
                        sums[r0 + i] += block[(i, j)].abs();
                    }
                }
            }
        }
        sums.into_iter().fold(0.0, f64::max)
    }

    /// Per-column maximum absolute value.
    pub fn norm_inf_by_column(&self) -> Vec<f64> {
        let mut norms = vec![0.0_f64; self.ncols()];
        for r in 0..self.block_rows() {
            for (b, c) in self.row_blocks(r) {
                let (c0, _) = self.col_span(c);
                let block = self.blocks[b].borrow();
                for j in 0..block.ncols() {
                    let col_max = block.column(j).iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
                    norms[c0 + j] = norms[c0 + j].max(col_max);
                }
            }
        }
        norms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DVector, dmatrix};

    fn mixed() -> (DMatrix<f64>, SparseBlockMatrix) {
        let dense = dmatrix![
            1.0, 2.0, 0.0, 0.0, 3.0;
            4.0, 5.0, 0.0, 0.0, 6.0;
            0.0, 0.0, 7.0, 8.0, 0.0;
            0.0, 0.0, 9.0, 1.0, 0.0;
            2.0, 0.0, 0.0, 0.0, 5.0
        ];
        let sbm = SparseBlockMatrix::from_dense(&dense, &[2, 2, 1], &[2, 2, 1]).unwrap();
        (dense, sbm)
    }

    #[test]
    fn gemv_matches_dense() {
        let (dense, sbm) = mixed();
        let x = [1.0, -1.0, 2.0, 0.5, 3.0];
        let mut y = vec![1.0; 5];
        sbm.gemv(2.0, &x, 0.5, &mut y).unwrap();
        let expected = dense * DVector::from_column_slice(&x) * 2.0 + DVector::from_element(5, 0.5);
        for i in 0..5 {
            assert!((y[i] - expected[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn gemv_rejects_bad_lengths() {
        let (_, sbm) = mixed();
        let mut y = vec![0.0; 4];
        assert!(sbm.gemv(1.0, &[0.0; 5], 0.0, &mut y).is_err());
    }

    #[test]
    fn row_prod_no_diag_skips_diagonal() {
        let (_, sbm) = mixed();
        let x = [1.0, 1.0, 1.0, 1.0, 1.0];
        let mut y = [0.0; 2];
        sbm.row_prod(0, &x, &mut y, true).unwrap();
        assert_eq!(y, [6.0, 15.0]);
        sbm.row_prod_no_diag(0, &x, &mut y, true).unwrap();
        assert_eq!(y, [3.0, 6.0]);
        sbm.row_prod_no_diag(0, &x, &mut y, false).unwrap();
        assert_eq!(y, [6.0, 12.0]);
    }

    #[test]
    fn gemm_without_allocation_requires_blocks() {
        let (dense, sbm) = mixed();
        let product = SparseBlockMatrix::multiply(&sbm, &sbm).unwrap();
        let mut c = product.clone();
        SparseBlockMatrix::gemm_without_allocation(1.0, &sbm, &sbm, 1.0, &mut c).unwrap();
        let expected = &dense * &dense * 2.0;
        assert!((c.to_dense() - expected).abs().max() < 1e-12);

        let mut empty = SparseBlockMatrix::new(&[2, 2, 1], &[2, 2, 1]);
        let err = SparseBlockMatrix::gemm_without_allocation(1.0, &sbm, &sbm, 0.0, &mut empty);
        assert!(matches!(err, Err(Error::ShapeMismatch { .. })));
        assert_eq!(empty.nnz_blocks(), 0);
    }

    #[test]
    fn add_and_scale() {
        let (dense, sbm) = mixed();
        let sum = SparseBlockMatrix::add(&sbm, &sbm, 1.0, -3.0).unwrap();
        assert_eq!(sum.to_dense(), &dense * -2.0);
        let mut scaled = sbm.clone();
        scaled.scale(0.5);
        assert_eq!(scaled.to_dense(), dense * 0.5);
    }

    #[test]
    fn transpose_copies() {
        let (dense, sbm) = mixed();
        let t = sbm.transpose();
        assert_eq!(t.to_dense(), dense.transpose());
        t.block(0).borrow_mut()[(0, 0)] = 100.0;
        assert_eq!(sbm.get_value(0, 0).unwrap(), 1.0);
    }

    #[test]
    fn permutations_share_blocks() {
        let (dense, sbm) = mixed();
        let rows = sbm.row_permutation(&[2, 0, 1]).unwrap();
        assert_eq!(rows.row_offsets(), &[1, 3, 5]);
        assert_eq!(rows.get_value(0, 0).unwrap(), dense[(4, 0)]);
        assert_eq!(rows.get_value(1, 4).unwrap(), dense[(0, 4)]);

        let cols = sbm.column_permutation(&[2, 0, 1]).unwrap();
        assert_eq!(cols.get_value(0, 0).unwrap(), dense[(0, 4)]);
        assert_eq!(cols.get_value(3, 3).unwrap(), dense[(3, 2)]);

        sbm.block(0).borrow_mut()[(0, 0)] = -1.0;
        assert_eq!(rows.get_value(1, 0).unwrap(), -1.0);
        assert!(sbm.row_permutation(&[0, 0, 1]).is_err());
    }

    #[test]
    fn uniform_3x3_gemv() {
        let dense = DMatrix::from_fn(6, 6, |i, j| (i * 6 + j) as f64 * 0.1);
        let sbm = SparseBlockMatrix::from_dense(&dense, &[3, 3], &[3, 3]).unwrap();
        assert!(sbm.is_uniform(3));
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut y = vec![0.0; 6];
        sbm.gemv_3x3(1.0, &x, 0.0, &mut y).unwrap();
        let expected = dense * DVector::from_column_slice(&x);
        for i in 0..6 {
            assert!((y[i] - expected[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn norms() {
        let (dense, sbm) = mixed();
        assert_eq!(sbm.norm_inf(), 15.0);
        let by_col = sbm.norm_inf_by_column();
        for j in 0..5 {
            let expected = dense.column(j).iter().fold(0.0_f64, |a, v| a.max(v.abs()));
            assert_eq!(by_col[j], expected);
        }
    }
}
