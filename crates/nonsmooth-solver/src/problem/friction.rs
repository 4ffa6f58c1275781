use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use nonsmooth_core::{NumericMatrix, Storage};

use super::next_stamp;
use crate::error::{Error, Result};

/// Friction-contact problem in reduced form: find reactions `r` and
/// velocities `u = M r + q` such that for every contact `i`,
/// `K_i ∋ r_i ⟂ û_i ∈ K_i*`, where `K_i` is the Coulomb cone of friction
/// coefficient `mu_i` and `û_i` the De Saxcé modified velocity.
///
/// Each contact occupies `dimension` consecutive rows: the normal component
/// first, then one (2D) or two (3D) tangential components.
#[derive(Debug, Clone)]
pub struct FrictionContactProblem {
    dimension: usize,
    number_of_contacts: usize,
    m: NumericMatrix,
    q: Vec<f64>,
    mu: Vec<f64>,
    version: u64,
}

/// Data of a single contact with the others frozen.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalContactProblem {
    /// Diagonal block `W_ii`.
    pub w: DMatrix<f64>,
    /// `q_i + Σ_{j≠i} W_ij r_j`.
    pub q: Vec<f64>,
    pub mu: f64,
}

impl LocalContactProblem {
    pub fn dimension(&self) -> usize {
        self.q.len()
    }

    /// `u = W r + q`.
    pub fn velocity(&self, r: &[f64], u: &mut [f64]) {
        u.copy_from_slice(&self.q);
        for (j, rj) in r.iter().enumerate() {
            for (i, ui) in u.iter_mut().enumerate() {
                *ui += self.w[(i, j)] * rj;
            }
        }
    }
}

fn check_mu(mu: &[f64]) -> Result<()> {
    if let Some((i, m)) = mu.iter().enumerate().find(|(_, m)| m.is_nan() || **m < 0.0) {
        return Err(Error::InvalidProblem(format!(
            "friction coefficient of contact {i} must be non-negative, got {m}"
        )));
    }
    Ok(())
}

impl FrictionContactProblem {
    pub fn new(dimension: usize, m: NumericMatrix, q: Vec<f64>, mu: Vec<f64>) -> Result<Self> {
        if dimension != 2 && dimension != 3 {
            return Err(Error::InvalidProblem(format!(
                "contact dimension must be 2 or 3, got {dimension}"
            )));
        }
        let number_of_contacts = mu.len();
        let n = dimension * number_of_contacts;
        if m.shape() != (n, n) {
            return Err(Error::Core(nonsmooth_core::Error::ShapeMismatch {
                context: "friction-contact matrix",
                expected: (n, n),
                actual: m.shape(),
            }));
        }
        if q.len() != n {
            return Err(Error::dimension("friction-contact vector q", n, q.len()));
        }
        check_mu(&mu)?;
        Ok(Self {
            dimension,
            number_of_contacts,
            m,
            q,
            mu,
            version: next_stamp(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn number_of_contacts(&self) -> usize {
        self.number_of_contacts
    }

    pub fn size(&self) -> usize {
        self.q.len()
    }

    pub fn m(&self) -> &NumericMatrix {
        &self.m
    }

    pub fn q(&self) -> &[f64] {
        &self.q
    }

    pub fn mu(&self) -> &[f64] {
        &self.mu
    }

    /// Changes with every mutation of the problem data.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Mutable access to `M`; counts as a mutation.
    pub fn m_mut(&mut self) -> &mut NumericMatrix {
        self.version = next_stamp();
        &mut self.m
    }

    pub fn set_q(&mut self, q: Vec<f64>) -> Result<()> {
        if q.len() != self.size() {
            return Err(Error::dimension("friction-contact vector q", self.size(), q.len()));
        }
        self.q = q;
        self.version = next_stamp();
        Ok(())
    }

    pub fn set_mu(&mut self, mu: Vec<f64>) -> Result<()> {
        if mu.len() != self.number_of_contacts {
            return Err(Error::dimension(
                "friction coefficients",
                self.number_of_contacts,
                mu.len(),
            ));
        }
        check_mu(&mu)?;
        self.mu = mu;
        self.version = next_stamp();
        Ok(())
    }

    /// `M := alpha gamma² M`, `q := alpha gamma q`.
    ///
    /// A solution `(r', u')` of the rescaled problem maps back through
    /// [`unscale_solution`](Self::unscale_solution).
    pub fn rescale(&mut self, alpha: f64, gamma: f64) -> Result<()> {
        check_factors(alpha, gamma)?;
        self.m.scale(alpha * gamma * gamma);
        let s = alpha * gamma;
        self.q.iter_mut().for_each(|v| *v *= s);
        self.version = next_stamp();
        log::debug!("rescaled friction-contact problem with alpha={alpha}, gamma={gamma}");
        Ok(())
    }

    /// `r = gamma r'`, `u = u' / (alpha gamma)`.
    pub fn unscale_solution(
        alpha: f64,
        gamma: f64,
        reaction: &mut [f64],
        velocity: &mut [f64],
    ) -> Result<()> {
        check_factors(alpha, gamma)?;
        reaction.iter_mut().for_each(|v| *v *= gamma);
        let s = 1.0 / (alpha * gamma);
        velocity.iter_mut().for_each(|v| *v *= s);
        Ok(())
    }

    /// `u = M r + q`.
    pub fn velocity(&self, reaction: &[f64], velocity: &mut [f64]) -> Result<()> {
        velocity.copy_from_slice(&self.q);
        self.m.gemv(1.0, reaction, 1.0, velocity)?;
        Ok(())
    }

    pub(crate) fn check_buffers(&self, reaction: &[f64], velocity: &[f64]) -> Result<()> {
        if reaction.len() != self.size() {
            return Err(Error::dimension("reaction", self.size(), reaction.len()));
        }
        if velocity.len() != self.size() {
            return Err(Error::dimension("velocity", self.size(), velocity.len()));
        }
        Ok(())
    }

    /// Whether `M` is stored as a sparse block matrix on the contact grid.
    fn contact_blocks(&self) -> Option<&nonsmooth_core::SparseBlockMatrix> {
        match self.m.storage() {
            Storage::SparseBlock(sbm)
                if sbm.block_rows() == self.number_of_contacts
                    && sbm.block_cols() == self.number_of_contacts
                    && sbm.is_uniform(self.dimension) =>
            {
                Some(sbm)
            }
            _ => None,
        }
    }

    /// Diagonal block of `contact`.
    pub fn diagonal_block(&self, contact: usize) -> Result<DMatrix<f64>> {
        self.check_contact(contact)?;
        let d = self.dimension;
        if let Some(sbm) = self.contact_blocks() {
            return Ok(sbm
                .diagonal_block_index(contact)
                .map_or_else(|| DMatrix::zeros(d, d), |b| sbm.block(b).borrow().clone()));
        }
        let base = contact * d;
        let mut w = DMatrix::zeros(d, d);
        for j in 0..d {
            for i in 0..d {
                w[(i, j)] = self.m.get(base + i, base + j)?;
            }
        }
        Ok(w)
    }

    /// Local problem of `contact` with the other reactions fixed at
    /// `reaction`.
    pub fn local_problem(&self, contact: usize, reaction: &[f64]) -> Result<LocalContactProblem> {
        let w = self.diagonal_block(contact)?;
        let d = self.dimension;
        let base = contact * d;
        let mut q = self.q[base..base + d].to_vec();
        if let Some(sbm) = self.contact_blocks() {
            sbm.row_prod_no_diag(contact, reaction, &mut q, false)?;
        } else {
            let r_local = &reaction[base..base + d];
            for (k, qk) in q.iter_mut().enumerate() {
                let diag: f64 = (0..d).map(|l| w[(k, l)] * r_local[l]).sum();
                *qk += self.m.row_dot(base + k, reaction)? - diag;
            }
        }
        Ok(LocalContactProblem {
            w,
            q,
            mu: self.mu[contact],
        })
    }

    fn check_contact(&self, contact: usize) -> Result<()> {
        if contact >= self.number_of_contacts {
            return Err(Error::InvalidProblem(format!(
                "contact {contact} out of range for {} contacts",
                self.number_of_contacts
            )));
        }
        Ok(())
    }
}

fn check_factors(alpha: f64, gamma: f64) -> Result<()> {
    if !(alpha > 0.0 && gamma > 0.0 && alpha.is_finite() && gamma.is_finite()) {
        return Err(Error::InvalidProblem(format!(
            "rescaling factors must be positive, got alpha={alpha}, gamma={gamma}"
        )));
    }
    Ok(())
}

/// Normal/tangential view of a [`FrictionContactProblem`]:
/// `M_nn, M_nt, M_tn, M_tt` and `q_n, q_t`.
///
/// The view is stamped with the version of the problem it was built from;
/// [`is_stale`](Self::is_stale) reports when the source has changed since.
#[derive(Debug, Clone)]
pub struct SplitFrictionContactProblem {
    pub m_nn: NumericMatrix,
    pub m_nt: NumericMatrix,
    pub m_tn: NumericMatrix,
    pub m_tt: NumericMatrix,
    pub q_n: Vec<f64>,
    pub q_t: Vec<f64>,
    source_version: u64,
}

impl SplitFrictionContactProblem {
    pub fn new(problem: &FrictionContactProblem) -> Self {
        let d = problem.dimension();
        let nc = problem.number_of_contacts();
        let nt = nc * (d - 1);

        // Row or column index within the normal or tangential sub-vector.
        let split = |i: usize| -> (bool, usize) {
            let (contact, k) = (i / d, i % d);
            if k == 0 {
                (true, contact)
            } else {
                (false, contact * (d - 1) + k - 1)
            }
        };

        let mut nn = CooMatrix::new(nc, nc);
        let mut n_t = CooMatrix::new(nc, nt);
        let mut t_n = CooMatrix::new(nt, nc);
        let mut tt = CooMatrix::new(nt, nt);
        for (i, j, v) in problem.m().triplets() {
            if v == 0.0 {
                continue;
            }
            match (split(i), split(j)) {
                ((true, a), (true, b)) => nn.push(a, b, v),
                ((true, a), (false, b)) => n_t.push(a, b, v),
                ((false, a), (true, b)) => t_n.push(a, b, v),
                ((false, a), (false, b)) => tt.push(a, b, v),
            }
        }

        let mut q_n = Vec::with_capacity(nc);
        let mut q_t = Vec::with_capacity(nt);
        for (i, &v) in problem.q().iter().enumerate() {
            if i % d == 0 {
                q_n.push(v);
            } else {
                q_t.push(v);
            }
        }

        let sparse = |coo: &CooMatrix<f64>| NumericMatrix::sparse(CsrMatrix::from(coo));
        Self {
            m_nn: sparse(&nn),
            m_nt: sparse(&n_t),
            m_tn: sparse(&t_n),
            m_tt: sparse(&tt),
            q_n,
            q_t,
            source_version: problem.version(),
        }
    }

    pub fn source_version(&self) -> u64 {
        self.source_version
    }

    pub fn is_stale(&self, problem: &FrictionContactProblem) -> bool {
        self.source_version != problem.version()
    }

    /// Rebuild from `problem` if it changed since this view was taken.
    pub fn refresh(&mut self, problem: &FrictionContactProblem) {
        if self.is_stale(problem) {
            log::debug!("rebuilding split view of friction-contact problem");
            *self = Self::new(problem);
        }
    }
}
