//! Dense matrices of expressions.

use std::fmt;
use std::ops::Index;

use crate::error::{ExprError, Result};
use crate::expr::Expr;

/// Row-major matrix of [`Expr`] entries.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ExprMatrix {
    nrows: usize,
    ncols: usize,
    data: Vec<Expr>,
}

impl ExprMatrix {
    /// Build from nested rows. Fails with [`ExprError::Shape`] on ragged input.
    pub fn from_rows(rows: Vec<Vec<Expr>>) -> Result<Self> {
        let nrows = rows.len();
        let ncols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|r| r.len() != ncols) {
            return Err(ExprError::Shape(format!(
                "row {bad} has {} entries, expected {ncols}",
                rows[bad].len()
            )));
        }
        Ok(Self {
            nrows,
            ncols,
            data: rows.into_iter().flatten().collect(),
        })
    }

    /// Build entry `(i, j)` as `f(i, j)`, row by row.
    pub fn from_fn(nrows: usize, ncols: usize, mut f: impl FnMut(usize, usize) -> Expr) -> Self {
        let mut data = Vec::with_capacity(nrows * ncols);
        for i in 0..nrows {
            for j in 0..ncols {
                data.push(f(i, j));
            }
        }
        Self { nrows, ncols, data }
    }

    /// Fallible [`ExprMatrix::from_fn`]; the first error aborts construction.
    pub fn try_from_fn(
        nrows: usize,
        ncols: usize,
        mut f: impl FnMut(usize, usize) -> Result<Expr>,
    ) -> Result<Self> {
        let mut data = Vec::with_capacity(nrows * ncols);
        for i in 0..nrows {
            for j in 0..ncols {
                data.push(f(i, j)?);
            }
        }
        Ok(Self { nrows, ncols, data })
    }

    /// All-zero matrix.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self::from_fn(nrows, ncols, |_, _| Expr::zero())
    }

    /// `n x n` identity.
    pub fn identity(n: usize) -> Self {
        Self::from_fn(n, n, |i, j| if i == j { Expr::one() } else { Expr::zero() })
    }

    /// Square diagonal matrix with the given diagonal.
    pub fn diag(entries: impl IntoIterator<Item = Expr>) -> Self {
        let entries: Vec<Expr> = entries.into_iter().collect();
        let n = entries.len();
        Self::from_fn(n, n, |i, j| {
            if i == j {
                entries[i].clone()
            } else {
                Expr::zero()
            }
        })
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// `true` if `nrows == ncols`.
    pub fn is_square(&self) -> bool {
        self.nrows == self.ncols
    }

    /// Entry `(i, j)`, or `None` when out of range.
    pub fn get(&self, i: usize, j: usize) -> Option<&Expr> {
        if i < self.nrows && j < self.ncols {
            self.data.get(i * self.ncols + j)
        } else {
            None
        }
    }

    /// Row `i`. Panics if `i >= nrows`.
    pub fn row(&self, i: usize) -> &[Expr] {
        &self.data[i * self.ncols..(i + 1) * self.ncols]
    }

    /// Entries in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &Expr> {
        self.data.iter()
    }

    /// The transposed matrix.
    pub fn transpose(&self) -> Self {
        Self::from_fn(self.ncols, self.nrows, |i, j| self[(j, i)].clone())
    }

    /// Apply `f` to every entry.
    pub fn map(&self, mut f: impl FnMut(&Expr) -> Expr) -> Self {
        Self {
            nrows: self.nrows,
            ncols: self.ncols,
            data: self.data.iter().map(&mut f).collect(),
        }
    }

    /// Fallible [`ExprMatrix::map`].
    pub fn try_map(&self, f: impl FnMut(&Expr) -> Result<Expr>) -> Result<Self> {
        Ok(Self {
            nrows: self.nrows,
            ncols: self.ncols,
            data: self.data.iter().map(f).collect::<Result<_>>()?,
        })
    }

    /// `true` if `self[(i, j)]` and `self[(j, i)]` are the same expression.
    pub fn is_structurally_symmetric(&self) -> bool {
        self.is_square()
            && (0..self.nrows).all(|i| (0..i).all(|j| self[(i, j)] == self[(j, i)]))
    }

    /// Matrix with row `row` and column `col` removed.
    pub fn minor(&self, row: usize, col: usize) -> Self {
        let mut data = Vec::with_capacity((self.nrows - 1) * (self.ncols - 1));
        for i in (0..self.nrows).filter(|&i| i != row) {
            for j in (0..self.ncols).filter(|&j| j != col) {
                data.push(self[(i, j)].clone());
            }
        }
        Self {
            nrows: self.nrows - 1,
            ncols: self.ncols - 1,
            data,
        }
    }

    fn require_square(&self) -> Result<()> {
        if self.is_square() {
            Ok(())
        } else {
            Err(ExprError::Shape(format!(
                "expected a square matrix, got {}x{}",
                self.nrows, self.ncols
            )))
        }
    }

    /// Unsimplified determinant by cofactor expansion along the first row.
    ///
    /// Zero entries are skipped, so diagonal and block-sparse matrices stay
    /// cheap.
    pub fn cofactor_determinant(&self) -> Result<Expr> {
        self.require_square()?;
        Ok(det_rec(self))
    }

    /// Unsimplified adjugate (transpose of the cofactor matrix).
    pub fn adjugate(&self) -> Result<Self> {
        self.require_square()?;
        let n = self.nrows;
        if n == 1 {
            return Ok(Self::identity(1));
        }
        Ok(Self::from_fn(n, n, |i, j| {
            let c = det_rec(&self.minor(j, i));
            if (i + j) % 2 == 0 { c } else { -c }
        }))
    }
}

fn det_rec(m: &ExprMatrix) -> Expr {
    match m.nrows {
        0 => Expr::one(),
        1 => m[(0, 0)].clone(),
        2 => &m[(0, 0)] * &m[(1, 1)] - &m[(0, 1)] * &m[(1, 0)],
        n => Expr::sum((0..n).filter(|&j| !m[(0, j)].is_zero()).map(|j| {
            let term = &m[(0, j)] * det_rec(&m.minor(0, j));
            if j % 2 == 0 { term } else { -term }
        })),
    }
}

impl Index<(usize, usize)> for ExprMatrix {
    type Output = Expr;

    fn index(&self, (i, j): (usize, usize)) -> &Expr {
        assert!(i < self.nrows && j < self.ncols, "index ({i}, {j}) out of bounds");
        &self.data[i * self.ncols + j]
    }
}

impl fmt::Debug for ExprMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries((0..self.nrows).map(|i| self.row(i)))
            .finish()
    }
}

impl fmt::Display for ExprMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for i in 0..self.nrows {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str("[")?;
            for (j, e) in self.row(i).iter().enumerate() {
                if j > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{e}")?;
            }
            f.write_str("]")?;
        }
        f.write_str("]")
    }
}
