//! Immutable rank-`R` arrays of symbolic entries.

use std::fmt;
use std::ops::Index;

use phyz_expr::Expr;

/// Dense rank-`R` tensor over a `dim`-dimensional index space.
///
/// Entries are stored row-major: the last index varies fastest. A tensor is
/// only ever observed fully built.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Tensor<const R: usize> {
    dim: usize,
    data: Vec<Expr>,
}

impl<const R: usize> Tensor<R> {
    fn len_for(dim: usize) -> usize {
        (0..R).fold(1, |acc, _| acc * dim)
    }

    /// Flat storage offset of `idx`.
    pub(crate) fn offset(dim: usize, idx: [usize; R]) -> usize {
        idx.iter().fold(0, |acc, &i| acc * dim + i)
    }

    fn unflatten(dim: usize, mut flat: usize) -> [usize; R] {
        let mut idx = [0; R];
        for slot in idx.iter_mut().rev() {
            *slot = flat % dim;
            flat /= dim;
        }
        idx
    }

    /// Build entry `idx` as `f(idx)` in row-major order.
    pub fn from_fn(dim: usize, mut f: impl FnMut([usize; R]) -> Expr) -> Self {
        let data = (0..Self::len_for(dim))
            .map(|flat| f(Self::unflatten(dim, flat)))
            .collect();
        Self { dim, data }
    }

    /// Build every entry or fail on the first error.
    pub fn try_from_fn<E>(dim: usize, mut f: impl FnMut([usize; R]) -> Result<Expr, E>) -> Result<Self, E> {
        Self::try_build(dim, |idx, _| f(idx))
    }

    /// Like [`Tensor::try_from_fn`], but `f` also sees the entries built so
    /// far (in row-major order), so symmetric partners can be reused.
    pub(crate) fn try_build<E>(
        dim: usize,
        mut f: impl FnMut([usize; R], &[Expr]) -> Result<Expr, E>,
    ) -> Result<Self, E> {
        let len = Self::len_for(dim);
        let mut data = Vec::with_capacity(len);
        for flat in 0..len {
            let entry = f(Self::unflatten(dim, flat), &data)?;
            data.push(entry);
        }
        Ok(Self { dim, data })
    }

    /// Tensor with every entry the literal zero.
    pub fn zeros(dim: usize) -> Self {
        Self::from_fn(dim, |_| Expr::zero())
    }

    /// Range of each index.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Entry at `idx`, or `None` if any index is out of range.
    pub fn get(&self, idx: [usize; R]) -> Option<&Expr> {
        if idx.iter().all(|&i| i < self.dim) {
            self.data.get(Self::offset(self.dim, idx))
        } else {
            None
        }
    }

    /// All `(index, entry)` pairs in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = ([usize; R], &Expr)> {
        self.data
            .iter()
            .enumerate()
            .map(|(flat, e)| (Self::unflatten(self.dim, flat), e))
    }

    /// Entries that are not the literal zero.
    pub fn nonzero(&self) -> impl Iterator<Item = ([usize; R], &Expr)> {
        self.iter().filter(|(_, e)| !e.is_zero())
    }

    /// `true` if every entry is the literal zero.
    pub fn is_zero(&self) -> bool {
        self.data.iter().all(Expr::is_zero)
    }

    /// Apply `f` to every entry.
    pub fn map(&self, f: impl FnMut(&Expr) -> Expr) -> Self {
        Self {
            dim: self.dim,
            data: self.data.iter().map(f).collect(),
        }
    }

    /// Fallible [`Tensor::map`].
    pub fn try_map<E>(&self, f: impl FnMut(&Expr) -> Result<Expr, E>) -> Result<Self, E> {
        Ok(Self {
            dim: self.dim,
            data: self.data.iter().map(f).collect::<Result<_, E>>()?,
        })
    }
}

impl<const R: usize> Index<[usize; R]> for Tensor<R> {
    type Output = Expr;

    fn index(&self, idx: [usize; R]) -> &Expr {
        assert!(
            idx.iter().all(|&i| i < self.dim),
            "index {idx:?} out of bounds for dimension {}",
            self.dim
        );
        &self.data[Self::offset(self.dim, idx)]
    }
}

impl<const R: usize> fmt::Debug for Tensor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.nonzero()).finish()
    }
}

/// One line per non-zero entry: `[i, j, k] = expr`.
impl<const R: usize> fmt::Display for Tensor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut any = false;
        for (idx, e) in self.nonzero() {
            writeln!(f, "{idx:?} = {e}")?;
            any = true;
        }
        if !any {
            writeln!(f, "0")?;
        }
        Ok(())
    }
}
