//! Dense row-major f64 tensor.
//!
//! A tensor is either `Persistent` (an ordinary heap buffer; parameters and
//! optimizer moments) or `Temporary` (carved out of an [`crate::arena::Arena`];
//! everything produced while building one iteration's graph). Both share the
//! same shape and indexing rules; only the backing storage and its lifetime
//! differ. Matmul is the one operation with an accelerated backend; every
//! other kernel lives here directly.

use crate::arena::{Arena, ArenaSlice};
use crate::shape::{Shape, ShapeError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TensorError {
    #[error("shape error: {0}")]
    Shape(#[from] ShapeError),
    #[error("shape mismatch: {0}")]
    Mismatch(String),
}

pub type TensorResult<T> = Result<T, TensorError>;

enum Storage {
    Persistent(Vec<f64>),
    Temporary(ArenaSlice),
}

pub struct Tensor {
    storage: Storage,
    shape: Shape,
}

impl Tensor {
    pub fn persistent(data: Vec<f64>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.numel(),
            "tensor data length {} does not match shape {:?}",
            data.len(),
            shape
        );
        Tensor {
            storage: Storage::Persistent(data),
            shape,
        }
    }

    pub fn zeros_persistent(shape: Shape) -> Self {
        let n = shape.numel();
        Tensor::persistent(vec![0.0; n], shape)
    }

    /// Zero-filled temporary tensor carved from `arena`.
    pub fn temp(arena: &Arena, shape: Shape) -> Self {
        let n = shape.numel();
        let slice = arena.alloc(n);
        Tensor {
            storage: Storage::Temporary(slice),
            shape,
        }
    }

    pub fn temp_from_slice(arena: &Arena, shape: Shape, values: &[f64]) -> Self {
        let mut t = Tensor::temp(arena, shape);
        t.data_mut().copy_from_slice(values);
        t
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self.storage, Storage::Persistent(_))
    }

    pub fn data(&self) -> &[f64] {
        match &self.storage {
            Storage::Persistent(v) => v.as_slice(),
            // Safety: caller-discipline contract documented on `ArenaSlice` --
            // a `Tensor` wrapping `Temporary` storage must not outlive the
            // arena reset that invalidates it.
            Storage::Temporary(s) => unsafe { s.as_slice() },
        }
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        match &mut self.storage {
            Storage::Persistent(v) => v.as_mut_slice(),
            Storage::Temporary(s) => unsafe { s.as_mut_slice() },
        }
    }

    pub fn fill(&mut self, value: f64) {
        self.data_mut().iter_mut().for_each(|x| *x = value);
    }

    /// Accumulate `other` into `self` element-wise (`self += other`). Every
    /// backward kernel accumulates through this rather than overwriting, so a
    /// variable used as input to more than one op sums its contributions.
    pub fn accumulate(&mut self, other: &Tensor) {
        debug_assert!(self.shape.same_as(&other.shape));
        let o = other.data().to_vec();
        let s = self.data_mut();
        for i in 0..s.len() {
            s[i] += o[i];
        }
    }

    pub fn clone_as_persistent(&self) -> Tensor {
        Tensor::persistent(self.data().to_vec(), self.shape.clone())
    }

    fn check_same_shape(&self, other: &Tensor, op: &str) -> TensorResult<()> {
        if !self.shape.same_as(&other.shape) {
            return Err(TensorError::Mismatch(format!(
                "{op}: shape mismatch {:?} vs {:?}",
                self.shape, other.shape
            )));
        }
        Ok(())
    }

    pub fn add(&self, other: &Tensor, arena: &Arena) -> TensorResult<Tensor> {
        self.check_same_shape(other, "add")?;
        let mut out = Tensor::temp(arena, self.shape.clone());
        let (a, b) = (self.data(), other.data());
        let o = out.data_mut();
        for i in 0..o.len() {
            o[i] = a[i] + b[i];
        }
        Ok(out)
    }

    pub fn sub(&self, other: &Tensor, arena: &Arena) -> TensorResult<Tensor> {
        self.check_same_shape(other, "sub")?;
        let mut out = Tensor::temp(arena, self.shape.clone());
        let (a, b) = (self.data(), other.data());
        let o = out.data_mut();
        for i in 0..o.len() {
            o[i] = a[i] - b[i];
        }
        Ok(out)
    }

    pub fn mul(&self, other: &Tensor, arena: &Arena) -> TensorResult<Tensor> {
        self.check_same_shape(other, "mul")?;
        let mut out = Tensor::temp(arena, self.shape.clone());
        let (a, b) = (self.data(), other.data());
        let o = out.data_mut();
        for i in 0..o.len() {
            o[i] = a[i] * b[i];
        }
        Ok(out)
    }

    /// Row-broadcast add: `self` is `[n, k]`, `bias` is `[k]`. Backs `Linear`'s
    /// bias term; not one of the core autodiff kernels but follows the same
    /// arena discipline and participates in the tape the same way.
    pub fn add_broadcast_row(&self, bias: &Tensor, arena: &Arena) -> TensorResult<Tensor> {
        let dims = self.shape.dims();
        if dims.len() != 2 || bias.shape.rank() != 1 || bias.shape.dims()[0] != dims[1] {
            return Err(TensorError::Mismatch(format!(
                "add_broadcast_row: incompatible shapes {:?} + {:?}",
                self.shape, bias.shape
            )));
        }
        let (n, k) = (dims[0], dims[1]);
        let mut out = Tensor::temp(arena, self.shape.clone());
        let (a, b) = (self.data(), bias.data());
        let o = out.data_mut();
        for i in 0..n {
            for j in 0..k {
                o[i * k + j] = a[i * k + j] + b[j];
            }
        }
        Ok(out)
    }

    /// `C[m,n] = A[m,k] . B[k,n]`, portable triple-loop fallback. Used directly
    /// when the `blas` feature is off, and by tests regardless of feature
    /// selection to pin down exact expected values.
    pub fn matmul_cpu(&self, other: &Tensor, arena: &Arena) -> TensorResult<Tensor> {
        let (m, k) = match self.shape.dims() {
            [m, k] => (*m, *k),
            _ => {
                return Err(TensorError::Mismatch(format!(
                    "matmul: lhs must be rank 2, got {:?}",
                    self.shape
                )))
            }
        };
        let (k2, n) = match other.shape.dims() {
            [k2, n] => (*k2, *n),
            _ => {
                return Err(TensorError::Mismatch(format!(
                    "matmul: rhs must be rank 2, got {:?}",
                    other.shape
                )))
            }
        };
        if k != k2 {
            return Err(TensorError::Mismatch(format!(
                "matmul: inner dims mismatch {k} vs {k2}"
            )));
        }
        let mut out = Tensor::temp(arena, Shape::new(vec![m, n]));
        let (a, b) = (self.data(), other.data());
        let o = out.data_mut();
        for i in 0..m {
            for l in 0..k {
                let a_il = a[i * k + l];
                if a_il == 0.0 {
                    continue;
                }
                for j in 0..n {
                    o[i * n + j] += a_il * b[l * n + j];
                }
            }
        }
        Ok(out)
    }

    pub fn transpose2d(&self, arena: &Arena) -> TensorResult<Tensor> {
        let (m, n) = match self.shape.dims() {
            [m, n] => (*m, *n),
            _ => {
                return Err(TensorError::Mismatch(format!(
                    "transpose: expected rank 2, got {:?}",
                    self.shape
                )))
            }
        };
        let mut out = Tensor::temp(arena, Shape::new(vec![n, m]));
        let a = self.data();
        let o = out.data_mut();
        for i in 0..m {
            for j in 0..n {
                o[j * m + i] = a[i * n + j];
            }
        }
        Ok(out)
    }

    /// Reinterpret the same elements under a new shape. Copies into a fresh
    /// temporary rather than aliasing storage, so the persistent/temporary tag
    /// of the result always matches where it was allocated.
    pub fn reshape(&self, new_shape: Shape, arena: &Arena) -> TensorResult<Tensor> {
        if new_shape.numel() != self.shape.numel() {
            return Err(TensorError::Mismatch(format!(
                "reshape: element count mismatch {:?} -> {:?}",
                self.shape, new_shape
            )));
        }
        Ok(Tensor::temp_from_slice(arena, new_shape, self.data()))
    }

    pub fn relu(&self, arena: &Arena) -> TensorResult<Tensor> {
        let mut out = Tensor::temp(arena, self.shape.clone());
        let a = self.data();
        let o = out.data_mut();
        for i in 0..o.len() {
            o[i] = a[i].max(0.0);
        }
        Ok(out)
    }

    /// Softmax over each row of a rank-2 tensor, with max-subtraction for
    /// numerical stability.
    pub fn softmax_row(&self, arena: &Arena) -> TensorResult<Tensor> {
        let (rows, cols) = match self.shape.dims() {
            [r, c] => (*r, *c),
            _ => {
                return Err(TensorError::Mismatch(format!(
                    "softmax_row: expected rank 2, got {:?}",
                    self.shape
                )))
            }
        };
        let mut out = Tensor::temp(arena, self.shape.clone());
        let a = self.data();
        let o = out.data_mut();
        for r in 0..rows {
            let row = &a[r * cols..(r + 1) * cols];
            let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mut sum = 0.0;
            let out_row = &mut o[r * cols..(r + 1) * cols];
            for (j, &x) in row.iter().enumerate() {
                let e = (x - max).exp();
                out_row[j] = e;
                sum += e;
            }
            let sum = sum.max(1e-12);
            for v in out_row.iter_mut() {
                *v /= sum;
            }
        }
        Ok(out)
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("persistent", &self.is_persistent())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(vals: &[f64], shape: Vec<usize>, arena: &Arena) -> Tensor {
        Tensor::temp_from_slice(arena, Shape::new(shape), vals)
    }

    #[test]
    fn add_matches_elementwise_sum() {
        let arena = Arena::new();
        let a = t(&[1.0, 2.0, 3.0, 4.0], vec![2, 2], &arena);
        let b = t(&[5.0, 6.0, 7.0, 8.0], vec![2, 2], &arena);
        let c = a.add(&b, &arena).unwrap();
        assert_eq!(c.data(), &[6.0, 8.0, 10.0, 12.0]);
    }

    #[test]
    fn matmul_2x2() {
        let arena = Arena::new();
        let a = t(&[1.0, 2.0, 3.0, 4.0], vec![2, 2], &arena);
        let b = t(&[5.0, 6.0, 7.0, 8.0], vec![2, 2], &arena);
        let c = a.matmul_cpu(&b, &arena).unwrap();
        assert_eq!(c.data(), &[19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn transpose_2x3() {
        let arena = Arena::new();
        let a = t(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3], &arena);
        let b = a.transpose2d(&arena).unwrap();
        assert_eq!(b.shape().dims(), &[3, 2]);
        assert_eq!(b.data(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn softmax_row_sums_to_one() {
        let arena = Arena::new();
        let a = t(&[1.0, 2.0, 3.0, 1.0, 1.0, 1.0], vec![2, 3], &arena);
        let s = a.softmax_row(&arena).unwrap();
        for r in 0..2 {
            let row_sum: f64 = s.data()[r * 3..(r + 1) * 3].iter().sum();
            assert!((row_sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn relu_zeros_negatives() {
        let arena = Arena::new();
        let a = t(&[2.0, -1.0, 3.0, -2.0], vec![4], &arena);
        let r = a.relu(&arena).unwrap();
        assert_eq!(r.data(), &[2.0, 0.0, 3.0, 0.0]);
    }

    #[test]
    fn accumulate_sums_in_place() {
        let arena = Arena::new();
        let mut a = t(&[1.0, 2.0], vec![2], &arena);
        let b = t(&[10.0, 20.0], vec![2], &arena);
        a.accumulate(&b);
        assert_eq!(a.data(), &[11.0, 22.0]);
    }
}
