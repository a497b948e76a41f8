//! Shape management for tensors: dimensions and layout.

use std::fmt;
use thiserror::Error;

/// Error when shape is invalid for an operation.
#[derive(Error, Debug)]
#[error("shape error: {0}")]
pub struct ShapeError(pub String);

/// Highest rank a tensor may carry. Nothing in this engine needs more; attention
/// reshapes stay at rank 4 (batch-free: seq, heads, head_dim) at most.
pub const MAX_RANK: usize = 8;

/// Shape of a tensor: ordered list of dimension sizes.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Create a shape from dimension sizes.
    ///
    /// Panics in debug builds if `dims.len() > MAX_RANK`; release builds trust
    /// the caller, matching how shape mismatches elsewhere in this crate are
    /// debug-assertable rather than checked on every hot-path call.
    pub fn new(dims: Vec<usize>) -> Self {
        debug_assert!(
            dims.len() <= MAX_RANK,
            "shape rank {} exceeds MAX_RANK {}",
            dims.len(),
            MAX_RANK
        );
        Shape { dims }
    }

    /// Number of dimensions (rank).
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Dimension sizes as slice.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    /// Check if this shape is compatible for element-wise op with another (same shape).
    pub fn same_as(&self, other: &Shape) -> bool {
        self.dims == other.dims
    }

    /// Check if shape is a scalar (0 dimensions or single element).
    pub fn is_scalar(&self) -> bool {
        self.numel() <= 1
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shape{:?}", self.dims)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.dims)
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::new(dims.to_vec())
    }
}
