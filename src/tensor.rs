//! Dense rank-3 tensor container
//!
//! A contiguous batch of matrices: `batch × rows × row_size` (image-like
//! data keeps one matrix per sample). Same ownership rules as the other
//! containers — `assign` is the only growth point.

/// Dense tensor of `T`, laid out batch-major
///
/// # Examples
///
/// ```
/// use centella::Tensor;
///
/// let mut t = Tensor::new();
/// t.assign(2, 3, 3, 0u8);
/// assert_eq!(t.batch(), 2);
/// assert_eq!(t.matrix_size(), 9);
/// assert_eq!(t.element(1).len(), 9);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tensor<T> {
    batch: usize,
    rows: usize,
    row_size: usize,
    data: Vec<T>,
}

impl<T: Copy> Tensor<T> {
    /// Create an empty tensor with no storage
    pub fn new() -> Self {
        Self {
            batch: 0,
            rows: 0,
            row_size: 0,
            data: Vec::new(),
        }
    }

    /// Resize to `batch × rows × row_size`, every slot set to `value`
    pub fn assign(&mut self, batch: usize, rows: usize, row_size: usize, value: T) {
        self.batch = batch;
        self.rows = rows;
        self.row_size = row_size;
        self.data.clear();
        self.data.resize(batch * rows * row_size, value);
    }

    /// Outer (batch) count
    pub fn batch(&self) -> usize {
        self.batch
    }

    /// Rows within one batch element
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Elements per row within one batch element
    pub fn row_size(&self) -> usize {
        self.row_size
    }

    /// Elements in one batch element (`rows * row_size`)
    pub fn matrix_size(&self) -> usize {
        self.rows * self.row_size
    }

    /// Total element count
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the tensor has no storage
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Batch element `i` as a flat slice of `matrix_size()` elements
    ///
    /// # Panics
    ///
    /// Panics if `i >= batch()`.
    pub fn element(&self, i: usize) -> &[T] {
        let sz = self.matrix_size();
        &self.data[i * sz..(i + 1) * sz]
    }

    /// Batch element `i` as a mutable flat slice
    ///
    /// # Panics
    ///
    /// Panics if `i >= batch()`.
    pub fn element_mut(&mut self, i: usize) -> &mut [T] {
        let sz = self.matrix_size();
        &mut self.data[i * sz..(i + 1) * sz]
    }

    /// Whole storage as a slice
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Whole storage as a mutable slice
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}
