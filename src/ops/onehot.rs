//! One-hot gradient subtraction
//!
//! The cross-entropy gradient step: for every row `r` of the destination,
//! subtract 1 at the column named by `labels[r]`. Sparse single-element
//! access per row, so the portable loop is the most capable kernel on every
//! host.

use crate::error::{CentellaError, Result};
use crate::matrix::Matrix;
use crate::ops::{check_dest, check_inst, check_shape, check_src, MulElement};
use crate::vector::Vector;
use crate::InstSet;

/// `dest[r][labels[r]] -= 1` for every row
///
/// All labels are validated against the row size before anything is
/// written, so an out-of-range label leaves the destination untouched.
///
/// # Examples
///
/// ```
/// use centella::{ops, Matrix, Vector};
///
/// let mut dest = Matrix::new();
/// dest.assign(3, 4, 0.0f32);
/// let labels = Vector::from_slice(&[0u8, 2, 1]);
/// ops::onehot_subtract(&mut dest, &labels).unwrap();
/// assert_eq!(dest.row(0), &[-1.0, 0.0, 0.0, 0.0]);
/// assert_eq!(dest.row(1), &[0.0, 0.0, -1.0, 0.0]);
/// assert_eq!(dest.row(2), &[0.0, -1.0, 0.0, 0.0]);
/// ```
pub fn onehot_subtract<T>(dest: &mut Matrix<T>, labels: &Vector<u8>) -> Result<()>
where
    T: MulElement + core::ops::SubAssign,
{
    onehot_subtract_with(InstSet::detect(), dest, labels)
}

/// [`onehot_subtract`] with a forced instruction set (test seam)
pub fn onehot_subtract_with<T>(
    inst: InstSet,
    dest: &mut Matrix<T>,
    labels: &Vector<u8>,
) -> Result<()>
where
    T: MulElement + core::ops::SubAssign,
{
    check_inst(inst)?;
    check_dest(dest)?;
    check_src(labels)?;
    check_shape(dest.rows(), labels.len())?;

    // Validate every label before the first write
    for &label in labels.as_slice() {
        if usize::from(label) >= dest.row_size() {
            return Err(CentellaError::ShapeMismatch {
                expected: dest.row_size(),
                actual: usize::from(label),
            });
        }
    }

    for (r, &label) in labels.as_slice().iter().enumerate() {
        dest.row_mut(r)[usize::from(label)] -= T::ONE;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subtracts_at_labelled_columns() {
        let mut dest = Matrix::new();
        dest.assign(3, 4, 0.0f32);
        let labels = Vector::from_slice(&[0u8, 2, 1]);
        onehot_subtract(&mut dest, &labels).unwrap();
        assert_eq!(dest.row(0), &[-1.0, 0.0, 0.0, 0.0]);
        assert_eq!(dest.row(1), &[0.0, 0.0, -1.0, 0.0]);
        assert_eq!(dest.row(2), &[0.0, -1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_accumulates_on_existing_values() {
        let mut dest = Matrix::from_vec(1, 2, vec![0.75f64, 0.25]).unwrap();
        let labels = Vector::from_slice(&[1u8]);
        onehot_subtract(&mut dest, &labels).unwrap();
        assert_eq!(dest.row(0), &[0.75, -0.75]);
    }

    #[test]
    fn test_out_of_range_label_writes_nothing() {
        let mut dest = Matrix::new();
        dest.assign(2, 3, 5.0f32);
        let labels = Vector::from_slice(&[0u8, 3]);
        let err = onehot_subtract(&mut dest, &labels).unwrap_err();
        assert_eq!(
            err,
            CentellaError::ShapeMismatch {
                expected: 3,
                actual: 3
            }
        );
        assert!(dest.as_slice().iter().all(|&x| x == 5.0));
    }

    #[test]
    fn test_label_count_must_match_rows() {
        let mut dest = Matrix::new();
        dest.assign(2, 3, 0.0f32);
        let labels = Vector::from_slice(&[0u8]);
        assert_eq!(
            onehot_subtract(&mut dest, &labels).unwrap_err(),
            CentellaError::ShapeMismatch {
                expected: 2,
                actual: 1
            }
        );
    }
}
