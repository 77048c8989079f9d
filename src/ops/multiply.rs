//! Multiply-family operations
//!
//! Matrix-times-vector, vector-times-matrix, matrix-times-matrix and
//! tensor-times-matrix, all accumulating: the destination is first filled
//! with zero (or the bias), then the kernel accumulates into it in place.
//!
//! The [`Layout`] flag selects between two structurally different kernel
//! families — an inner-product traversal and an axpy (scaled-row
//! accumulation) traversal — rather than transposing any data.

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::block::{self, Tile};
use crate::error::Result;
use crate::kernels::scalar::ScalarKernel;
use crate::matrix::{Layout, Matrix};
use crate::ops::{check_dest, check_inst, check_shape, check_src, MulKernels};
use crate::tensor::Tensor;
use crate::vector::Vector;
use crate::InstSet;

#[cfg(target_arch = "x86_64")]
use crate::kernels::{avx, avx::AvxKernel, sse, sse::SseKernel};

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for i32 {}
}

/// Element types the multiply family is defined for
///
/// f32 and f64 carry vectorized kernel sets; i32 has only the portable
/// scalar loop, so every instruction set resolves to it.
pub trait MulElement: Copy + core::ops::AddAssign + sealed::Sealed + 'static {
    /// Additive identity, used to prefill accumulating destinations
    const ZERO: Self;
    /// Multiplicative identity, used by the one-hot gradient subtraction
    const ONE: Self;

    #[doc(hidden)]
    fn mul_kernels(inst: InstSet) -> MulKernels<Self>;
}

impl MulElement for f32 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    fn mul_kernels(inst: InstSet) -> MulKernels<f32> {
        #[cfg(target_arch = "x86_64")]
        {
            match inst {
                InstSet::None => MulKernels {
                    width: 1,
                    dot: ScalarKernel::dot_f32,
                    axpy: ScalarKernel::axpy_f32,
                },
                InstSet::Sse | InstSet::Sse2 => MulKernels {
                    width: sse::F32_WIDTH,
                    dot: SseKernel::dot_f32,
                    axpy: SseKernel::axpy_f32,
                },
                InstSet::Sse3 | InstSet::Sse41 => MulKernels {
                    width: sse::F32_WIDTH,
                    dot: SseKernel::dot_f32_hadd,
                    axpy: SseKernel::axpy_f32,
                },
                InstSet::Avx => MulKernels {
                    width: avx::F32_WIDTH,
                    dot: AvxKernel::dot_f32,
                    axpy: AvxKernel::axpy_f32,
                },
                InstSet::AvxFma | InstSet::Avx2 => MulKernels {
                    width: avx::F32_WIDTH,
                    dot: AvxKernel::dot_f32_fma,
                    axpy: AvxKernel::axpy_f32_fma,
                },
            }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = inst;
            MulKernels {
                width: 1,
                dot: ScalarKernel::dot_f32,
                axpy: ScalarKernel::axpy_f32,
            }
        }
    }
}

impl MulElement for f64 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    fn mul_kernels(inst: InstSet) -> MulKernels<f64> {
        #[cfg(target_arch = "x86_64")]
        {
            match inst {
                // f64 SIMD needs SSE2; plain SSE resolves to the scalar loop
                InstSet::None | InstSet::Sse => MulKernels {
                    width: 1,
                    dot: ScalarKernel::dot_f64,
                    axpy: ScalarKernel::axpy_f64,
                },
                InstSet::Sse2 | InstSet::Sse3 | InstSet::Sse41 => MulKernels {
                    width: sse::F64_WIDTH,
                    dot: SseKernel::dot_f64,
                    axpy: SseKernel::axpy_f64,
                },
                InstSet::Avx => MulKernels {
                    width: avx::F64_WIDTH,
                    dot: AvxKernel::dot_f64,
                    axpy: AvxKernel::axpy_f64,
                },
                InstSet::AvxFma | InstSet::Avx2 => MulKernels {
                    width: avx::F64_WIDTH,
                    dot: AvxKernel::dot_f64_fma,
                    axpy: AvxKernel::axpy_f64_fma,
                },
            }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = inst;
            MulKernels {
                width: 1,
                dot: ScalarKernel::dot_f64,
                axpy: ScalarKernel::axpy_f64,
            }
        }
    }
}

impl MulElement for i32 {
    const ZERO: Self = 0;
    const ONE: Self = 1;

    fn mul_kernels(_inst: InstSet) -> MulKernels<i32> {
        // No vector specialization: the most capable set for i32 multiply
        // is the portable loop on every host.
        MulKernels {
            width: 1,
            dot: ScalarKernel::dot_i32,
            axpy: ScalarKernel::axpy_i32,
        }
    }
}

/// `dest[j] += dot(row_of(j), v)` for every output `j`, blocked over the
/// inner dimension
fn dot_accumulate<'a, T: MulElement>(
    kern: &MulKernels<T>,
    sk: &MulKernels<T>,
    row_of: impl Fn(usize) -> &'a [T],
    v: &[T],
    dest: &mut [T],
) {
    let p = v.len();
    let ap = block::aligned_len(p, kern.width);
    block::compose(dest.len(), p, 1, kern.width, |tile| match tile {
        Tile::Block { col } => {
            let row = row_of(col);
            dest[col] += unsafe { (kern.dot)(&row[..ap], &v[..ap]) };
        }
        Tile::Remainder { col, cols, from } => {
            for j in col..col + cols {
                let row = row_of(j);
                dest[j] += unsafe { (sk.dot)(&row[from..], &v[from..]) };
            }
        }
    });
}

/// `dest[j] += Σ_k coeffs[k] * row_of(k)[j]`, blocked over the output
/// dimension
fn axpy_accumulate<'a, T: MulElement>(
    kern: &MulKernels<T>,
    sk: &MulKernels<T>,
    coeffs: &[T],
    row_of: impl Fn(usize) -> &'a [T],
    dest: &mut [T],
) {
    let n = dest.len();
    let an = block::aligned_len(n, kern.width);
    block::compose(coeffs.len(), n, 1, kern.width, |tile| match tile {
        Tile::Block { col } => unsafe {
            (kern.axpy)(coeffs[col], &row_of(col)[..an], &mut dest[..an]);
        },
        Tile::Remainder { col, cols, from } => {
            for k in col..col + cols {
                unsafe { (sk.axpy)(coeffs[k], &row_of(k)[from..n], &mut dest[from..]) };
            }
        }
    });
}

/// `dest = M · v`
///
/// Row-major: `dest` has one slot per matrix row, `v` one per column.
/// Column-major: the storage holds the transpose (each stored row is a
/// logical column), so `dest` matches `row_size()` and `v` matches
/// `rows()`.
///
/// # Errors
///
/// `UninitializedDestination` / `UninitializedSource` for empty containers,
/// `ShapeMismatch` when the extents disagree.
///
/// # Examples
///
/// ```
/// use centella::{ops, Layout, Matrix, Vector};
///
/// let m = Matrix::from_vec(2, 3, vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
/// let v = Vector::from_slice(&[1.0f32, 0.0, 1.0]);
/// let mut dest = Vector::new();
/// dest.assign(2, 0.0);
/// ops::multiply_mv(&mut dest, &m, &v, Layout::RowMajor).unwrap();
/// assert_eq!(dest.as_slice(), &[4.0, 10.0]);
/// ```
pub fn multiply_mv<T: MulElement>(
    dest: &mut Vector<T>,
    m: &Matrix<T>,
    v: &Vector<T>,
    layout: Layout,
) -> Result<()> {
    multiply_mv_with(InstSet::detect(), dest, m, v, layout)
}

/// [`multiply_mv`] with a forced instruction set (test seam)
pub fn multiply_mv_with<T: MulElement>(
    inst: InstSet,
    dest: &mut Vector<T>,
    m: &Matrix<T>,
    v: &Vector<T>,
    layout: Layout,
) -> Result<()> {
    check_inst(inst)?;
    check_dest(dest)?;
    check_src(m)?;
    check_src(v)?;

    let kern = T::mul_kernels(inst);
    let sk = T::mul_kernels(InstSet::None);
    match layout {
        Layout::RowMajor => {
            check_shape(m.rows(), dest.len())?;
            check_shape(m.row_size(), v.len())?;
            dest.fill(T::ZERO);
            dot_accumulate(&kern, &sk, |i| m.row(i), v.as_slice(), dest.as_mut_slice());
        }
        Layout::ColMajor => {
            check_shape(m.row_size(), dest.len())?;
            check_shape(m.rows(), v.len())?;
            dest.fill(T::ZERO);
            axpy_accumulate(&kern, &sk, v.as_slice(), |k| m.row(k), dest.as_mut_slice());
        }
    }
    Ok(())
}

/// `dest = v · M`
///
/// Row-major: `v` has one slot per matrix row, `dest` one per column.
/// Column-major: the transposed reading, `v` matches `row_size()` and
/// `dest` matches `rows()`.
pub fn multiply_vm<T: MulElement>(
    dest: &mut Vector<T>,
    v: &Vector<T>,
    m: &Matrix<T>,
    layout: Layout,
) -> Result<()> {
    multiply_vm_with(InstSet::detect(), dest, v, m, layout)
}

/// [`multiply_vm`] with a forced instruction set (test seam)
pub fn multiply_vm_with<T: MulElement>(
    inst: InstSet,
    dest: &mut Vector<T>,
    v: &Vector<T>,
    m: &Matrix<T>,
    layout: Layout,
) -> Result<()> {
    check_inst(inst)?;
    check_dest(dest)?;
    check_src(v)?;
    check_src(m)?;

    let kern = T::mul_kernels(inst);
    let sk = T::mul_kernels(InstSet::None);
    match layout {
        Layout::RowMajor => {
            check_shape(m.row_size(), dest.len())?;
            check_shape(m.rows(), v.len())?;
            dest.fill(T::ZERO);
            axpy_accumulate(&kern, &sk, v.as_slice(), |i| m.row(i), dest.as_mut_slice());
        }
        Layout::ColMajor => {
            check_shape(m.rows(), dest.len())?;
            check_shape(m.row_size(), v.len())?;
            dest.fill(T::ZERO);
            dot_accumulate(&kern, &sk, |j| m.row(j), v.as_slice(), dest.as_mut_slice());
        }
    }
    Ok(())
}

/// `dest = A · B` (row-major)
///
/// The destination is zero-filled, then each row accumulates
/// `Σ_k A[i,k] · B[k,:]` in place.
///
/// # Examples
///
/// ```
/// use centella::{ops, Matrix};
///
/// let a = Matrix::from_vec(2, 3, vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
/// let b = Matrix::from_vec(3, 4, vec![
///     1.0f32, 0.0, 0.0, 1.0,
///     0.0, 1.0, 0.0, 1.0,
///     0.0, 0.0, 1.0, 1.0,
/// ]).unwrap();
/// let mut dest = Matrix::new();
/// dest.assign(2, 4, 0.0);
/// ops::multiply_mm(&mut dest, &a, &b).unwrap();
/// assert_eq!(dest.row(0), &[1.0, 2.0, 3.0, 6.0]);
/// assert_eq!(dest.row(1), &[4.0, 5.0, 6.0, 15.0]);
/// ```
#[cfg_attr(feature = "tracing", instrument(skip_all, fields(m = a.rows(), n = a.row_size(), p = b.row_size())))]
pub fn multiply_mm<T: MulElement>(dest: &mut Matrix<T>, a: &Matrix<T>, b: &Matrix<T>) -> Result<()> {
    multiply_mm_with(InstSet::detect(), dest, a, b)
}

/// [`multiply_mm`] with a forced instruction set (test seam)
pub fn multiply_mm_with<T: MulElement>(
    inst: InstSet,
    dest: &mut Matrix<T>,
    a: &Matrix<T>,
    b: &Matrix<T>,
) -> Result<()> {
    check_inst(inst)?;
    check_dest(dest)?;
    check_src(a)?;
    check_src(b)?;
    check_shape(a.row_size(), b.rows())?;
    check_shape(a.rows(), dest.rows())?;
    check_shape(b.row_size(), dest.row_size())?;

    dest.fill(T::ZERO);
    accumulate_mm(inst, dest, a, b);
    Ok(())
}

/// `dest = A · B + bias` with the bias row-broadcast
///
/// The destination rows are filled with `bias` first, then the product
/// accumulates in place — never composed through a temporary.
pub fn multiply_mm_bias<T: MulElement>(
    dest: &mut Matrix<T>,
    a: &Matrix<T>,
    b: &Matrix<T>,
    bias: &Vector<T>,
) -> Result<()> {
    multiply_mm_bias_with(InstSet::detect(), dest, a, b, bias)
}

/// [`multiply_mm_bias`] with a forced instruction set (test seam)
pub fn multiply_mm_bias_with<T: MulElement>(
    inst: InstSet,
    dest: &mut Matrix<T>,
    a: &Matrix<T>,
    b: &Matrix<T>,
    bias: &Vector<T>,
) -> Result<()> {
    check_inst(inst)?;
    check_dest(dest)?;
    check_src(a)?;
    check_src(b)?;
    check_src(bias)?;
    check_shape(a.row_size(), b.rows())?;
    check_shape(a.rows(), dest.rows())?;
    check_shape(b.row_size(), dest.row_size())?;
    check_shape(b.row_size(), bias.len())?;

    for i in 0..dest.rows() {
        dest.row_mut(i).copy_from_slice(bias.as_slice());
    }
    accumulate_mm(inst, dest, a, b);
    Ok(())
}

/// Row-by-row axpy accumulation shared by the matrix-matrix entries
fn accumulate_mm<T: MulElement>(inst: InstSet, dest: &mut Matrix<T>, a: &Matrix<T>, b: &Matrix<T>) {
    let kern = T::mul_kernels(inst);
    let sk = T::mul_kernels(InstSet::None);
    for i in 0..a.rows() {
        axpy_accumulate(&kern, &sk, a.row(i), |k| b.row(k), dest.row_mut(i));
    }
}

/// `dest = T · W`: each flattened tensor batch element times a row-major
/// weight matrix (the forward-pass entry)
///
/// `W.rows()` must equal the tensor's `matrix_size()`; destination row `i`
/// receives batch element `i` times `W`.
#[cfg_attr(feature = "tracing", instrument(skip_all, fields(batch = t.batch(), k = w.rows(), n = w.row_size())))]
pub fn multiply_tm<T: MulElement>(dest: &mut Matrix<T>, t: &Tensor<T>, w: &Matrix<T>) -> Result<()> {
    multiply_tm_with(InstSet::detect(), dest, t, w)
}

/// [`multiply_tm`] with a forced instruction set (test seam)
pub fn multiply_tm_with<T: MulElement>(
    inst: InstSet,
    dest: &mut Matrix<T>,
    t: &Tensor<T>,
    w: &Matrix<T>,
) -> Result<()> {
    check_inst(inst)?;
    check_dest(dest)?;
    check_src(t)?;
    check_src(w)?;
    check_shape(t.matrix_size(), w.rows())?;
    check_shape(t.batch(), dest.rows())?;
    check_shape(w.row_size(), dest.row_size())?;

    let kern = T::mul_kernels(inst);
    let sk = T::mul_kernels(InstSet::None);
    dest.fill(T::ZERO);
    for bi in 0..t.batch() {
        axpy_accumulate(&kern, &sk, t.element(bi), |k| w.row(k), dest.row_mut(bi));
    }
    Ok(())
}
