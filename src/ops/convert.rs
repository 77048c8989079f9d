//! Type conversions: widening with scale, and exact/saturating narrowing
//!
//! The legal (source, destination) pairs are a fixed, enumerable set,
//! expressed as trait implementations. Narrowing conversions saturate to
//! the target's representable range — identical clamping in the scalar and
//! packed paths — never wrap.

use crate::block;
use crate::error::Result;
use crate::kernels::scalar::ScalarKernel;
use crate::matrix::Matrix;
use crate::ops::{check_dest, check_inst, check_shape, check_src, Dense};
use crate::tensor::Tensor;
use crate::InstSet;

#[cfg(target_arch = "x86_64")]
use crate::kernels::{avx, avx::AvxKernel, sse, sse::SseKernel};

mod sealed {
    pub trait Sealed {}
    impl Sealed for u8 {}
    impl Sealed for i32 {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// Widening conversion with a scale factor applied in the same pass
///
/// Pairs: `u8 → f32`, `u8 → f64` (image normalization), `i32 → f32`.
pub trait ScaledConvert<D: Copy>: Copy + sealed::Sealed + 'static {
    #[doc(hidden)]
    fn kernel(inst: InstSet) -> (usize, unsafe fn(&[Self], &mut [D], D));
}

impl ScaledConvert<f32> for u8 {
    fn kernel(inst: InstSet) -> (usize, unsafe fn(&[u8], &mut [f32], f32)) {
        #[cfg(target_arch = "x86_64")]
        {
            match inst {
                // Packed byte widening arrives with SSE4.1
                InstSet::None | InstSet::Sse | InstSet::Sse2 | InstSet::Sse3 => {
                    (1, ScalarKernel::u8_to_f32_scaled)
                }
                InstSet::Sse41 | InstSet::Avx | InstSet::AvxFma => {
                    (sse::U8_WIDTH, SseKernel::u8_to_f32_scaled)
                }
                InstSet::Avx2 => (avx::U8_WIDTH, AvxKernel::u8_to_f32_scaled),
            }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = inst;
            (1, ScalarKernel::u8_to_f32_scaled)
        }
    }
}

impl ScaledConvert<f64> for u8 {
    fn kernel(inst: InstSet) -> (usize, unsafe fn(&[u8], &mut [f64], f64)) {
        // Two lanes per register leave no payoff over the scalar loop
        let _ = inst;
        (1, ScalarKernel::u8_to_f64_scaled)
    }
}

impl ScaledConvert<f32> for i32 {
    fn kernel(inst: InstSet) -> (usize, unsafe fn(&[i32], &mut [f32], f32)) {
        #[cfg(target_arch = "x86_64")]
        {
            match inst {
                InstSet::None | InstSet::Sse => (1, ScalarKernel::i32_to_f32_scaled),
                InstSet::Sse2 | InstSet::Sse3 | InstSet::Sse41 => {
                    (sse::I32_WIDTH, SseKernel::i32_to_f32_scaled)
                }
                InstSet::Avx | InstSet::AvxFma | InstSet::Avx2 => {
                    (avx::I32_WIDTH, AvxKernel::i32_to_f32_scaled)
                }
            }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = inst;
            (1, ScalarKernel::i32_to_f32_scaled)
        }
    }
}

/// Exact or saturating conversion without a factor
///
/// Pairs: `i32 → i8`, `i32 → i16` (saturating), `f32 ↔ f64`.
pub trait ExactConvert<D: Copy>: Copy + sealed::Sealed + 'static {
    #[doc(hidden)]
    fn kernel(inst: InstSet) -> (usize, unsafe fn(&[Self], &mut [D]));
}

impl ExactConvert<i8> for i32 {
    fn kernel(inst: InstSet) -> (usize, unsafe fn(&[i32], &mut [i8])) {
        #[cfg(target_arch = "x86_64")]
        {
            match inst {
                InstSet::None | InstSet::Sse => (1, ScalarKernel::i32_to_i8_sat),
                InstSet::Sse2 | InstSet::Sse3 | InstSet::Sse41 | InstSet::Avx
                | InstSet::AvxFma => (16, SseKernel::i32_to_i8_sat),
                InstSet::Avx2 => (16, AvxKernel::i32_to_i8_sat),
            }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = inst;
            (1, ScalarKernel::i32_to_i8_sat)
        }
    }
}

impl ExactConvert<i16> for i32 {
    fn kernel(inst: InstSet) -> (usize, unsafe fn(&[i32], &mut [i16])) {
        #[cfg(target_arch = "x86_64")]
        {
            match inst {
                InstSet::None | InstSet::Sse => (1, ScalarKernel::i32_to_i16_sat),
                InstSet::Sse2 | InstSet::Sse3 | InstSet::Sse41 | InstSet::Avx
                | InstSet::AvxFma => (8, SseKernel::i32_to_i16_sat),
                InstSet::Avx2 => (16, AvxKernel::i32_to_i16_sat),
            }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = inst;
            (1, ScalarKernel::i32_to_i16_sat)
        }
    }
}

impl ExactConvert<f64> for f32 {
    fn kernel(inst: InstSet) -> (usize, unsafe fn(&[f32], &mut [f64])) {
        #[cfg(target_arch = "x86_64")]
        {
            match inst {
                InstSet::None | InstSet::Sse => (1, ScalarKernel::f32_to_f64),
                InstSet::Sse2 | InstSet::Sse3 | InstSet::Sse41 => (4, SseKernel::f32_to_f64),
                InstSet::Avx | InstSet::AvxFma | InstSet::Avx2 => (8, AvxKernel::f32_to_f64),
            }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = inst;
            (1, ScalarKernel::f32_to_f64)
        }
    }
}

impl ExactConvert<f32> for f64 {
    fn kernel(inst: InstSet) -> (usize, unsafe fn(&[f64], &mut [f32])) {
        #[cfg(target_arch = "x86_64")]
        {
            match inst {
                InstSet::None | InstSet::Sse => (1, ScalarKernel::f64_to_f32),
                InstSet::Sse2 | InstSet::Sse3 | InstSet::Sse41 => (4, SseKernel::f64_to_f32),
                InstSet::Avx | InstSet::AvxFma | InstSet::Avx2 => (8, AvxKernel::f64_to_f32),
            }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = inst;
            (1, ScalarKernel::f64_to_f32)
        }
    }
}

fn run_scaled<S: ScaledConvert<D>, D: Copy>(inst: InstSet, src: &[S], dest: &mut [D], factor: D) {
    let (width, kern) = S::kernel(inst);
    let (_, sk) = S::kernel(InstSet::None);
    let aligned = block::aligned_len(src.len(), width);
    if aligned > 0 {
        unsafe { kern(&src[..aligned], &mut dest[..aligned], factor) };
    }
    if aligned < src.len() {
        unsafe { sk(&src[aligned..], &mut dest[aligned..], factor) };
    }
}

fn run_exact<S: ExactConvert<D>, D: Copy>(inst: InstSet, src: &[S], dest: &mut [D]) {
    let (width, kern) = S::kernel(inst);
    let (_, sk) = S::kernel(InstSet::None);
    let aligned = block::aligned_len(src.len(), width);
    if aligned > 0 {
        unsafe { kern(&src[..aligned], &mut dest[..aligned]) };
    }
    if aligned < src.len() {
        unsafe { sk(&src[aligned..], &mut dest[aligned..]) };
    }
}

/// Element-wise widening conversion with a scale factor
///
/// `dest[i] = convert(src[i]) * factor`, in one pass. Containers must hold
/// the same element count (shape-agnostic otherwise, so a byte tensor can
/// convert into a float tensor of the same total size).
///
/// # Examples
///
/// ```
/// use centella::{ops, Vector};
///
/// let src = Vector::from_slice(&[0u8, 51, 255]);
/// let mut dest = Vector::new();
/// dest.assign(3, 0.0f32);
/// ops::convert_scaled(&mut dest, &src, 0.5).unwrap();
/// assert_eq!(dest.as_slice(), &[0.0, 25.5, 127.5]);
/// ```
pub fn convert_scaled<S, D, CS, CD>(dest: &mut CD, src: &CS, factor: D) -> Result<()>
where
    S: ScaledConvert<D>,
    D: Copy,
    CS: Dense<S>,
    CD: Dense<D>,
{
    convert_scaled_with(InstSet::detect(), dest, src, factor)
}

/// [`convert_scaled`] with a forced instruction set (test seam)
pub fn convert_scaled_with<S, D, CS, CD>(
    inst: InstSet,
    dest: &mut CD,
    src: &CS,
    factor: D,
) -> Result<()>
where
    S: ScaledConvert<D>,
    D: Copy,
    CS: Dense<S>,
    CD: Dense<D>,
{
    check_inst(inst)?;
    check_dest(dest)?;
    check_src(src)?;
    check_shape(src.len(), dest.len())?;
    run_scaled(inst, src.as_slice(), dest.as_mut_slice(), factor);
    Ok(())
}

/// Element-wise conversion; narrowing targets saturate instead of wrapping
///
/// # Examples
///
/// ```
/// use centella::{ops, Vector};
///
/// let src = Vector::from_slice(&[-1000i32, -128, 127, 1000]);
/// let mut dest = Vector::new();
/// dest.assign(4, 0i8);
/// ops::convert(&mut dest, &src).unwrap();
/// assert_eq!(dest.as_slice(), &[-128, -128, 127, 127]);
/// ```
pub fn convert<S, D, CS, CD>(dest: &mut CD, src: &CS) -> Result<()>
where
    S: ExactConvert<D>,
    D: Copy,
    CS: Dense<S>,
    CD: Dense<D>,
{
    convert_with(InstSet::detect(), dest, src)
}

/// [`convert`] with a forced instruction set (test seam)
pub fn convert_with<S, D, CS, CD>(inst: InstSet, dest: &mut CD, src: &CS) -> Result<()>
where
    S: ExactConvert<D>,
    D: Copy,
    CS: Dense<S>,
    CD: Dense<D>,
{
    check_inst(inst)?;
    check_dest(dest)?;
    check_src(src)?;
    check_shape(src.len(), dest.len())?;
    run_exact(inst, src.as_slice(), dest.as_mut_slice());
    Ok(())
}

/// Copy one tensor batch element into one matrix row, converting and
/// scaling in the same pass
///
/// This is the loader's per-sample primitive: batch element `src_index`
/// (e.g. one image) lands in `dest` row `dest_row` as normalized floats.
pub fn copy_sample_scaled<D>(
    dest: &mut Matrix<D>,
    dest_row: usize,
    src: &Tensor<u8>,
    src_index: usize,
    factor: D,
) -> Result<()>
where
    u8: ScaledConvert<D>,
    D: Copy,
{
    copy_sample_scaled_with(InstSet::detect(), dest, dest_row, src, src_index, factor)
}

/// [`copy_sample_scaled`] with a forced instruction set (test seam)
pub fn copy_sample_scaled_with<D>(
    inst: InstSet,
    dest: &mut Matrix<D>,
    dest_row: usize,
    src: &Tensor<u8>,
    src_index: usize,
    factor: D,
) -> Result<()>
where
    u8: ScaledConvert<D>,
    D: Copy,
{
    check_inst(inst)?;
    check_dest(dest)?;
    check_src(src)?;
    check_shape(src.matrix_size(), dest.row_size())?;
    if dest_row >= dest.rows() {
        return Err(crate::error::CentellaError::ShapeMismatch {
            expected: dest.rows(),
            actual: dest_row,
        });
    }
    if src_index >= src.batch() {
        return Err(crate::error::CentellaError::ShapeMismatch {
            expected: src.batch(),
            actual: src_index,
        });
    }
    run_scaled(inst, src.element(src_index), dest.row_mut(dest_row), factor);
    Ok(())
}
