//! Reductions: full-container folds and column sums
//!
//! The legal mode set depends on the element type (integers have no
//! average); the capability check happens at entry, before any computation.
//! Column sums zero-fill the destination before accumulating, for every
//! element pair.

use crate::block;
use crate::error::{CentellaError, Result};
use crate::kernels::scalar::ScalarKernel;
use crate::matrix::Matrix;
use crate::ops::{check_dest, check_inst, check_shape, check_src, Dense, ReduceKernels};
use crate::vector::Vector;
use crate::InstSet;

#[cfg(target_arch = "x86_64")]
use crate::kernels::{avx, avx::AvxKernel, sse, sse::SseKernel};

/// Reduction mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduce {
    /// Sum of all elements
    Sum,
    /// Arithmetic mean (float element types only)
    Avg,
    /// Smallest element
    Min,
    /// Largest element
    Max,
}

impl Reduce {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Reduce::Sum => "Sum",
            Reduce::Avg => "Avg",
            Reduce::Min => "Min",
            Reduce::Max => "Max",
        }
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for i32 {}
    impl Sealed for u8 {}
}

/// Element types the full reductions are defined for
pub trait ReduceElement: Copy + core::ops::AddAssign + sealed::Sealed + 'static {
    #[doc(hidden)]
    const TYPE_NAME: &'static str;

    #[doc(hidden)]
    fn reduce_kernels(inst: InstSet) -> ReduceKernels<Self>;

    #[doc(hidden)]
    fn supports_avg() -> bool;

    /// `sum / n`; only reachable for types where [`Self::supports_avg`] is
    /// true
    #[doc(hidden)]
    fn avg_of(sum: Self, n: usize) -> Self;

    #[doc(hidden)]
    fn pick_min(a: Self, b: Self) -> Self;

    #[doc(hidden)]
    fn pick_max(a: Self, b: Self) -> Self;
}

impl ReduceElement for f32 {
    const TYPE_NAME: &'static str = "f32";

    fn reduce_kernels(inst: InstSet) -> ReduceKernels<f32> {
        #[cfg(target_arch = "x86_64")]
        {
            match inst {
                InstSet::None => ReduceKernels {
                    width: 1,
                    sum: ScalarKernel::sum_f32,
                    min: ScalarKernel::min_f32,
                    max: ScalarKernel::max_f32,
                },
                InstSet::Sse | InstSet::Sse2 | InstSet::Sse3 | InstSet::Sse41 => ReduceKernels {
                    width: sse::F32_WIDTH,
                    sum: SseKernel::sum_f32,
                    min: SseKernel::min_f32,
                    max: SseKernel::max_f32,
                },
                InstSet::Avx | InstSet::AvxFma | InstSet::Avx2 => ReduceKernels {
                    width: avx::F32_WIDTH,
                    sum: AvxKernel::sum_f32,
                    min: AvxKernel::min_f32,
                    max: AvxKernel::max_f32,
                },
            }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = inst;
            ReduceKernels {
                width: 1,
                sum: ScalarKernel::sum_f32,
                min: ScalarKernel::min_f32,
                max: ScalarKernel::max_f32,
            }
        }
    }

    fn supports_avg() -> bool {
        true
    }

    fn avg_of(sum: Self, n: usize) -> Self {
        sum / n as f32
    }

    fn pick_min(a: Self, b: Self) -> Self {
        a.min(b)
    }

    fn pick_max(a: Self, b: Self) -> Self {
        a.max(b)
    }
}

impl ReduceElement for f64 {
    const TYPE_NAME: &'static str = "f64";

    fn reduce_kernels(inst: InstSet) -> ReduceKernels<f64> {
        #[cfg(target_arch = "x86_64")]
        {
            match inst {
                InstSet::None | InstSet::Sse => ReduceKernels {
                    width: 1,
                    sum: ScalarKernel::sum_f64,
                    min: ScalarKernel::min_f64,
                    max: ScalarKernel::max_f64,
                },
                InstSet::Sse2 | InstSet::Sse3 | InstSet::Sse41 => ReduceKernels {
                    width: sse::F64_WIDTH,
                    sum: SseKernel::sum_f64,
                    min: SseKernel::min_f64,
                    max: SseKernel::max_f64,
                },
                InstSet::Avx | InstSet::AvxFma | InstSet::Avx2 => ReduceKernels {
                    width: avx::F64_WIDTH,
                    sum: AvxKernel::sum_f64,
                    min: AvxKernel::min_f64,
                    max: AvxKernel::max_f64,
                },
            }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = inst;
            ReduceKernels {
                width: 1,
                sum: ScalarKernel::sum_f64,
                min: ScalarKernel::min_f64,
                max: ScalarKernel::max_f64,
            }
        }
    }

    fn supports_avg() -> bool {
        true
    }

    fn avg_of(sum: Self, n: usize) -> Self {
        sum / n as f64
    }

    fn pick_min(a: Self, b: Self) -> Self {
        a.min(b)
    }

    fn pick_max(a: Self, b: Self) -> Self {
        a.max(b)
    }
}

impl ReduceElement for i32 {
    const TYPE_NAME: &'static str = "i32";

    fn reduce_kernels(inst: InstSet) -> ReduceKernels<i32> {
        #[cfg(target_arch = "x86_64")]
        {
            match inst {
                InstSet::None | InstSet::Sse => ReduceKernels {
                    width: 1,
                    sum: ScalarKernel::sum_i32,
                    min: ScalarKernel::min_i32,
                    max: ScalarKernel::max_i32,
                },
                // Packed dword min/max arrive with SSE4.1; before that only
                // the sum is vectorized and min/max stay scalar
                InstSet::Sse2 | InstSet::Sse3 => ReduceKernels {
                    width: sse::I32_WIDTH,
                    sum: SseKernel::sum_i32,
                    min: ScalarKernel::min_i32,
                    max: ScalarKernel::max_i32,
                },
                InstSet::Sse41 | InstSet::Avx | InstSet::AvxFma => ReduceKernels {
                    width: sse::I32_WIDTH,
                    sum: SseKernel::sum_i32,
                    min: SseKernel::min_i32,
                    max: SseKernel::max_i32,
                },
                InstSet::Avx2 => ReduceKernels {
                    width: avx::I32_WIDTH,
                    sum: AvxKernel::sum_i32,
                    min: AvxKernel::min_i32,
                    max: AvxKernel::max_i32,
                },
            }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = inst;
            ReduceKernels {
                width: 1,
                sum: ScalarKernel::sum_i32,
                min: ScalarKernel::min_i32,
                max: ScalarKernel::max_i32,
            }
        }
    }

    fn supports_avg() -> bool {
        false
    }

    fn avg_of(sum: Self, _n: usize) -> Self {
        // Unreachable: Avg is rejected for i32 at entry
        sum
    }

    fn pick_min(a: Self, b: Self) -> Self {
        a.min(b)
    }

    fn pick_max(a: Self, b: Self) -> Self {
        a.max(b)
    }
}

/// Fold a whole container down to one value
///
/// Works on any dense container (vector, matrix, tensor) since the fold is
/// shape-agnostic. `Avg` is rejected with `UnsupportedMode` for integer
/// element types.
///
/// # Examples
///
/// ```
/// use centella::{ops, Reduce, Vector};
///
/// let v = Vector::from_slice(&[1.0f32, 2.0, 3.0, 4.0]);
/// assert_eq!(ops::reduce(&v, Reduce::Sum).unwrap(), 10.0);
/// assert_eq!(ops::reduce(&v, Reduce::Avg).unwrap(), 2.5);
/// assert_eq!(ops::reduce(&v, Reduce::Max).unwrap(), 4.0);
/// ```
pub fn reduce<T: ReduceElement, C: Dense<T>>(src: &C, mode: Reduce) -> Result<T> {
    reduce_with(InstSet::detect(), src, mode)
}

/// [`reduce`] with a forced instruction set (test seam)
pub fn reduce_with<T: ReduceElement, C: Dense<T>>(
    inst: InstSet,
    src: &C,
    mode: Reduce,
) -> Result<T> {
    check_inst(inst)?;
    check_src(src)?;
    if mode == Reduce::Avg && !T::supports_avg() {
        return Err(CentellaError::UnsupportedMode {
            mode: mode.name(),
            ty: T::TYPE_NAME,
        });
    }

    let s = src.as_slice();
    let kern = T::reduce_kernels(inst);
    let sk = T::reduce_kernels(InstSet::None);
    let (aligned, _) = block::split(s.len(), kern.width);

    let value = match mode {
        Reduce::Sum | Reduce::Avg => {
            // Scalar sum of an empty tail is the additive identity
            let mut total = unsafe { (sk.sum)(&s[aligned..]) };
            if aligned > 0 {
                total += unsafe { (kern.sum)(&s[..aligned]) };
            }
            if mode == Reduce::Avg {
                T::avg_of(total, s.len())
            } else {
                total
            }
        }
        Reduce::Min => {
            if aligned == 0 {
                unsafe { (sk.min)(s) }
            } else {
                let mut m = unsafe { (kern.min)(&s[..aligned]) };
                if aligned < s.len() {
                    m = T::pick_min(m, unsafe { (sk.min)(&s[aligned..]) });
                }
                m
            }
        }
        Reduce::Max => {
            if aligned == 0 {
                unsafe { (sk.max)(s) }
            } else {
                let mut m = unsafe { (kern.max)(&s[..aligned]) };
                if aligned < s.len() {
                    m = T::pick_max(m, unsafe { (sk.max)(&s[aligned..]) });
                }
                m
            }
        }
    };
    Ok(value)
}

#[cfg(target_arch = "x86_64")]
unsafe fn accumulate_f32_sse(src: &[f32], dest: &mut [f32]) {
    SseKernel::axpy_f32(1.0, src, dest);
}

#[cfg(target_arch = "x86_64")]
unsafe fn accumulate_f32_avx(src: &[f32], dest: &mut [f32]) {
    AvxKernel::axpy_f32(1.0, src, dest);
}

#[cfg(target_arch = "x86_64")]
unsafe fn accumulate_f64_sse(src: &[f64], dest: &mut [f64]) {
    SseKernel::axpy_f64(1.0, src, dest);
}

#[cfg(target_arch = "x86_64")]
unsafe fn accumulate_f64_avx(src: &[f64], dest: &mut [f64]) {
    AvxKernel::axpy_f64(1.0, src, dest);
}

/// Element types the column sum is defined for, with their accumulator type
pub trait ColSumElement: Copy + sealed::Sealed + 'static {
    /// Per-column accumulator element
    type Acc: Copy + 'static;

    #[doc(hidden)]
    const ACC_ZERO: Self::Acc;

    #[doc(hidden)]
    fn accumulate_kernel(inst: InstSet) -> (usize, unsafe fn(&[Self], &mut [Self::Acc]));
}

impl ColSumElement for u8 {
    type Acc = f32;

    const ACC_ZERO: f32 = 0.0;

    fn accumulate_kernel(inst: InstSet) -> (usize, unsafe fn(&[u8], &mut [f32])) {
        #[cfg(target_arch = "x86_64")]
        {
            match inst {
                InstSet::None | InstSet::Sse | InstSet::Sse2 | InstSet::Sse3 => {
                    (1, ScalarKernel::accumulate_u8_f32)
                }
                InstSet::Sse41 | InstSet::Avx | InstSet::AvxFma => {
                    (sse::U8_WIDTH, SseKernel::accumulate_u8_f32)
                }
                InstSet::Avx2 => (avx::U8_WIDTH, AvxKernel::accumulate_u8_f32),
            }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = inst;
            (1, ScalarKernel::accumulate_u8_f32)
        }
    }
}

impl ColSumElement for f32 {
    type Acc = f32;

    const ACC_ZERO: f32 = 0.0;

    fn accumulate_kernel(inst: InstSet) -> (usize, unsafe fn(&[f32], &mut [f32])) {
        #[cfg(target_arch = "x86_64")]
        {
            match inst {
                InstSet::None => (1, ScalarKernel::accumulate_f32),
                InstSet::Sse | InstSet::Sse2 | InstSet::Sse3 | InstSet::Sse41 => {
                    (sse::F32_WIDTH, accumulate_f32_sse)
                }
                InstSet::Avx | InstSet::AvxFma | InstSet::Avx2 => {
                    (avx::F32_WIDTH, accumulate_f32_avx)
                }
            }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = inst;
            (1, ScalarKernel::accumulate_f32)
        }
    }
}

impl ColSumElement for f64 {
    type Acc = f64;

    const ACC_ZERO: f64 = 0.0;

    fn accumulate_kernel(inst: InstSet) -> (usize, unsafe fn(&[f64], &mut [f64])) {
        #[cfg(target_arch = "x86_64")]
        {
            match inst {
                InstSet::None | InstSet::Sse => (1, ScalarKernel::accumulate_f64),
                InstSet::Sse2 | InstSet::Sse3 | InstSet::Sse41 => {
                    (sse::F64_WIDTH, accumulate_f64_sse)
                }
                InstSet::Avx | InstSet::AvxFma | InstSet::Avx2 => {
                    (avx::F64_WIDTH, accumulate_f64_avx)
                }
            }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = inst;
            (1, ScalarKernel::accumulate_f64)
        }
    }
}

/// Per-column sums of a row-major matrix
///
/// The destination is zero-filled first, then every row accumulates into
/// it. Byte matrices accumulate into f32 (the loader's pixel statistics
/// path); float matrices accumulate into their own type.
pub fn col_sum<T: ColSumElement>(dest: &mut Vector<T::Acc>, src: &Matrix<T>) -> Result<()> {
    col_sum_with(InstSet::detect(), dest, src)
}

/// [`col_sum`] with a forced instruction set (test seam)
pub fn col_sum_with<T: ColSumElement>(
    inst: InstSet,
    dest: &mut Vector<T::Acc>,
    src: &Matrix<T>,
) -> Result<()> {
    check_inst(inst)?;
    check_dest(dest)?;
    check_src(src)?;
    check_shape(src.row_size(), dest.len())?;

    let (width, kern) = T::accumulate_kernel(inst);
    let (_, sk) = T::accumulate_kernel(InstSet::None);
    let row_size = src.row_size();
    let aligned = block::aligned_len(row_size, width);

    dest.fill(T::ACC_ZERO);
    let d = dest.as_mut_slice();
    for r in 0..src.rows() {
        let row = src.row(r);
        if aligned > 0 {
            unsafe { kern(&row[..aligned], &mut d[..aligned]) };
        }
        if aligned < row_size {
            unsafe { sk(&row[aligned..], &mut d[aligned..]) };
        }
    }
    Ok(())
}
