//! Element-wise activation functions
//!
//! Sigmoid and exp over whole containers, dispatched to the transcendental
//! approximations in [`math`](crate::math) at the widest width the
//! instruction set offers. f64 activations stay scalar — the training
//! stack's activations run in f32 and the f64 overloads exist for the
//! reference path.

use crate::block;
use crate::error::Result;
use crate::kernels::scalar::ScalarKernel;
use crate::ops::{check_dest, check_inst, check_shape, check_src, Dense};
use crate::InstSet;

#[cfg(target_arch = "x86_64")]
use crate::kernels::{avx, avx::AvxKernel, sse, sse::SseKernel};

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// Element types the activation functions are defined for
pub trait ActivateElement: Copy + sealed::Sealed + 'static {
    #[doc(hidden)]
    fn sigmoid_kernel(inst: InstSet) -> (usize, unsafe fn(&[Self], &mut [Self]));

    #[doc(hidden)]
    fn exp_kernel(inst: InstSet) -> (usize, unsafe fn(&[Self], &mut [Self]));
}

impl ActivateElement for f32 {
    fn sigmoid_kernel(inst: InstSet) -> (usize, unsafe fn(&[f32], &mut [f32])) {
        #[cfg(target_arch = "x86_64")]
        {
            match inst {
                // The 128-bit transcendental path needs SSE2 integer ops
                InstSet::None | InstSet::Sse => (1, ScalarKernel::sigmoid_f32),
                InstSet::Sse2 | InstSet::Sse3 | InstSet::Sse41 => {
                    (sse::F32_WIDTH, SseKernel::sigmoid_f32)
                }
                InstSet::Avx | InstSet::AvxFma => (avx::F32_WIDTH, AvxKernel::sigmoid_f32),
                InstSet::Avx2 => (avx::F32_WIDTH, AvxKernel::sigmoid_f32_avx2),
            }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = inst;
            (1, ScalarKernel::sigmoid_f32)
        }
    }

    fn exp_kernel(inst: InstSet) -> (usize, unsafe fn(&[f32], &mut [f32])) {
        #[cfg(target_arch = "x86_64")]
        {
            match inst {
                InstSet::None | InstSet::Sse => (1, ScalarKernel::exp_f32),
                InstSet::Sse2 | InstSet::Sse3 | InstSet::Sse41 => {
                    (sse::F32_WIDTH, SseKernel::exp_f32)
                }
                InstSet::Avx | InstSet::AvxFma => (avx::F32_WIDTH, AvxKernel::exp_f32),
                InstSet::Avx2 => (avx::F32_WIDTH, AvxKernel::exp_f32_avx2),
            }
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = inst;
            (1, ScalarKernel::exp_f32)
        }
    }
}

impl ActivateElement for f64 {
    fn sigmoid_kernel(inst: InstSet) -> (usize, unsafe fn(&[f64], &mut [f64])) {
        let _ = inst;
        (1, ScalarKernel::sigmoid_f64)
    }

    fn exp_kernel(inst: InstSet) -> (usize, unsafe fn(&[f64], &mut [f64])) {
        let _ = inst;
        (1, ScalarKernel::exp_f64)
    }
}

fn run<T: ActivateElement>(
    (width, kern): (usize, unsafe fn(&[T], &mut [T])),
    (_, sk): (usize, unsafe fn(&[T], &mut [T])),
    src: &[T],
    dest: &mut [T],
) {
    let aligned = block::aligned_len(src.len(), width);
    if aligned > 0 {
        unsafe { kern(&src[..aligned], &mut dest[..aligned]) };
    }
    if aligned < src.len() {
        unsafe { sk(&src[aligned..], &mut dest[aligned..]) };
    }
}

/// Element-wise sigmoid: `dest[i] = 1 / (1 + exp(-src[i]))`
///
/// Inputs are clamped to the range where the inner `exp` stays
/// representable; see [`math`](crate::math) for the constants.
///
/// # Examples
///
/// ```
/// use centella::{ops, Vector};
///
/// let src = Vector::from_slice(&[0.0f32, -1000.0, 1000.0]);
/// let mut dest = Vector::new();
/// dest.assign(3, 0.0f32);
/// ops::sigmoid(&mut dest, &src).unwrap();
/// assert!((dest.as_slice()[0] - 0.5).abs() < 1e-7);
/// assert!(dest.as_slice()[1] < 1e-30);
/// assert!(dest.as_slice()[2] > 1.0 - 1e-6);
/// ```
pub fn sigmoid<T: ActivateElement, C: Dense<T>>(dest: &mut C, src: &C) -> Result<()> {
    sigmoid_with(InstSet::detect(), dest, src)
}

/// [`sigmoid`] with a forced instruction set (test seam)
pub fn sigmoid_with<T: ActivateElement, C: Dense<T>>(
    inst: InstSet,
    dest: &mut C,
    src: &C,
) -> Result<()> {
    check_inst(inst)?;
    check_dest(dest)?;
    check_src(src)?;
    check_shape(src.len(), dest.len())?;
    run(
        T::sigmoid_kernel(inst),
        T::sigmoid_kernel(InstSet::None),
        src.as_slice(),
        dest.as_mut_slice(),
    );
    Ok(())
}

/// Element-wise exp via the range-reduced polynomial approximation
pub fn exp<T: ActivateElement, C: Dense<T>>(dest: &mut C, src: &C) -> Result<()> {
    exp_with(InstSet::detect(), dest, src)
}

/// [`exp`] with a forced instruction set (test seam)
pub fn exp_with<T: ActivateElement, C: Dense<T>>(inst: InstSet, dest: &mut C, src: &C) -> Result<()> {
    check_inst(inst)?;
    check_dest(dest)?;
    check_src(src)?;
    check_shape(src.len(), dest.len())?;
    run(
        T::exp_kernel(inst),
        T::exp_kernel(InstSet::None),
        src.as_slice(),
        dest.as_mut_slice(),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Vector;

    #[test]
    fn test_sigmoid_midpoint_and_tails() {
        let src = Vector::from_slice(&[0.0f32, -1000.0, 1000.0]);
        let mut dest = Vector::new();
        dest.assign(3, 0.0f32);
        sigmoid(&mut dest, &src).unwrap();
        assert!((dest.as_slice()[0] - 0.5).abs() < 1e-7);
        assert!(dest.as_slice()[1] < 1e-30);
        assert!(dest.as_slice()[2] > 1.0 - 1e-6);
    }

    #[test]
    fn test_sigmoid_equivalence_across_inst_sets() {
        let src = Vector::from_slice(
            &(0..61).map(|i| (i as f32 - 30.0) * 0.4).collect::<Vec<_>>(),
        );
        let mut want = Vector::new();
        want.assign(61, 0.0f32);
        sigmoid_with(InstSet::None, &mut want, &src).unwrap();

        for inst in InstSet::available() {
            let mut got = Vector::new();
            got.assign(61, 0.0f32);
            sigmoid_with(inst, &mut got, &src).unwrap();
            for (w, g) in want.as_slice().iter().zip(got.as_slice()) {
                assert!((w - g).abs() < 1e-5, "{inst:?}: {w} vs {g}");
            }
        }
    }

    #[test]
    fn test_exp_matches_reference_math() {
        let src = Vector::from_slice(&[-2.0f32, -0.5, 0.0, 0.5, 2.0]);
        let mut dest = Vector::new();
        dest.assign(5, 0.0f32);
        exp(&mut dest, &src).unwrap();
        for (x, y) in src.as_slice().iter().zip(dest.as_slice()) {
            let want = crate::math::exp_f32(*x);
            assert!((y - want).abs() <= want * 1e-5);
        }
    }

    #[test]
    fn test_f64_activation_is_scalar_reference() {
        let src = Vector::from_slice(&[0.0f64, 1.0, -1.0]);
        let mut dest = Vector::new();
        dest.assign(3, 0.0f64);
        sigmoid(&mut dest, &src).unwrap();
        assert!((dest.as_slice()[0] - 0.5).abs() < 1e-15);
        assert!((dest.as_slice()[1] - 1.0 / (1.0 + (-1.0f64).exp())).abs() < 1e-9);
    }
}
