//! 256-bit kernel set (AVX / AVX+FMA / AVX2)
//!
//! 8 lanes of f32, 4 lanes of f64, 8 lanes of i32 per register. Plain AVX
//! covers the float arithmetic; the FMA variants fuse the multiply-add in
//! the inner product and axpy loops; AVX2 adds the 256-bit integer paths
//! (widening, saturating narrowing, integer reductions).
//!
//! Wide registers cannot be reduced in one instruction: horizontal sums
//! extract the high 128-bit half, fold onto the low half, then finish with
//! the 128-bit pairwise sequence.
//!
//! # Safety
//!
//! All fns are `unsafe`: callers must have verified the instruction set
//! named in each fn's `#[target_feature]` gate.

use std::arch::x86_64::*;

/// 256-bit kernel set
pub struct AvxKernel;

/// f32 lanes per 256-bit register
pub const F32_WIDTH: usize = 8;
/// f64 lanes per 256-bit register
pub const F64_WIDTH: usize = 4;
/// i32 lanes per 256-bit register
pub const I32_WIDTH: usize = 8;
/// Bytes consumed per widening-conversion step
pub const U8_WIDTH: usize = 8;

/// Sum the eight lanes of `v` into a scalar
#[inline]
#[target_feature(enable = "avx")]
unsafe fn hsum256_ps(v: __m256) -> f32 {
    let hi = _mm256_extractf128_ps(v, 1);
    let lo = _mm256_castps256_ps128(v);
    let sum4 = _mm_add_ps(hi, lo);
    let sum2 = _mm_add_ps(sum4, _mm_movehl_ps(sum4, sum4));
    _mm_cvtss_f32(_mm_add_ss(sum2, _mm_shuffle_ps(sum2, sum2, 1)))
}

/// Sum the four lanes of `v` into a scalar
#[inline]
#[target_feature(enable = "avx")]
unsafe fn hsum256_pd(v: __m256d) -> f64 {
    let hi = _mm256_extractf128_pd(v, 1);
    let lo = _mm256_castpd256_pd128(v);
    let sum2 = _mm_add_pd(hi, lo);
    _mm_cvtsd_f64(_mm_add_sd(sum2, _mm_unpackhi_pd(sum2, sum2)))
}

/// Sum the eight i32 lanes of `v` into a scalar
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn hsum256_epi32(v: __m256i) -> i32 {
    let hi = _mm256_extracti128_si256(v, 1);
    let lo = _mm256_castsi256_si128(v);
    let sum4 = _mm_add_epi32(hi, lo);
    let t = _mm_add_epi32(sum4, _mm_shuffle_epi32(sum4, 0b_01_00_11_10));
    let t = _mm_add_epi32(t, _mm_shuffle_epi32(t, 0b_00_00_00_01));
    _mm_cvtsi128_si32(t)
}

impl AvxKernel {
    /// Inner product, 8 lanes at a time; `len` multiple of 8
    #[target_feature(enable = "avx")]
    pub unsafe fn dot_f32(a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        debug_assert_eq!(a.len() % F32_WIDTH, 0);
        let mut acc = _mm256_setzero_ps();
        let mut i = 0;
        while i < a.len() {
            let va = _mm256_loadu_ps(a.as_ptr().add(i));
            let vb = _mm256_loadu_ps(b.as_ptr().add(i));
            acc = _mm256_add_ps(acc, _mm256_mul_ps(va, vb));
            i += F32_WIDTH;
        }
        hsum256_ps(acc)
    }

    /// Inner product with a fused multiply-add accumulator
    #[target_feature(enable = "avx,fma")]
    pub unsafe fn dot_f32_fma(a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        debug_assert_eq!(a.len() % F32_WIDTH, 0);
        let mut acc = _mm256_setzero_ps();
        let mut i = 0;
        while i < a.len() {
            let va = _mm256_loadu_ps(a.as_ptr().add(i));
            let vb = _mm256_loadu_ps(b.as_ptr().add(i));
            acc = _mm256_fmadd_ps(va, vb, acc);
            i += F32_WIDTH;
        }
        hsum256_ps(acc)
    }

    /// `dest[i] += c * x[i]`; `len` multiple of 8
    #[target_feature(enable = "avx")]
    pub unsafe fn axpy_f32(c: f32, x: &[f32], dest: &mut [f32]) {
        debug_assert_eq!(x.len(), dest.len());
        debug_assert_eq!(x.len() % F32_WIDTH, 0);
        let vc = _mm256_set1_ps(c);
        let mut i = 0;
        while i < x.len() {
            let vx = _mm256_loadu_ps(x.as_ptr().add(i));
            let vd = _mm256_loadu_ps(dest.as_ptr().add(i));
            _mm256_storeu_ps(
                dest.as_mut_ptr().add(i),
                _mm256_add_ps(vd, _mm256_mul_ps(vc, vx)),
            );
            i += F32_WIDTH;
        }
    }

    /// `dest[i] += c * x[i]` with fused multiply-add
    #[target_feature(enable = "avx,fma")]
    pub unsafe fn axpy_f32_fma(c: f32, x: &[f32], dest: &mut [f32]) {
        debug_assert_eq!(x.len(), dest.len());
        debug_assert_eq!(x.len() % F32_WIDTH, 0);
        let vc = _mm256_set1_ps(c);
        let mut i = 0;
        while i < x.len() {
            let vx = _mm256_loadu_ps(x.as_ptr().add(i));
            let vd = _mm256_loadu_ps(dest.as_ptr().add(i));
            _mm256_storeu_ps(dest.as_mut_ptr().add(i), _mm256_fmadd_ps(vc, vx, vd));
            i += F32_WIDTH;
        }
    }

    /// Sum of all elements; `len` multiple of 8
    #[target_feature(enable = "avx")]
    pub unsafe fn sum_f32(a: &[f32]) -> f32 {
        debug_assert_eq!(a.len() % F32_WIDTH, 0);
        let mut acc = _mm256_setzero_ps();
        let mut i = 0;
        while i < a.len() {
            acc = _mm256_add_ps(acc, _mm256_loadu_ps(a.as_ptr().add(i)));
            i += F32_WIDTH;
        }
        hsum256_ps(acc)
    }

    /// Smallest element; `len` a non-zero multiple of 8
    #[target_feature(enable = "avx")]
    pub unsafe fn min_f32(a: &[f32]) -> f32 {
        debug_assert!(!a.is_empty());
        debug_assert_eq!(a.len() % F32_WIDTH, 0);
        let mut acc = _mm256_loadu_ps(a.as_ptr());
        let mut i = F32_WIDTH;
        while i < a.len() {
            acc = _mm256_min_ps(acc, _mm256_loadu_ps(a.as_ptr().add(i)));
            i += F32_WIDTH;
        }
        let m = _mm_min_ps(_mm256_extractf128_ps(acc, 1), _mm256_castps256_ps128(acc));
        let m = _mm_min_ps(m, _mm_movehl_ps(m, m));
        let m = _mm_min_ss(m, _mm_shuffle_ps(m, m, 1));
        _mm_cvtss_f32(m)
    }

    /// Largest element; `len` a non-zero multiple of 8
    #[target_feature(enable = "avx")]
    pub unsafe fn max_f32(a: &[f32]) -> f32 {
        debug_assert!(!a.is_empty());
        debug_assert_eq!(a.len() % F32_WIDTH, 0);
        let mut acc = _mm256_loadu_ps(a.as_ptr());
        let mut i = F32_WIDTH;
        while i < a.len() {
            acc = _mm256_max_ps(acc, _mm256_loadu_ps(a.as_ptr().add(i)));
            i += F32_WIDTH;
        }
        let m = _mm_max_ps(_mm256_extractf128_ps(acc, 1), _mm256_castps256_ps128(acc));
        let m = _mm_max_ps(m, _mm_movehl_ps(m, m));
        let m = _mm_max_ss(m, _mm_shuffle_ps(m, m, 1));
        _mm_cvtss_f32(m)
    }

    /// Inner product, 4 lanes at a time; `len` multiple of 4
    #[target_feature(enable = "avx")]
    pub unsafe fn dot_f64(a: &[f64], b: &[f64]) -> f64 {
        debug_assert_eq!(a.len(), b.len());
        debug_assert_eq!(a.len() % F64_WIDTH, 0);
        let mut acc = _mm256_setzero_pd();
        let mut i = 0;
        while i < a.len() {
            let va = _mm256_loadu_pd(a.as_ptr().add(i));
            let vb = _mm256_loadu_pd(b.as_ptr().add(i));
            acc = _mm256_add_pd(acc, _mm256_mul_pd(va, vb));
            i += F64_WIDTH;
        }
        hsum256_pd(acc)
    }

    /// Inner product with a fused multiply-add accumulator
    #[target_feature(enable = "avx,fma")]
    pub unsafe fn dot_f64_fma(a: &[f64], b: &[f64]) -> f64 {
        debug_assert_eq!(a.len(), b.len());
        debug_assert_eq!(a.len() % F64_WIDTH, 0);
        let mut acc = _mm256_setzero_pd();
        let mut i = 0;
        while i < a.len() {
            let va = _mm256_loadu_pd(a.as_ptr().add(i));
            let vb = _mm256_loadu_pd(b.as_ptr().add(i));
            acc = _mm256_fmadd_pd(va, vb, acc);
            i += F64_WIDTH;
        }
        hsum256_pd(acc)
    }

    /// `dest[i] += c * x[i]`; `len` multiple of 4
    #[target_feature(enable = "avx")]
    pub unsafe fn axpy_f64(c: f64, x: &[f64], dest: &mut [f64]) {
        debug_assert_eq!(x.len(), dest.len());
        debug_assert_eq!(x.len() % F64_WIDTH, 0);
        let vc = _mm256_set1_pd(c);
        let mut i = 0;
        while i < x.len() {
            let vx = _mm256_loadu_pd(x.as_ptr().add(i));
            let vd = _mm256_loadu_pd(dest.as_ptr().add(i));
            _mm256_storeu_pd(
                dest.as_mut_ptr().add(i),
                _mm256_add_pd(vd, _mm256_mul_pd(vc, vx)),
            );
            i += F64_WIDTH;
        }
    }

    /// `dest[i] += c * x[i]` with fused multiply-add
    #[target_feature(enable = "avx,fma")]
    pub unsafe fn axpy_f64_fma(c: f64, x: &[f64], dest: &mut [f64]) {
        debug_assert_eq!(x.len(), dest.len());
        debug_assert_eq!(x.len() % F64_WIDTH, 0);
        let vc = _mm256_set1_pd(c);
        let mut i = 0;
        while i < x.len() {
            let vx = _mm256_loadu_pd(x.as_ptr().add(i));
            let vd = _mm256_loadu_pd(dest.as_ptr().add(i));
            _mm256_storeu_pd(dest.as_mut_ptr().add(i), _mm256_fmadd_pd(vc, vx, vd));
            i += F64_WIDTH;
        }
    }

    /// Sum of all elements; `len` multiple of 4
    #[target_feature(enable = "avx")]
    pub unsafe fn sum_f64(a: &[f64]) -> f64 {
        debug_assert_eq!(a.len() % F64_WIDTH, 0);
        let mut acc = _mm256_setzero_pd();
        let mut i = 0;
        while i < a.len() {
            acc = _mm256_add_pd(acc, _mm256_loadu_pd(a.as_ptr().add(i)));
            i += F64_WIDTH;
        }
        hsum256_pd(acc)
    }

    /// Smallest element; `len` a non-zero multiple of 4
    #[target_feature(enable = "avx")]
    pub unsafe fn min_f64(a: &[f64]) -> f64 {
        debug_assert!(!a.is_empty());
        debug_assert_eq!(a.len() % F64_WIDTH, 0);
        let mut acc = _mm256_loadu_pd(a.as_ptr());
        let mut i = F64_WIDTH;
        while i < a.len() {
            acc = _mm256_min_pd(acc, _mm256_loadu_pd(a.as_ptr().add(i)));
            i += F64_WIDTH;
        }
        let m = _mm_min_pd(_mm256_extractf128_pd(acc, 1), _mm256_castpd256_pd128(acc));
        _mm_cvtsd_f64(_mm_min_sd(m, _mm_unpackhi_pd(m, m)))
    }

    /// Largest element; `len` a non-zero multiple of 4
    #[target_feature(enable = "avx")]
    pub unsafe fn max_f64(a: &[f64]) -> f64 {
        debug_assert!(!a.is_empty());
        debug_assert_eq!(a.len() % F64_WIDTH, 0);
        let mut acc = _mm256_loadu_pd(a.as_ptr());
        let mut i = F64_WIDTH;
        while i < a.len() {
            acc = _mm256_max_pd(acc, _mm256_loadu_pd(a.as_ptr().add(i)));
            i += F64_WIDTH;
        }
        let m = _mm_max_pd(_mm256_extractf128_pd(acc, 1), _mm256_castpd256_pd128(acc));
        _mm_cvtsd_f64(_mm_max_sd(m, _mm_unpackhi_pd(m, m)))
    }

    /// Sum of all elements; `len` multiple of 8
    #[target_feature(enable = "avx2")]
    pub unsafe fn sum_i32(a: &[i32]) -> i32 {
        debug_assert_eq!(a.len() % I32_WIDTH, 0);
        let mut acc = _mm256_setzero_si256();
        let mut i = 0;
        while i < a.len() {
            acc = _mm256_add_epi32(acc, _mm256_loadu_si256(a.as_ptr().add(i) as *const __m256i));
            i += I32_WIDTH;
        }
        hsum256_epi32(acc)
    }

    /// Smallest element; `len` a non-zero multiple of 8
    #[target_feature(enable = "avx2")]
    pub unsafe fn min_i32(a: &[i32]) -> i32 {
        debug_assert!(!a.is_empty());
        debug_assert_eq!(a.len() % I32_WIDTH, 0);
        let mut acc = _mm256_loadu_si256(a.as_ptr() as *const __m256i);
        let mut i = I32_WIDTH;
        while i < a.len() {
            acc = _mm256_min_epi32(acc, _mm256_loadu_si256(a.as_ptr().add(i) as *const __m256i));
            i += I32_WIDTH;
        }
        let m = _mm_min_epi32(_mm256_extracti128_si256(acc, 1), _mm256_castsi256_si128(acc));
        let m = _mm_min_epi32(m, _mm_shuffle_epi32(m, 0b_01_00_11_10));
        let m = _mm_min_epi32(m, _mm_shuffle_epi32(m, 0b_00_00_00_01));
        _mm_cvtsi128_si32(m)
    }

    /// Largest element; `len` a non-zero multiple of 8
    #[target_feature(enable = "avx2")]
    pub unsafe fn max_i32(a: &[i32]) -> i32 {
        debug_assert!(!a.is_empty());
        debug_assert_eq!(a.len() % I32_WIDTH, 0);
        let mut acc = _mm256_loadu_si256(a.as_ptr() as *const __m256i);
        let mut i = I32_WIDTH;
        while i < a.len() {
            acc = _mm256_max_epi32(acc, _mm256_loadu_si256(a.as_ptr().add(i) as *const __m256i));
            i += I32_WIDTH;
        }
        let m = _mm_max_epi32(_mm256_extracti128_si256(acc, 1), _mm256_castsi256_si128(acc));
        let m = _mm_max_epi32(m, _mm_shuffle_epi32(m, 0b_01_00_11_10));
        let m = _mm_max_epi32(m, _mm_shuffle_epi32(m, 0b_00_00_00_01));
        _mm_cvtsi128_si32(m)
    }

    /// Widen 8 bytes per step to f32 with a scale factor; `len` multiple of 8
    #[target_feature(enable = "avx2")]
    pub unsafe fn u8_to_f32_scaled(src: &[u8], dest: &mut [f32], factor: f32) {
        debug_assert_eq!(src.len(), dest.len());
        debug_assert_eq!(src.len() % U8_WIDTH, 0);
        let vf = _mm256_set1_ps(factor);
        let mut i = 0;
        while i < src.len() {
            let bytes = _mm_loadl_epi64(src.as_ptr().add(i) as *const __m128i);
            let wide = _mm256_cvtepu8_epi32(bytes);
            _mm256_storeu_ps(
                dest.as_mut_ptr().add(i),
                _mm256_mul_ps(_mm256_cvtepi32_ps(wide), vf),
            );
            i += U8_WIDTH;
        }
    }

    /// `dest[i] += src[i] as f32`; `len` multiple of 8
    #[target_feature(enable = "avx2")]
    pub unsafe fn accumulate_u8_f32(src: &[u8], dest: &mut [f32]) {
        debug_assert_eq!(src.len(), dest.len());
        debug_assert_eq!(src.len() % U8_WIDTH, 0);
        let mut i = 0;
        while i < src.len() {
            let bytes = _mm_loadl_epi64(src.as_ptr().add(i) as *const __m128i);
            let wide = _mm256_cvtepi32_ps(_mm256_cvtepu8_epi32(bytes));
            let vd = _mm256_loadu_ps(dest.as_ptr().add(i));
            _mm256_storeu_ps(dest.as_mut_ptr().add(i), _mm256_add_ps(vd, wide));
            i += U8_WIDTH;
        }
    }

    /// `dest[i] = src[i] as f32 * factor`; `len` multiple of 8
    #[target_feature(enable = "avx")]
    pub unsafe fn i32_to_f32_scaled(src: &[i32], dest: &mut [f32], factor: f32) {
        debug_assert_eq!(src.len(), dest.len());
        debug_assert_eq!(src.len() % I32_WIDTH, 0);
        let vf = _mm256_set1_ps(factor);
        let mut i = 0;
        while i < src.len() {
            let v = _mm256_loadu_si256(src.as_ptr().add(i) as *const __m256i);
            _mm256_storeu_ps(
                dest.as_mut_ptr().add(i),
                _mm256_mul_ps(_mm256_cvtepi32_ps(v), vf),
            );
            i += I32_WIDTH;
        }
    }

    /// Narrow 16 i32 per step to i8 with saturation; `len` multiple of 16
    ///
    /// `packs` works within 128-bit lanes, so the packed i16 register is
    /// permuted back into element order before the final narrowing.
    #[target_feature(enable = "avx2")]
    pub unsafe fn i32_to_i8_sat(src: &[i32], dest: &mut [i8]) {
        debug_assert_eq!(src.len(), dest.len());
        debug_assert_eq!(src.len() % 16, 0);
        let mut i = 0;
        while i < src.len() {
            let a = _mm256_loadu_si256(src.as_ptr().add(i) as *const __m256i);
            let b = _mm256_loadu_si256(src.as_ptr().add(i + 8) as *const __m256i);
            let packed16 = _mm256_permute4x64_epi64(_mm256_packs_epi32(a, b), 0b_11_01_10_00);
            let lo = _mm256_castsi256_si128(packed16);
            let hi = _mm256_extracti128_si256(packed16, 1);
            _mm_storeu_si128(
                dest.as_mut_ptr().add(i) as *mut __m128i,
                _mm_packs_epi16(lo, hi),
            );
            i += 16;
        }
    }

    /// Narrow 16 i32 per step to i16 with saturation; `len` multiple of 16
    #[target_feature(enable = "avx2")]
    pub unsafe fn i32_to_i16_sat(src: &[i32], dest: &mut [i16]) {
        debug_assert_eq!(src.len(), dest.len());
        debug_assert_eq!(src.len() % 16, 0);
        let mut i = 0;
        while i < src.len() {
            let a = _mm256_loadu_si256(src.as_ptr().add(i) as *const __m256i);
            let b = _mm256_loadu_si256(src.as_ptr().add(i + 8) as *const __m256i);
            let packed = _mm256_permute4x64_epi64(_mm256_packs_epi32(a, b), 0b_11_01_10_00);
            _mm256_storeu_si256(dest.as_mut_ptr().add(i) as *mut __m256i, packed);
            i += 16;
        }
    }

    /// Widen f32 to f64; `len` multiple of 8
    #[target_feature(enable = "avx")]
    pub unsafe fn f32_to_f64(src: &[f32], dest: &mut [f64]) {
        debug_assert_eq!(src.len(), dest.len());
        debug_assert_eq!(src.len() % F32_WIDTH, 0);
        let mut i = 0;
        while i < src.len() {
            let v = _mm256_loadu_ps(src.as_ptr().add(i));
            let lo = _mm256_cvtps_pd(_mm256_castps256_ps128(v));
            let hi = _mm256_cvtps_pd(_mm256_extractf128_ps(v, 1));
            _mm256_storeu_pd(dest.as_mut_ptr().add(i), lo);
            _mm256_storeu_pd(dest.as_mut_ptr().add(i + 4), hi);
            i += F32_WIDTH;
        }
    }

    /// Narrow f64 to f32; `len` multiple of 8
    #[target_feature(enable = "avx")]
    pub unsafe fn f64_to_f32(src: &[f64], dest: &mut [f32]) {
        debug_assert_eq!(src.len(), dest.len());
        debug_assert_eq!(src.len() % 8, 0);
        let mut i = 0;
        while i < src.len() {
            let lo = _mm256_cvtpd_ps(_mm256_loadu_pd(src.as_ptr().add(i)));
            let hi = _mm256_cvtpd_ps(_mm256_loadu_pd(src.as_ptr().add(i + 4)));
            _mm_storeu_ps(dest.as_mut_ptr().add(i), lo);
            _mm_storeu_ps(dest.as_mut_ptr().add(i + 4), hi);
            i += 8;
        }
    }

    /// Element-wise sigmoid for plain AVX (each half through the 128-bit
    /// path); `len` multiple of 8
    #[target_feature(enable = "avx")]
    pub unsafe fn sigmoid_f32(src: &[f32], dest: &mut [f32]) {
        debug_assert_eq!(src.len(), dest.len());
        debug_assert_eq!(src.len() % F32_WIDTH, 0);
        let mut i = 0;
        while i < src.len() {
            let v = _mm256_loadu_ps(src.as_ptr().add(i));
            _mm256_storeu_ps(
                dest.as_mut_ptr().add(i),
                crate::math::avx::sigmoid_ps_halves(v),
            );
            i += F32_WIDTH;
        }
    }

    /// Element-wise sigmoid, native 256-bit; `len` multiple of 8
    #[target_feature(enable = "avx2,fma")]
    pub unsafe fn sigmoid_f32_avx2(src: &[f32], dest: &mut [f32]) {
        debug_assert_eq!(src.len(), dest.len());
        debug_assert_eq!(src.len() % F32_WIDTH, 0);
        let mut i = 0;
        while i < src.len() {
            let v = _mm256_loadu_ps(src.as_ptr().add(i));
            _mm256_storeu_ps(dest.as_mut_ptr().add(i), crate::math::avx::sigmoid_ps(v));
            i += F32_WIDTH;
        }
    }

    /// Element-wise exp for plain AVX; `len` multiple of 8
    #[target_feature(enable = "avx")]
    pub unsafe fn exp_f32(src: &[f32], dest: &mut [f32]) {
        debug_assert_eq!(src.len(), dest.len());
        debug_assert_eq!(src.len() % F32_WIDTH, 0);
        let mut i = 0;
        while i < src.len() {
            let v = _mm256_loadu_ps(src.as_ptr().add(i));
            _mm256_storeu_ps(dest.as_mut_ptr().add(i), crate::math::avx::exp_ps_halves(v));
            i += F32_WIDTH;
        }
    }

    /// Element-wise exp, native 256-bit; `len` multiple of 8
    #[target_feature(enable = "avx2,fma")]
    pub unsafe fn exp_f32_avx2(src: &[f32], dest: &mut [f32]) {
        debug_assert_eq!(src.len(), dest.len());
        debug_assert_eq!(src.len() % F32_WIDTH, 0);
        let mut i = 0;
        while i < src.len() {
            let v = _mm256_loadu_ps(src.as_ptr().add(i));
            _mm256_storeu_ps(dest.as_mut_ptr().add(i), crate::math::avx::exp_ps(v));
            i += F32_WIDTH;
        }
    }
}
