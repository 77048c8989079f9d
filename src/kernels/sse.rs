//! 128-bit kernel set (SSE / SSE2 / SSE3 / SSE4.1)
//!
//! 4 lanes of f32, 2 lanes of f64, 4 lanes of i32, 16 bytes per register.
//! Every fn processes a slice whose length is a multiple of its vector
//! width; remainders are the blocked composer's job, handled by the scalar
//! set. Loads and stores are unaligned throughout.
//!
//! # Safety
//!
//! All fns are `unsafe`: callers must have verified the instruction set
//! named in each fn's `#[target_feature]` gate.

use std::arch::x86_64::*;

/// 128-bit kernel set
pub struct SseKernel;

/// f32 lanes per 128-bit register
pub const F32_WIDTH: usize = 4;
/// f64 lanes per 128-bit register
pub const F64_WIDTH: usize = 2;
/// i32 lanes per 128-bit register
pub const I32_WIDTH: usize = 4;
/// Bytes consumed per widening-conversion step
pub const U8_WIDTH: usize = 16;

/// Sum the four lanes of `v` into a scalar
#[inline]
#[target_feature(enable = "sse")]
unsafe fn hsum_ps(v: __m128) -> f32 {
    // Pairwise: fold high half onto low, then lane 1 onto lane 0
    let t = _mm_add_ps(v, _mm_movehl_ps(v, v));
    let t = _mm_add_ss(t, _mm_shuffle_ps(t, t, 1));
    _mm_cvtss_f32(t)
}

/// Sum the two lanes of `v` into a scalar
#[inline]
#[target_feature(enable = "sse2")]
unsafe fn hsum_pd(v: __m128d) -> f64 {
    let hi = _mm_unpackhi_pd(v, v);
    _mm_cvtsd_f64(_mm_add_sd(v, hi))
}

/// Sum the four i32 lanes of `v` into a scalar
#[inline]
#[target_feature(enable = "sse2")]
unsafe fn hsum_epi32(v: __m128i) -> i32 {
    let t = _mm_add_epi32(v, _mm_shuffle_epi32(v, 0b_01_00_11_10));
    let t = _mm_add_epi32(t, _mm_shuffle_epi32(t, 0b_00_00_00_01));
    _mm_cvtsi128_si32(t)
}

impl SseKernel {
    /// Inner product, 4 lanes at a time; `len` multiple of 4
    #[target_feature(enable = "sse")]
    pub unsafe fn dot_f32(a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        debug_assert_eq!(a.len() % F32_WIDTH, 0);
        let mut acc = _mm_setzero_ps();
        let mut i = 0;
        while i < a.len() {
            let va = _mm_loadu_ps(a.as_ptr().add(i));
            let vb = _mm_loadu_ps(b.as_ptr().add(i));
            acc = _mm_add_ps(acc, _mm_mul_ps(va, vb));
            i += F32_WIDTH;
        }
        hsum_ps(acc)
    }

    /// Inner product with SSE3 horizontal-add reduction
    #[target_feature(enable = "sse3")]
    pub unsafe fn dot_f32_hadd(a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        debug_assert_eq!(a.len() % F32_WIDTH, 0);
        let mut acc = _mm_setzero_ps();
        let mut i = 0;
        while i < a.len() {
            let va = _mm_loadu_ps(a.as_ptr().add(i));
            let vb = _mm_loadu_ps(b.as_ptr().add(i));
            acc = _mm_add_ps(acc, _mm_mul_ps(va, vb));
            i += F32_WIDTH;
        }
        let t = _mm_hadd_ps(acc, acc);
        let t = _mm_hadd_ps(t, t);
        _mm_cvtss_f32(t)
    }

    /// `dest[i] += c * x[i]`; `len` multiple of 4
    #[target_feature(enable = "sse")]
    pub unsafe fn axpy_f32(c: f32, x: &[f32], dest: &mut [f32]) {
        debug_assert_eq!(x.len(), dest.len());
        debug_assert_eq!(x.len() % F32_WIDTH, 0);
        let vc = _mm_set1_ps(c);
        let mut i = 0;
        while i < x.len() {
            let vx = _mm_loadu_ps(x.as_ptr().add(i));
            let vd = _mm_loadu_ps(dest.as_ptr().add(i));
            _mm_storeu_ps(dest.as_mut_ptr().add(i), _mm_add_ps(vd, _mm_mul_ps(vc, vx)));
            i += F32_WIDTH;
        }
    }

    /// Sum of all elements; `len` multiple of 4
    #[target_feature(enable = "sse")]
    pub unsafe fn sum_f32(a: &[f32]) -> f32 {
        debug_assert_eq!(a.len() % F32_WIDTH, 0);
        let mut acc = _mm_setzero_ps();
        let mut i = 0;
        while i < a.len() {
            acc = _mm_add_ps(acc, _mm_loadu_ps(a.as_ptr().add(i)));
            i += F32_WIDTH;
        }
        hsum_ps(acc)
    }

    /// Smallest element; `len` a non-zero multiple of 4
    #[target_feature(enable = "sse")]
    pub unsafe fn min_f32(a: &[f32]) -> f32 {
        debug_assert!(!a.is_empty());
        debug_assert_eq!(a.len() % F32_WIDTH, 0);
        let mut acc = _mm_loadu_ps(a.as_ptr());
        let mut i = F32_WIDTH;
        while i < a.len() {
            acc = _mm_min_ps(acc, _mm_loadu_ps(a.as_ptr().add(i)));
            i += F32_WIDTH;
        }
        let t = _mm_min_ps(acc, _mm_movehl_ps(acc, acc));
        let t = _mm_min_ss(t, _mm_shuffle_ps(t, t, 1));
        _mm_cvtss_f32(t)
    }

    /// Largest element; `len` a non-zero multiple of 4
    #[target_feature(enable = "sse")]
    pub unsafe fn max_f32(a: &[f32]) -> f32 {
        debug_assert!(!a.is_empty());
        debug_assert_eq!(a.len() % F32_WIDTH, 0);
        let mut acc = _mm_loadu_ps(a.as_ptr());
        let mut i = F32_WIDTH;
        while i < a.len() {
            acc = _mm_max_ps(acc, _mm_loadu_ps(a.as_ptr().add(i)));
            i += F32_WIDTH;
        }
        let t = _mm_max_ps(acc, _mm_movehl_ps(acc, acc));
        let t = _mm_max_ss(t, _mm_shuffle_ps(t, t, 1));
        _mm_cvtss_f32(t)
    }

    /// Inner product, 2 lanes at a time; `len` multiple of 2
    #[target_feature(enable = "sse2")]
    pub unsafe fn dot_f64(a: &[f64], b: &[f64]) -> f64 {
        debug_assert_eq!(a.len(), b.len());
        debug_assert_eq!(a.len() % F64_WIDTH, 0);
        let mut acc = _mm_setzero_pd();
        let mut i = 0;
        while i < a.len() {
            let va = _mm_loadu_pd(a.as_ptr().add(i));
            let vb = _mm_loadu_pd(b.as_ptr().add(i));
            acc = _mm_add_pd(acc, _mm_mul_pd(va, vb));
            i += F64_WIDTH;
        }
        hsum_pd(acc)
    }

    /// `dest[i] += c * x[i]`; `len` multiple of 2
    #[target_feature(enable = "sse2")]
    pub unsafe fn axpy_f64(c: f64, x: &[f64], dest: &mut [f64]) {
        debug_assert_eq!(x.len(), dest.len());
        debug_assert_eq!(x.len() % F64_WIDTH, 0);
        let vc = _mm_set1_pd(c);
        let mut i = 0;
        while i < x.len() {
            let vx = _mm_loadu_pd(x.as_ptr().add(i));
            let vd = _mm_loadu_pd(dest.as_ptr().add(i));
            _mm_storeu_pd(dest.as_mut_ptr().add(i), _mm_add_pd(vd, _mm_mul_pd(vc, vx)));
            i += F64_WIDTH;
        }
    }

    /// Sum of all elements; `len` multiple of 2
    #[target_feature(enable = "sse2")]
    pub unsafe fn sum_f64(a: &[f64]) -> f64 {
        debug_assert_eq!(a.len() % F64_WIDTH, 0);
        let mut acc = _mm_setzero_pd();
        let mut i = 0;
        while i < a.len() {
            acc = _mm_add_pd(acc, _mm_loadu_pd(a.as_ptr().add(i)));
            i += F64_WIDTH;
        }
        hsum_pd(acc)
    }

    /// Smallest element; `len` a non-zero multiple of 2
    #[target_feature(enable = "sse2")]
    pub unsafe fn min_f64(a: &[f64]) -> f64 {
        debug_assert!(!a.is_empty());
        debug_assert_eq!(a.len() % F64_WIDTH, 0);
        let mut acc = _mm_loadu_pd(a.as_ptr());
        let mut i = F64_WIDTH;
        while i < a.len() {
            acc = _mm_min_pd(acc, _mm_loadu_pd(a.as_ptr().add(i)));
            i += F64_WIDTH;
        }
        let hi = _mm_unpackhi_pd(acc, acc);
        _mm_cvtsd_f64(_mm_min_sd(acc, hi))
    }

    /// Largest element; `len` a non-zero multiple of 2
    #[target_feature(enable = "sse2")]
    pub unsafe fn max_f64(a: &[f64]) -> f64 {
        debug_assert!(!a.is_empty());
        debug_assert_eq!(a.len() % F64_WIDTH, 0);
        let mut acc = _mm_loadu_pd(a.as_ptr());
        let mut i = F64_WIDTH;
        while i < a.len() {
            acc = _mm_max_pd(acc, _mm_loadu_pd(a.as_ptr().add(i)));
            i += F64_WIDTH;
        }
        let hi = _mm_unpackhi_pd(acc, acc);
        _mm_cvtsd_f64(_mm_max_sd(acc, hi))
    }

    /// Sum of all elements; `len` multiple of 4
    #[target_feature(enable = "sse2")]
    pub unsafe fn sum_i32(a: &[i32]) -> i32 {
        debug_assert_eq!(a.len() % I32_WIDTH, 0);
        let mut acc = _mm_setzero_si128();
        let mut i = 0;
        while i < a.len() {
            acc = _mm_add_epi32(acc, _mm_loadu_si128(a.as_ptr().add(i) as *const __m128i));
            i += I32_WIDTH;
        }
        hsum_epi32(acc)
    }

    /// Smallest element; `len` a non-zero multiple of 4
    #[target_feature(enable = "sse4.1")]
    pub unsafe fn min_i32(a: &[i32]) -> i32 {
        debug_assert!(!a.is_empty());
        debug_assert_eq!(a.len() % I32_WIDTH, 0);
        let mut acc = _mm_loadu_si128(a.as_ptr() as *const __m128i);
        let mut i = I32_WIDTH;
        while i < a.len() {
            acc = _mm_min_epi32(acc, _mm_loadu_si128(a.as_ptr().add(i) as *const __m128i));
            i += I32_WIDTH;
        }
        let t = _mm_min_epi32(acc, _mm_shuffle_epi32(acc, 0b_01_00_11_10));
        let t = _mm_min_epi32(t, _mm_shuffle_epi32(t, 0b_00_00_00_01));
        _mm_cvtsi128_si32(t)
    }

    /// Largest element; `len` a non-zero multiple of 4
    #[target_feature(enable = "sse4.1")]
    pub unsafe fn max_i32(a: &[i32]) -> i32 {
        debug_assert!(!a.is_empty());
        debug_assert_eq!(a.len() % I32_WIDTH, 0);
        let mut acc = _mm_loadu_si128(a.as_ptr() as *const __m128i);
        let mut i = I32_WIDTH;
        while i < a.len() {
            acc = _mm_max_epi32(acc, _mm_loadu_si128(a.as_ptr().add(i) as *const __m128i));
            i += I32_WIDTH;
        }
        let t = _mm_max_epi32(acc, _mm_shuffle_epi32(acc, 0b_01_00_11_10));
        let t = _mm_max_epi32(t, _mm_shuffle_epi32(t, 0b_00_00_00_01));
        _mm_cvtsi128_si32(t)
    }

    /// Widen 16 bytes per step to f32 with a scale factor; `len` multiple of 16
    #[target_feature(enable = "sse4.1")]
    pub unsafe fn u8_to_f32_scaled(src: &[u8], dest: &mut [f32], factor: f32) {
        debug_assert_eq!(src.len(), dest.len());
        debug_assert_eq!(src.len() % U8_WIDTH, 0);
        let vf = _mm_set1_ps(factor);
        let mut i = 0;
        while i < src.len() {
            let bytes = _mm_loadu_si128(src.as_ptr().add(i) as *const __m128i);
            // Four groups of 4 bytes, each widened u8 -> i32 -> f32
            let g0 = _mm_cvtepu8_epi32(bytes);
            let g1 = _mm_cvtepu8_epi32(_mm_srli_si128(bytes, 4));
            let g2 = _mm_cvtepu8_epi32(_mm_srli_si128(bytes, 8));
            let g3 = _mm_cvtepu8_epi32(_mm_srli_si128(bytes, 12));
            _mm_storeu_ps(dest.as_mut_ptr().add(i), _mm_mul_ps(_mm_cvtepi32_ps(g0), vf));
            _mm_storeu_ps(dest.as_mut_ptr().add(i + 4), _mm_mul_ps(_mm_cvtepi32_ps(g1), vf));
            _mm_storeu_ps(dest.as_mut_ptr().add(i + 8), _mm_mul_ps(_mm_cvtepi32_ps(g2), vf));
            _mm_storeu_ps(dest.as_mut_ptr().add(i + 12), _mm_mul_ps(_mm_cvtepi32_ps(g3), vf));
            i += U8_WIDTH;
        }
    }

    /// `dest[i] += src[i] as f32`; `len` multiple of 16
    #[target_feature(enable = "sse4.1")]
    pub unsafe fn accumulate_u8_f32(src: &[u8], dest: &mut [f32]) {
        debug_assert_eq!(src.len(), dest.len());
        debug_assert_eq!(src.len() % U8_WIDTH, 0);
        let mut i = 0;
        while i < src.len() {
            let bytes = _mm_loadu_si128(src.as_ptr().add(i) as *const __m128i);
            let g0 = _mm_cvtepi32_ps(_mm_cvtepu8_epi32(bytes));
            let g1 = _mm_cvtepi32_ps(_mm_cvtepu8_epi32(_mm_srli_si128(bytes, 4)));
            let g2 = _mm_cvtepi32_ps(_mm_cvtepu8_epi32(_mm_srli_si128(bytes, 8)));
            let g3 = _mm_cvtepi32_ps(_mm_cvtepu8_epi32(_mm_srli_si128(bytes, 12)));
            let d0 = _mm_loadu_ps(dest.as_ptr().add(i));
            let d1 = _mm_loadu_ps(dest.as_ptr().add(i + 4));
            let d2 = _mm_loadu_ps(dest.as_ptr().add(i + 8));
            let d3 = _mm_loadu_ps(dest.as_ptr().add(i + 12));
            _mm_storeu_ps(dest.as_mut_ptr().add(i), _mm_add_ps(d0, g0));
            _mm_storeu_ps(dest.as_mut_ptr().add(i + 4), _mm_add_ps(d1, g1));
            _mm_storeu_ps(dest.as_mut_ptr().add(i + 8), _mm_add_ps(d2, g2));
            _mm_storeu_ps(dest.as_mut_ptr().add(i + 12), _mm_add_ps(d3, g3));
            i += U8_WIDTH;
        }
    }

    /// `dest[i] = src[i] as f32 * factor`; `len` multiple of 4
    #[target_feature(enable = "sse2")]
    pub unsafe fn i32_to_f32_scaled(src: &[i32], dest: &mut [f32], factor: f32) {
        debug_assert_eq!(src.len(), dest.len());
        debug_assert_eq!(src.len() % I32_WIDTH, 0);
        let vf = _mm_set1_ps(factor);
        let mut i = 0;
        while i < src.len() {
            let v = _mm_loadu_si128(src.as_ptr().add(i) as *const __m128i);
            _mm_storeu_ps(dest.as_mut_ptr().add(i), _mm_mul_ps(_mm_cvtepi32_ps(v), vf));
            i += I32_WIDTH;
        }
    }

    /// Narrow 16 i32 per step to i8 with saturation; `len` multiple of 16
    ///
    /// The packed-saturation instructions clamp exactly like the scalar
    /// reference, so both paths agree on out-of-range inputs.
    #[target_feature(enable = "sse2")]
    pub unsafe fn i32_to_i8_sat(src: &[i32], dest: &mut [i8]) {
        debug_assert_eq!(src.len(), dest.len());
        debug_assert_eq!(src.len() % 16, 0);
        let mut i = 0;
        while i < src.len() {
            let a = _mm_loadu_si128(src.as_ptr().add(i) as *const __m128i);
            let b = _mm_loadu_si128(src.as_ptr().add(i + 4) as *const __m128i);
            let c = _mm_loadu_si128(src.as_ptr().add(i + 8) as *const __m128i);
            let d = _mm_loadu_si128(src.as_ptr().add(i + 12) as *const __m128i);
            let ab = _mm_packs_epi32(a, b);
            let cd = _mm_packs_epi32(c, d);
            let packed = _mm_packs_epi16(ab, cd);
            _mm_storeu_si128(dest.as_mut_ptr().add(i) as *mut __m128i, packed);
            i += 16;
        }
    }

    /// Narrow 8 i32 per step to i16 with saturation; `len` multiple of 8
    #[target_feature(enable = "sse2")]
    pub unsafe fn i32_to_i16_sat(src: &[i32], dest: &mut [i16]) {
        debug_assert_eq!(src.len(), dest.len());
        debug_assert_eq!(src.len() % 8, 0);
        let mut i = 0;
        while i < src.len() {
            let a = _mm_loadu_si128(src.as_ptr().add(i) as *const __m128i);
            let b = _mm_loadu_si128(src.as_ptr().add(i + 4) as *const __m128i);
            _mm_storeu_si128(
                dest.as_mut_ptr().add(i) as *mut __m128i,
                _mm_packs_epi32(a, b),
            );
            i += 8;
        }
    }

    /// Widen f32 to f64; `len` multiple of 4
    #[target_feature(enable = "sse2")]
    pub unsafe fn f32_to_f64(src: &[f32], dest: &mut [f64]) {
        debug_assert_eq!(src.len(), dest.len());
        debug_assert_eq!(src.len() % F32_WIDTH, 0);
        let mut i = 0;
        while i < src.len() {
            let v = _mm_loadu_ps(src.as_ptr().add(i));
            let lo = _mm_cvtps_pd(v);
            let hi = _mm_cvtps_pd(_mm_movehl_ps(v, v));
            _mm_storeu_pd(dest.as_mut_ptr().add(i), lo);
            _mm_storeu_pd(dest.as_mut_ptr().add(i + 2), hi);
            i += F32_WIDTH;
        }
    }

    /// Narrow f64 to f32; `len` multiple of 4
    #[target_feature(enable = "sse2")]
    pub unsafe fn f64_to_f32(src: &[f64], dest: &mut [f32]) {
        debug_assert_eq!(src.len(), dest.len());
        debug_assert_eq!(src.len() % 4, 0);
        let mut i = 0;
        while i < src.len() {
            let lo = _mm_cvtpd_ps(_mm_loadu_pd(src.as_ptr().add(i)));
            let hi = _mm_cvtpd_ps(_mm_loadu_pd(src.as_ptr().add(i + 2)));
            _mm_storeu_ps(dest.as_mut_ptr().add(i), _mm_movelh_ps(lo, hi));
            i += 4;
        }
    }

    /// Element-wise sigmoid; `len` multiple of 4
    #[target_feature(enable = "sse2")]
    pub unsafe fn sigmoid_f32(src: &[f32], dest: &mut [f32]) {
        debug_assert_eq!(src.len(), dest.len());
        debug_assert_eq!(src.len() % F32_WIDTH, 0);
        let mut i = 0;
        while i < src.len() {
            let v = _mm_loadu_ps(src.as_ptr().add(i));
            _mm_storeu_ps(dest.as_mut_ptr().add(i), crate::math::sse::sigmoid_ps(v));
            i += F32_WIDTH;
        }
    }

    /// Element-wise exp; `len` multiple of 4
    #[target_feature(enable = "sse2")]
    pub unsafe fn exp_f32(src: &[f32], dest: &mut [f32]) {
        debug_assert_eq!(src.len(), dest.len());
        debug_assert_eq!(src.len() % F32_WIDTH, 0);
        let mut i = 0;
        while i < src.len() {
            let v = _mm_loadu_ps(src.as_ptr().add(i));
            _mm_storeu_ps(dest.as_mut_ptr().add(i), crate::math::sse::exp_ps(v));
            i += F32_WIDTH;
        }
    }
}
