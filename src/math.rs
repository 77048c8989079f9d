//! Transcendental approximations for activation kernels
//!
//! `exp` is computed by range reduction and an 8-term Taylor polynomial:
//! `t = x·log2(e)` is rounded to an integer `r`, the input is reduced with a
//! two-part (Cody-Waite) ln(2) constant, the polynomial is evaluated in
//! Horner form, and `2^r` is reconstructed by bit-composing an IEEE-754
//! exponent field rather than calling into libm. The same structure is
//! implemented at scalar, 128-bit and 256-bit widths.
//!
//! Precision target is activation-grade, not libm-grade: inputs are clamped
//! to the range the sigmoid needs, so overflow/underflow past the
//! representable range cannot occur.
//!
//! Rounding note: the scalar reference rounds ties away from zero (an
//! explicit `±0.5` adjust), while the vector paths use the hardware
//! round-to-nearest-even of `cvtps_epi32`. The two disagree only at exact
//! half-integer multiples of the `log2(e)` scaling, well inside the
//! cross-path test tolerance.

/// Two-part split of ln(2), high part (f32)
pub const LN2_HI_F32: f32 = 6.931_457_5e-1;
/// Two-part split of ln(2), low part (f32)
pub const LN2_LO_F32: f32 = 1.428_606_8e-6;

/// Two-part split of ln(2), high part (f64)
pub const LN2_HI_F64: f64 = 6.931_471_803_691_238e-1;
/// Two-part split of ln(2), low part (f64)
pub const LN2_LO_F64: f64 = 1.908_214_929_270_587_7e-10;

/// Input clamp keeping `exp` inside normal f32 range
pub const EXP_MIN_F32: f32 = -87.3;
/// Input clamp keeping `exp` inside normal f32 range
pub const EXP_MAX_F32: f32 = 88.3;

/// Input clamp keeping `exp` inside normal f64 range
pub const EXP_MIN_F64: f64 = -708.0;
/// Input clamp keeping `exp` inside normal f64 range
pub const EXP_MAX_F64: f64 = 709.0;

/// Sigmoid input clamp (f32); `exp(±x)` stays representable inside it
pub const SIGMOID_MIN_F32: f32 = -88.0;
/// Sigmoid input clamp (f32)
pub const SIGMOID_MAX_F32: f32 = 88.0;

/// Sigmoid input clamp (f64)
pub const SIGMOID_MIN_F64: f64 = -708.0;
/// Sigmoid input clamp (f64)
pub const SIGMOID_MAX_F64: f64 = 708.0;

/// `2^e` as f32, composed directly in the IEEE-754 exponent field
///
/// Valid for the normal exponent range `-126..=127`. This is the one place
/// the crate exploits the float bit layout; it is verified against
/// `powi` across the whole range in the unit tests.
#[inline]
pub fn pow2i_f32(e: i32) -> f32 {
    debug_assert!((-126..=127).contains(&e));
    f32::from_bits(((e + 127) as u32) << 23)
}

/// `2^e` as f64, composed directly in the IEEE-754 exponent field
///
/// Valid for the normal exponent range `-1022..=1023`.
#[inline]
pub fn pow2i_f64(e: i32) -> f64 {
    debug_assert!((-1022..=1023).contains(&e));
    f64::from_bits(((e as i64 + 1023) as u64) << 52)
}

/// Scalar `exp` reference (f32)
///
/// The portable path every vector width is measured against.
#[inline]
pub fn exp_f32(x: f32) -> f32 {
    let x = x.clamp(EXP_MIN_F32, EXP_MAX_F32);
    let t = x * std::f32::consts::LOG2_E;

    // Round to nearest, ties away from zero
    let mut r = t as i32;
    let frac = t - r as f32;
    if frac >= 0.5 {
        r += 1;
    } else if frac <= -0.5 {
        r -= 1;
    }

    let rf = r as f32;
    let xr = x - rf * LN2_HI_F32 - rf * LN2_LO_F32;

    // 8-term Taylor polynomial, coefficients 1/0!..1/7!, Horner form
    let mut p = 1.0 / 5040.0;
    p = p * xr + 1.0 / 720.0;
    p = p * xr + 1.0 / 120.0;
    p = p * xr + 1.0 / 24.0;
    p = p * xr + 1.0 / 6.0;
    p = p * xr + 0.5;
    p = p * xr + 1.0;
    p = p * xr + 1.0;

    p * pow2i_f32(r)
}

/// Scalar `exp` reference (f64)
#[inline]
pub fn exp_f64(x: f64) -> f64 {
    let x = x.clamp(EXP_MIN_F64, EXP_MAX_F64);
    let t = x * std::f64::consts::LOG2_E;

    let mut r = t as i32;
    let frac = t - r as f64;
    if frac >= 0.5 {
        r += 1;
    } else if frac <= -0.5 {
        r -= 1;
    }

    let rf = r as f64;
    let xr = x - rf * LN2_HI_F64 - rf * LN2_LO_F64;

    let mut p = 1.0 / 5040.0;
    p = p * xr + 1.0 / 720.0;
    p = p * xr + 1.0 / 120.0;
    p = p * xr + 1.0 / 24.0;
    p = p * xr + 1.0 / 6.0;
    p = p * xr + 0.5;
    p = p * xr + 1.0;
    p = p * xr + 1.0;

    p * pow2i_f64(r)
}

/// Scalar sigmoid (f32): `1 / (1 + exp(-x))` with the input clamped so the
/// inner `exp` never leaves the representable range
#[inline]
pub fn sigmoid_f32(x: f32) -> f32 {
    let x = x.clamp(SIGMOID_MIN_F32, SIGMOID_MAX_F32);
    1.0 / (1.0 + exp_f32(-x))
}

/// Scalar sigmoid (f64)
#[inline]
pub fn sigmoid_f64(x: f64) -> f64 {
    let x = x.clamp(SIGMOID_MIN_F64, SIGMOID_MAX_F64);
    1.0 / (1.0 + exp_f64(-x))
}

/// 128-bit vector widths (SSE2)
#[cfg(target_arch = "x86_64")]
pub mod sse {
    use std::arch::x86_64::*;

    use super::{
        EXP_MAX_F32, EXP_MIN_F32, LN2_HI_F32, LN2_LO_F32, SIGMOID_MAX_F32, SIGMOID_MIN_F32,
    };

    /// 4-wide `exp` with the same clamp/reduce/reconstruct structure as the
    /// scalar reference
    ///
    /// # Safety
    ///
    /// Caller must have verified SSE2 support.
    #[target_feature(enable = "sse2")]
    pub unsafe fn exp_ps(x: __m128) -> __m128 {
        // Clamp to the normal-exponent-safe domain
        let x = _mm_max_ps(_mm_min_ps(x, _mm_set1_ps(EXP_MAX_F32)), _mm_set1_ps(EXP_MIN_F32));

        // Range reduction: x = r·ln2 + xr, r rounded to nearest (hardware)
        let t = _mm_mul_ps(x, _mm_set1_ps(std::f32::consts::LOG2_E));
        let r_i = _mm_cvtps_epi32(t);
        let r_f = _mm_cvtepi32_ps(r_i);
        let xr = _mm_sub_ps(x, _mm_mul_ps(r_f, _mm_set1_ps(LN2_HI_F32)));
        let xr = _mm_sub_ps(xr, _mm_mul_ps(r_f, _mm_set1_ps(LN2_LO_F32)));

        // 8-term Taylor polynomial in Horner form
        let mut p = _mm_set1_ps(1.0 / 5040.0);
        p = _mm_add_ps(_mm_mul_ps(p, xr), _mm_set1_ps(1.0 / 720.0));
        p = _mm_add_ps(_mm_mul_ps(p, xr), _mm_set1_ps(1.0 / 120.0));
        p = _mm_add_ps(_mm_mul_ps(p, xr), _mm_set1_ps(1.0 / 24.0));
        p = _mm_add_ps(_mm_mul_ps(p, xr), _mm_set1_ps(1.0 / 6.0));
        p = _mm_add_ps(_mm_mul_ps(p, xr), _mm_set1_ps(0.5));
        p = _mm_add_ps(_mm_mul_ps(p, xr), _mm_set1_ps(1.0));
        p = _mm_add_ps(_mm_mul_ps(p, xr), _mm_set1_ps(1.0));

        // Reconstruct 2^r in the exponent field: (r + 127) << 23
        let pow2 = _mm_castsi128_ps(_mm_slli_epi32::<23>(_mm_add_epi32(r_i, _mm_set1_epi32(127))));
        _mm_mul_ps(p, pow2)
    }

    /// 4-wide sigmoid: clamp, then `1 / (1 + exp(-x))`
    ///
    /// # Safety
    ///
    /// Caller must have verified SSE2 support.
    #[target_feature(enable = "sse2")]
    pub unsafe fn sigmoid_ps(x: __m128) -> __m128 {
        let x = _mm_max_ps(
            _mm_min_ps(x, _mm_set1_ps(SIGMOID_MAX_F32)),
            _mm_set1_ps(SIGMOID_MIN_F32),
        );
        let one = _mm_set1_ps(1.0);
        let neg = _mm_sub_ps(_mm_setzero_ps(), x);
        let e = exp_ps(neg);
        _mm_div_ps(one, _mm_add_ps(one, e))
    }
}

/// 256-bit vector widths (AVX and AVX2)
#[cfg(target_arch = "x86_64")]
pub mod avx {
    use std::arch::x86_64::*;

    use super::{
        EXP_MAX_F32, EXP_MIN_F32, LN2_HI_F32, LN2_LO_F32, SIGMOID_MAX_F32, SIGMOID_MIN_F32,
    };

    /// 8-wide `exp` for plain AVX
    ///
    /// 256-bit integer shifts need AVX2, so the exponent reconstruction runs
    /// each 128-bit half through the SSE2 path and reassembles.
    ///
    /// # Safety
    ///
    /// Caller must have verified AVX support.
    #[target_feature(enable = "avx")]
    pub unsafe fn exp_ps_halves(x: __m256) -> __m256 {
        let lo = _mm256_castps256_ps128(x);
        let hi = _mm256_extractf128_ps::<1>(x);
        let lo = super::sse::exp_ps(lo);
        let hi = super::sse::exp_ps(hi);
        _mm256_set_m128(hi, lo)
    }

    /// 8-wide sigmoid for plain AVX
    ///
    /// # Safety
    ///
    /// Caller must have verified AVX support.
    #[target_feature(enable = "avx")]
    pub unsafe fn sigmoid_ps_halves(x: __m256) -> __m256 {
        let x = _mm256_max_ps(
            _mm256_min_ps(x, _mm256_set1_ps(SIGMOID_MAX_F32)),
            _mm256_set1_ps(SIGMOID_MIN_F32),
        );
        let one = _mm256_set1_ps(1.0);
        let neg = _mm256_sub_ps(_mm256_setzero_ps(), x);
        let e = exp_ps_halves(neg);
        _mm256_div_ps(one, _mm256_add_ps(one, e))
    }

    /// 8-wide `exp` for AVX2, native 256-bit integer exponent reconstruction
    /// and FMA in the polynomial
    ///
    /// # Safety
    ///
    /// Caller must have verified AVX2 and FMA support.
    #[target_feature(enable = "avx2,fma")]
    pub unsafe fn exp_ps(x: __m256) -> __m256 {
        let x = _mm256_max_ps(
            _mm256_min_ps(x, _mm256_set1_ps(EXP_MAX_F32)),
            _mm256_set1_ps(EXP_MIN_F32),
        );

        let t = _mm256_mul_ps(x, _mm256_set1_ps(std::f32::consts::LOG2_E));
        let r_i = _mm256_cvtps_epi32(t);
        let r_f = _mm256_cvtepi32_ps(r_i);
        let xr = _mm256_fnmadd_ps(r_f, _mm256_set1_ps(LN2_HI_F32), x);
        let xr = _mm256_fnmadd_ps(r_f, _mm256_set1_ps(LN2_LO_F32), xr);

        let mut p = _mm256_set1_ps(1.0 / 5040.0);
        p = _mm256_fmadd_ps(p, xr, _mm256_set1_ps(1.0 / 720.0));
        p = _mm256_fmadd_ps(p, xr, _mm256_set1_ps(1.0 / 120.0));
        p = _mm256_fmadd_ps(p, xr, _mm256_set1_ps(1.0 / 24.0));
        p = _mm256_fmadd_ps(p, xr, _mm256_set1_ps(1.0 / 6.0));
        p = _mm256_fmadd_ps(p, xr, _mm256_set1_ps(0.5));
        p = _mm256_fmadd_ps(p, xr, _mm256_set1_ps(1.0));
        p = _mm256_fmadd_ps(p, xr, _mm256_set1_ps(1.0));

        let pow2 = _mm256_castsi256_ps(_mm256_slli_epi32::<23>(_mm256_add_epi32(
            r_i,
            _mm256_set1_epi32(127),
        )));
        _mm256_mul_ps(p, pow2)
    }

    /// 8-wide sigmoid for AVX2
    ///
    /// # Safety
    ///
    /// Caller must have verified AVX2 and FMA support.
    #[target_feature(enable = "avx2,fma")]
    pub unsafe fn sigmoid_ps(x: __m256) -> __m256 {
        let x = _mm256_max_ps(
            _mm256_min_ps(x, _mm256_set1_ps(SIGMOID_MAX_F32)),
            _mm256_set1_ps(SIGMOID_MIN_F32),
        );
        let one = _mm256_set1_ps(1.0);
        let neg = _mm256_sub_ps(_mm256_setzero_ps(), x);
        let e = exp_ps(neg);
        _mm256_div_ps(one, _mm256_add_ps(one, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pow2i_f32_matches_powi_over_full_range() {
        for e in -126..=127 {
            assert_eq!(pow2i_f32(e), 2.0f32.powi(e), "exponent {e}");
        }
    }

    #[test]
    fn test_pow2i_f64_matches_powi_over_full_range() {
        for e in -1022..=1023 {
            assert_eq!(pow2i_f64(e), 2.0f64.powi(e), "exponent {e}");
        }
    }

    #[test]
    fn test_exp_f32_tracks_libm() {
        let mut x = -87.0f32;
        while x < 88.0 {
            let got = exp_f32(x);
            let want = x.exp();
            let rel = ((got - want) / want).abs();
            assert!(rel < 2e-6, "x={x} got={got} want={want} rel={rel}");
            x += 0.37;
        }
    }

    #[test]
    fn test_exp_f64_tracks_libm() {
        let mut x = -200.0f64;
        while x < 200.0 {
            let got = exp_f64(x);
            let want = x.exp();
            let rel = ((got - want) / want).abs();
            assert!(rel < 1e-8, "x={x} got={got} want={want} rel={rel}");
            x += 1.13;
        }
    }

    #[test]
    fn test_exp_clamps_instead_of_overflowing() {
        assert!(exp_f32(1.0e4).is_finite());
        assert!(exp_f32(-1.0e4) > 0.0);
        assert!(exp_f64(1.0e5).is_finite());
    }

    #[test]
    fn test_sigmoid_zero_is_half() {
        assert!((sigmoid_f32(0.0) - 0.5).abs() < f32::EPSILON);
        assert!((sigmoid_f64(0.0) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sigmoid_saturates_at_the_clamp() {
        assert_eq!(sigmoid_f32(-1.0e6), sigmoid_f32(SIGMOID_MIN_F32));
        assert_eq!(sigmoid_f32(1.0e6), sigmoid_f32(SIGMOID_MAX_F32));
        assert!(sigmoid_f32(-1.0e6) < 1e-30);
        assert!(sigmoid_f32(1.0e6) > 1.0 - 1e-7);
    }

    #[test]
    fn test_sigmoid_is_monotone() {
        let mut prev = sigmoid_f32(-90.0);
        let mut x = -89.0f32;
        while x <= 90.0 {
            let cur = sigmoid_f32(x);
            assert!(cur >= prev, "sigmoid decreased at x={x}");
            prev = cur;
            x += 0.5;
        }
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_sse_exp_matches_scalar() {
        use std::arch::x86_64::*;
        if !crate::cpu::is_support_sse2() {
            return;
        }
        let input = [-5.5f32, -0.25, 0.0, 3.75];
        let mut out = [0.0f32; 4];
        unsafe {
            let v = _mm_loadu_ps(input.as_ptr());
            _mm_storeu_ps(out.as_mut_ptr(), sse::exp_ps(v));
        }
        for (i, &x) in input.iter().enumerate() {
            let want = exp_f32(x);
            assert!(
                ((out[i] - want) / want).abs() < 1e-5,
                "lane {i}: {} vs {want}",
                out[i]
            );
        }
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_avx2_exp_matches_scalar() {
        use std::arch::x86_64::*;
        if !(crate::cpu::is_support_avx2() && crate::cpu::is_support_fma()) {
            return;
        }
        let input = [-20.0f32, -5.5, -1.0, -0.25, 0.0, 0.5, 3.75, 10.0];
        let mut out = [0.0f32; 8];
        unsafe {
            let v = _mm256_loadu_ps(input.as_ptr());
            _mm256_storeu_ps(out.as_mut_ptr(), avx::exp_ps(v));
        }
        for (i, &x) in input.iter().enumerate() {
            let want = exp_f32(x);
            assert!(
                ((out[i] - want) / want).abs() < 1e-5,
                "lane {i}: {} vs {want}",
                out[i]
            );
        }
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_avx_halves_exp_matches_sse() {
        use std::arch::x86_64::*;
        if !crate::cpu::is_support_avx() {
            return;
        }
        let input = [-3.0f32, -1.5, 0.0, 0.75, 1.5, 2.25, 4.0, 8.0];
        let mut out = [0.0f32; 8];
        unsafe {
            let v = _mm256_loadu_ps(input.as_ptr());
            _mm256_storeu_ps(out.as_mut_ptr(), avx::exp_ps_halves(v));
        }
        for (i, &x) in input.iter().enumerate() {
            let want = exp_f32(x);
            assert!(((out[i] - want) / want).abs() < 1e-5);
        }
    }
}
