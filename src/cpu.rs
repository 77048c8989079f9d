//! Runtime CPU feature detection
//!
//! The host CPU is probed exactly once; every `is_support_*` predicate is a
//! pure read of the cached result afterward. Absence of a feature is a
//! normal `false`, never an error.
//!
//! Initialization is not designed for concurrent first use — embedders
//! should force detection once at startup (any predicate call does it), after
//! which concurrent readers are free.

use std::sync::OnceLock;

static FEATURES: OnceLock<CpuFeatures> = OnceLock::new();

/// Detected CPU capabilities for SIMD kernel dispatch
///
/// Populated once per process and consulted on every dispatch. FMA is kept
/// separate from the AVX flags because it is an orthogonal capability: a CPU
/// can have AVX without FMA, and the dispatcher combines them explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuFeatures {
    /// SSE (128-bit float SIMD)
    pub sse: bool,
    /// SSE2 (128-bit double/integer SIMD; x86_64 baseline)
    pub sse2: bool,
    /// SSE3 (horizontal add/sub)
    pub sse3: bool,
    /// SSE4.1 (packed widen/narrow, dword min/max, blend)
    pub sse41: bool,
    /// AVX (256-bit float SIMD)
    pub avx: bool,
    /// AVX2 (256-bit integer SIMD)
    pub avx2: bool,
    /// Fused multiply-add
    pub fma: bool,
}

impl CpuFeatures {
    /// Probe the host CPU
    ///
    /// Safe to call repeatedly, but callers should prefer [`CpuFeatures::get`]
    /// which probes once and caches.
    pub fn detect() -> Self {
        #[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
        {
            Self {
                sse: is_x86_feature_detected!("sse"),
                sse2: is_x86_feature_detected!("sse2"),
                sse3: is_x86_feature_detected!("sse3"),
                sse41: is_x86_feature_detected!("sse4.1"),
                avx: is_x86_feature_detected!("avx"),
                avx2: is_x86_feature_detected!("avx2"),
                fma: is_x86_feature_detected!("fma"),
            }
        }

        #[cfg(not(any(target_arch = "x86_64", target_arch = "x86")))]
        {
            Self::none()
        }
    }

    /// Capability set with every feature absent (portable fallback)
    pub fn none() -> Self {
        Self {
            sse: false,
            sse2: false,
            sse3: false,
            sse41: false,
            avx: false,
            avx2: false,
            fma: false,
        }
    }

    /// Cached capabilities for this process
    pub fn get() -> &'static CpuFeatures {
        FEATURES.get_or_init(CpuFeatures::detect)
    }
}

/// SSE available on this host
pub fn is_support_sse() -> bool {
    CpuFeatures::get().sse
}

/// SSE2 available on this host
pub fn is_support_sse2() -> bool {
    CpuFeatures::get().sse2
}

/// SSE3 available on this host
pub fn is_support_sse3() -> bool {
    CpuFeatures::get().sse3
}

/// SSE4.1 available on this host
pub fn is_support_sse41() -> bool {
    CpuFeatures::get().sse41
}

/// AVX available on this host
pub fn is_support_avx() -> bool {
    CpuFeatures::get().avx
}

/// AVX2 available on this host
pub fn is_support_avx2() -> bool {
    CpuFeatures::get().avx2
}

/// FMA available on this host
pub fn is_support_fma() -> bool {
    CpuFeatures::get().fma
}
