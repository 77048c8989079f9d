//! Instruction-set kernel sets
//!
//! One module per register-width family, one struct per kernel set. Every
//! fixed-width fn in `sse`/`avx` has the same contract: slice lengths are a
//! multiple of the set's vector width for the element type (the blocked
//! composer guarantees this; a `debug_assert!` backs it up), loads and
//! stores are unaligned, and the scalar set in `scalar` defines the
//! reference semantics every other set must match (within float tolerance).
//!
//! # Safety
//!
//! All `unsafe` code is isolated here and in `math`. Callers must verify the
//! corresponding CPU capability before invoking an `unsafe fn`; the dispatch
//! layer does that through the cached feature probe.

pub mod scalar;

#[cfg(target_arch = "x86_64")]
pub mod avx;
#[cfg(target_arch = "x86_64")]
pub mod sse;

use crate::cpu::CpuFeatures;
use crate::InstSet;

/// True if this host can execute kernels of the given set
pub(crate) fn is_executable(inst: InstSet) -> bool {
    let f = CpuFeatures::get();
    match inst {
        InstSet::None => true,
        InstSet::Sse => f.sse,
        InstSet::Sse2 => f.sse2,
        InstSet::Sse3 => f.sse3,
        InstSet::Sse41 => f.sse41,
        InstSet::Avx => f.avx,
        InstSet::AvxFma => f.avx && f.fma,
        InstSet::Avx2 => f.avx2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_is_always_executable() {
        assert!(is_executable(InstSet::None));
    }

    #[test]
    fn test_executable_matches_available_list() {
        for inst in InstSet::available() {
            assert!(is_executable(inst), "{inst:?} listed but not executable");
        }
    }
}
