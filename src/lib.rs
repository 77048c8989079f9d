//! Centella: CPU-Dispatched SIMD Numeric Kernels
//!
//! **Centella** (Spanish: "lightning flash") provides the vectorized
//! tensor/matrix/vector primitives a small neural-network training stack
//! runs on: multiplication, reductions, activation functions, saturating
//! type conversion, one-hot operations and sliding-window index generation.
//!
//! One shape-checked, type-generic entry point per operation selects at
//! runtime among hand-tuned instruction-set implementations (scalar,
//! SSE/SSE2/SSE3/SSE4.1, AVX, AVX with FMA, AVX2), each with its own
//! blocking factors and vector widths.
//!
//! # Design Principles
//!
//! - **Runtime dispatch**: the CPU is probed once; every call picks the most
//!   capable kernel the element type supports
//! - **Caller-owned memory**: destinations are pre-sized with `assign`;
//!   kernels only overwrite existing storage and never allocate
//! - **Unsafe isolated in kernels**: the public API is 100% safe; intrinsics
//!   live in `kernels/` and `math`
//! - **Unaligned-safe**: all vector loads/stores are unaligned, callers owe
//!   no alignment guarantees
//!
//! # Quick Start
//!
//! ```rust
//! use centella::{ops, Layout, Matrix, Vector};
//!
//! let m = Matrix::from_vec(2, 3, vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
//! let v = Vector::from_slice(&[1.0f32, 1.0, 1.0]);
//! let mut dest = Vector::new();
//! dest.assign(2, 0.0);
//!
//! // dest = M · v, dispatched to the best available instruction set
//! ops::multiply_mv(&mut dest, &m, &v, Layout::RowMajor).unwrap();
//! assert_eq!(dest.as_slice(), &[6.0, 15.0]);
//! ```

pub mod block;
pub mod cpu;
pub mod dataset;
pub mod error;
pub mod kernels;
pub mod math;
pub mod matrix;
pub mod ops;
pub mod tensor;
pub mod vector;

pub use error::{CentellaError, Result};
pub use matrix::{Layout, Matrix};
pub use ops::Reduce;
pub use tensor::Tensor;
pub use vector::Vector;

/// Instruction-set tag used for kernel dispatch
///
/// FMA is an orthogonal capability combined with a base ISA: `AvxFma` selects
/// fused-multiply-add specializations distinct from plain `Avx`. AVX2 CPUs
/// all ship FMA, so the `Avx2` kernels use it freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InstSet {
    /// Portable scalar fallback (no SIMD)
    None,
    /// SSE (128-bit f32)
    Sse,
    /// SSE2 (128-bit f64/integer)
    Sse2,
    /// SSE3 (horizontal adds)
    Sse3,
    /// SSE4.1 (packed convert/min/max)
    Sse41,
    /// AVX (256-bit float)
    Avx,
    /// AVX + FMA
    AvxFma,
    /// AVX2 (256-bit integer, FMA implied)
    Avx2,
}

impl InstSet {
    /// Select the most capable instruction set available on this CPU
    ///
    /// Preference order: AVX2 > AVX+FMA > AVX > SSE4.1 > SSE3 > SSE2 > SSE >
    /// none. Detection is cached process-wide; this is a pure read after the
    /// first call.
    ///
    /// # Examples
    ///
    /// ```
    /// use centella::InstSet;
    ///
    /// let inst = InstSet::detect();
    /// println!("dispatching with {inst:?}");
    /// ```
    pub fn detect() -> Self {
        let f = cpu::CpuFeatures::get();
        if f.avx2 {
            return InstSet::Avx2;
        }
        if f.avx && f.fma {
            return InstSet::AvxFma;
        }
        if f.avx {
            return InstSet::Avx;
        }
        if f.sse41 {
            return InstSet::Sse41;
        }
        if f.sse3 {
            return InstSet::Sse3;
        }
        if f.sse2 {
            return InstSet::Sse2;
        }
        if f.sse {
            return InstSet::Sse;
        }
        InstSet::None
    }

    /// Every tag this CPU can execute, scalar first
    ///
    /// Useful for exercising each dispatchable path in tests and benches.
    pub fn available() -> Vec<InstSet> {
        use InstSet::*;
        let f = cpu::CpuFeatures::get();
        let mut out = vec![None];
        for (flag, inst) in [
            (f.sse, Sse),
            (f.sse2, Sse2),
            (f.sse3, Sse3),
            (f.sse41, Sse41),
            (f.avx, Avx),
            (f.avx && f.fma, AvxFma),
            (f.avx2, Avx2),
        ] {
            if flag {
                out.push(inst);
            }
        }
        out
    }
}
