//! Dispatch equivalence across instruction sets
//!
//! Every instruction-set path this host can execute must produce the same
//! results as the portable scalar path — within a type-appropriate
//! tolerance for floats (accumulation order differs with vector width),
//! exactly for integers.

use centella::{ops, InstSet, Layout, Matrix, Reduce, Tensor, Vector};
use proptest::prelude::*;

fn assert_close(a: &[f32], b: &[f32], tol: f32, ctx: &str) {
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        let bound = tol * (1.0 + y.abs());
        assert!((x - y).abs() <= bound, "{ctx}[{i}]: {x} vs {y}");
    }
}

#[test]
fn matmul_every_inst_matches_scalar() {
    let a = Matrix::from_vec(7, 19, (0..133).map(|i| (i as f32 * 0.37).sin()).collect()).unwrap();
    let b = Matrix::from_vec(19, 11, (0..209).map(|i| (i as f32 * 0.13).cos()).collect()).unwrap();

    let mut want = Matrix::new();
    want.assign(7, 11, 0.0f32);
    ops::multiply_mm_with(InstSet::None, &mut want, &a, &b).unwrap();

    for inst in InstSet::available() {
        let mut got = Matrix::new();
        got.assign(7, 11, 0.0f32);
        ops::multiply_mm_with(inst, &mut got, &a, &b).unwrap();
        assert_close(got.as_slice(), want.as_slice(), 1e-4, &format!("{inst:?}"));
    }
}

#[test]
fn matvec_layouts_match_scalar_on_every_inst() {
    let m = Matrix::from_vec(9, 23, (0..207).map(|i| (i as f32 * 0.71).sin()).collect()).unwrap();
    let mt = {
        // Explicit transpose for the column-major reading
        let mut data = vec![0.0f32; 207];
        for r in 0..9 {
            for c in 0..23 {
                data[c * 9 + r] = m.row(r)[c];
            }
        }
        Matrix::from_vec(23, 9, data).unwrap()
    };
    let v = Vector::from_slice(&(0..23).map(|i| (i as f32 * 0.5).cos()).collect::<Vec<_>>());

    let mut want = Vector::new();
    want.assign(9, 0.0f32);
    ops::multiply_mv_with(InstSet::None, &mut want, &m, &v, Layout::RowMajor).unwrap();

    for inst in InstSet::available() {
        let mut row = Vector::new();
        row.assign(9, 0.0f32);
        ops::multiply_mv_with(inst, &mut row, &m, &v, Layout::RowMajor).unwrap();
        assert_close(row.as_slice(), want.as_slice(), 1e-4, &format!("row {inst:?}"));

        let mut col = Vector::new();
        col.assign(9, 0.0f32);
        ops::multiply_mv_with(inst, &mut col, &mt, &v, Layout::ColMajor).unwrap();
        assert_close(col.as_slice(), want.as_slice(), 1e-4, &format!("col {inst:?}"));
    }
}

#[test]
fn tensor_matmul_matches_scalar() {
    let mut t = Tensor::new();
    t.assign(4, 3, 5, 0.0f32);
    for (i, x) in t.as_mut_slice().iter_mut().enumerate() {
        *x = (i as f32 * 0.29).sin();
    }
    let w = Matrix::from_vec(15, 6, (0..90).map(|i| (i as f32 * 0.17).cos()).collect()).unwrap();

    let mut want = Matrix::new();
    want.assign(4, 6, 0.0f32);
    ops::multiply_tm_with(InstSet::None, &mut want, &t, &w).unwrap();

    for inst in InstSet::available() {
        let mut got = Matrix::new();
        got.assign(4, 6, 0.0f32);
        ops::multiply_tm_with(inst, &mut got, &t, &w).unwrap();
        assert_close(got.as_slice(), want.as_slice(), 1e-4, &format!("{inst:?}"));
    }
}

#[test]
fn reductions_match_scalar() {
    let v = Vector::from_slice(&(0..1013).map(|i| (i as f32 * 0.003).sin()).collect::<Vec<_>>());
    for mode in [Reduce::Sum, Reduce::Avg, Reduce::Min, Reduce::Max] {
        // Long sums reassociate across vector widths; min/max are exact
        let tol = match mode {
            Reduce::Sum => 1e-3,
            Reduce::Avg => 1e-4,
            _ => 1e-5,
        };
        let want = ops::reduce_with(InstSet::None, &v, mode).unwrap();
        for inst in InstSet::available() {
            let got = ops::reduce_with(inst, &v, mode).unwrap();
            assert!(
                (got - want).abs() <= tol * (1.0 + want.abs()),
                "{mode:?} {inst:?}: {got} vs {want}"
            );
        }
    }
}

#[test]
fn integer_reductions_are_exact_on_every_path() {
    let v = Vector::from_slice(&(0..517).map(|i| (i * 7 % 101) as i32 - 50).collect::<Vec<_>>());
    for mode in [Reduce::Sum, Reduce::Min, Reduce::Max] {
        let want = ops::reduce_with(InstSet::None, &v, mode).unwrap();
        for inst in InstSet::available() {
            assert_eq!(ops::reduce_with(inst, &v, mode).unwrap(), want, "{mode:?} {inst:?}");
        }
    }
}

#[test]
fn conversions_are_exact_on_every_path() {
    let bytes = Vector::from_slice(&(0..300).map(|i| (i % 256) as u8).collect::<Vec<_>>());
    let ints = Vector::from_slice(&(0..300).map(|i| i * 1_000_000 - 150_000_000).collect::<Vec<_>>());

    let mut want_f = Vector::new();
    want_f.assign(300, 0.0f32);
    ops::convert_scaled_with(InstSet::None, &mut want_f, &bytes, 1.0 / 255.0).unwrap();

    let mut want_i8 = Vector::new();
    want_i8.assign(300, 0i8);
    ops::convert_with(InstSet::None, &mut want_i8, &ints).unwrap();

    let mut want_i16 = Vector::new();
    want_i16.assign(300, 0i16);
    ops::convert_with(InstSet::None, &mut want_i16, &ints).unwrap();

    for inst in InstSet::available() {
        let mut got = Vector::new();
        got.assign(300, 0.0f32);
        ops::convert_scaled_with(inst, &mut got, &bytes, 1.0 / 255.0).unwrap();
        assert_eq!(got.as_slice(), want_f.as_slice(), "u8->f32 {inst:?}");

        let mut got8 = Vector::new();
        got8.assign(300, 0i8);
        ops::convert_with(inst, &mut got8, &ints).unwrap();
        assert_eq!(got8.as_slice(), want_i8.as_slice(), "i32->i8 {inst:?}");

        let mut got16 = Vector::new();
        got16.assign(300, 0i16);
        ops::convert_with(inst, &mut got16, &ints).unwrap();
        assert_eq!(got16.as_slice(), want_i16.as_slice(), "i32->i16 {inst:?}");
    }
}

#[test]
fn col_sum_matches_scalar() {
    let src = Matrix::from_vec(13, 37, (0..481).map(|i| (i * 3 % 256) as u8).collect()).unwrap();

    let mut want = Vector::new();
    want.assign(37, 0.0f32);
    ops::col_sum_with(InstSet::None, &mut want, &src).unwrap();

    for inst in InstSet::available() {
        let mut got = Vector::new();
        got.assign(37, 0.0f32);
        ops::col_sum_with(inst, &mut got, &src).unwrap();
        assert_eq!(got.as_slice(), want.as_slice(), "{inst:?}");
    }
}

#[test]
fn activations_match_scalar() {
    let src = Vector::from_slice(&(0..203).map(|i| (i as f32 - 101.0) * 0.9).collect::<Vec<_>>());

    let mut want_sig = Vector::new();
    want_sig.assign(203, 0.0f32);
    ops::sigmoid_with(InstSet::None, &mut want_sig, &src).unwrap();

    let mut want_exp = Vector::new();
    want_exp.assign(203, 0.0f32);
    ops::exp_with(InstSet::None, &mut want_exp, &src).unwrap();

    for inst in InstSet::available() {
        let mut got = Vector::new();
        got.assign(203, 0.0f32);
        ops::sigmoid_with(inst, &mut got, &src).unwrap();
        assert_close(got.as_slice(), want_sig.as_slice(), 1e-5, &format!("sigmoid {inst:?}"));

        let mut got = Vector::new();
        got.assign(203, 0.0f32);
        ops::exp_with(inst, &mut got, &src).unwrap();
        assert_close(got.as_slice(), want_exp.as_slice(), 1e-5, &format!("exp {inst:?}"));
    }
}

proptest! {
    #[test]
    fn prop_matmul_matches_scalar(
        (m, k, n, a_data, b_data) in (1usize..5, 1usize..24, 1usize..12).prop_flat_map(|(m, k, n)| {
            (
                Just(m),
                Just(k),
                Just(n),
                proptest::collection::vec(-4.0f32..4.0, m * k),
                proptest::collection::vec(-4.0f32..4.0, k * n),
            )
        })
    ) {
        let a = Matrix::from_vec(m, k, a_data).unwrap();
        let b = Matrix::from_vec(k, n, b_data).unwrap();

        let mut want = Matrix::new();
        want.assign(m, n, 0.0f32);
        ops::multiply_mm_with(InstSet::None, &mut want, &a, &b).unwrap();

        for inst in InstSet::available() {
            let mut got = Matrix::new();
            got.assign(m, n, 0.0f32);
            ops::multiply_mm_with(inst, &mut got, &a, &b).unwrap();
            for (x, y) in got.as_slice().iter().zip(want.as_slice()) {
                prop_assert!((x - y).abs() <= 1e-3 * (1.0 + y.abs()), "{inst:?}: {x} vs {y}");
            }
        }
    }

    #[test]
    fn prop_reduce_sum_matches_scalar(data in proptest::collection::vec(-100.0f32..100.0, 1..400)) {
        let v = Vector::from_slice(&data);
        let want = ops::reduce_with(InstSet::None, &v, Reduce::Sum).unwrap();
        // Tolerance scales with the magnitude actually summed, not the
        // (possibly cancelled) result
        let scale: f32 = data.iter().map(|x| x.abs()).sum();
        for inst in InstSet::available() {
            let got = ops::reduce_with(inst, &v, Reduce::Sum).unwrap();
            prop_assert!((got - want).abs() <= 1e-4 * (1.0 + scale), "{inst:?}");
        }
    }

    #[test]
    fn prop_saturating_narrow_matches_clamp(data in proptest::collection::vec(any::<i32>(), 1..200)) {
        let src = Vector::from_slice(&data);
        for inst in InstSet::available() {
            let mut got = Vector::new();
            got.assign(data.len(), 0i8);
            ops::convert_with(inst, &mut got, &src).unwrap();
            for (x, &s) in got.as_slice().iter().zip(&data) {
                let want = s.clamp(i32::from(i8::MIN), i32::from(i8::MAX)) as i8;
                prop_assert_eq!(*x, want, "{:?}", inst);
            }
        }
    }
}
