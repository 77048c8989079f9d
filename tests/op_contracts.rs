//! Operation contracts: validation order, saturation corners, fixed
//! numeric cases, and the feature-detection guarantees

use centella::{cpu, ops, CentellaError, InstSet, Layout, Matrix, Reduce, Vector};

#[test]
fn empty_destination_is_rejected_first() {
    let m = Matrix::from_vec(2, 2, vec![1.0f32; 4]).unwrap();
    let v = Vector::from_slice(&[1.0f32, 1.0]);
    let mut dest: Vector<f32> = Vector::new();
    assert_eq!(
        ops::multiply_mv(&mut dest, &m, &v, Layout::RowMajor).unwrap_err(),
        CentellaError::UninitializedDestination
    );
}

#[test]
fn empty_source_is_rejected() {
    let empty: Matrix<f32> = Matrix::new();
    let v = Vector::from_slice(&[1.0f32]);
    let mut dest = Vector::from_slice(&[0.0f32]);
    assert_eq!(
        ops::multiply_mv(&mut dest, &empty, &v, Layout::RowMajor).unwrap_err(),
        CentellaError::UninitializedSource
    );

    let empty_v: Vector<f32> = Vector::new();
    assert_eq!(
        ops::reduce(&empty_v, Reduce::Sum).unwrap_err(),
        CentellaError::UninitializedSource
    );
}

#[test]
fn shape_mismatch_performs_no_partial_write() {
    let a = Matrix::from_vec(2, 3, vec![1.0f32; 6]).unwrap();
    let b = Matrix::from_vec(4, 2, vec![1.0f32; 8]).unwrap(); // inner 3 != 4
    let mut dest = Matrix::from_vec(2, 2, vec![9.0f32; 4]).unwrap();
    assert_eq!(
        ops::multiply_mm(&mut dest, &a, &b).unwrap_err(),
        CentellaError::ShapeMismatch {
            expected: 3,
            actual: 4
        }
    );
    assert!(dest.as_slice().iter().all(|&x| x == 9.0));
}

#[test]
fn forced_unavailable_inst_set_is_rejected() {
    let available = InstSet::available();
    let all = [
        InstSet::None,
        InstSet::Sse,
        InstSet::Sse2,
        InstSet::Sse3,
        InstSet::Sse41,
        InstSet::Avx,
        InstSet::AvxFma,
        InstSet::Avx2,
    ];
    let Some(missing) = all.iter().copied().find(|i| !available.contains(i)) else {
        // Host supports everything; nothing to force
        return;
    };

    let v = Vector::from_slice(&[1.0f32, 2.0]);
    assert_eq!(
        ops::reduce_with(missing, &v, Reduce::Sum).unwrap_err(),
        CentellaError::UnsupportedInstantiation { inst: missing }
    );
}

#[test]
fn saturation_round_trip_at_the_corners() {
    let src = Vector::from_slice(&[
        i32::from(i8::MIN) - 1,
        i32::from(i8::MIN),
        i32::from(i8::MAX),
        i32::from(i8::MAX) + 1,
    ]);
    for inst in InstSet::available() {
        let mut dest = Vector::new();
        dest.assign(4, 0i8);
        ops::convert_with(inst, &mut dest, &src).unwrap();
        assert_eq!(
            dest.as_slice(),
            &[i8::MIN, i8::MIN, i8::MAX, i8::MAX],
            "{inst:?}"
        );
    }

    let src16 = Vector::from_slice(&[
        i32::from(i16::MIN) - 1,
        i32::from(i16::MIN),
        i32::from(i16::MAX),
        i32::from(i16::MAX) + 1,
    ]);
    for inst in InstSet::available() {
        let mut dest = Vector::new();
        dest.assign(4, 0i16);
        ops::convert_with(inst, &mut dest, &src16).unwrap();
        assert_eq!(
            dest.as_slice(),
            &[i16::MIN, i16::MIN, i16::MAX, i16::MAX],
            "{inst:?}"
        );
    }
}

#[test]
fn accumulation_fixed_case() {
    let a = Matrix::from_vec(2, 3, vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    #[rustfmt::skip]
    let b = Matrix::from_vec(3, 4, vec![
        1.0, 0.0, 0.0, 1.0,
        0.0, 1.0, 0.0, 1.0,
        0.0, 0.0, 1.0, 1.0,
    ]).unwrap();
    let mut dest = Matrix::new();
    dest.assign(2, 4, 0.0f32);
    ops::multiply_mm(&mut dest, &a, &b).unwrap();
    assert_eq!(dest.row(0), &[1.0, 2.0, 3.0, 6.0]);
    assert_eq!(dest.row(1), &[4.0, 5.0, 6.0, 15.0]);
}

#[test]
fn sigmoid_boundaries_and_monotonicity() {
    let probes: Vec<f32> = vec![-1.0e6, -200.0, -88.0, -10.0, 0.0, 10.0, 88.0, 200.0, 1.0e6];
    let src = Vector::from_slice(&probes);
    let mut dest = Vector::new();
    dest.assign(probes.len(), 0.0f32);
    ops::sigmoid(&mut dest, &src).unwrap();

    let out = dest.as_slice();
    assert!((out[4] - 0.5).abs() < f32::EPSILON);
    assert!(out[0] < 1e-30, "far below the clamp must be ~0");
    assert!(out[8] > 1.0 - 1e-6, "far above the clamp must be ~1");
    for w in out.windows(2) {
        assert!(w[1] >= w[0], "sigmoid must be monotone over the domain");
    }
}

#[test]
fn onehot_subtract_fixed_case() {
    let mut dest = Matrix::new();
    dest.assign(3, 4, 0.0f32);
    let labels = Vector::from_slice(&[0u8, 2, 1]);
    ops::onehot_subtract(&mut dest, &labels).unwrap();
    assert_eq!(dest.row(0), &[-1.0, 0.0, 0.0, 0.0]);
    assert_eq!(dest.row(1), &[0.0, 0.0, -1.0, 0.0]);
    assert_eq!(dest.row(2), &[0.0, -1.0, 0.0, 0.0]);
}

#[test]
fn feature_detection_is_idempotent() {
    let first = (
        cpu::is_support_sse(),
        cpu::is_support_sse2(),
        cpu::is_support_sse3(),
        cpu::is_support_sse41(),
        cpu::is_support_avx(),
        cpu::is_support_avx2(),
        cpu::is_support_fma(),
    );
    for _ in 0..10 {
        let again = (
            cpu::is_support_sse(),
            cpu::is_support_sse2(),
            cpu::is_support_sse3(),
            cpu::is_support_sse41(),
            cpu::is_support_avx(),
            cpu::is_support_avx2(),
            cpu::is_support_fma(),
        );
        assert_eq!(first, again);
    }
    assert_eq!(InstSet::detect(), InstSet::detect());
}

#[test]
fn unsupported_mode_reports_type_and_mode() {
    let v = Vector::from_slice(&[1i32, 2]);
    match ops::reduce(&v, Reduce::Avg) {
        Err(CentellaError::UnsupportedMode { mode, ty }) => {
            assert_eq!(mode, "Avg");
            assert_eq!(ty, "i32");
        }
        other => panic!("expected UnsupportedMode, got {other:?}"),
    }
}

#[test]
fn window_indices_fixed_case() {
    let mut dest = Matrix::new();
    dest.assign(4, 4, 0u32);
    ops::window_indices(&mut dest, 3, 3, ops::Window::square(2)).unwrap();
    assert_eq!(dest.row(0), &[0, 1, 3, 4]);
    assert_eq!(dest.row(1), &[1, 2, 4, 5]);
    assert_eq!(dest.row(2), &[3, 4, 6, 7]);
    assert_eq!(dest.row(3), &[4, 5, 7, 8]);
}

#[test]
fn bias_multiply_prefills_instead_of_composing() {
    let a = Matrix::from_vec(1, 2, vec![1.0f32, 1.0]).unwrap();
    let b = Matrix::from_vec(2, 2, vec![1.0f32, 0.0, 0.0, 1.0]).unwrap();
    let bias = Vector::from_slice(&[5.0f32, -5.0]);
    let mut dest = Matrix::new();
    dest.assign(1, 2, 123.0f32); // stale contents must not leak through
    ops::multiply_mm_bias(&mut dest, &a, &b, &bias).unwrap();
    assert_eq!(dest.row(0), &[6.0, -4.0]);
}
