use std::sync::{Arc, Mutex};

use common::float_ext::FloatExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::progress::FactorizeProgress;
use super::*;
use crate::convergence::{reconstruct, reconstruction_error, reconstruction_psnr};
use crate::error::{Error, ErrorKind};

fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize, low: f64, high: f64) -> Matrix {
    Matrix::from_fn(rows, cols, |_, _| rng.random_range(low..high))
}

fn random_light_field(rng: &mut StdRng, dims: LightFieldDims, high: f64) -> LightField {
    LightField::from_fn(dims, |_, _, _, _| rng.random_range(0.0..high)).unwrap()
}

/// Light field that a rank-`rank` mask pair reproduces exactly.
fn low_rank_light_field(rng: &mut StdRng, dims: LightFieldDims, rank: usize) -> LightField {
    let n = dims.pixel_count();
    let rear = random_matrix(rng, n, rank, 0.2, 1.0);
    let front = random_matrix(rng, rank, n, 0.2, 1.0);
    let exact = reconstruct(dims, &rear, &front).unwrap();
    // Rays leaving the plane are zero in the reconstruction; fill them so the
    // light field stays plausible.
    LightField::from_fn(dims, |v, u, b, a| {
        let value = exact.get(v, u, b, a);
        if value > 0.0 { value } else { 0.5 }
    })
    .unwrap()
}

fn quiet() -> FactorizeConfig {
    FactorizeConfig::default().with_log_interval(0)
}

fn assert_unit_range(mask: &Matrix) {
    for &value in mask.data() {
        assert!(value.is_finite(), "non-finite weight {value}");
        assert!((0.0..=1.0).contains(&value), "weight {value} outside [0, 1]");
    }
}

#[test]
fn test_two_by_two_without_parallax_reduces_error() {
    let lf = LightField::new([2, 2, 1, 1], vec![0.1, 0.4, 0.7, 0.9]).unwrap();
    let rear = Matrix::filled(4, 1, 0.5);
    let front = Matrix::filled(1, 4, 0.5);

    let initial_error = reconstruction_error(&lf, &rear, &front).unwrap();
    let result = factorize(&lf, &rear, &front, &quiet().with_iterations(5)).unwrap();

    assert_eq!(result.iterations_run, 5);
    assert!(result.psnr.is_none());
    assert_unit_range(&result.rear);
    assert_unit_range(&result.front);

    let final_error = reconstruction_error(&lf, &result.rear, &result.front).unwrap();
    assert!(final_error <= initial_error);
    // Rank one without parallax is solved exactly by the first iteration
    for i in 0..4 {
        let product = result.rear.get(i, 0) * result.front.get(0, i);
        assert!(product.approximately_eq(lf.data()[i]), "pixel {i}: {product}");
    }
}

#[test]
fn test_single_view_rank_one_moves_every_pixel_closer() {
    let mut rng = StdRng::seed_from_u64(7);
    let dims = LightFieldDims::new(3, 4, 1, 1);
    let lf = random_light_field(&mut rng, dims, 1.0);
    let rear = random_matrix(&mut rng, 12, 1, 0.1, 1.0);
    let front = random_matrix(&mut rng, 1, 12, 0.1, 1.0);

    let result = factorize(&lf, &rear, &front, &quiet().with_iterations(1)).unwrap();

    for i in 0..12 {
        let target = lf.data()[i];
        let before = (rear.get(i, 0) * front.get(0, i) - target).abs();
        let after = (result.rear.get(i, 0) * result.front.get(0, i) - target).abs();
        assert!(after < before, "pixel {i}: {after} !< {before}");
    }
}

#[test]
fn test_weights_stay_in_unit_range_every_iteration() {
    let mut rng = StdRng::seed_from_u64(11);
    let dims = LightFieldDims::new(4, 5, 3, 3);
    // Radiance above 1 forces the clamp
    let lf = random_light_field(&mut rng, dims, 3.0);
    let rear = random_matrix(&mut rng, 20, 2, 0.0, 1.0);
    let front = random_matrix(&mut rng, 2, 20, 0.0, 1.0);

    for iterations in 1..=6 {
        let config = quiet().with_iterations(iterations);
        let result = factorize(&lf, &rear, &front, &config).unwrap();
        assert_unit_range(&result.rear);
        assert_unit_range(&result.front);
    }
}

#[test]
fn test_fixed_front_is_bit_identical() {
    let mut rng = StdRng::seed_from_u64(3);
    let dims = LightFieldDims::new(3, 3, 3, 3);
    let lf = random_light_field(&mut rng, dims, 1.0);
    let rear = random_matrix(&mut rng, 9, 2, 0.1, 1.0);
    let front = random_matrix(&mut rng, 2, 9, 0.1, 1.0);

    let config = quiet().with_iterations(4).with_fixed_front();
    let result = factorize(&lf, &rear, &front, &config).unwrap();

    let expected: Vec<u64> = front.data().iter().map(|v| v.to_bits()).collect();
    let actual: Vec<u64> = result.front.data().iter().map(|v| v.to_bits()).collect();
    assert_eq!(actual, expected);
    assert_ne!(result.rear, rear);
}

#[test]
fn test_inputs_are_not_modified() {
    let lf = LightField::filled([2, 2, 3, 3], 0.3).unwrap();
    let rear = Matrix::filled(4, 1, 0.5);
    let front = Matrix::filled(1, 4, 0.5);
    let (rear_copy, front_copy) = (rear.clone(), front.clone());

    factorize(&lf, &rear, &front, &quiet().with_iterations(2)).unwrap();

    assert_eq!(rear, rear_copy);
    assert_eq!(front, front_copy);
}

#[test]
fn test_zero_denominator_resaturates_to_one() {
    let lf = LightField::filled([2, 2, 1, 1], 0.3).unwrap();
    let rear = Matrix::zeros(4, 1);
    let front = Matrix::filled(1, 4, 0.5);

    let result = factorize(&lf, &rear, &front, &quiet().with_iterations(1)).unwrap();

    // H: 0/0 -> 1. W: 0 * (0.3 / 0) -> NaN -> 1.
    assert!(result.front.data().iter().all(|&h| h == 1.0));
    assert!(result.rear.data().iter().all(|&w| w == 1.0));
}

#[test]
fn test_sanitize_clamps_and_replaces_nan() {
    let mut mask = Matrix::new(1, 5, vec![0.5, 1.5, f64::NAN, f64::INFINITY, 0.0]).unwrap();
    let degenerate = sanitize(&mut mask);
    assert_eq!(degenerate, 1);
    assert_eq!(mask.data(), &[0.5, 1.0, 1.0, 1.0, 0.0]);
}

#[test]
fn test_early_stop_applies_exactly_one_iteration() {
    let lf = LightField::new([2, 2, 1, 1], vec![0.1, 0.4, 0.7, 0.9]).unwrap();
    let rear = Matrix::filled(4, 1, 0.5);
    let front = Matrix::filled(1, 4, 0.5);

    let config = quiet()
        .with_iterations(8)
        .with_min_psnr(-1000.0)
        .with_psnr_trace();
    let stopped = factorize(&lf, &rear, &front, &config).unwrap();
    let single = factorize(&lf, &rear, &front, &quiet().with_iterations(1)).unwrap();

    assert_eq!(stopped.iterations_run, 1);
    assert_eq!(stopped.rear, single.rear);
    assert_eq!(stopped.front, single.front);

    let trace = stopped.psnr.unwrap();
    assert_eq!(trace.len(), 8);
    assert!(trace.iter().all(|p| p.to_bits() == trace[0].to_bits()));
}

#[test]
fn test_threshold_run_matches_shorter_budget() {
    let mut rng = StdRng::seed_from_u64(21);
    let dims = LightFieldDims::new(4, 4, 3, 3);
    let lf = low_rank_light_field(&mut rng, dims, 2);
    let rear = random_matrix(&mut rng, 16, 2, 0.1, 1.0);
    let front = random_matrix(&mut rng, 2, 16, 0.1, 1.0);

    let budget = 10;
    let full = factorize(&lf, &rear, &front, &quiet().with_iterations(budget).with_psnr_trace())
        .unwrap();
    let trace = full.psnr.unwrap();
    assert_eq!(trace.len(), budget);

    let threshold = (trace[3] + trace[0]) / 2.0;
    let k = trace.iter().position(|&p| p > threshold).unwrap() + 1;

    let config = quiet()
        .with_iterations(budget)
        .with_min_psnr(threshold)
        .with_psnr_trace();
    let stopped = factorize(&lf, &rear, &front, &config).unwrap();
    let reference = factorize(&lf, &rear, &front, &quiet().with_iterations(k)).unwrap();

    assert_eq!(stopped.iterations_run, k);
    assert_eq!(stopped.rear, reference.rear);
    assert_eq!(stopped.front, reference.front);

    let stopped_trace = stopped.psnr.unwrap();
    assert_eq!(stopped_trace.len(), budget);
    assert_eq!(&stopped_trace[..k], &trace[..k]);
    assert!(stopped_trace[k..].iter().all(|&p| p == trace[k - 1]));
}

#[test]
fn test_psnr_trace_records_each_iteration() {
    let mut rng = StdRng::seed_from_u64(5);
    let dims = LightFieldDims::new(3, 4, 3, 3);
    let lf = low_rank_light_field(&mut rng, dims, 1);
    let rear = Matrix::filled(12, 1, 0.5);
    let front = Matrix::filled(1, 12, 0.5);

    let result = factorize(&lf, &rear, &front, &quiet().with_iterations(3).with_psnr_trace())
        .unwrap();
    let trace = result.psnr.unwrap();

    assert_eq!(trace.len(), 3);
    let last = reconstruction_psnr(&lf, &result.rear, &result.front).unwrap();
    assert_eq!(trace[2].to_bits(), last.to_bits());
}

#[test]
fn test_threshold_without_trace_returns_no_trace() {
    let lf = LightField::filled([2, 2, 1, 1], 0.5).unwrap();
    let config = quiet().with_iterations(4).with_min_psnr(-1000.0);
    let result = factorize(
        &lf,
        &Matrix::filled(4, 1, 0.5),
        &Matrix::filled(1, 4, 0.5),
        &config,
    )
    .unwrap();
    assert!(result.psnr.is_none());
    assert_eq!(result.iterations_run, 1);
}

#[test]
fn test_factorization_improves_low_rank_reconstruction() {
    let mut rng = StdRng::seed_from_u64(42);
    let dims = LightFieldDims::new(6, 6, 3, 3);
    let lf = low_rank_light_field(&mut rng, dims, 1);
    let rear = Matrix::filled(36, 1, 0.5);
    let front = Matrix::filled(1, 36, 0.5);

    let initial = reconstruction_error(&lf, &rear, &front).unwrap();
    let result = factorize(&lf, &rear, &front, &quiet().with_iterations(25)).unwrap();
    let final_error = reconstruction_error(&lf, &result.rear, &result.front).unwrap();

    assert!(
        final_error < 0.5 * initial,
        "error {final_error} not well below initial {initial}"
    );
}

#[test]
fn test_rejects_rank_mismatch_before_iterating() {
    let lf = LightField::filled([2, 2, 1, 1], 0.5).unwrap();
    let calls = Arc::new(Mutex::new(0usize));
    let calls_in = Arc::clone(&calls);
    let progress = ProgressCallback::new(Arc::new(move |_: FactorizeProgress| {
        *calls_in.lock().unwrap() += 1;
    }));

    let err = factorize_with_progress(
        &lf,
        &Matrix::filled(4, 2, 0.5),
        &Matrix::filled(1, 4, 0.5),
        &quiet(),
        progress,
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidShape);
    assert_eq!(*calls.lock().unwrap(), 0);
}

#[test]
fn test_rejects_pixel_count_mismatch() {
    let lf = LightField::filled([2, 3, 1, 1], 0.5).unwrap();
    let err = factorize(
        &lf,
        &Matrix::filled(4, 1, 0.5),
        &Matrix::filled(1, 6, 0.5),
        &quiet(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::RearMaskShape { expected_rows: 6, .. }));
}

#[test]
fn test_rejects_invalid_scalars() {
    let lf = LightField::filled([1, 1, 1, 1], 0.5).unwrap();
    let rear = Matrix::filled(1, 1, 0.5);
    let front = Matrix::filled(1, 1, 0.5);

    let err = factorize(&lf, &rear, &front, &quiet().with_iterations(0)).unwrap_err();
    assert_eq!(err, Error::ZeroIterations);

    let err = factorize(&lf, &rear, &front, &quiet().with_min_psnr(f64::NAN)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidType);
}

#[test]
fn test_progress_reports_each_iteration_and_finish() {
    let lf = LightField::filled([2, 2, 3, 3], 0.4).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in = Arc::clone(&seen);
    let progress = ProgressCallback::new(Arc::new(move |p: FactorizeProgress| {
        seen_in.lock().unwrap().push(p);
    }));

    factorize_with_progress(
        &lf,
        &Matrix::filled(4, 1, 0.5),
        &Matrix::filled(1, 4, 0.5),
        &quiet().with_iterations(3),
        progress,
    )
    .unwrap();

    let seen = seen.lock().unwrap();
    let stages: Vec<FactorizeStage> = seen.iter().map(|p| p.stage).collect();
    assert_eq!(
        stages,
        vec![
            FactorizeStage::Updating,
            FactorizeStage::Updating,
            FactorizeStage::Updating,
            FactorizeStage::Finished,
        ]
    );
    assert_eq!(seen[2].iteration, 3);
    assert!(seen.iter().all(|p| p.total == 3 && p.psnr.is_none()));
}

#[test]
fn test_progress_reports_stop() {
    let lf = LightField::filled([2, 2, 1, 1], 0.4).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in = Arc::clone(&seen);
    let progress = ProgressCallback::new(Arc::new(move |p: FactorizeProgress| {
        seen_in.lock().unwrap().push(p.stage);
    }));

    factorize_with_progress(
        &lf,
        &Matrix::filled(4, 1, 0.5),
        &Matrix::filled(1, 4, 0.5),
        &quiet().with_iterations(5).with_min_psnr(-1000.0),
        progress,
    )
    .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![FactorizeStage::Stopped]);
}

#[test]
fn test_layers_are_spatial_images() {
    let mut rng = StdRng::seed_from_u64(9);
    let dims = LightFieldDims::new(3, 5, 3, 3);
    let lf = random_light_field(&mut rng, dims, 1.0);
    let rear = random_matrix(&mut rng, 15, 2, 0.1, 1.0);
    let front = random_matrix(&mut rng, 2, 15, 0.1, 1.0);

    let result = factorize(&lf, &rear, &front, &quiet().with_iterations(2)).unwrap();
    let rear_layers = result.rear_layers();
    let front_layers = result.front_layers();

    assert_eq!(result.rank(), 2);
    assert_eq!(rear_layers.len(), 2);
    assert_eq!(front_layers.len(), 2);
    assert_eq!(rear_layers[1].shape(), (3, 5));
    // pixel (2, 1) -> linear 11
    assert_eq!(rear_layers[1].get(2, 1), result.rear.get(11, 1));
    assert_eq!(front_layers[0].get(2, 1), result.front.get(0, 11));
}

/// 1x2 plane, three horizontal views. Rear pixel `u` and front pixel `s`
/// share the ray at slice `a = s - u + 1`; the two slices that would leave
/// the plane hold 9.0 and must never be read.
///
/// ```text
/// L(0,0) = 0.4   L(0,1) = 0.2
/// L(1,0) = 0.1   L(1,1) = 0.3
/// ```
fn two_pixel_parallax_light_field() -> LightField {
    LightField::new([1, 2, 1, 3], vec![9.0, 0.4, 0.2, 0.1, 0.3, 9.0]).unwrap()
}

#[test]
fn test_one_iteration_matches_hand_computed_masks() {
    let lf = two_pixel_parallax_light_field();
    let rear = Matrix::new(2, 1, vec![0.5, 1.0]).unwrap();
    let front = Matrix::new(1, 2, vec![0.5, 0.25]).unwrap();

    let result = factorize(&lf, &rear, &front, &quiet().with_iterations(1)).unwrap();

    // Front phase from the initial masks:
    //   H0 = 0.5  * (0.5*0.4 + 1.0*0.1) / ((0.25 + 1.0) * 0.5)  = 0.24
    //   H1 = 0.25 * (0.5*0.2 + 1.0*0.3) / ((0.25 + 1.0) * 0.25) = 0.32
    assert!(result.front.get(0, 0).approximately_eq(0.24));
    assert!(result.front.get(0, 1).approximately_eq(0.32));

    // Rear phase from the initial rear mask and the updated front mask:
    //   W0 = 0.5 * (0.24*0.4 + 0.32*0.2) / (0.5 * (0.24^2 + 0.32^2)) = 1.0
    //   W1 = 1.0 * (0.24*0.1 + 0.32*0.3) / (1.0 * (0.24^2 + 0.32^2)) = 0.75
    // Reading the initial front mask instead would give 0.8 and 0.4.
    assert!(result.rear.get(0, 0).approximately_eq(1.0));
    assert!(result.rear.get(1, 0).approximately_eq(0.75));
}

#[test]
fn test_fixed_front_rear_update_matches_hand_computed_masks() {
    let lf = two_pixel_parallax_light_field();
    let rear = Matrix::new(2, 1, vec![0.5, 1.0]).unwrap();
    let front = Matrix::new(1, 2, vec![0.5, 0.25]).unwrap();

    let config = quiet().with_iterations(1).with_fixed_front();
    let result = factorize(&lf, &rear, &front, &config).unwrap();

    //   W0 = 0.5 * (0.5*0.4 + 0.25*0.2) / (0.5 * (0.25 + 0.0625)) = 0.8
    //   W1 = 1.0 * (0.5*0.1 + 0.25*0.3) / (1.0 * (0.25 + 0.0625)) = 0.4
    assert_eq!(result.front, front);
    assert!(result.rear.get(0, 0).approximately_eq(0.8));
    assert!(result.rear.get(1, 0).approximately_eq(0.4));
}

/// Slice recording the ray between `src` and `dst` along one axis.
fn reference_slice(src: usize, dst: usize, half: usize, extent: usize) -> usize {
    let offset = dst as isize - src as isize + half as isize;
    extent - 1 - offset.rem_euclid(extent as isize) as usize
}

/// One iteration written directly from the update rules: every rear/front
/// pair within the parallax range, snapshots taken before each phase.
fn reference_iteration(lf: &LightField, rear: &mut Matrix, front: &mut Matrix) {
    let dims = lf.dims();
    let cols = dims.spatial_cols;
    let n = dims.pixel_count();
    let rank = rear.cols();
    let (half_b, half_a) = (dims.half_angular_rows(), dims.half_angular_cols());

    let sample = |i: usize, j: usize| -> Option<f64> {
        let (v, u) = (i / cols, i % cols);
        let (t, s) = (j / cols, j % cols);
        if v.abs_diff(t) > half_b || u.abs_diff(s) > half_a {
            return None;
        }
        let b = reference_slice(t, v, half_b, dims.angular_rows);
        let a = reference_slice(s, u, half_a, dims.angular_cols);
        Some(lf.get(v, u, b, a))
    };
    let approx = |w: &Matrix, h: &Matrix, i: usize, j: usize| -> f64 {
        (0..rank).map(|r| w[(i, r)] * h[(r, j)]).sum()
    };

    let rear_prev = rear.clone();
    let front_prev = front.clone();
    for j in 0..n {
        for r in 0..rank {
            let (mut num, mut den) = (0.0, 0.0);
            for i in 0..n {
                if let Some(observed) = sample(i, j) {
                    num += rear_prev[(i, r)] * observed;
                    den += rear_prev[(i, r)] * approx(&rear_prev, &front_prev, i, j);
                }
            }
            // f64::min maps NaN to 1.0 as well
            front[(r, j)] = (front_prev[(r, j)] * (num / den)).min(1.0);
        }
    }

    let front_prev = front.clone();
    for i in 0..n {
        for r in 0..rank {
            let (mut num, mut den) = (0.0, 0.0);
            for j in 0..n {
                if let Some(observed) = sample(i, j) {
                    num += front_prev[(r, j)] * observed;
                    den += front_prev[(r, j)] * approx(&rear_prev, &front_prev, i, j);
                }
            }
            rear[(i, r)] = (rear_prev[(i, r)] * (num / den)).min(1.0);
        }
    }
}

fn assert_masks_close(actual: &Matrix, expected: &Matrix) {
    assert_eq!(actual.shape(), expected.shape());
    for (index, (&a, &e)) in actual.data().iter().zip(expected.data()).enumerate() {
        assert!(a.approximately_eq_within(e, 1e-12), "entry {index}: {a} vs {e}");
    }
}

#[test]
fn test_updates_match_reference_loop_with_parallax() {
    let mut rng = StdRng::seed_from_u64(17);

    for (dims, rank) in [
        (LightFieldDims::new(2, 3, 3, 3), 1),
        (LightFieldDims::new(2, 3, 3, 3), 2),
        (LightFieldDims::new(4, 5, 3, 5), 3),
        (LightFieldDims::new(3, 4, 2, 4), 2),
    ] {
        let n = dims.pixel_count();
        let lf = random_light_field(&mut rng, dims, 1.0);
        let rear = random_matrix(&mut rng, n, rank, 0.1, 1.0);
        let front = random_matrix(&mut rng, rank, n, 0.1, 1.0);

        let mut expected_rear = rear.clone();
        let mut expected_front = front.clone();
        for iterations in 1..=3 {
            reference_iteration(&lf, &mut expected_rear, &mut expected_front);

            let config = quiet().with_iterations(iterations);
            let result = factorize(&lf, &rear, &front, &config).unwrap();
            assert_masks_close(&result.rear, &expected_rear);
            assert_masks_close(&result.front, &expected_front);
        }
    }
}

#[test]
fn test_even_angular_extents_factorize() {
    let mut rng = StdRng::seed_from_u64(23);
    let dims = LightFieldDims::new(4, 4, 2, 4);
    let lf = random_light_field(&mut rng, dims, 1.0);
    let n = dims.pixel_count();

    let config = quiet().with_iterations(4).with_psnr_trace();
    let result = factorize(
        &lf,
        &Matrix::filled(n, 2, 0.5),
        &Matrix::filled(2, n, 0.5),
        &config,
    )
    .unwrap();

    assert_eq!(result.iterations_run, 4);
    assert_unit_range(&result.rear);
    assert_unit_range(&result.front);
    let trace = result.psnr.unwrap();
    assert_eq!(trace.len(), 4);
    assert!(trace.iter().all(|psnr| psnr.is_finite()));
}
