//! Masked and hole-filling rank filter scenarios.

mod common;

use common::{pick, random_mask, random_u8, window};
use histrank::{Boundary, Kernel, MaskConfig, MaskMode, MaskedRankFilter, RankError};
use nanorand::WyRand;
use ndarray::{ArrayD, Dimension, IxDyn};

/// All-background mask: nothing to rank, fill everywhere.
#[test]
fn all_background_gives_fill() {
    let mut rng = WyRand::new_seed(5);
    let input = random_u8(&mut rng, &[8, 6]);
    let mask = ArrayD::from_elem(IxDyn(&[8, 6]), 0u8);
    for mode in [MaskMode::Restricted, MaskMode::HoleFill] {
        let config = MaskConfig::new(1u8, 0u8, 17u8).with_mode(mode);
        let filter = MaskedRankFilter::with_radius(&[1, 2], 0.5, config).expect("filter");
        let out = filter.apply(&input.view(), &mask.view()).expect("apply");
        assert!(out.image.iter().all(|&v| v == 17), "{mode:?}");
        assert!(out.mask.iter().all(|&m| m == 0), "{mode:?}");
    }
}

/// One foreground pixel spreads its value over the kernel footprint.
#[test]
fn single_foreground_pixel_fills_its_neighbourhood() {
    let mut input = ArrayD::from_elem(IxDyn(&[9, 9]), 3.5f32);
    input[[4, 5].as_slice()] = -8.0;
    let mut mask = ArrayD::from_elem(IxDyn(&[9, 9]), false);
    mask[[4, 5].as_slice()] = true;

    let config = MaskConfig::new(true, false, f32::NAN).hole_filling();
    let filter = MaskedRankFilter::with_radius(&[2, 2], 0.5, config).expect("filter");
    let out = filter.apply(&input.view(), &mask.view()).expect("apply");

    for (index, &value) in out.image.indexed_iter() {
        let near = index[0].abs_diff(4) <= 2 && index[1].abs_diff(5) <= 2;
        if near {
            assert_eq!(value, -8.0, "at {index:?}");
        } else {
            assert!(value.is_nan(), "at {index:?}");
        }
        assert_eq!(out.mask[index.slice()], near);
    }
}

fn check_masked_against_brute(
    input: &ArrayD<u8>,
    mask: &ArrayD<bool>,
    kernel: &Kernel,
    rank: f32,
    mode: MaskMode,
) {
    let fill = 0u8;
    let config = MaskConfig::new(true, false, fill).with_mode(mode);
    let filter = MaskedRankFilter::new(kernel.clone(), rank, config).expect("filter");
    let out = filter.apply(&input.view(), &mask.view()).expect("apply");

    for (index, &value) in out.image.indexed_iter() {
        let values = window(input, kernel, Boundary::Shrink, index.slice(), |cell| mask[cell]);
        let wanted = mode == MaskMode::HoleFill || mask[index.slice()];
        let covered = wanted && !values.is_empty();
        let expected = if covered { pick(&values, rank) } else { fill };
        assert_eq!(value, expected, "{mode:?} at {index:?}");
        assert_eq!(out.mask[index.slice()], covered, "{mode:?} mask at {index:?}");
    }
}

#[test]
fn random_masks_match_brute_force() {
    let mut rng = WyRand::new_seed(1234);
    let input = random_u8(&mut rng, &[14, 12]);
    for percent in [10, 50, 90] {
        let mask = random_mask(&mut rng, &[14, 12], percent);
        for kernel in [
            Kernel::boxed(&[1, 1]).expect("box"),
            Kernel::ellipsoid(&[2, 3]).expect("disc"),
        ] {
            for rank in [0.0, 0.5, 1.0] {
                check_masked_against_brute(&input, &mask, &kernel, rank, MaskMode::Restricted);
                check_masked_against_brute(&input, &mask, &kernel, rank, MaskMode::HoleFill);
            }
        }
    }
}

#[test]
fn three_dimensional_hole_fill() {
    let mut rng = WyRand::new_seed(8);
    let input = random_u8(&mut rng, &[5, 6, 4]);
    let mask = random_mask(&mut rng, &[5, 6, 4], 20);
    let kernel = Kernel::ellipsoid(&[1, 1, 1]).expect("kernel");
    check_masked_against_brute(&input, &mask, &kernel, 0.5, MaskMode::HoleFill);
}

/// Repeated hole filling grows the covered area until it stops changing.
#[test]
fn repeated_hole_fill_converges() {
    let mut rng = WyRand::new_seed(21);
    let mut image = random_u8(&mut rng, &[10, 10]);
    let mut mask = ArrayD::from_elem(IxDyn(&[10, 10]), false);
    mask[[0, 0].as_slice()] = true;
    let config = MaskConfig::new(true, false, 0u8).hole_filling();
    let filter = MaskedRankFilter::with_radius(&[1, 1], 0.5, config).expect("filter");

    let mut covered = 1;
    for _ in 0..9 {
        let out = filter.apply(&image.view(), &mask.view()).expect("apply");
        let now = out.mask.iter().filter(|&&m| m).count();
        assert!(now > covered);
        covered = now;
        image = out.image;
        mask = out.mask;
    }
    assert_eq!(covered, 100);
}

#[test]
fn mismatched_mask_is_rejected() {
    let input = ArrayD::<u8>::zeros(IxDyn(&[4, 4]));
    let mask = ArrayD::<u8>::zeros(IxDyn(&[4, 5]));
    let config = MaskConfig::new(1u8, 0u8, 0u8);
    let filter = MaskedRankFilter::with_radius(&[1, 1], 0.5, config).expect("filter");
    assert!(matches!(
        filter.apply(&input.view(), &mask.view()),
        Err(RankError::ShapeMismatch { what: "mask", .. })
    ));
    assert!(MaskedRankFilter::with_radius(&[1, 1], 2.0, config).is_err());
}
