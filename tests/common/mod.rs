//! Brute-force references shared by the integration tests.

#![allow(dead_code)]

use histrank::filters::histogram::RankPixel;
use histrank::{Boundary, Kernel};
use nanorand::{Rng, WyRand};
use ndarray::{ArrayD, Dimension, IxDyn};

/// Values the kernel covers around `centre`, sorted.
pub fn window<T: RankPixel>(
    input: &ArrayD<T>,
    kernel: &Kernel,
    boundary: Boundary<T>,
    centre: &[usize],
    admit: impl Fn(&[usize]) -> bool,
) -> Vec<T> {
    let mut values = Vec::new();
    for offset in kernel.offsets() {
        let index: Vec<isize> = centre.iter().zip(offset).map(|(&c, &o)| c as isize + o).collect();
        let inside = index
            .iter()
            .zip(input.shape())
            .all(|(&i, &s)| i >= 0 && (i as usize) < s);
        if inside {
            let index: Vec<usize> = index.iter().map(|&i| i as usize).collect();
            if admit(&index) {
                values.push(input[index.as_slice()]);
            }
        } else if let Boundary::Extend(v) = boundary {
            values.push(v);
        }
    }
    values.sort_by(|a, b| a.total_cmp(b));
    values
}

/// Value at `rank` of a sorted, non-empty slice: position
/// `floor(rank * (n - 1))` with the rank read as a decimal in millionths.
pub fn pick<T: Copy>(sorted: &[T], rank: f32) -> T {
    let millionths = (rank as f64 * 1e6).round() as usize;
    sorted[millionths * (sorted.len() - 1) / 1_000_000]
}

/// Rank filter computed by sorting every window.
pub fn brute_rank<T: RankPixel>(
    input: &ArrayD<T>,
    kernel: &Kernel,
    rank: f32,
    boundary: Boundary<T>,
) -> ArrayD<T> {
    ArrayD::from_shape_fn(input.raw_dim(), |index| {
        let values = window(input, kernel, boundary, index.slice(), |_| true);
        if values.is_empty() {
            input[index.slice()]
        } else {
            pick(&values, rank)
        }
    })
}

pub fn random_u8(rng: &mut WyRand, shape: &[usize]) -> ArrayD<u8> {
    ArrayD::from_shape_simple_fn(IxDyn(shape), || rng.generate_range(0_u8..=255))
}

/// Small value range so windows contain plenty of ties.
pub fn random_i32(rng: &mut WyRand, shape: &[usize]) -> ArrayD<i32> {
    ArrayD::from_shape_simple_fn(IxDyn(shape), || rng.generate_range(0_i32..12) - 6)
}

pub fn random_f32(rng: &mut WyRand, shape: &[usize]) -> ArrayD<f32> {
    ArrayD::from_shape_simple_fn(IxDyn(shape), || rng.generate_range(0_u32..1000) as f32 / 8.0)
}

pub fn random_mask(rng: &mut WyRand, shape: &[usize], percent: u32) -> ArrayD<bool> {
    ArrayD::from_shape_simple_fn(IxDyn(shape), || rng.generate_range(0_u32..100) < percent)
}
