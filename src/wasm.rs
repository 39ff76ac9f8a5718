//! WebAssembly exports for histrank filters.
//!
//! These functions are exposed to JavaScript via wasm-bindgen. Images are
//! flat row-major single-channel buffers of `width * height` values.
//!
//! ## Pixel Types
//!
//! - **u8**: 8-bit grey values, counting-table histogram
//! - **f32**: float values, ordered-map histogram
//!
//! Everything runs on the calling thread.

use ndarray::{Array2, ArrayD};
use wasm_bindgen::prelude::*;

use crate::error::RankError;
use crate::filters::histogram::RankPixel;
use crate::filters::kernel::Kernel;
use crate::filters::masked::{MaskConfig, MaskedRankFilter};
use crate::filters::mean::MovingMeanFilter;
use crate::filters::rank::{RankConfig, RankFilter};
use crate::filters::separable::{
    MaskCombine, SeparableMaskConfig, SeparableMaskedRankFilter, SeparableRankFilter,
};

fn js_error(err: RankError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn to_image<T>(data: &[T], width: usize, height: usize) -> Result<ArrayD<T>, JsValue>
where
    T: Copy,
{
    Array2::from_shape_vec((height, width), data.to_vec())
        .map(|image| image.into_dyn())
        .map_err(|e| JsValue::from_str(&format!("invalid dimensions: {e}")))
}

fn kernel(radius_y: usize, radius_x: usize, ellipse: bool) -> Result<Kernel, JsValue> {
    let radius = [radius_y, radius_x];
    if ellipse {
        Kernel::ellipsoid(&radius).map_err(js_error)
    } else {
        Kernel::boxed(&radius).map_err(js_error)
    }
}

fn run_rank<T: RankPixel>(
    data: &[T],
    width: usize,
    height: usize,
    radius: usize,
    rank: f32,
    ellipse: bool,
) -> Result<Vec<T>, JsValue> {
    let input = to_image(data, width, height)?;
    let config = RankConfig::default().with_rank(rank).sequential();
    let filter = RankFilter::new(kernel(radius, radius, ellipse)?, config).map_err(js_error)?;
    let result = filter.apply(&input.view()).map_err(js_error)?;
    Ok(result.into_raw_vec_and_offset().0)
}

// ============================================================================
// Rank Filter
// ============================================================================

/// Rank filter on a u8 grey image.
///
/// # Arguments
/// * `data` - Flat array of grey bytes (length = width * height)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `radius` - Window radius in pixels
/// * `rank` - Quantile, 0.0 = min, 0.5 = median, 1.0 = max
/// * `ellipse` - Disc-shaped window instead of a square
///
/// # Returns
/// Flat array of filtered bytes
#[wasm_bindgen]
pub fn rank_filter_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    radius: usize,
    rank: f32,
    ellipse: bool,
) -> Result<Vec<u8>, JsValue> {
    run_rank(data, width, height, radius, rank, ellipse)
}

/// Rank filter on an f32 grey image.
#[wasm_bindgen]
pub fn rank_filter_f32_wasm(
    data: &[f32],
    width: usize,
    height: usize,
    radius: usize,
    rank: f32,
    ellipse: bool,
) -> Result<Vec<f32>, JsValue> {
    run_rank(data, width, height, radius, rank, ellipse)
}

/// Median filter on a u8 grey image with a square window.
#[wasm_bindgen]
pub fn median_filter_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    radius: usize,
) -> Result<Vec<u8>, JsValue> {
    run_rank(data, width, height, radius, 0.5, false)
}

// ============================================================================
// Masked Rank Filter
// ============================================================================

/// Rank over the non-zero pixels of `mask` (u8 image).
///
/// With `fill_holes` the zero pixels of the mask near non-zero ones are
/// filled in too. Pixels that get no value receive `fill`.
///
/// # Returns
/// Flat array of filtered bytes
#[wasm_bindgen]
#[allow(clippy::too_many_arguments)]
pub fn masked_rank_filter_wasm(
    data: &[u8],
    mask: &[u8],
    width: usize,
    height: usize,
    radius: usize,
    rank: f32,
    fill: u8,
    fill_holes: bool,
) -> Result<Vec<u8>, JsValue> {
    let input = to_image(data, width, height)?;
    let mask = to_image(mask, width, height)?.mapv(|m| m != 0);
    let mut config = MaskConfig::new(true, false, fill).sequential();
    if fill_holes {
        config = config.hole_filling();
    }
    let filter =
        MaskedRankFilter::new(kernel(radius, radius, false)?, rank, config).map_err(js_error)?;
    let out = filter.apply(&input.view(), &mask.view()).map_err(js_error)?;
    Ok(out.image.into_raw_vec_and_offset().0)
}

// ============================================================================
// Separable Filters
// ============================================================================

/// Row-then-column approximation of the square rank filter (u8).
#[wasm_bindgen]
pub fn separable_rank_filter_wasm(
    data: &[u8],
    width: usize,
    height: usize,
    radius: usize,
    rank: f32,
) -> Result<Vec<u8>, JsValue> {
    let input = to_image(data, width, height)?;
    let config = RankConfig::default().with_rank(rank).sequential();
    let filter = SeparableRankFilter::new(&[radius, radius], config).map_err(js_error)?;
    let result = filter.apply(&input.view()).map_err(js_error)?;
    Ok(result.into_raw_vec_and_offset().0)
}

/// Masked row-then-column approximation (f32 image, non-zero mask = valid).
///
/// `any_axis` accepts pixels covered along one axis instead of both.
#[wasm_bindgen]
#[allow(clippy::too_many_arguments)]
pub fn separable_masked_rank_filter_wasm(
    data: &[f32],
    mask: &[u8],
    width: usize,
    height: usize,
    radius: usize,
    rank: f32,
    fill: f32,
    any_axis: bool,
) -> Result<Vec<f32>, JsValue> {
    let input = to_image(data, width, height)?;
    let mask = to_image(mask, width, height)?.mapv(|m| m != 0);
    let combine = if any_axis { MaskCombine::Any } else { MaskCombine::All };
    let config = SeparableMaskConfig::new(true, false, fill)
        .with_combine(combine)
        .sequential();
    let filter = SeparableMaskedRankFilter::new(&[radius, radius], rank, config).map_err(js_error)?;
    let out = filter.apply(&input.view(), &mask.view()).map_err(js_error)?;
    Ok(out.image.into_raw_vec_and_offset().0)
}

// ============================================================================
// Mean Filter
// ============================================================================

/// Moving mean over a square window (f32), cropped at the border.
#[wasm_bindgen]
pub fn mean_filter_wasm(
    data: &[f32],
    width: usize,
    height: usize,
    radius: usize,
) -> Result<Vec<f32>, JsValue> {
    let input = to_image(data, width, height)?;
    let filter = MovingMeanFilter::new(kernel(radius, radius, false)?).sequential();
    let result = filter.apply(&input.view()).map_err(js_error)?;
    Ok(result.into_raw_vec_and_offset().0)
}
