//! Separable approximation of the box rank filter.
//!
//! One 1-D rank filter per axis, applied in axis order with each pass
//! reading the previous pass's output. Minimum and maximum come out exact;
//! other ranks (the median in particular) are an approximation of the
//! true box filter, traded for a per-pixel cost proportional to the sum of
//! the radii rather than their product.
//!
//! The masked variant chains hole-filling masked passes, then decides the
//! final valid area from per-axis coverage of the original mask: a pixel
//! is valid when its line window along every axis (`MaskCombine::All`) or
//! along at least one axis (`MaskCombine::Any`) holds foreground.

use log::debug;
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Axis, Zip};

use super::histogram::RankPixel;
use super::kernel::Kernel;
use super::masked::{MaskConfig, MaskValue, MaskedOutput, MaskedRankFilter};
use super::rank::{RankConfig, RankFilter};
use super::region::{crop, required_input_region, Region};
use crate::error::{check_rank, check_shape, RankError, RankResult};

fn check_radius(radius: &[usize]) -> RankResult<()> {
    if radius.is_empty() {
        return Err(RankError::InvalidParameters(
            "radius needs at least one axis".into(),
        ));
    }
    Ok(())
}

fn check_ndim(radius: &[usize], ndim: usize) -> RankResult<()> {
    if radius.len() != ndim {
        return Err(RankError::DimensionMismatch {
            expected: radius.len(),
            actual: ndim,
        });
    }
    Ok(())
}

// ============================================================================
// Unmasked
// ============================================================================

/// Chain of 1-D rank filters, one per axis with a non-zero radius.
#[derive(Debug, Clone)]
pub struct SeparableRankFilter<T> {
    radius: Vec<usize>,
    passes: Vec<RankFilter<T>>,
}

impl<T: RankPixel> SeparableRankFilter<T> {
    /// # Errors
    /// * `InvalidParameters` if `radius` is empty
    /// * `InvalidRank` if `config.rank` lies outside `[0, 1]`
    pub fn new(radius: &[usize], config: RankConfig<T>) -> RankResult<Self> {
        check_radius(radius)?;
        check_rank(config.rank)?;
        let passes = radius
            .iter()
            .enumerate()
            .filter(|(_, &r)| r > 0)
            .map(|(axis, &r)| RankFilter::new(Kernel::line(radius.len(), axis, r)?, config))
            .collect::<RankResult<Vec<_>>>()?;
        debug!("separable rank filter: radius {radius:?}, {} pass(es)", passes.len());
        Ok(Self {
            radius: radius.to_vec(),
            passes,
        })
    }

    pub fn radius(&self) -> &[usize] {
        &self.radius
    }

    /// Input region `output` depends on after every pass.
    pub fn required_input_region(
        &self,
        output: &Region,
        input_shape: &[usize],
    ) -> RankResult<Region> {
        required_input_region(output, &self.radius, input_shape)
    }

    /// Filter the whole array.
    pub fn apply(&self, input: &ArrayViewD<T>) -> RankResult<ArrayD<T>> {
        check_ndim(&self.radius, input.ndim())?;
        let mut current = input.to_owned();
        for pass in &self.passes {
            current = pass.apply(&current.view())?;
        }
        Ok(current)
    }

    /// Filter one region. The chain runs over the region grown by the
    /// radius, which holds everything the region's results depend on.
    pub fn compute_region(
        &self,
        input: &ArrayViewD<T>,
        mut output: ArrayViewMutD<T>,
        region: &Region,
    ) -> RankResult<()> {
        check_ndim(&self.radius, input.ndim())?;
        check_shape("output", region.size(), output.shape())?;
        let padded = self.required_input_region(region, input.shape())?;
        let filtered = self.apply(&crop(input, &padded))?;
        output.assign(&crop(&filtered.view(), &region.relative_to(&padded)));
        Ok(())
    }
}

/// Separable rank filter with the default (shrinking) border.
///
/// # Arguments
/// * `input` - N-dimensional array
/// * `radius` - Line radius per axis; zero skips the axis
/// * `rank` - Quantile in `[0, 1]`
pub fn separable_rank_filter<T: RankPixel>(
    input: ArrayViewD<T>,
    radius: &[usize],
    rank: f32,
) -> RankResult<ArrayD<T>> {
    SeparableRankFilter::new(radius, RankConfig::default().with_rank(rank))?.apply(&input)
}

// ============================================================================
// Masked
// ============================================================================

/// How per-axis coverage combines into the final valid area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskCombine {
    /// Covered along every axis
    #[default]
    All,
    /// Covered along at least one axis
    Any,
}

/// Masked separable filter settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeparableMaskConfig<T, M> {
    pub foreground: M,
    pub background: M,
    /// Output value outside the valid area
    pub fill: T,
    pub combine: MaskCombine,
    /// When false, original foreground pixels keep their input value and
    /// only the grown area receives filtered values.
    pub write_inside_mask: bool,
    pub parallel: bool,
}

impl<T, M> SeparableMaskConfig<T, M> {
    pub fn new(foreground: M, background: M, fill: T) -> Self {
        Self {
            foreground,
            background,
            fill,
            combine: MaskCombine::All,
            write_inside_mask: true,
            parallel: true,
        }
    }

    pub fn with_combine(mut self, combine: MaskCombine) -> Self {
        self.combine = combine;
        self
    }

    pub fn with_write_inside_mask(mut self, write: bool) -> Self {
        self.write_inside_mask = write;
        self
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

/// Whether the line window of `radius` along `axis` holds foreground, for
/// every position of `mask`.
pub fn axis_coverage<M: MaskValue>(
    mask: &ArrayViewD<M>,
    foreground: M,
    axis: usize,
    radius: usize,
    parallel: bool,
) -> ArrayD<bool> {
    let mut covered = ArrayD::from_elem(mask.raw_dim(), false);
    let sweep = |lane: ndarray::ArrayView1<M>, mut out: ndarray::ArrayViewMut1<bool>| {
        let n = lane.len();
        let mut prefix = Vec::with_capacity(n + 1);
        prefix.push(0usize);
        for &m in lane.iter() {
            let last = prefix[prefix.len() - 1];
            prefix.push(last + usize::from(m == foreground));
        }
        for (i, c) in out.iter_mut().enumerate() {
            let lo = i.saturating_sub(radius);
            let hi = (i + radius + 1).min(n);
            *c = prefix[hi] > prefix[lo];
        }
    };
    let zip = Zip::from(mask.lanes(Axis(axis))).and(covered.lanes_mut(Axis(axis)));
    if parallel {
        zip.par_for_each(sweep);
    } else {
        zip.for_each(sweep);
    }
    covered
}

/// Masked separable rank filter.
#[derive(Debug, Clone)]
pub struct SeparableMaskedRankFilter<T, M> {
    radius: Vec<usize>,
    config: SeparableMaskConfig<T, M>,
    passes: Vec<MaskedRankFilter<T, M>>,
}

impl<T: RankPixel, M: MaskValue> SeparableMaskedRankFilter<T, M> {
    /// # Errors
    /// * `InvalidParameters` if `radius` is empty
    /// * `InvalidRank` if `rank` lies outside `[0, 1]`
    pub fn new(radius: &[usize], rank: f32, config: SeparableMaskConfig<T, M>) -> RankResult<Self> {
        check_radius(radius)?;
        check_rank(rank)?;
        let mut pass_config =
            MaskConfig::new(config.foreground, config.background, config.fill).hole_filling();
        pass_config.parallel = config.parallel;
        let passes = radius
            .iter()
            .enumerate()
            .filter(|(_, &r)| r > 0)
            .map(|(axis, &r)| {
                MaskedRankFilter::new(Kernel::line(radius.len(), axis, r)?, rank, pass_config)
            })
            .collect::<RankResult<Vec<_>>>()?;
        debug!(
            "separable masked rank filter: radius {radius:?}, {:?} combine, write inside mask {}",
            config.combine, config.write_inside_mask
        );
        Ok(Self {
            radius: radius.to_vec(),
            config,
            passes,
        })
    }

    pub fn radius(&self) -> &[usize] {
        &self.radius
    }

    pub fn config(&self) -> &SeparableMaskConfig<T, M> {
        &self.config
    }

    pub fn required_input_region(
        &self,
        output: &Region,
        input_shape: &[usize],
    ) -> RankResult<Region> {
        required_input_region(output, &self.radius, input_shape)
    }

    /// Filter the whole array.
    pub fn apply(
        &self,
        input: &ArrayViewD<T>,
        mask: &ArrayViewD<M>,
    ) -> RankResult<MaskedOutput<T, M>> {
        check_ndim(&self.radius, input.ndim())?;
        check_shape("mask", input.shape(), mask.shape())?;
        let SeparableMaskConfig {
            foreground,
            background,
            fill,
            combine,
            write_inside_mask,
            parallel,
        } = self.config;

        let mut image = input.to_owned();
        let mut grown = mask.to_owned();
        for pass in &self.passes {
            let out = pass.apply(&image.view(), &grown.view())?;
            image = out.image;
            grown = out.mask;
        }

        let mut valid = mask.mapv(|m| m == foreground);
        let mut first = true;
        for (axis, &r) in self.radius.iter().enumerate().filter(|(_, &r)| r > 0) {
            let covered = axis_coverage(mask, foreground, axis, r, parallel);
            if first {
                valid = covered;
                first = false;
                continue;
            }
            Zip::from(&mut valid).and(&covered).for_each(|v, &c| {
                *v = match combine {
                    MaskCombine::All => *v && c,
                    MaskCombine::Any => *v || c,
                }
            });
        }

        let mut out_mask = ArrayD::from_elem(input.raw_dim(), background);
        Zip::from(&mut image)
            .and(&mut out_mask)
            .and(&valid)
            .and(input)
            .and(mask)
            .for_each(|value, flag, &ok, &original, &m| {
                if !ok {
                    *value = fill;
                    *flag = background;
                    return;
                }
                if !write_inside_mask && m == foreground {
                    *value = original;
                }
                *flag = foreground;
            });

        Ok(MaskedOutput { image, mask: out_mask })
    }

    /// Filter one region, optionally writing the output mask too.
    pub fn compute_region(
        &self,
        input: &ArrayViewD<T>,
        mask: &ArrayViewD<M>,
        mut output: ArrayViewMutD<T>,
        mask_out: Option<ArrayViewMutD<M>>,
        region: &Region,
    ) -> RankResult<()> {
        check_ndim(&self.radius, input.ndim())?;
        check_shape("mask", input.shape(), mask.shape())?;
        check_shape("output", region.size(), output.shape())?;
        if let Some(view) = &mask_out {
            check_shape("output mask", region.size(), view.shape())?;
        }
        let padded = self.required_input_region(region, input.shape())?;
        let result = self.apply(&crop(input, &padded), &crop(mask, &padded))?;
        let local = region.relative_to(&padded);
        output.assign(&crop(&result.image.view(), &local));
        if let Some(mut view) = mask_out {
            view.assign(&crop(&result.mask.view(), &local));
        }
        Ok(())
    }
}
