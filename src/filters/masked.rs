//! Rank filter restricted to the foreground of a companion mask.
//!
//! Only cells whose mask value equals the configured foreground enter the
//! histogram; cells outside the array are always left out. Two modes:
//!
//! - **Restricted**: rank is computed at foreground positions only; every
//!   other position receives the fill value.
//! - **Hole filling**: rank is computed everywhere from whatever foreground
//!   cells the window holds, so background near the foreground is filled
//!   in. Positions whose window holds no foreground receive the fill value.
//!
//! Both modes also produce an output mask marking the positions that got a
//! rank value (foreground) and those that got the fill value (background).
//! Feeding a hole-filling result and its mask back in grows the filled
//! area by one kernel radius per pass.

use std::fmt;

use log::debug;
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD};

use super::histogram::RankPixel;
use super::kernel::Kernel;
use super::offsets::ScanPlan;
use super::region::{required_input_region, Region};
use super::scan::{run_slab_pairs, scan_region, Boundary, MaskAdmit, RankStatistic, WindowStatistic};
use crate::error::{check_rank, check_shape, RankError, RankResult};

/// Values a mask can hold.
pub trait MaskValue: Copy + PartialEq + Send + Sync + fmt::Debug + 'static {}

impl<M: Copy + PartialEq + Send + Sync + fmt::Debug + 'static> MaskValue for M {}

/// Where the masked filter computes a rank value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskMode {
    /// Foreground positions only
    #[default]
    Restricted,
    /// Every position whose window holds foreground
    HoleFill,
}

/// Masked filter settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskConfig<T, M> {
    /// Mask value selecting cells that enter the histogram
    pub foreground: M,
    /// Output mask value for positions that received `fill`
    pub background: M,
    /// Output value where no rank is computed
    pub fill: T,
    pub mode: MaskMode,
    /// Split `apply` across rayon workers
    pub parallel: bool,
}

impl<T, M> MaskConfig<T, M> {
    /// Restricted mode, parallel.
    pub fn new(foreground: M, background: M, fill: T) -> Self {
        Self {
            foreground,
            background,
            fill,
            mode: MaskMode::Restricted,
            parallel: true,
        }
    }

    pub fn with_mode(mut self, mode: MaskMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn hole_filling(self) -> Self {
        self.with_mode(MaskMode::HoleFill)
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

impl<T: Default> Default for MaskConfig<T, bool> {
    fn default() -> Self {
        Self::new(true, false, T::default())
    }
}

/// Filtered image plus the mask of positions that received a rank value.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedOutput<T, M> {
    pub image: ArrayD<T>,
    pub mask: ArrayD<M>,
}

/// A configured masked rank filter.
#[derive(Debug, Clone)]
pub struct MaskedRankFilter<T, M> {
    plan: ScanPlan,
    rank: f32,
    config: MaskConfig<T, M>,
}

impl<T: RankPixel, M: MaskValue> MaskedRankFilter<T, M> {
    /// # Errors
    /// `InvalidRank` if `rank` lies outside `[0, 1]`.
    pub fn new(kernel: Kernel, rank: f32, config: MaskConfig<T, M>) -> RankResult<Self> {
        let rank = check_rank(rank)?;
        let plan = ScanPlan::new(kernel);
        debug!(
            "masked rank filter: rank {rank}, {:?} mode, foreground {:?}",
            config.mode, config.foreground
        );
        Ok(Self { plan, rank, config })
    }

    /// Filter over the full box of the given per-axis radius.
    pub fn with_radius(radius: &[usize], rank: f32, config: MaskConfig<T, M>) -> RankResult<Self> {
        Self::new(Kernel::boxed(radius)?, rank, config)
    }

    pub fn kernel(&self) -> &Kernel {
        self.plan.kernel()
    }

    pub fn config(&self) -> &MaskConfig<T, M> {
        &self.config
    }

    pub fn required_input_region(
        &self,
        output: &Region,
        input_shape: &[usize],
    ) -> RankResult<Region> {
        required_input_region(output, self.kernel().radius(), input_shape)
    }

    /// Filter one region.
    ///
    /// # Arguments
    /// * `input` - Full input array
    /// * `mask` - Full mask, same shape as `input`
    /// * `output` - View shaped like `region.size()`
    /// * `mask_out` - Optional view shaped like `region.size()` receiving the output mask
    /// * `region` - Part of the index space to compute
    pub fn compute_region(
        &self,
        input: &ArrayViewD<T>,
        mask: &ArrayViewD<M>,
        output: ArrayViewMutD<T>,
        mask_out: Option<ArrayViewMutD<M>>,
        region: &Region,
    ) -> RankResult<()> {
        self.check_inputs(input, mask)?;
        region.check_within(input.shape())?;
        check_shape("output", region.size(), output.shape())?;
        if let Some(view) = &mask_out {
            check_shape("output mask", region.size(), view.shape())?;
        }
        self.scan(input, mask, output, mask_out, region);
        Ok(())
    }

    /// Filter the whole array.
    pub fn apply(
        &self,
        input: &ArrayViewD<T>,
        mask: &ArrayViewD<M>,
    ) -> RankResult<MaskedOutput<T, M>> {
        self.check_inputs(input, mask)?;
        let region = Region::whole(input.shape());
        let mut image = ArrayD::from_elem(input.raw_dim(), self.config.fill);
        let mut out_mask = ArrayD::from_elem(input.raw_dim(), self.config.background);
        let slabs = run_slab_pairs(
            image.view_mut(),
            out_mask.view_mut(),
            &region,
            self.config.parallel,
            |image, out_mask, sub| {
                self.scan(input, mask, image, Some(out_mask), &sub);
                Ok(())
            },
        )?;
        debug!("masked rank filter applied to {:?} in {slabs} slab(s)", input.shape());
        Ok(MaskedOutput { image, mask: out_mask })
    }

    fn check_inputs(&self, input: &ArrayViewD<T>, mask: &ArrayViewD<M>) -> RankResult<()> {
        if input.ndim() != self.kernel().ndim() {
            return Err(RankError::DimensionMismatch {
                expected: self.kernel().ndim(),
                actual: input.ndim(),
            });
        }
        check_shape("mask", input.shape(), mask.shape())
    }

    fn scan(
        &self,
        input: &ArrayViewD<T>,
        mask: &ArrayViewD<M>,
        mut output: ArrayViewMutD<T>,
        mut mask_out: Option<ArrayViewMutD<M>>,
        region: &Region,
    ) {
        let MaskConfig {
            foreground,
            background,
            fill,
            mode,
            ..
        } = self.config;
        let admit = MaskAdmit::new(mask.view(), foreground);
        let mut stat = RankStatistic::<T>::new(self.rank);

        scan_region(
            &self.plan,
            input,
            &Boundary::Shrink,
            &admit,
            region,
            &mut stat,
            |absolute, relative, stat| {
                let wanted = match mode {
                    MaskMode::Restricted => mask[absolute] == foreground,
                    MaskMode::HoleFill => true,
                };
                // an empty histogram has no rank value
                let covered = wanted && !stat.is_empty();
                output[relative] = if covered { stat.evaluate() } else { fill };
                if let Some(view) = mask_out.as_mut() {
                    view[relative] = if covered { foreground } else { background };
                }
            },
        );
    }
}
