//! Moving-window mean over an arbitrary structuring element.
//!
//! Same scan as the rank filters with a running sum in place of the
//! histogram, so each step costs the leading plus trailing face of the
//! kernel. Windows are cropped at the array border: the mean is taken
//! over the cells that exist.

use log::debug;
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD};

use super::histogram::RankPixel;
use super::kernel::Kernel;
use super::offsets::ScanPlan;
use super::region::{required_input_region, Region};
use super::scan::{run_slabs, scan_region, AdmitAll, Boundary, WindowStatistic};
use crate::error::{check_shape, RankError, RankResult};

/// Running sum and count.
///
/// The sum is kept as a rounded total plus the exact rounding error of
/// every update, so sliding across a whole image does not drift.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanStatistic {
    sum: f64,
    error: f64,
    count: usize,
}

impl MeanStatistic {
    /// Mean of the current window, rounded once from the compensated sum.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| {
            let n = self.count as f64;
            let quotient = self.sum / n;
            let remainder = quotient.mul_add(-n, self.sum) + self.error;
            quotient + remainder / n
        })
    }

    #[inline]
    fn accumulate(&mut self, value: f64) {
        let total = self.sum + value;
        let part = total - self.sum;
        self.error += (self.sum - (total - part)) + (value - part);
        self.sum = total;
    }
}

impl<T: RankPixel> WindowStatistic<T> for MeanStatistic {
    fn reset(&mut self) {
        self.sum = 0.0;
        self.error = 0.0;
        self.count = 0;
    }

    #[inline]
    fn add(&mut self, value: T) {
        self.accumulate(value.to_f64());
        self.count += 1;
    }

    #[inline]
    fn remove(&mut self, value: T) {
        self.accumulate(-value.to_f64());
        self.count -= 1;
    }

    fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn evaluate(&mut self) -> T {
        T::from_f64(self.mean().unwrap_or_default())
    }
}

/// A configured moving mean filter.
#[derive(Debug, Clone)]
pub struct MovingMeanFilter {
    plan: ScanPlan,
    parallel: bool,
}

impl MovingMeanFilter {
    pub fn new(kernel: Kernel) -> Self {
        Self {
            plan: ScanPlan::new(kernel),
            parallel: true,
        }
    }

    /// Mean over the full box of the given per-axis radius.
    pub fn with_radius(radius: &[usize]) -> RankResult<Self> {
        Ok(Self::new(Kernel::boxed(radius)?))
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    pub fn kernel(&self) -> &Kernel {
        self.plan.kernel()
    }

    pub fn required_input_region(
        &self,
        output: &Region,
        input_shape: &[usize],
    ) -> RankResult<Region> {
        required_input_region(output, self.kernel().radius(), input_shape)
    }

    pub fn compute_region<T: RankPixel>(
        &self,
        input: &ArrayViewD<T>,
        output: ArrayViewMutD<T>,
        region: &Region,
    ) -> RankResult<()> {
        self.check_input(input.ndim())?;
        region.check_within(input.shape())?;
        check_shape("output", region.size(), output.shape())?;
        self.scan(input, output, region);
        Ok(())
    }

    pub fn apply<T: RankPixel>(&self, input: &ArrayViewD<T>) -> RankResult<ArrayD<T>> {
        self.check_input(input.ndim())?;
        let region = Region::whole(input.shape());
        let mut output = input.to_owned();
        let slabs = run_slabs(output.view_mut(), &region, self.parallel, |slab, sub| {
            self.scan(input, slab, &sub);
            Ok(())
        })?;
        debug!("mean filter applied to {:?} in {slabs} slab(s)", input.shape());
        Ok(output)
    }

    fn check_input(&self, ndim: usize) -> RankResult<()> {
        if ndim != self.kernel().ndim() {
            return Err(RankError::DimensionMismatch {
                expected: self.kernel().ndim(),
                actual: ndim,
            });
        }
        Ok(())
    }

    fn scan<T: RankPixel>(
        &self,
        input: &ArrayViewD<T>,
        mut output: ArrayViewMutD<T>,
        region: &Region,
    ) {
        let mut stat = MeanStatistic::default();
        scan_region(
            &self.plan,
            input,
            &Boundary::Shrink,
            &AdmitAll,
            region,
            &mut stat,
            |absolute, relative, stat| {
                output[relative] = if WindowStatistic::<T>::is_empty(stat) {
                    input[absolute]
                } else {
                    stat.evaluate()
                };
            },
        );
    }
}

/// Mean over the box of the given per-axis radius.
pub fn mean_filter<T: RankPixel>(input: ArrayViewD<T>, radius: &[usize]) -> RankResult<ArrayD<T>> {
    MovingMeanFilter::with_radius(radius)?.apply(&input)
}
