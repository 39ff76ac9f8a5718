//! N-dimensional rank filter over an arbitrary structuring element.
//!
//! Output at each position is the value at quantile `rank` of the input
//! values covered by the kernel centred there. `rank = 0` gives the
//! minimum, `rank = 1` the maximum and `rank = 0.5` the median (the lower
//! central value for even counts).
//!
//! ## Border Handling
//!
//! | Policy | Cells outside the array |
//! |--------|-------------------------|
//! | `Boundary::Shrink` (default) | ignored; windows shrink at the border |
//! | `Boundary::Extend(v)` | each counted as `v` |
//!
//! With `Shrink`, a kernel that does not contain the origin can have no
//! cell inside the array; such positions keep their input value.
//!
//! ## Example
//!
//! ```
//! use histrank::filters::kernel::Kernel;
//! use histrank::filters::rank::{RankConfig, RankFilter};
//! use ndarray::{arr1, ArrayD};
//!
//! let input: ArrayD<u8> = arr1(&[5u8, 1, 4, 2, 8]).into_dyn();
//! let filter = RankFilter::new(Kernel::boxed(&[1]).unwrap(), RankConfig::median()).unwrap();
//! let output = filter.apply(&input.view()).unwrap();
//! assert_eq!(output.as_slice().unwrap(), &[1, 4, 2, 4, 2]);
//! ```

use log::debug;
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD};

use super::histogram::{RankHistogram, RankPixel};
use super::kernel::Kernel;
use super::offsets::ScanPlan;
use super::region::{required_input_region, Region};
use super::scan::{run_slabs, scan_region, AdmitAll, Boundary, RankStatistic, WindowStatistic};
use crate::error::{check_rank, check_shape, RankError, RankResult};

/// Rank filter settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankConfig<T> {
    /// Quantile in `[0, 1]`
    pub rank: f32,
    /// Out-of-range cell policy
    pub boundary: Boundary<T>,
    /// Split `apply` across rayon workers
    pub parallel: bool,
}

impl<T> Default for RankConfig<T> {
    fn default() -> Self {
        Self {
            rank: 0.5,
            boundary: Boundary::Shrink,
            parallel: true,
        }
    }
}

impl<T> RankConfig<T> {
    pub fn median() -> Self {
        Self::default()
    }

    pub fn minimum() -> Self {
        Self::default().with_rank(0.0)
    }

    pub fn maximum() -> Self {
        Self::default().with_rank(1.0)
    }

    pub fn with_rank(mut self, rank: f32) -> Self {
        self.rank = rank;
        self
    }

    pub fn with_boundary(mut self, boundary: Boundary<T>) -> Self {
        self.boundary = boundary;
        self
    }

    /// Run `apply` as a single region on the calling thread.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

/// A configured rank filter. Immutable once built; `compute_region` can be
/// called concurrently for disjoint regions.
#[derive(Debug, Clone)]
pub struct RankFilter<T> {
    plan: ScanPlan,
    rank: f32,
    boundary: Boundary<T>,
    parallel: bool,
}

impl<T: RankPixel> RankFilter<T> {
    /// Configure a filter for `kernel`.
    ///
    /// # Errors
    /// `InvalidRank` if `config.rank` lies outside `[0, 1]`.
    pub fn new(kernel: Kernel, config: RankConfig<T>) -> RankResult<Self> {
        let rank = check_rank(config.rank)?;
        let plan = ScanPlan::new(kernel);
        debug!(
            "rank filter: rank {rank}, {:?} boundary, {} histogram",
            config.boundary,
            <T::Histogram as RankHistogram<T>>::STRATEGY
        );
        Ok(Self {
            plan,
            rank,
            boundary: config.boundary,
            parallel: config.parallel,
        })
    }

    /// Configure a filter over the full box of the given per-axis radius.
    pub fn with_radius(radius: &[usize], config: RankConfig<T>) -> RankResult<Self> {
        Self::new(Kernel::boxed(radius)?, config)
    }

    pub fn kernel(&self) -> &Kernel {
        self.plan.kernel()
    }

    pub fn plan(&self) -> &ScanPlan {
        &self.plan
    }

    pub fn rank(&self) -> f32 {
        self.rank
    }

    pub fn boundary(&self) -> Boundary<T> {
        self.boundary
    }

    /// Input region that `output` depends on, clipped to `input_shape`.
    pub fn required_input_region(
        &self,
        output: &Region,
        input_shape: &[usize],
    ) -> RankResult<Region> {
        required_input_region(output, self.kernel().radius(), input_shape)
    }

    /// Filter one region of `input` into `output`.
    ///
    /// # Arguments
    /// * `input` - Full input array
    /// * `output` - View shaped like `region.size()`, receiving the result
    /// * `region` - Part of the input index space to compute
    ///
    /// # Errors
    /// * `DimensionMismatch` if `input` and the kernel differ in axes
    /// * `RegionOutOfBounds` if `region` reaches past the input
    /// * `ShapeMismatch` if `output` is not shaped like the region
    pub fn compute_region(
        &self,
        input: &ArrayViewD<T>,
        output: ArrayViewMutD<T>,
        region: &Region,
    ) -> RankResult<()> {
        self.check_input(input.shape())?;
        region.check_within(input.shape())?;
        check_shape("output", region.size(), output.shape())?;
        self.scan(input, output, region);
        Ok(())
    }

    /// Filter the whole array.
    ///
    /// # Returns
    /// New array of the input's shape.
    pub fn apply(&self, input: &ArrayViewD<T>) -> RankResult<ArrayD<T>> {
        self.check_input(input.shape())?;
        let region = Region::whole(input.shape());
        let mut output = input.to_owned();
        let slabs = run_slabs(output.view_mut(), &region, self.parallel, |slab, sub| {
            self.scan(input, slab, &sub);
            Ok(())
        })?;
        debug!("rank filter applied to {:?} in {slabs} slab(s)", input.shape());
        Ok(output)
    }

    fn check_input(&self, shape: &[usize]) -> RankResult<()> {
        if shape.len() != self.kernel().ndim() {
            return Err(RankError::DimensionMismatch {
                expected: self.kernel().ndim(),
                actual: shape.len(),
            });
        }
        Ok(())
    }

    fn scan(&self, input: &ArrayViewD<T>, mut output: ArrayViewMutD<T>, region: &Region) {
        let mut stat = RankStatistic::<T>::new(self.rank);
        scan_region(
            &self.plan,
            input,
            &self.boundary,
            &AdmitAll,
            region,
            &mut stat,
            |absolute, relative, stat| {
                output[relative] = if stat.is_empty() {
                    input[absolute]
                } else {
                    stat.evaluate()
                };
            },
        );
    }
}

// ============================================================================
// Convenience Functions
// ============================================================================

/// Rank filter with an arbitrary kernel and the default (shrinking) border.
///
/// # Arguments
/// * `input` - N-dimensional array
/// * `kernel` - Structuring element with as many axes as `input`
/// * `rank` - Quantile in `[0, 1]`
pub fn rank_filter<T: RankPixel>(
    input: ArrayViewD<T>,
    kernel: &Kernel,
    rank: f32,
) -> RankResult<ArrayD<T>> {
    RankFilter::new(kernel.clone(), RankConfig::default().with_rank(rank))?.apply(&input)
}

/// Median over the box of the given per-axis radius.
pub fn median_filter<T: RankPixel>(
    input: ArrayViewD<T>,
    radius: &[usize],
) -> RankResult<ArrayD<T>> {
    RankFilter::with_radius(radius, RankConfig::median())?.apply(&input)
}

/// Minimum over the box of the given per-axis radius (grey erosion).
pub fn min_filter<T: RankPixel>(input: ArrayViewD<T>, radius: &[usize]) -> RankResult<ArrayD<T>> {
    RankFilter::with_radius(radius, RankConfig::minimum())?.apply(&input)
}

/// Maximum over the box of the given per-axis radius (grey dilation).
pub fn max_filter<T: RankPixel>(input: ArrayViewD<T>, radius: &[usize]) -> RankResult<ArrayD<T>> {
    RankFilter::with_radius(radius, RankConfig::maximum())?.apply(&input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, IxDyn};

    fn scenario_a() -> ArrayD<u8> {
        arr1(&[5u8, 1, 4, 2, 8]).into_dyn()
    }

    #[test]
    fn test_median_1d_shrink() {
        let output = median_filter(scenario_a().view(), &[1]).unwrap();
        assert_eq!(output.as_slice().unwrap(), &[1, 4, 2, 4, 2]);
    }

    #[test]
    fn test_median_1d_extend() {
        let filter = RankFilter::with_radius(
            &[1],
            RankConfig::median().with_boundary(Boundary::Extend(0u8)),
        )
        .unwrap();
        let output = filter.apply(&scenario_a().view()).unwrap();
        assert_eq!(output.as_slice().unwrap(), &[1, 4, 2, 4, 2]);

        let filter = RankFilter::with_radius(
            &[1],
            RankConfig::maximum().with_boundary(Boundary::Extend(9u8)),
        )
        .unwrap();
        let output = filter.apply(&scenario_a().view()).unwrap();
        assert_eq!(output.as_slice().unwrap(), &[9, 5, 4, 8, 9]);
    }

    #[test]
    fn test_min_max_2d() {
        let input = arr2(&[[3i32, 7, 1], [9, 4, 6], [2, 8, 5]]).into_dyn();
        let min = min_filter(input.view(), &[1, 1]).unwrap();
        let max = max_filter(input.view(), &[1, 1]).unwrap();
        assert_eq!(min, arr2(&[[3, 1, 1], [2, 1, 1], [2, 2, 4]]).into_dyn());
        assert_eq!(max, arr2(&[[9, 9, 7], [9, 9, 8], [9, 9, 8]]).into_dyn());
    }

    #[test]
    fn test_compute_region_matches_apply() {
        let input =
            ArrayD::from_shape_fn(IxDyn(&[6, 5]), |ix| ((ix[0] * 13 + ix[1] * 7) % 11) as f32);
        let kernel = Kernel::ellipsoid(&[2, 1]).unwrap();
        let filter = RankFilter::new(kernel, RankConfig::median()).unwrap();
        let full = filter.apply(&input.view()).unwrap();

        let region = Region::new(vec![2, 1], vec![3, 3]).unwrap();
        let mut part = ArrayD::<f32>::zeros(IxDyn(&[3, 3]));
        filter.compute_region(&input.view(), part.view_mut(), &region).unwrap();
        for (index, &value) in part.indexed_iter() {
            assert_eq!(value, full[[index[0] + 2, index[1] + 1].as_slice()]);
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let input =
            ArrayD::from_shape_fn(IxDyn(&[17, 9]), |ix| ((ix[0] * 31 + ix[1] * 17) % 23) as u16);
        let kernel = Kernel::ellipsoid(&[2, 3]).unwrap();
        let parallel = RankFilter::new(kernel.clone(), RankConfig::median()).unwrap();
        let sequential = RankFilter::new(kernel, RankConfig::median().sequential()).unwrap();
        assert_eq!(
            parallel.apply(&input.view()).unwrap(),
            sequential.apply(&input.view()).unwrap()
        );
    }

    #[test]
    fn test_empty_window_keeps_input() {
        let kernel = Kernel::from_offsets(1, vec![vec![2]]).unwrap();
        let input = arr1(&[3u8, 6, 9]).into_dyn();
        let output = rank_filter(input.view(), &kernel, 0.5).unwrap();
        assert_eq!(output.as_slice().unwrap(), &[9, 6, 9]);
    }

    #[test]
    fn test_configuration_errors() {
        let kernel = Kernel::boxed(&[1, 1]).unwrap();
        let too_high = RankConfig::default().with_rank(1.2);
        assert_eq!(
            RankFilter::<u8>::new(kernel.clone(), too_high).unwrap_err(),
            RankError::InvalidRank(1.2)
        );

        let filter = RankFilter::<u8>::new(kernel, RankConfig::default()).unwrap();
        let input = ArrayD::<u8>::zeros(IxDyn(&[4, 4]));
        assert!(matches!(
            filter.apply(&ArrayD::<u8>::zeros(IxDyn(&[4])).view()),
            Err(RankError::DimensionMismatch { expected: 2, actual: 1 })
        ));

        let region = Region::new(vec![1, 1], vec![2, 2]).unwrap();
        let mut wrong = ArrayD::<u8>::zeros(IxDyn(&[2, 3]));
        assert!(matches!(
            filter.compute_region(&input.view(), wrong.view_mut(), &region),
            Err(RankError::ShapeMismatch { what: "output", .. })
        ));

        let outside = Region::new(vec![3, 0], vec![2, 2]).unwrap();
        let mut out = ArrayD::<u8>::zeros(IxDyn(&[2, 2]));
        assert!(matches!(
            filter.compute_region(&input.view(), out.view_mut(), &outside),
            Err(RankError::RegionOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_required_input_region() {
        let kernel = Kernel::ellipsoid(&[2, 1]).unwrap();
        let filter = RankFilter::<f64>::new(kernel, RankConfig::default()).unwrap();
        let region = filter
            .required_input_region(&Region::new(vec![0, 3], vec![2, 2]).unwrap(), &[10, 5])
            .unwrap();
        assert_eq!(region.origin(), &[0, 2]);
        assert_eq!(region.size(), &[4, 3]);
    }
}
