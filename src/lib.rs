//! histrank: moving-histogram rank filters
//!
//! Order-statistic filters (median, percentile, min, max) over
//! N-dimensional arrays with arbitrary structuring elements. The window
//! histogram is updated incrementally as the window slides, so a step costs
//! the cells on the leading and trailing faces of the kernel rather than the
//! whole kernel.
//!
//! ## Array Format
//! Every filter takes `ndarray` dynamic-dimension views (`ArrayViewD<T>`)
//! and returns owned arrays of the same shape. Any number of axes is
//! supported; the kernel must have as many axes as the array.
//!
//! ## Filters
//! - `RankFilter`: exact rank filter with shrinking or extended borders
//! - `MaskedRankFilter`: rank over mask foreground, optionally filling holes
//! - `SeparableRankFilter` / `SeparableMaskedRankFilter`: per-axis approximation
//! - `MovingMeanFilter`: running mean over the same scan
//!
//! All of them split whole-array work across rayon workers and expose
//! `compute_region` for callers that schedule regions themselves.

pub mod error;
pub mod filters;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use error::{RankError, RankResult};
pub use filters::kernel::Kernel;
pub use filters::masked::{MaskConfig, MaskMode, MaskedOutput, MaskedRankFilter};
pub use filters::mean::{mean_filter, MovingMeanFilter};
pub use filters::rank::{max_filter, median_filter, min_filter, rank_filter, RankConfig, RankFilter};
pub use filters::region::{required_input_region, Region};
pub use filters::scan::Boundary;
pub use filters::separable::{
    separable_rank_filter, MaskCombine, SeparableMaskConfig, SeparableMaskedRankFilter,
    SeparableRankFilter,
};

// Python bindings (only when python feature is enabled)
#[cfg(feature = "python")]
mod python {
    use numpy::{IntoPyArray, PyArrayDyn, PyReadonlyArrayDyn};
    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;

    use crate::error::RankError;
    use crate::filters::histogram::RankPixel;
    use crate::filters::kernel::Kernel;
    use crate::filters::masked::{MaskConfig, MaskedRankFilter};
    use crate::filters::mean::MovingMeanFilter;
    use crate::filters::rank::{RankConfig, RankFilter};
    use crate::filters::scan::Boundary;
    use crate::filters::separable::{
        MaskCombine, SeparableMaskConfig, SeparableMaskedRankFilter, SeparableRankFilter,
    };

    impl From<RankError> for PyErr {
        fn from(err: RankError) -> PyErr {
            PyValueError::new_err(err.to_string())
        }
    }

    fn build_kernel(radius: &[usize], shape: &str) -> PyResult<Kernel> {
        match shape {
            "box" => Ok(Kernel::boxed(radius)?),
            "ellipse" => Ok(Kernel::ellipsoid(radius)?),
            other => Err(PyValueError::new_err(format!(
                "unknown kernel shape '{other}', expected 'box' or 'ellipse'"
            ))),
        }
    }

    fn run_rank<T: RankPixel>(
        image: PyReadonlyArrayDyn<'_, T>,
        radius: Vec<usize>,
        rank: f32,
        shape: &str,
        extend: Option<T>,
    ) -> PyResult<ndarray::ArrayD<T>>
    where
        T: numpy::Element,
    {
        let boundary = extend.map(Boundary::Extend).unwrap_or_default();
        let config = RankConfig::default().with_rank(rank).with_boundary(boundary);
        let filter = RankFilter::new(build_kernel(&radius, shape)?, config)?;
        Ok(filter.apply(&image.as_array())?)
    }

    // ========================================================================
    // Rank Filter
    // ========================================================================

    /// Rank filter on a u8 array of any dimension.
    ///
    /// `radius` gives one entry per axis; `shape` is "box" or "ellipse".
    /// `extend` counts out-of-range cells as that value instead of
    /// shrinking the window.
    #[pyfunction]
    #[pyo3(signature = (image, radius, rank=0.5, shape="box", extend=None))]
    pub fn rank_filter<'py>(
        py: Python<'py>,
        image: PyReadonlyArrayDyn<'py, u8>,
        radius: Vec<usize>,
        rank: f32,
        shape: &str,
        extend: Option<u8>,
    ) -> PyResult<Bound<'py, PyArrayDyn<u8>>> {
        Ok(run_rank(image, radius, rank, shape, extend)?.into_pyarray(py))
    }

    /// Rank filter on an f32 array of any dimension.
    #[pyfunction]
    #[pyo3(signature = (image, radius, rank=0.5, shape="box", extend=None))]
    pub fn rank_filter_f32<'py>(
        py: Python<'py>,
        image: PyReadonlyArrayDyn<'py, f32>,
        radius: Vec<usize>,
        rank: f32,
        shape: &str,
        extend: Option<f32>,
    ) -> PyResult<Bound<'py, PyArrayDyn<f32>>> {
        Ok(run_rank(image, radius, rank, shape, extend)?.into_pyarray(py))
    }

    /// Rank filter on a u16 array of any dimension.
    #[pyfunction]
    #[pyo3(signature = (image, radius, rank=0.5, shape="box", extend=None))]
    pub fn rank_filter_u16<'py>(
        py: Python<'py>,
        image: PyReadonlyArrayDyn<'py, u16>,
        radius: Vec<usize>,
        rank: f32,
        shape: &str,
        extend: Option<u16>,
    ) -> PyResult<Bound<'py, PyArrayDyn<u16>>> {
        Ok(run_rank(image, radius, rank, shape, extend)?.into_pyarray(py))
    }

    // ========================================================================
    // Masked Rank Filter
    // ========================================================================

    /// Rank over mask foreground (u8 image, u8 mask).
    ///
    /// Returns `(image, mask)`. With `fill_holes` the rank is computed at
    /// background positions too and the returned mask marks every position
    /// that received a value.
    #[pyfunction]
    #[pyo3(signature = (image, mask, radius, rank=0.5, foreground=1, fill=0, fill_holes=false, shape="box"))]
    #[allow(clippy::too_many_arguments)]
    pub fn masked_rank_filter<'py>(
        py: Python<'py>,
        image: PyReadonlyArrayDyn<'py, u8>,
        mask: PyReadonlyArrayDyn<'py, u8>,
        radius: Vec<usize>,
        rank: f32,
        foreground: u8,
        fill: u8,
        fill_holes: bool,
        shape: &str,
    ) -> PyResult<(Bound<'py, PyArrayDyn<u8>>, Bound<'py, PyArrayDyn<u8>>)> {
        let background = if foreground == 0 { 1 } else { 0 };
        let mut config = MaskConfig::new(foreground, background, fill);
        if fill_holes {
            config = config.hole_filling();
        }
        let filter = MaskedRankFilter::new(build_kernel(&radius, shape)?, rank, config)?;
        let out = filter.apply(&image.as_array(), &mask.as_array())?;
        Ok((out.image.into_pyarray(py), out.mask.into_pyarray(py)))
    }

    // ========================================================================
    // Separable Filters
    // ========================================================================

    /// Per-axis approximation of the box rank filter (f32).
    #[pyfunction]
    #[pyo3(signature = (image, radius, rank=0.5))]
    pub fn separable_rank_filter<'py>(
        py: Python<'py>,
        image: PyReadonlyArrayDyn<'py, f32>,
        radius: Vec<usize>,
        rank: f32,
    ) -> PyResult<Bound<'py, PyArrayDyn<f32>>> {
        let filter = SeparableRankFilter::new(&radius, RankConfig::default().with_rank(rank))?;
        Ok(filter.apply(&image.as_array())?.into_pyarray(py))
    }

    /// Masked per-axis approximation (f32 image, u8 mask).
    ///
    /// `combine` is "all" or "any".
    #[pyfunction]
    #[pyo3(signature = (image, mask, radius, rank=0.5, foreground=1, fill=0.0, combine="all", write_inside_mask=true))]
    #[allow(clippy::too_many_arguments)]
    pub fn separable_masked_rank_filter<'py>(
        py: Python<'py>,
        image: PyReadonlyArrayDyn<'py, f32>,
        mask: PyReadonlyArrayDyn<'py, u8>,
        radius: Vec<usize>,
        rank: f32,
        foreground: u8,
        fill: f32,
        combine: &str,
        write_inside_mask: bool,
    ) -> PyResult<(Bound<'py, PyArrayDyn<f32>>, Bound<'py, PyArrayDyn<u8>>)> {
        let combine = match combine {
            "all" => MaskCombine::All,
            "any" => MaskCombine::Any,
            other => {
                return Err(PyValueError::new_err(format!(
                    "unknown combine mode '{other}', expected 'all' or 'any'"
                )))
            }
        };
        let background = if foreground == 0 { 1 } else { 0 };
        let config = SeparableMaskConfig::new(foreground, background, fill)
            .with_combine(combine)
            .with_write_inside_mask(write_inside_mask);
        let filter = SeparableMaskedRankFilter::new(&radius, rank, config)?;
        let out = filter.apply(&image.as_array(), &mask.as_array())?;
        Ok((out.image.into_pyarray(py), out.mask.into_pyarray(py)))
    }

    // ========================================================================
    // Mean Filter
    // ========================================================================

    /// Moving mean (f32), windows cropped at the border.
    #[pyfunction]
    #[pyo3(signature = (image, radius, shape="box"))]
    pub fn mean_filter<'py>(
        py: Python<'py>,
        image: PyReadonlyArrayDyn<'py, f32>,
        radius: Vec<usize>,
        shape: &str,
    ) -> PyResult<Bound<'py, PyArrayDyn<f32>>> {
        let filter = MovingMeanFilter::new(build_kernel(&radius, shape)?);
        Ok(filter.apply(&image.as_array())?.into_pyarray(py))
    }

    #[pymodule]
    pub fn histrank(m: &Bound<'_, PyModule>) -> PyResult<()> {
        // Rank filters
        m.add_function(wrap_pyfunction!(rank_filter, m)?)?;
        m.add_function(wrap_pyfunction!(rank_filter_f32, m)?)?;
        m.add_function(wrap_pyfunction!(rank_filter_u16, m)?)?;
        m.add_function(wrap_pyfunction!(masked_rank_filter, m)?)?;

        // Separable approximations
        m.add_function(wrap_pyfunction!(separable_rank_filter, m)?)?;
        m.add_function(wrap_pyfunction!(separable_masked_rank_filter, m)?)?;

        // Mean
        m.add_function(wrap_pyfunction!(mean_filter, m)?)?;
        Ok(())
    }
}
