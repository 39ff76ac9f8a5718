//! Structuring elements for moving-window filters.
//!
//! A kernel is a finite set of integer offsets relative to the window
//! centre. Any shape is allowed; nothing requires symmetry or that the
//! origin itself is part of the set.
//!
//! ## Constructors
//!
//! | Constructor | Shape |
//! |-------------|-------|
//! | `Kernel::boxed` | full hyper-rectangle of `2r+1` cells per axis |
//! | `Kernel::ellipsoid` | cells with `sum((o_i / r_i)^2) <= 1`, a disc in 2-D |
//! | `Kernel::line` | `2r+1` cells along one axis |
//! | `Kernel::from_mask` | active cells of a boolean array, centred at `shape / 2` |
//! | `Kernel::from_offsets` | arbitrary offset list |

use ndarray::{ArrayViewD, Dimension, IxDyn};

use crate::error::{RankError, RankResult};

/// Integer displacement, one component per axis.
pub type Offset = Vec<isize>;

/// A structuring element: sorted, duplicate-free offsets plus the per-axis
/// bounding radius derived from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kernel {
    ndim: usize,
    offsets: Vec<Offset>,
    radius: Vec<usize>,
}

impl Kernel {
    /// Build a kernel from an arbitrary list of offsets.
    ///
    /// Offsets are sorted lexicographically and duplicates dropped, so the
    /// resulting set and every list derived from it are deterministic.
    ///
    /// # Errors
    /// * `InvalidParameters` if `ndim` is zero
    /// * `DimensionMismatch` if an offset has the wrong length
    /// * `EmptyKernel` if no offsets are given
    pub fn from_offsets<I>(ndim: usize, offsets: I) -> RankResult<Self>
    where
        I: IntoIterator<Item = Offset>,
    {
        if ndim == 0 {
            return Err(RankError::InvalidParameters(
                "kernel needs at least one axis".into(),
            ));
        }

        let mut collected = Vec::new();
        for offset in offsets {
            if offset.len() != ndim {
                return Err(RankError::DimensionMismatch {
                    expected: ndim,
                    actual: offset.len(),
                });
            }
            collected.push(offset);
        }
        if collected.is_empty() {
            return Err(RankError::EmptyKernel);
        }

        collected.sort();
        collected.dedup();

        let mut radius = vec![0usize; ndim];
        for offset in &collected {
            for (r, &o) in radius.iter_mut().zip(offset) {
                *r = (*r).max(o.unsigned_abs());
            }
        }

        Ok(Self {
            ndim,
            offsets: collected,
            radius,
        })
    }

    /// Full box of `2 * radius[i] + 1` cells along each axis.
    pub fn boxed(radius: &[usize]) -> RankResult<Self> {
        Self::from_offsets(radius.len(), box_offsets(radius))
    }

    /// Hyper-ellipsoid inscribed in the box of the given radius.
    ///
    /// Axes with a zero radius contribute only offset 0. With radius 1 in
    /// 2-D this is the 4-connected cross.
    pub fn ellipsoid(radius: &[usize]) -> RankResult<Self> {
        let inside = |offset: &Offset| {
            let dist: f64 = offset
                .iter()
                .zip(radius)
                .filter(|(_, &r)| r > 0)
                .map(|(&o, &r)| {
                    let t = o as f64 / r as f64;
                    t * t
                })
                .sum();
            dist <= 1.0 + 1e-9
        };
        Self::from_offsets(radius.len(), box_offsets(radius).filter(inside))
    }

    /// Line of `2 * radius + 1` cells along `axis`.
    pub fn line(ndim: usize, axis: usize, radius: usize) -> RankResult<Self> {
        if axis >= ndim {
            return Err(RankError::InvalidParameters(format!(
                "axis {axis} out of range for {ndim} dimensions"
            )));
        }
        let r = radius as isize;
        Self::from_offsets(
            ndim,
            (-r..=r).map(|o| {
                let mut offset = vec![0isize; ndim];
                offset[axis] = o;
                offset
            }),
        )
    }

    /// Active cells of a boolean array, centred at `shape[i] / 2`.
    pub fn from_mask(mask: ArrayViewD<bool>) -> RankResult<Self> {
        let center: Vec<isize> = mask.shape().iter().map(|&s| (s / 2) as isize).collect();
        let offsets = mask
            .indexed_iter()
            .filter(|(_, &active)| active)
            .map(|(index, _)| {
                index
                    .slice()
                    .iter()
                    .zip(&center)
                    .map(|(&i, &c)| i as isize - c)
                    .collect::<Offset>()
            })
            .collect::<Vec<_>>();
        Self::from_offsets(mask.ndim(), offsets)
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.ndim
    }

    /// Number of cells in the window.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Always false; construction rejects empty kernels.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Offsets in lexicographic order.
    pub fn offsets(&self) -> &[Offset] {
        &self.offsets
    }

    /// Largest absolute offset along each axis.
    pub fn radius(&self) -> &[usize] {
        &self.radius
    }

    /// Set membership by binary search over the sorted offsets.
    pub fn contains(&self, offset: &[isize]) -> bool {
        self.offsets
            .binary_search_by(|probe| probe.as_slice().cmp(offset))
            .is_ok()
    }
}

/// Every offset of the box with the given radius, in lexicographic order.
fn box_offsets(radius: &[usize]) -> impl Iterator<Item = Offset> + '_ {
    let dims: Vec<usize> = radius.iter().map(|&r| 2 * r + 1).collect();
    ndarray::indices(IxDyn(&dims)).into_iter().map(move |index| {
        index
            .slice()
            .iter()
            .zip(radius)
            .map(|(&i, &r)| i as isize - r as isize)
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, ArrayD};

    #[test]
    fn test_box_kernel_size_and_radius() {
        let kernel = Kernel::boxed(&[1, 2]).unwrap();
        assert_eq!(kernel.len(), 3 * 5);
        assert_eq!(kernel.radius(), &[1, 2]);
        assert!(kernel.contains(&[-1, 2]));
        assert!(!kernel.contains(&[2, 0]));
    }

    #[test]
    fn test_offsets_are_sorted_and_unique() {
        let kernel = Kernel::from_offsets(
            2,
            vec![vec![1, 0], vec![0, 0], vec![1, 0], vec![-1, 3]],
        )
        .unwrap();
        assert_eq!(kernel.offsets(), &[vec![-1, 3], vec![0, 0], vec![1, 0]]);
        assert_eq!(kernel.radius(), &[1, 3]);
    }

    #[test]
    fn test_ellipsoid_radius_one_is_cross() {
        let kernel = Kernel::ellipsoid(&[1, 1]).unwrap();
        assert_eq!(kernel.len(), 5);
        assert!(kernel.contains(&[0, 1]));
        assert!(!kernel.contains(&[1, 1]));
    }

    #[test]
    fn test_ellipsoid_degenerate_axis() {
        let kernel = Kernel::ellipsoid(&[0, 3]).unwrap();
        assert_eq!(kernel.len(), 7);
        assert_eq!(kernel.radius(), &[0, 3]);
    }

    #[test]
    fn test_line_kernel() {
        let kernel = Kernel::line(3, 1, 2).unwrap();
        assert_eq!(kernel.len(), 5);
        assert_eq!(kernel.radius(), &[0, 2, 0]);
        assert!(Kernel::line(2, 2, 1).is_err());
    }

    #[test]
    fn test_from_mask_centres_on_middle() {
        let mask = arr2(&[[false, true, false], [true, true, true], [false, true, false]]);
        let kernel = Kernel::from_mask(mask.into_dyn().view()).unwrap();
        assert_eq!(kernel, Kernel::ellipsoid(&[1, 1]).unwrap());
    }

    #[test]
    fn test_empty_and_mismatched_kernels_rejected() {
        assert_eq!(
            Kernel::from_offsets(2, Vec::<Offset>::new()),
            Err(RankError::EmptyKernel)
        );
        assert!(matches!(
            Kernel::from_offsets(2, vec![vec![0]]),
            Err(RankError::DimensionMismatch { expected: 2, actual: 1 })
        ));
        let all_false = ArrayD::from_elem(IxDyn(&[3, 3]), false);
        assert_eq!(Kernel::from_mask(all_false.view()), Err(RankError::EmptyKernel));
    }
}
