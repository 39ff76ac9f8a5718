//! Rectangular index regions.
//!
//! A region is an origin plus an extent per axis. Workers receive one
//! region each; the pipeline asks for the input region a given output
//! region depends on.

use std::fmt;

use ndarray::{ArrayViewD, Slice};

use crate::error::{RankError, RankResult};

/// Axis-aligned block of indices: `origin[i] .. origin[i] + size[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region {
    origin: Vec<usize>,
    size: Vec<usize>,
}

impl Region {
    /// Create a region from its origin and extent.
    pub fn new(origin: Vec<usize>, size: Vec<usize>) -> RankResult<Self> {
        if origin.len() != size.len() {
            return Err(RankError::DimensionMismatch {
                expected: origin.len(),
                actual: size.len(),
            });
        }
        Ok(Self { origin, size })
    }

    /// Region covering a whole array.
    pub fn whole(shape: &[usize]) -> Self {
        Self {
            origin: vec![0; shape.len()],
            size: shape.to_vec(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.size.len()
    }

    pub fn origin(&self) -> &[usize] {
        &self.origin
    }

    pub fn size(&self) -> &[usize] {
        &self.size
    }

    /// One past the last index along `axis`.
    pub fn end(&self, axis: usize) -> usize {
        self.origin[axis] + self.size[axis]
    }

    /// True when any axis has zero extent.
    pub fn is_empty(&self) -> bool {
        self.size.iter().any(|&s| s == 0)
    }

    /// Number of indices in the region.
    pub fn num_pixels(&self) -> usize {
        self.size.iter().product()
    }

    pub fn contains(&self, index: &[usize]) -> bool {
        index.len() == self.ndim()
            && index
                .iter()
                .enumerate()
                .all(|(axis, &i)| i >= self.origin[axis] && i < self.end(axis))
    }

    /// Check that the region lies inside an array of the given shape.
    pub fn check_within(&self, shape: &[usize]) -> RankResult<()> {
        if shape.len() != self.ndim() {
            return Err(RankError::DimensionMismatch {
                expected: shape.len(),
                actual: self.ndim(),
            });
        }
        if (0..self.ndim()).any(|axis| self.end(axis) > shape[axis]) {
            return Err(RankError::RegionOutOfBounds {
                region: self.to_string(),
                shape: shape.to_vec(),
            });
        }
        Ok(())
    }

    /// Grow by `radius` on both sides of each axis, then crop to `shape`.
    pub fn padded(&self, radius: &[usize], shape: &[usize]) -> RankResult<Self> {
        if radius.len() != self.ndim() {
            return Err(RankError::DimensionMismatch {
                expected: self.ndim(),
                actual: radius.len(),
            });
        }
        self.check_within(shape)?;

        let mut origin = Vec::with_capacity(self.ndim());
        let mut size = Vec::with_capacity(self.ndim());
        for axis in 0..self.ndim() {
            if self.size[axis] == 0 {
                origin.push(self.origin[axis]);
                size.push(0);
                continue;
            }
            let start = self.origin[axis].saturating_sub(radius[axis]);
            let end = (self.end(axis) + radius[axis]).min(shape[axis]);
            origin.push(start);
            size.push(end - start);
        }
        Ok(Self { origin, size })
    }

    /// Sub-region restricted to `start .. start + len` along `axis`,
    /// with `start` relative to this region's origin.
    pub fn slab(&self, axis: usize, start: usize, len: usize) -> Self {
        let mut origin = self.origin.clone();
        let mut size = self.size.clone();
        origin[axis] += start;
        size[axis] = len.min(self.size[axis].saturating_sub(start));
        Self { origin, size }
    }

    /// The same block expressed relative to `outer`'s origin. `outer`
    /// must contain this region.
    pub fn relative_to(&self, outer: &Region) -> Self {
        Self {
            origin: self
                .origin
                .iter()
                .zip(&outer.origin)
                .map(|(&o, &base)| o - base)
                .collect(),
            size: self.size.clone(),
        }
    }

    /// Split along `axis` into at most `pieces` contiguous slabs of equal
    /// length (the last one may be shorter).
    pub fn split(&self, axis: usize, pieces: usize) -> Vec<Self> {
        let len = self.size[axis];
        if len == 0 || pieces == 0 {
            return vec![self.clone()];
        }
        let chunk = slab_len(len, pieces);
        (0..len)
            .step_by(chunk)
            .map(|start| self.slab(axis, start, chunk))
            .collect()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[origin {:?}, size {:?}]", self.origin, self.size)
    }
}

/// View of the part of `array` covered by `region`.
pub fn crop<'a, A>(array: &'a ArrayViewD<'_, A>, region: &Region) -> ArrayViewD<'a, A> {
    array.slice_each_axis(|ax| {
        let axis = ax.axis.index();
        Slice::from(region.origin[axis]..region.end(axis))
    })
}

/// Length of each slab when `len` indices are shared among `pieces` workers.
pub fn slab_len(len: usize, pieces: usize) -> usize {
    len.div_ceil(pieces.max(1)).max(1)
}

/// Input region needed to compute `output`: each axis expanded by the
/// structuring element radius, then clipped to the input extent.
pub fn required_input_region(
    output: &Region,
    radius: &[usize],
    input_shape: &[usize],
) -> RankResult<Region> {
    output.padded(radius, input_shape)
}
