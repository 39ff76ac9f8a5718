//! Moving-window scan engine.
//!
//! The engine walks an output region in boustrophedon order and keeps a
//! window statistic up to date as the centre moves:
//!
//! 1. **Seed**: reset the statistic and add every kernel cell around the
//!    first centre.
//! 2. **Slide**: for each unit step, remove the trailing face and add the
//!    leading face using the plan's precomputed offset lists, then emit.
//! 3. **Advance**: when the fast axis is exhausted, take one step along the
//!    next axis in the plan's order and sweep the fast axis backwards.
//!
//! Line advances are incremental too. A step whose update cost reaches the
//! kernel size re-seeds instead.
//!
//! The statistic is abstract (`WindowStatistic`) so the same loop drives
//! the rank filters and the running mean. Which in-bounds cells count is
//! decided by an `Admit` policy, which is how masks are applied.

use log::trace;
use ndarray::parallel::prelude::*;
use ndarray::{ArrayViewD, ArrayViewMutD, Axis};

use super::histogram::{RankHistogram, RankPixel};
use super::kernel::Kernel;
use super::offsets::{Direction, ScanPlan, Step};
use super::region::{slab_len, Region};
use crate::error::RankResult;

// ============================================================================
// Window Statistics
// ============================================================================

/// Running summary of the values inside the window.
pub trait WindowStatistic<T>: Send {
    fn reset(&mut self);

    fn add(&mut self, value: T);

    fn remove(&mut self, value: T);

    fn is_empty(&self) -> bool;

    /// Current result. Only called while the window is non-empty.
    fn evaluate(&mut self) -> T;
}

/// Rank query over a moving histogram.
pub struct RankStatistic<T: RankPixel> {
    histogram: T::Histogram,
    rank: f32,
}

impl<T: RankPixel> RankStatistic<T> {
    pub fn new(rank: f32) -> Self {
        Self {
            histogram: T::Histogram::default(),
            rank,
        }
    }
}

impl<T: RankPixel> WindowStatistic<T> for RankStatistic<T> {
    fn reset(&mut self) {
        self.histogram.reset();
    }

    #[inline]
    fn add(&mut self, value: T) {
        self.histogram.add(value);
    }

    #[inline]
    fn remove(&mut self, value: T) {
        self.histogram.remove(value);
    }

    fn is_empty(&self) -> bool {
        self.histogram.is_empty()
    }

    #[inline]
    fn evaluate(&mut self) -> T {
        self.histogram.rank_value(self.rank)
    }
}

// ============================================================================
// Cell Policies
// ============================================================================

/// Treatment of kernel cells that fall outside the input array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Boundary<T> {
    /// Leave them out; the window shrinks near the border.
    Shrink,
    /// Count each of them as this value.
    Extend(T),
}

impl<T> Default for Boundary<T> {
    fn default() -> Self {
        Boundary::Shrink
    }
}

/// Decides whether an in-bounds cell enters the window.
pub trait Admit: Sync {
    fn admits(&self, index: &[usize]) -> bool;
}

/// Every in-bounds cell counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdmitAll;

impl Admit for AdmitAll {
    #[inline]
    fn admits(&self, _index: &[usize]) -> bool {
        true
    }
}

/// Only cells whose mask value equals `foreground` count.
#[derive(Debug, Clone)]
pub struct MaskAdmit<'a, M> {
    mask: ArrayViewD<'a, M>,
    foreground: M,
}

impl<'a, M> MaskAdmit<'a, M> {
    pub fn new(mask: ArrayViewD<'a, M>, foreground: M) -> Self {
        Self { mask, foreground }
    }
}

impl<M: PartialEq + Sync> Admit for MaskAdmit<'_, M> {
    #[inline]
    fn admits(&self, index: &[usize]) -> bool {
        self.mask[index] == self.foreground
    }
}

// ============================================================================
// Scan Cursor
// ============================================================================

/// Position of a boustrophedon walk over a region.
///
/// `order[0]` is swept back and forth; higher levels advance by one when
/// every lower level has reached its end, after which the lower levels
/// reverse.
#[derive(Debug, Clone)]
pub struct ScanCursor {
    index: Vec<usize>,
    start: Vec<usize>,
    end: Vec<usize>,
    order: Vec<usize>,
    dirs: Vec<Direction>,
}

impl ScanCursor {
    /// Cursor on the region origin, every level heading forward.
    pub fn new(region: &Region, order: &[usize]) -> Self {
        Self {
            index: region.origin().to_vec(),
            start: region.origin().to_vec(),
            end: (0..region.ndim()).map(|axis| region.end(axis)).collect(),
            order: order.to_vec(),
            dirs: vec![Direction::Forward; order.len()],
        }
    }

    /// Current centre.
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    fn can_move(&self, level: usize) -> bool {
        let axis = self.order[level];
        match self.dirs[level] {
            Direction::Forward => self.index[axis] + 1 < self.end[axis],
            Direction::Backward => self.index[axis] > self.start[axis],
        }
    }

    /// Move to the next position, returning the unit step taken, or `None`
    /// once the whole region has been visited.
    pub fn advance(&mut self) -> Option<Step> {
        let level = (0..self.order.len()).find(|&level| self.can_move(level))?;
        let axis = self.order[level];
        let direction = self.dirs[level];
        match direction {
            Direction::Forward => self.index[axis] += 1,
            Direction::Backward => self.index[axis] -= 1,
        }
        for lower in &mut self.dirs[..level] {
            *lower = lower.reversed();
        }
        Some(Step::new(axis, direction))
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Resolves kernel cells around a centre to the values they contribute.
struct Neighbourhood<'v, 'a, T, A> {
    input: &'v ArrayViewD<'a, T>,
    boundary: &'v Boundary<T>,
    admit: &'v A,
    cell: Vec<usize>,
}

impl<T: Copy, A: Admit> Neighbourhood<'_, '_, T, A> {
    #[inline]
    fn value(&mut self, centre: &[usize], offset: &[isize]) -> Option<T> {
        let input = self.input;
        let shape = input.shape();
        for axis in 0..centre.len() {
            let i = centre[axis] as isize + offset[axis];
            if i < 0 || i as usize >= shape[axis] {
                return match *self.boundary {
                    Boundary::Extend(value) => Some(value),
                    Boundary::Shrink => None,
                };
            }
            self.cell[axis] = i as usize;
        }
        if self.admit.admits(&self.cell) {
            Some(input[self.cell.as_slice()])
        } else {
            None
        }
    }

    fn seed<S: WindowStatistic<T>>(&mut self, kernel: &Kernel, centre: &[usize], stat: &mut S) {
        stat.reset();
        for offset in kernel.offsets() {
            if let Some(value) = self.value(centre, offset) {
                stat.add(value);
            }
        }
    }
}

/// Scan `region` of `input`, calling `emit(absolute, relative, stat)` once
/// per position with the statistic describing that position's window.
/// `relative` is the index inside the region.
pub(crate) fn scan_region<T, A, S, F>(
    plan: &ScanPlan,
    input: &ArrayViewD<T>,
    boundary: &Boundary<T>,
    admit: &A,
    region: &Region,
    stat: &mut S,
    mut emit: F,
) where
    T: Copy,
    A: Admit,
    S: WindowStatistic<T>,
    F: FnMut(&[usize], &[usize], &mut S),
{
    if region.is_empty() {
        return;
    }

    let kernel = plan.kernel();
    let mut window = Neighbourhood {
        input,
        boundary,
        admit,
        cell: vec![0; input.ndim()],
    };
    let mut cursor = ScanCursor::new(region, plan.axis_order());
    let mut centre = cursor.index().to_vec();
    let mut relative = vec![0usize; region.ndim()];

    window.seed(kernel, &centre, stat);
    let mut seeds = 1usize;
    let mut slides = 0usize;
    emit(&centre, &relative, &mut *stat);

    while let Some(step) = cursor.advance() {
        let lists = plan.table().step(step);
        if lists.cost() >= kernel.len() {
            window.seed(kernel, cursor.index(), stat);
            seeds += 1;
        } else {
            // both lists are relative to the centre before the step
            for offset in lists.removed() {
                if let Some(value) = window.value(&centre, offset) {
                    stat.remove(value);
                }
            }
            for offset in lists.added() {
                if let Some(value) = window.value(&centre, offset) {
                    stat.add(value);
                }
            }
            slides += 1;
        }

        centre.copy_from_slice(cursor.index());
        for (axis, r) in relative.iter_mut().enumerate() {
            *r = centre[axis] - region.origin()[axis];
        }
        emit(&centre, &relative, &mut *stat);
    }

    trace!("scanned region {region}: {seeds} seeds, {slides} incremental steps");
}

// ============================================================================
// Executor
// ============================================================================

/// Run `work` over `output`, which covers `region`. In parallel mode the
/// output is cut into contiguous slabs along axis 0, one per rayon worker;
/// each call receives its slab and the matching sub-region.
///
/// Returns the number of slabs.
pub(crate) fn run_slabs<T, F>(
    mut output: ArrayViewMutD<T>,
    region: &Region,
    parallel: bool,
    work: F,
) -> RankResult<usize>
where
    T: Send + Sync,
    F: Fn(ArrayViewMutD<T>, Region) -> RankResult<()> + Send + Sync,
{
    let len = region.size().first().copied().unwrap_or(0);
    if !parallel || len < 2 {
        work(output, region.clone())?;
        return Ok(1);
    }

    let chunk = slab_len(len, rayon::current_num_threads());
    output
        .axis_chunks_iter_mut(Axis(0), chunk)
        .into_par_iter()
        .enumerate()
        .try_for_each(|(i, slab)| work(slab, region.slab(0, i * chunk, chunk)))?;
    Ok(len.div_ceil(chunk))
}

/// `run_slabs` for two outputs of the same shape, cut identically.
pub(crate) fn run_slab_pairs<T, M, F>(
    mut image: ArrayViewMutD<T>,
    mut mask: ArrayViewMutD<M>,
    region: &Region,
    parallel: bool,
    work: F,
) -> RankResult<usize>
where
    T: Send + Sync,
    M: Send + Sync,
    F: Fn(ArrayViewMutD<T>, ArrayViewMutD<M>, Region) -> RankResult<()> + Send + Sync,
{
    let len = region.size().first().copied().unwrap_or(0);
    if !parallel || len < 2 {
        work(image, mask, region.clone())?;
        return Ok(1);
    }

    let chunk = slab_len(len, rayon::current_num_threads());
    image
        .axis_chunks_iter_mut(Axis(0), chunk)
        .into_par_iter()
        .zip(mask.axis_chunks_iter_mut(Axis(0), chunk))
        .enumerate()
        .try_for_each(|(i, (image, mask))| work(image, mask, region.slab(0, i * chunk, chunk)))?;
    Ok(len.div_ceil(chunk))
}
