//! Offset planning for one-pixel window translations.
//!
//! When the window centre moves by one unit along an axis, only the cells
//! on the leading face enter and only the cells on the trailing face
//! leave. For a step `s` and kernel `K`, with offsets relative to the
//! centre before the move:
//!
//! - `added(s)   = (K + s) \ K`
//! - `removed(s) = K \ (K + s)`
//!
//! so `(K ∪ added(s)) \ removed(s) == K + s`. Both lists are computed once
//! per kernel for each of the `2 * ndim` unit steps and stored in a flat
//! table indexed by `(axis, direction)`.

use std::cmp::Ordering;

use log::debug;

use super::kernel::{Kernel, Offset};

/// Direction of travel along an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn sign(self) -> isize {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// A unit translation of the window centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Step {
    pub axis: usize,
    pub direction: Direction,
}

impl Step {
    pub fn new(axis: usize, direction: Direction) -> Self {
        Self { axis, direction }
    }

    /// The step as a full offset vector.
    pub fn to_offset(self, ndim: usize) -> Offset {
        let mut offset = vec![0isize; ndim];
        offset[self.axis] = self.direction.sign();
        offset
    }
}

/// Cells entering and leaving the window for one unit step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOffsets {
    added: Vec<Offset>,
    removed: Vec<Offset>,
}

impl StepOffsets {
    fn between(kernel: &Kernel, step: Step) -> Self {
        let s = step.to_offset(kernel.ndim());
        let shift = |offset: &Offset, sign: isize| -> Offset {
            offset.iter().zip(&s).map(|(&o, &d)| o + sign * d).collect()
        };

        // o in K + s  <=>  o - s in K
        let added = kernel
            .offsets()
            .iter()
            .map(|o| shift(o, 1))
            .filter(|o| !kernel.contains(o))
            .collect();
        let removed = kernel
            .offsets()
            .iter()
            .filter(|o| !kernel.contains(&shift(o, -1)))
            .cloned()
            .collect();

        Self { added, removed }
    }

    /// Offsets entering the window, relative to the centre before the step.
    pub fn added(&self) -> &[Offset] {
        &self.added
    }

    /// Offsets leaving the window, relative to the centre before the step.
    pub fn removed(&self) -> &[Offset] {
        &self.removed
    }

    /// Histogram updates needed for this step.
    pub fn cost(&self) -> usize {
        self.added.len() + self.removed.len()
    }
}

/// Added/removed lists for all `2 * ndim` unit steps of one kernel.
///
/// Immutable after construction and shared read-only between workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetTable {
    ndim: usize,
    steps: Vec<StepOffsets>,
}

impl OffsetTable {
    pub fn new(kernel: &Kernel) -> Self {
        let ndim = kernel.ndim();
        let mut steps = Vec::with_capacity(2 * ndim);
        for axis in 0..ndim {
            steps.push(StepOffsets::between(kernel, Step::new(axis, Direction::Forward)));
            steps.push(StepOffsets::between(kernel, Step::new(axis, Direction::Backward)));
        }
        Self { ndim, steps }
    }

    pub fn ndim(&self) -> usize {
        self.ndim
    }

    #[inline]
    pub fn step(&self, step: Step) -> &StepOffsets {
        let slot = match step.direction {
            Direction::Forward => 0,
            Direction::Backward => 1,
        };
        &self.steps[2 * step.axis + slot]
    }

    /// Cost of stepping along `axis` (same in both directions).
    pub fn axis_cost(&self, axis: usize) -> DirectionCost {
        DirectionCost {
            axis,
            count: self.step(Step::new(axis, Direction::Forward)).cost(),
        }
    }
}

/// Update cost of moving along one axis. Ordered so that the cheaper axis
/// compares lower; equal counts fall back to the lower axis index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionCost {
    pub axis: usize,
    pub count: usize,
}

impl Ord for DirectionCost {
    fn cmp(&self, other: &Self) -> Ordering {
        self.count
            .cmp(&other.count)
            .then_with(|| self.axis.cmp(&other.axis))
    }
}

impl PartialOrd for DirectionCost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cheapest axis among `candidates`, if any.
pub fn best_direction(table: &OffsetTable, candidates: &[usize]) -> Option<DirectionCost> {
    candidates.iter().map(|&axis| table.axis_cost(axis)).min()
}

/// All axes from cheapest to most expensive. The first entry is the fast
/// axis swept within a line; the rest advance between lines, innermost
/// first.
pub fn axis_order(table: &OffsetTable) -> Vec<usize> {
    let mut remaining: Vec<usize> = (0..table.ndim()).collect();
    let mut order = Vec::with_capacity(remaining.len());
    while let Some(best) = best_direction(table, &remaining) {
        order.push(best.axis);
        remaining.retain(|&axis| axis != best.axis);
    }
    order
}

/// Everything a scan needs that depends only on the kernel: the kernel
/// itself, its offset table and the axis order. Built once per filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPlan {
    kernel: Kernel,
    table: OffsetTable,
    order: Vec<usize>,
}

impl ScanPlan {
    pub fn new(kernel: Kernel) -> Self {
        let table = OffsetTable::new(&kernel);
        let order = axis_order(&table);
        let plan = Self {
            kernel,
            table,
            order,
        };
        debug!(
            "scan plan: {} cells, radius {:?}, axis order {:?}, {} pixels per translation",
            plan.kernel.len(),
            plan.kernel.radius(),
            plan.order,
            plan.pixels_per_translation()
        );
        plan
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn table(&self) -> &OffsetTable {
        &self.table
    }

    pub fn axis_order(&self) -> &[usize] {
        &self.order
    }

    /// Histogram updates per step along the fast axis.
    pub fn pixels_per_translation(&self) -> usize {
        self.order
            .first()
            .map(|&axis| self.table.axis_cost(axis).count)
            .unwrap_or(0)
    }
}
