//! Moving histograms with cursor-based rank extraction.
//!
//! Two strategies share the `RankHistogram` interface:
//!
//! | Strategy | Backing | add/remove | Used for |
//! |----------|---------|------------|----------|
//! | `TableHistogram` | dense count per representable value | O(1) | `u8`, `i8`, `bool` |
//! | `MapHistogram` | `BTreeMap` value -> count | O(log n) | every other pixel type |
//!
//! The strategy is fixed per pixel type through `RankPixel::Histogram`, so
//! the choice is made at compile time and inlined into the scan loop.
//!
//! ## Rank Query
//!
//! For `n` entries and rank `r` the target position is
//! `floor(r * (n - 1)) + 1` (1-based, clamped to `1..=n`). The answer is the
//! smallest value whose cumulative count reaches the target, so a median
//! over an even count returns the lower of the two central values.
//!
//! Both strategies keep a cursor on the last answer together with the
//! number of entries at or below it. Consecutive windows differ by a few
//! cells, so the cursor usually moves a short distance per query.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Bound;

/// Multiset of the values currently inside the window.
pub trait RankHistogram<T>: Clone + Send {
    /// Strategy name, for logs.
    const STRATEGY: &'static str;

    /// Drop every entry.
    fn reset(&mut self);

    fn add(&mut self, value: T);

    /// Remove one occurrence of `value`, which must have been added before.
    fn remove(&mut self, value: T);

    /// Number of entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `rank` in `[0, 1]`.
    ///
    /// # Panics
    /// If the histogram is empty.
    fn rank_value(&mut self, rank: f32) -> T;
}

/// 1-based cumulative count the rank query must reach.
#[inline]
pub fn rank_target(rank: f32, entries: usize) -> usize {
    debug_assert!(entries > 0);
    // single precision, so decimal ranks such as 0.7 land on whole positions
    let position = (rank * (entries - 1) as f32).floor() as usize + 1;
    position.clamp(1, entries)
}

// ============================================================================
// Pixel Types
// ============================================================================

/// Pixel types a rank filter can run on.
pub trait RankPixel: Copy + PartialEq + Send + Sync + fmt::Debug + 'static {
    /// Histogram strategy for this type.
    type Histogram: RankHistogram<Self> + Default;

    /// Total order used by the ordered-map histogram. Floats order NaN
    /// after every finite value.
    fn total_cmp(&self, other: &Self) -> Ordering;

    fn to_f64(self) -> f64;

    /// Convert back, rounding and saturating for integers.
    fn from_f64(value: f64) -> Self;
}

/// Small value domains that fit a dense counting table.
pub trait TableValue: Copy {
    /// Number of representable values.
    const BINS: usize;

    fn to_bin(self) -> usize;

    fn from_bin(bin: usize) -> Self;
}

impl TableValue for u8 {
    const BINS: usize = 256;

    #[inline]
    fn to_bin(self) -> usize {
        self as usize
    }

    #[inline]
    fn from_bin(bin: usize) -> Self {
        bin as u8
    }
}

impl TableValue for i8 {
    const BINS: usize = 256;

    #[inline]
    fn to_bin(self) -> usize {
        (self as i16 - i8::MIN as i16) as usize
    }

    #[inline]
    fn from_bin(bin: usize) -> Self {
        (bin as i16 + i8::MIN as i16) as i8
    }
}

impl TableValue for bool {
    const BINS: usize = 2;

    #[inline]
    fn to_bin(self) -> usize {
        self as usize
    }

    #[inline]
    fn from_bin(bin: usize) -> Self {
        bin != 0
    }
}

macro_rules! table_pixel {
    ($($t:ty),*) => {$(
        impl RankPixel for $t {
            type Histogram = TableHistogram<$t>;

            fn total_cmp(&self, other: &Self) -> Ordering {
                self.cmp(other)
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(value: f64) -> Self {
                value.round() as $t
            }
        }
    )*};
}

macro_rules! map_int_pixel {
    ($($t:ty),*) => {$(
        impl RankPixel for $t {
            type Histogram = MapHistogram<$t>;

            fn total_cmp(&self, other: &Self) -> Ordering {
                self.cmp(other)
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(value: f64) -> Self {
                value.round() as $t
            }
        }
    )*};
}

macro_rules! map_float_pixel {
    ($($t:ty),*) => {$(
        impl RankPixel for $t {
            type Histogram = MapHistogram<$t>;

            fn total_cmp(&self, other: &Self) -> Ordering {
                <$t>::total_cmp(self, other)
            }

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn from_f64(value: f64) -> Self {
                value as $t
            }
        }
    )*};
}

table_pixel!(u8, i8);
map_int_pixel!(u16, i16, u32, i32, u64, i64);
map_float_pixel!(f32, f64);

impl RankPixel for bool {
    type Histogram = TableHistogram<bool>;

    fn total_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn to_f64(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }

    fn from_f64(value: f64) -> Self {
        value >= 0.5
    }
}

// ============================================================================
// Counting Table
// ============================================================================

/// Dense histogram over every representable value of a small type.
#[derive(Debug, Clone)]
pub struct TableHistogram<T> {
    counts: Vec<usize>,
    cursor: usize,
    /// Entries with bin <= cursor.
    below: usize,
    entries: usize,
    _value: PhantomData<fn() -> T>,
}

impl<T: TableValue> Default for TableHistogram<T> {
    fn default() -> Self {
        Self {
            counts: vec![0; T::BINS],
            cursor: 0,
            below: 0,
            entries: 0,
            _value: PhantomData,
        }
    }
}

impl<T: TableValue> RankHistogram<T> for TableHistogram<T> {
    const STRATEGY: &'static str = "counting table";

    fn reset(&mut self) {
        self.counts.fill(0);
        self.cursor = 0;
        self.below = 0;
        self.entries = 0;
    }

    #[inline]
    fn add(&mut self, value: T) {
        let bin = value.to_bin();
        self.counts[bin] += 1;
        self.entries += 1;
        if bin <= self.cursor {
            self.below += 1;
        }
    }

    #[inline]
    fn remove(&mut self, value: T) {
        let bin = value.to_bin();
        debug_assert!(self.counts[bin] > 0, "removing a value that is not in the histogram");
        self.counts[bin] -= 1;
        self.entries -= 1;
        if bin <= self.cursor {
            self.below -= 1;
        }
    }

    fn len(&self) -> usize {
        self.entries
    }

    fn rank_value(&mut self, rank: f32) -> T {
        assert!(self.entries > 0, "rank query on an empty histogram");
        let target = rank_target(rank, self.entries);

        if self.below < target {
            while self.below < target {
                self.cursor += 1;
                self.below += self.counts[self.cursor];
            }
        } else {
            // step down while the bins below the cursor still reach the target
            while self.cursor > 0 && self.below - self.counts[self.cursor] >= target {
                self.below -= self.counts[self.cursor];
                self.cursor -= 1;
            }
        }

        T::from_bin(self.cursor)
    }
}

// ============================================================================
// Ordered Map
// ============================================================================

/// Map key ordering pixels by `RankPixel::total_cmp`.
#[derive(Debug, Clone, Copy)]
pub struct Ordered<T>(pub T);

impl<T: RankPixel> PartialEq for Ordered<T> {
    fn eq(&self, other: &Self) -> bool {
        RankPixel::total_cmp(&self.0, &other.0) == Ordering::Equal
    }
}

impl<T: RankPixel> Eq for Ordered<T> {}

impl<T: RankPixel> PartialOrd for Ordered<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: RankPixel> Ord for Ordered<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        RankPixel::total_cmp(&self.0, &other.0)
    }
}

/// Zero-count keys tolerated beyond the live entry count before a prune.
const STALE_SLACK: usize = 64;

/// Sparse histogram for any totally ordered pixel type.
///
/// Values whose count drops to zero stay in the map until the next rank
/// query prunes them, or until more of them pile up than live entries.
#[derive(Debug, Clone)]
pub struct MapHistogram<T> {
    counts: BTreeMap<Ordered<T>, usize>,
    stale: Vec<Ordered<T>>,
    cursor: Option<Ordered<T>>,
    /// Entries with key <= cursor.
    below: usize,
    entries: usize,
}

impl<T> Default for MapHistogram<T> {
    fn default() -> Self {
        Self {
            counts: BTreeMap::new(),
            stale: Vec::new(),
            cursor: None,
            below: 0,
            entries: 0,
        }
    }
}

impl<T: RankPixel> MapHistogram<T> {
    /// Number of distinct values held, including zero-count ones not yet
    /// pruned.
    #[cfg(test)]
    fn distinct(&self) -> usize {
        self.counts.len()
    }

    fn at_or_below_cursor(&self, key: &Ordered<T>) -> bool {
        self.cursor.as_ref().is_some_and(|cursor| key <= cursor)
    }

    fn prune(&mut self) {
        for key in self.stale.drain(..) {
            if self.counts.get(&key) == Some(&0) {
                self.counts.remove(&key);
            }
        }
    }
}

impl<T: RankPixel> RankHistogram<T> for MapHistogram<T> {
    const STRATEGY: &'static str = "ordered map";

    fn reset(&mut self) {
        self.counts.clear();
        self.stale.clear();
        self.cursor = None;
        self.below = 0;
        self.entries = 0;
    }

    #[inline]
    fn add(&mut self, value: T) {
        let key = Ordered(value);
        *self.counts.entry(key).or_insert(0) += 1;
        self.entries += 1;
        if self.at_or_below_cursor(&key) {
            self.below += 1;
        }
    }

    #[inline]
    fn remove(&mut self, value: T) {
        let key = Ordered(value);
        match self.counts.get_mut(&key) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    self.stale.push(key);
                }
                if self.stale.len() > self.entries + STALE_SLACK {
                    self.prune();
                }
            }
            _ => panic!("removing {value:?} which is not in the histogram"),
        }
        self.entries -= 1;
        if self.at_or_below_cursor(&key) {
            self.below -= 1;
        }
    }

    fn len(&self) -> usize {
        self.entries
    }

    fn rank_value(&mut self, rank: f32) -> T {
        assert!(self.entries > 0, "rank query on an empty histogram");
        self.prune();
        let target = rank_target(rank, self.entries);

        if self.below < target {
            let lower = match self.cursor {
                Some(cursor) => Bound::Excluded(cursor),
                None => Bound::Unbounded,
            };
            for (&key, &count) in self.counts.range((lower, Bound::Unbounded)) {
                self.below += count;
                self.cursor = Some(key);
                if self.below >= target {
                    break;
                }
            }
        } else {
            while let Some(cursor) = self.cursor {
                let here = self.counts.get(&cursor).copied().unwrap_or(0);
                if self.below - here < target {
                    break;
                }
                self.below -= here;
                self.cursor = self.counts.range(..cursor).next_back().map(|(&key, _)| key);
            }
        }

        match self.cursor {
            Some(Ordered(value)) => value,
            None => unreachable!("non-empty histogram always has a rank position"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sorted pick with the rank read as a decimal fraction in millionths.
    fn brute_rank<T: RankPixel>(values: &[T], rank: f32) -> T {
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let millionths = (rank as f64 * 1e6).round() as usize;
        sorted[millionths * (sorted.len() - 1) / 1_000_000]
    }

    fn check_sliding<T: RankPixel>(data: &[T], width: usize, rank: f32) {
        let mut hist = T::Histogram::default();
        for &v in &data[..width] {
            hist.add(v);
        }
        assert_eq!(hist.rank_value(rank), brute_rank(&data[..width], rank));
        for start in 1..=data.len() - width {
            hist.remove(data[start - 1]);
            hist.add(data[start + width - 1]);
            let window = &data[start..start + width];
            assert_eq!(hist.rank_value(rank), brute_rank(window, rank), "window {window:?}");
        }
    }

    #[test]
    fn test_rank_target() {
        assert_eq!(rank_target(0.5, 1), 1);
        assert_eq!(rank_target(1.0, 1), 1);
        assert_eq!(rank_target(0.0, 5), 1);
        assert_eq!(rank_target(0.5, 5), 3);
        assert_eq!(rank_target(0.5, 4), 2);
        assert_eq!(rank_target(1.0, 4), 4);
        assert_eq!(rank_target(0.75, 5), 4);
    }

    #[test]
    fn test_rank_target_decimal_ranks() {
        // 0.7 * 10 = 7 and 0.9 * 10 = 9 exactly in decimal
        assert_eq!(rank_target(0.7, 11), 8);
        assert_eq!(rank_target(0.9, 11), 10);
        assert_eq!(rank_target(0.3, 11), 4);
        assert_eq!(rank_target(0.6, 11), 7);
        assert_eq!(rank_target(0.1, 11), 2);
        assert_eq!(rank_target(0.35, 21), 8);
        assert_eq!(rank_target(0.7, 21), 15);
        assert_eq!(rank_target(0.9, 21), 19);
        assert_eq!(rank_target(0.2, 6), 2);
    }

    #[test]
    fn test_decimal_ranks_pick_whole_positions() {
        let mut table = TableHistogram::<u8>::default();
        let mut map = MapHistogram::<i64>::default();
        for v in 0..=10 {
            table.add(v as u8);
            map.add(v);
        }
        assert_eq!(table.rank_value(0.7), 7);
        assert_eq!(table.rank_value(0.9), 9);
        assert_eq!(map.rank_value(0.7), 7);
        assert_eq!(map.rank_value(0.9), 9);
    }

    #[test]
    fn test_table_histogram_median_tie_takes_lower() {
        let mut hist = TableHistogram::<u8>::default();
        hist.add(10);
        hist.add(20);
        assert_eq!(hist.rank_value(0.5), 10);
        assert_eq!(hist.rank_value(1.0), 20);
        assert_eq!(hist.rank_value(0.0), 10);
    }

    #[test]
    fn test_table_histogram_cursor_walks_both_ways() {
        let mut hist = TableHistogram::<u8>::default();
        for v in [5, 1, 4] {
            hist.add(v);
        }
        assert_eq!(hist.rank_value(0.5), 4);
        hist.remove(5);
        hist.add(2);
        assert_eq!(hist.rank_value(0.5), 2);
        hist.remove(1);
        hist.add(8);
        assert_eq!(hist.rank_value(0.5), 4);
        hist.remove(4);
        assert_eq!(hist.rank_value(0.5), 2);
        assert_eq!(hist.rank_value(1.0), 8);
        assert_eq!(hist.rank_value(0.0), 2);
    }

    #[test]
    fn test_table_histogram_signed_and_bool() {
        let mut hist = TableHistogram::<i8>::default();
        for v in [-128, 127, -3, 0] {
            hist.add(v);
        }
        assert_eq!(hist.rank_value(0.0), -128);
        assert_eq!(hist.rank_value(0.5), -3);
        assert_eq!(hist.rank_value(1.0), 127);

        let mut hist = TableHistogram::<bool>::default();
        hist.add(true);
        hist.add(false);
        hist.add(true);
        assert!(hist.rank_value(0.5));
        assert!(!hist.rank_value(0.0));
    }

    #[test]
    fn test_map_histogram_prunes_lazily() {
        let mut hist = MapHistogram::<f32>::default();
        hist.add(1.5);
        hist.add(-2.0);
        hist.add(7.25);
        assert_eq!(hist.rank_value(0.5), 1.5);
        hist.remove(-2.0);
        assert_eq!(hist.distinct(), 3);
        assert_eq!(hist.rank_value(0.0), 1.5);
        assert_eq!(hist.distinct(), 2);
        hist.add(-2.0);
        assert_eq!(hist.rank_value(0.0), -2.0);
    }

    #[test]
    fn test_map_histogram_bounded_without_queries() {
        let mut hist = MapHistogram::<u32>::default();
        hist.add(0);
        for v in 1..10_000 {
            hist.add(v);
            hist.remove(v - 1);
            assert!(hist.distinct() <= 2 + STALE_SLACK + 1);
        }
        assert_eq!(hist.len(), 1);
        assert_eq!(hist.rank_value(0.5), 9_999);
    }

    #[test]
    fn test_single_entry_answers_every_rank() {
        let mut table = TableHistogram::<u8>::default();
        table.add(42);
        let mut map = MapHistogram::<i32>::default();
        map.add(-42);
        for rank in [0.0, 0.25, 0.5, 1.0] {
            assert_eq!(table.rank_value(rank), 42);
            assert_eq!(map.rank_value(rank), -42);
        }
    }

    #[test]
    fn test_reset_empties() {
        let mut hist = MapHistogram::<u16>::default();
        hist.add(3);
        hist.rank_value(0.5);
        hist.reset();
        assert!(hist.is_empty());
        hist.add(9);
        assert_eq!(hist.rank_value(0.5), 9);

        let mut hist = TableHistogram::<u8>::default();
        hist.add(200);
        hist.rank_value(1.0);
        hist.reset();
        hist.add(3);
        assert_eq!(hist.rank_value(0.0), 3);
    }

    #[test]
    #[should_panic(expected = "empty histogram")]
    fn test_empty_query_panics() {
        let mut hist = TableHistogram::<u8>::default();
        hist.rank_value(0.5);
    }

    #[test]
    fn test_sliding_matches_sort() {
        let data: Vec<u8> = (0..200u32).map(|i| ((i * 37 + 11) % 97) as u8).collect();
        for rank in [0.0, 0.3, 0.5, 0.7, 0.9, 1.0] {
            check_sliding(&data, 7, rank);
            check_sliding(&data, 11, rank);
            check_sliding(&data, 8, rank);
        }

        let data: Vec<f64> = (0..150u32)
            .map(|i| ((i * 53 + 7) % 41) as f64 * 0.5 - 8.0)
            .collect();
        for rank in [0.0, 0.5, 0.66, 1.0] {
            check_sliding(&data, 9, rank);
        }

        let data: Vec<i8> = (0..120i32).map(|i| ((i * 71) % 255 - 127) as i8).collect();
        check_sliding(&data, 5, 0.5);
    }

    #[test]
    fn test_order_independence() {
        let values = [9u16, 3, 3, 500, 42, 7, 7, 7, 1000];
        let mut forward = MapHistogram::<u16>::default();
        let mut backward = MapHistogram::<u16>::default();
        for &v in &values {
            forward.add(v);
        }
        for &v in values.iter().rev() {
            backward.add(v);
            backward.add(1);
        }
        for _ in &values {
            backward.remove(1);
        }
        for rank in [0.0, 0.2, 0.5, 0.8, 1.0] {
            assert_eq!(forward.rank_value(rank), backward.rank_value(rank));
        }
    }

    #[test]
    fn test_from_f64_saturates() {
        assert_eq!(u8::from_f64(300.0), 255);
        assert_eq!(u8::from_f64(-4.0), 0);
        assert_eq!(i16::from_f64(2.5), 3);
        assert!(bool::from_f64(0.75));
        assert_eq!(f32::from_f64(0.25), 0.25);
    }
}
