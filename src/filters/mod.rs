//! Moving-histogram filters for N-dimensional arrays.
//!
//! ## Supported Pixel Types
//!
//! | Type | Histogram | Notes |
//! |------|-----------|-------|
//! | `u8`, `i8`, `bool` | counting table | O(1) add/remove |
//! | `u16`, `i16`, `u32`, `i32`, `u64`, `i64` | ordered map | |
//! | `f32`, `f64` | ordered map | NaN sorts above every number |
//!
//! The histogram strategy is fixed per pixel type at compile time.
//!
//! ## Architecture
//!
//! Leaves first:
//! - **kernel** - structuring elements (box, ellipsoid, line, mask, offset list)
//! - **offsets** - cells entering and leaving the window per unit step, axis costs, scan plan
//! - **histogram** - counting table and ordered map with cursor rank queries
//! - **scan** - boustrophedon engine, border and mask policies, slab executor
//! - **region** - index regions and required-input computation
//!
//! ## Filters
//!
//! - **rank**: exact rank / median / min / max over any kernel
//! - **masked**: rank over mask foreground, restricted or hole filling
//! - **separable**: per-axis chain of line filters, optionally masked
//! - **mean**: moving mean over any kernel

pub mod histogram;
pub mod kernel;
pub mod masked;
pub mod mean;
pub mod offsets;
pub mod rank;
pub mod region;
pub mod scan;
pub mod separable;
