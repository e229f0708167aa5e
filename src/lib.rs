// Numeric kernels use index loops on bin arrays where iterators hurt readability.
#![allow(clippy::needless_range_loop)]

//! # exdot
//!
//! Bitwise-reproducible, rounding-error-free dot products for binary64
//! vectors on shared-memory multiprocessors.
//!
//! `exdot(n, x, y)` accumulates every product `xᵢ·yᵢ` exactly into a long
//! fixed-point **superaccumulator** — 39 overlapping 64-bit bins spanning
//! the whole binary64 exponent range — so the result carries no rounding
//! error at all, and two runs with the same inputs produce byte-identical
//! accumulators regardless of thread count, scheduling, lane width, or
//! reduction order. `round()` on the result is the correctly-rounded
//! binary64 value of the exact sum.
//!
//! The pipeline, leaves first:
//!
//! - **[`superacc`]**: the superaccumulator — exact fixed-point addition,
//!   carry-save overflow handling, canonical normalization, bin-wise merge,
//!   correctly-rounded readout.
//! - **[`fpe`]**: a per-worker floating-point-expansion cache that coalesces
//!   summands through error-free TwoSum cascades before touching the bins.
//! - **[`lane`] / [`simd`]**: the batch abstraction the kernels iterate
//!   over — plain `f64` always, `f64x8` with `--features simd` (nightly
//!   portable SIMD). Both backings produce identical bytes.
//! - **[`kernel`]**: per-worker range iteration, TwoProductFMA emission,
//!   batch-aligned partitioning with a zero-filled tail.
//! - **[`parallel`]**: scoped worker spawn and the lock-free deterministic
//!   tree reduction over per-thread readiness counters.
//!
//! ## Example
//!
//! ```
//! use exdot::exdot;
//!
//! // catastrophic cancellation is a non-event
//! let x = [1e100, 1.0, -1e100];
//! let y = [1.0, 1.0, 1.0];
//! assert_eq!(exdot(3, &x[..], &y[..]).round(), 1.0);
//!
//! // a scalar broadcasts across all iterations
//! let r = exdot(3, &x[..], 2.0f64);
//! assert_eq!(r.round(), 2.0);
//! ```
//!
//! ## Features
//!
//! - `simd`: 8-lane `f64x8` kernels via `portable_simd` (requires nightly).
//! - `exact-triple`: fully error-free three-operand kernel instead of the
//!   default once-rounded-per-fma form.

#![cfg_attr(feature = "simd", feature(portable_simd))]

pub mod accessor;
pub mod dot;
pub mod fpe;
pub mod kernel;
pub mod lane;
pub mod parallel;
#[cfg(feature = "simd")]
pub mod simd;
pub mod superacc;

pub use accessor::DotInput;
pub use dot::{
    exdot, exdot3, exdot3_fpe, exdot3_with_threads, exdot_fpe, exdot_with_threads, DEFAULT_FPE,
};
pub use fpe::{two_product_fma, two_sum, FpExpansion};
pub use lane::{LaneBatch, NativeBatch};
pub use superacc::{Special, Superaccumulator, BIN_COUNT, IMAX, IMIN};
