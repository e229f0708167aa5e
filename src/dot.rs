//! Public entry points: exact two-operand and mostly-exact three-operand
//! dot products.
//!
//! Every variant returns a normalized superaccumulator whose bytes depend
//! only on `n` and the inputs — not on the worker count, the lane width, or
//! scheduling. `round()` on the result gives the correctly-rounded binary64
//! value of the exact sum of products.

use crate::accessor::DotInput;
use crate::fpe::FpExpansion;
use crate::kernel::{dot2_range, dot3_range, partition};
use crate::lane::{LaneBatch, NativeBatch};
use crate::parallel::{reduce_workers, thread_count};
use crate::superacc::Superaccumulator;

/// Expansion depth used by the non-generic entry points.
pub const DEFAULT_FPE: usize = 8;

/// Exact dot product `Σ xᵢ·yᵢ` over `i < n`.
///
/// `x` and `y` are slices of f64/f32 (length at least `n`, checked by the
/// slice indexing) or broadcast scalars. Worker count is chosen from the
/// available parallelism and `n`.
pub fn exdot<A: DotInput, B: DotInput>(n: usize, x: A, y: B) -> Superaccumulator {
    exdot_fpe::<A, B, DEFAULT_FPE>(n, x, y)
}

/// `exdot` with an explicit expansion depth `NBFPE` in `[3, 8]`.
///
/// Deeper caches trade per-element work for fewer superaccumulator updates.
/// The accumulated value is identical for every depth.
pub fn exdot_fpe<A: DotInput, B: DotInput, const NBFPE: usize>(
    n: usize,
    x: A,
    y: B,
) -> Superaccumulator {
    exdot_impl::<A, B, NBFPE>(n, x, y, thread_count(n))
}

/// `exdot` with an explicit worker count (any `threads ≥ 1` gives the same
/// bytes; this is the hook reproducibility tests and benchmarks use).
pub fn exdot_with_threads<A: DotInput, B: DotInput>(
    n: usize,
    x: A,
    y: B,
    threads: usize,
) -> Superaccumulator {
    exdot_impl::<A, B, DEFAULT_FPE>(n, x, y, threads.max(1))
}

/// Mostly-exact triple dot product `Σ xᵢ·wᵢ·yᵢ` over `i < n`.
///
/// Each term is rounded twice (`fl(fl(xᵢ·wᵢ)·yᵢ)`) before exact
/// accumulation; see `kernel::dot3_range` for the contract and the
/// `exact-triple` feature.
pub fn exdot3<A: DotInput, B: DotInput, C: DotInput>(
    n: usize,
    x: A,
    w: B,
    y: C,
) -> Superaccumulator {
    exdot3_fpe::<A, B, C, DEFAULT_FPE>(n, x, w, y)
}

/// `exdot3` with an explicit expansion depth `NBFPE` in `[3, 8]`.
pub fn exdot3_fpe<A: DotInput, B: DotInput, C: DotInput, const NBFPE: usize>(
    n: usize,
    x: A,
    w: B,
    y: C,
) -> Superaccumulator {
    exdot3_impl::<A, B, C, NBFPE>(n, x, w, y, thread_count(n))
}

/// `exdot3` with an explicit worker count.
pub fn exdot3_with_threads<A: DotInput, B: DotInput, C: DotInput>(
    n: usize,
    x: A,
    w: B,
    y: C,
    threads: usize,
) -> Superaccumulator {
    exdot3_impl::<A, B, C, DEFAULT_FPE>(n, x, w, y, threads.max(1))
}

fn exdot_impl<A: DotInput, B: DotInput, const NBFPE: usize>(
    n: usize,
    x: A,
    y: B,
    tnum: usize,
) -> Superaccumulator {
    let mut result = reduce_workers(tnum, |tid, tnum, acc| {
        let (l, r) = partition(n, tid, tnum, NativeBatch::WIDTH);
        let tail = (tid + 1 == tnum).then_some(n);
        let mut cache = FpExpansion::<NativeBatch, NBFPE>::new(acc);
        dot2_range(&mut cache, x, y, l, r, tail);
        cache.flush();
    });
    result.normalize();
    result
}

fn exdot3_impl<A: DotInput, B: DotInput, C: DotInput, const NBFPE: usize>(
    n: usize,
    x: A,
    w: B,
    y: C,
    tnum: usize,
) -> Superaccumulator {
    let mut result = reduce_workers(tnum, |tid, tnum, acc| {
        let (l, r) = partition(n, tid, tnum, NativeBatch::WIDTH);
        let tail = (tid + 1 == tnum).then_some(n);
        let mut cache = FpExpansion::<NativeBatch, NBFPE>::new(acc);
        dot3_range(&mut cache, x, w, y, l, r, tail);
        cache.flush();
    });
    result.normalize();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_unit_vectors() {
        let ones = [1.0; 4];
        assert_eq!(exdot(4, &ones[..], &ones[..]).round(), 4.0);
    }

    #[test]
    fn test_cancellation_survives() {
        let x = [1e16, 1.0, -1e16];
        let y = [1.0, 1.0, 1.0];
        assert_eq!(exdot(3, &x[..], &y[..]).round(), 1.0);

        let x = [1e100, 1.0, -1e100];
        assert_eq!(exdot(3, &x[..], &y[..]).round(), 1.0);
    }

    #[test]
    fn test_two_pow_53_plus_one() {
        let x = [(1u64 << 53) as f64, 1.0];
        let y = [1.0, 1.0];
        let acc = exdot(2, &x[..], &y[..]);
        // held exactly in the units bin, rounds to even on readout
        assert_eq!(acc.as_bins()[crate::superacc::F_WORDS], (1i64 << 53) + 1);
        assert_eq!(acc.round(), (1u64 << 53) as f64);
    }

    #[test]
    fn test_small_magnitudes() {
        let x = [1e-8; 1000];
        let r = exdot(1000, &x[..], &x[..]).round();
        // the decimal literals 1e-8 and 1e-13 each round on parse, so allow
        // a couple of ulps around the nominal value
        let expected: f64 = 1e-13;
        let ulps = r.to_bits().abs_diff(expected.to_bits());
        assert!(ulps <= 2, "got {r:e}, expected {expected:e} ({ulps} ulps)");
    }

    #[test]
    fn test_triple_unit() {
        let ones = [1.0, 1.0, 1.0];
        assert_eq!(exdot3(3, &ones[..], &ones[..], &ones[..]).round(), 3.0);
    }

    #[test]
    fn test_empty_input_is_all_zero() {
        let empty: [f64; 0] = [];
        let acc = exdot(0, &empty[..], &empty[..]);
        assert!(acc.as_bins().iter().all(|&b| b == 0));
        assert_eq!(acc.round(), 0.0);
    }

    #[test]
    fn test_thread_count_does_not_change_bytes() {
        let mut rng = StdRng::seed_from_u64(1234);
        for &n in &[1usize, 7, 8, 9, 63, 64, 65, 1000] {
            let xs: Vec<f64> = (0..n)
                .map(|_| rng.gen_range(-1.0f64..1.0) * 10f64.powi(rng.gen_range(-80..80)))
                .collect();
            let ys: Vec<f64> = (0..n)
                .map(|_| rng.gen_range(-1.0f64..1.0) * 10f64.powi(rng.gen_range(-80..80)))
                .collect();
            let reference = exdot_with_threads(n, &xs[..], &ys[..], 1);
            for &t in &[2usize, 3, 4, 8, 16] {
                let acc = exdot_with_threads(n, &xs[..], &ys[..], t);
                assert_eq!(
                    acc.to_le_bytes(),
                    reference.to_le_bytes(),
                    "n = {n}, threads = {t}"
                );
            }
        }
    }

    #[test]
    fn test_tail_matches_scalar_reference() {
        // ragged lengths force the partial-load path in SIMD builds
        let mut rng = StdRng::seed_from_u64(77);
        for n in [1usize, 2, 3, 5, 7, 9, 11, 15, 17, 31, 33] {
            let xs: Vec<f64> = (0..n).map(|_| rng.gen_range(-1e6..1e6)).collect();
            let ys: Vec<f64> = (0..n).map(|_| rng.gen_range(-1e6..1e6)).collect();
            let acc = exdot(n, &xs[..], &ys[..]);
            let mut reference = Superaccumulator::new();
            {
                let mut cache = FpExpansion::<f64, DEFAULT_FPE>::new(&mut reference);
                dot2_range(&mut cache, &xs[..], &ys[..], 0, n, Some(n));
                cache.flush();
            }
            reference.normalize();
            assert_eq!(acc, reference, "n = {n}");
        }
    }

    #[test]
    fn test_integer_lattice_oracle() {
        // inputs on a dyadic grid: the exact dot product fits in i128, so an
        // independent correctly-rounded reference is just an i128 sum
        let mut rng = StdRng::seed_from_u64(2024);
        for &n in &[10usize, 100, 1000] {
            let xi: Vec<i64> = (0..n).map(|_| rng.gen_range(-(1 << 26)..1 << 26)).collect();
            let yi: Vec<i64> = (0..n).map(|_| rng.gen_range(-(1 << 26)..1 << 26)).collect();
            let xs: Vec<f64> = xi.iter().map(|&v| v as f64 * 2f64.powi(-13)).collect();
            let ys: Vec<f64> = yi.iter().map(|&v| v as f64 * 2f64.powi(-14)).collect();
            let exact: i128 = xi.iter().zip(&yi).map(|(&a, &b)| a as i128 * b as i128).sum();
            let expected = exact as f64 * 2f64.powi(-27);
            assert_eq!(
                exdot(n, &xs[..], &ys[..]).round(),
                expected,
                "n = {n}"
            );
        }
    }

    #[test]
    fn test_power_of_two_scaling_is_exact() {
        let mut rng = StdRng::seed_from_u64(3);
        let n = 200;
        let xs: Vec<f64> = (0..n).map(|_| rng.gen_range(-1e10..1e10)).collect();
        let ys: Vec<f64> = (0..n).map(|_| rng.gen_range(-1e10..1e10)).collect();
        let scaled: Vec<f64> = xs.iter().map(|&v| v * 32.0).collect();
        let base = exdot(n, &xs[..], &ys[..]).round();
        let scaled_dot = exdot(n, &scaled[..], &ys[..]).round();
        assert_eq!(scaled_dot, base * 32.0);
    }

    #[test]
    fn test_permutation_invariance_of_rounded_value() {
        let mut rng = StdRng::seed_from_u64(8);
        let n = 500;
        let xs: Vec<f64> = (0..n)
            .map(|_| rng.gen_range(-1.0f64..1.0) * 10f64.powi(rng.gen_range(-100..100)))
            .collect();
        let ys: Vec<f64> = (0..n)
            .map(|_| rng.gen_range(-1.0f64..1.0) * 10f64.powi(rng.gen_range(-100..100)))
            .collect();
        let forward = exdot(n, &xs[..], &ys[..]).round();
        let rx: Vec<f64> = xs.iter().rev().copied().collect();
        let ry: Vec<f64> = ys.iter().rev().copied().collect();
        let reversed = exdot(n, &rx[..], &ry[..]).round();
        assert_eq!(forward.to_bits(), reversed.to_bits());
    }

    #[test]
    fn test_infinity_saturates() {
        let x = [1.0, f64::INFINITY, 2.0];
        let y = [3.0, 1.0, 4.0];
        assert_eq!(exdot(3, &x[..], &y[..]).round(), f64::INFINITY);
        let y = [3.0, -1.0, 4.0];
        assert_eq!(exdot(3, &x[..], &y[..]).round(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_nan_contaminates() {
        let x = [1.0, f64::NAN, 2.0];
        let y = [3.0, 1.0, 4.0];
        assert!(exdot(3, &x[..], &y[..]).round().is_nan());
        // opposing infinities are NaN as well
        let x = [f64::INFINITY, f64::INFINITY];
        let y = [1.0, -1.0];
        assert!(exdot(2, &x[..], &y[..]).round().is_nan());
    }

    #[test]
    fn test_f32_inputs_widen() {
        let xs: Vec<f32> = (1..=10).map(|i| i as f32).collect();
        let ys: Vec<f32> = (1..=10).map(|i| i as f32 * 0.5).collect();
        let r = exdot(10, &xs[..], &ys[..]).round();
        let expected: f64 = (1..=10).map(|i| (i * i) as f64 * 0.5).sum();
        assert_eq!(r, expected);
    }

    #[test]
    fn test_broadcast_scalar_operand() {
        let xs: Vec<f64> = (0..100).map(f64::from).collect();
        let r = exdot(100, &xs[..], 2.0f64).round();
        assert_eq!(r, 2.0 * 4950.0);
        // broadcast on both sides: n copies of the product
        let r = exdot(1000, 3.0f64, 0.5f64).round();
        assert_eq!(r, 1500.0);
    }

    #[test]
    fn test_fpe_depth_does_not_change_bytes() {
        let mut rng = StdRng::seed_from_u64(55);
        let n = 300;
        let xs: Vec<f64> = (0..n)
            .map(|_| rng.gen_range(-1.0f64..1.0) * 10f64.powi(rng.gen_range(-150..150)))
            .collect();
        let ys: Vec<f64> = (0..n)
            .map(|_| rng.gen_range(-1.0f64..1.0) * 10f64.powi(rng.gen_range(-150..150)))
            .collect();
        let d8 = exdot_fpe::<_, _, 8>(n, &xs[..], &ys[..]);
        let d3 = exdot_fpe::<_, _, 3>(n, &xs[..], &ys[..]);
        let d5 = exdot_fpe::<_, _, 5>(n, &xs[..], &ys[..]);
        assert_eq!(d8, d3);
        assert_eq!(d8, d5);
    }

    #[test]
    fn test_triple_threads_deterministic() {
        let mut rng = StdRng::seed_from_u64(91);
        let n = 777;
        let xs: Vec<f64> = (0..n).map(|_| rng.gen_range(-1e3..1e3)).collect();
        let ws: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..1.0)).collect();
        let ys: Vec<f64> = (0..n).map(|_| rng.gen_range(-1e3..1e3)).collect();
        let reference = exdot3_with_threads(n, &xs[..], &ws[..], &ys[..], 1);
        for &t in &[2usize, 5, 8] {
            let acc = exdot3_with_threads(n, &xs[..], &ws[..], &ys[..], t);
            assert_eq!(acc, reference, "threads = {t}");
        }
    }

    #[cfg(feature = "simd")]
    #[test]
    fn test_simd_path_matches_scalar_bytes() {
        // the entry points run 8-lane f64x8 batches in this build; a 1-lane
        // cache over the full range is the reference they must match bit
        // for bit, ragged tails included
        let mut rng = StdRng::seed_from_u64(4321);
        for &n in &[1usize, 7, 9, 17, 100, 1001] {
            let xs: Vec<f64> = (0..n)
                .map(|_| rng.gen_range(-1.0f64..1.0) * 10f64.powi(rng.gen_range(-120..120)))
                .collect();
            let ys: Vec<f64> = (0..n)
                .map(|_| rng.gen_range(-1.0f64..1.0) * 10f64.powi(rng.gen_range(-120..120)))
                .collect();
            let wide = exdot_with_threads(n, &xs[..], &ys[..], 3);
            let mut narrow = Superaccumulator::new();
            {
                let mut cache = FpExpansion::<f64, DEFAULT_FPE>::new(&mut narrow);
                dot2_range(&mut cache, &xs[..], &ys[..], 0, n, Some(n));
                cache.flush();
            }
            narrow.normalize();
            assert_eq!(wide.to_le_bytes(), narrow.to_le_bytes(), "n = {n}");
        }
    }

    #[cfg(feature = "simd")]
    #[test]
    fn test_simd_triple_matches_scalar_bytes() {
        // per-lane rounding is position-independent, so the triple kernel is
        // bit-identical across lane widths too
        let mut rng = StdRng::seed_from_u64(8765);
        for &n in &[3usize, 11, 64, 333] {
            let xs: Vec<f64> = (0..n).map(|_| rng.gen_range(-1e8..1e8)).collect();
            let ws: Vec<f64> = (0..n).map(|_| rng.gen_range(-2.0..2.0)).collect();
            let ys: Vec<f64> = (0..n).map(|_| rng.gen_range(-1e8..1e8)).collect();
            let wide = exdot3_with_threads(n, &xs[..], &ws[..], &ys[..], 3);
            let mut narrow = Superaccumulator::new();
            {
                let mut cache = FpExpansion::<f64, DEFAULT_FPE>::new(&mut narrow);
                dot3_range(&mut cache, &xs[..], &ws[..], &ys[..], 0, n, Some(n));
                cache.flush();
            }
            narrow.normalize();
            assert_eq!(wide.to_le_bytes(), narrow.to_le_bytes(), "n = {n}");
        }
    }

    #[cfg(feature = "exact-triple")]
    #[test]
    fn test_exact_triple_matches_integer_lattice() {
        // dyadic inputs big enough that fl(x·w) drops bits, so the error-free
        // decomposition is doing real work; the true sum still fits in i128
        let mut rng = StdRng::seed_from_u64(4096);
        for &n in &[10usize, 257, 1000] {
            let xi: Vec<i64> = (0..n).map(|_| rng.gen_range(-(1 << 30)..1 << 30)).collect();
            let wi: Vec<i64> = (0..n).map(|_| rng.gen_range(-(1 << 30)..1 << 30)).collect();
            let yi: Vec<i64> = (0..n).map(|_| rng.gen_range(-(1 << 30)..1 << 30)).collect();
            let xs: Vec<f64> = xi.iter().map(|&v| v as f64 * 2f64.powi(-10)).collect();
            let ws: Vec<f64> = wi.iter().map(|&v| v as f64 * 2f64.powi(-12)).collect();
            let ys: Vec<f64> = yi.iter().map(|&v| v as f64 * 2f64.powi(-8)).collect();
            let exact: i128 = xi
                .iter()
                .zip(&wi)
                .zip(&yi)
                .map(|((&a, &b), &c)| a as i128 * b as i128 * c as i128)
                .sum();
            let expected = exact as f64 * 2f64.powi(-30);
            assert_eq!(
                exdot3(n, &xs[..], &ws[..], &ys[..]).round(),
                expected,
                "n = {n}"
            );
        }
    }

    #[cfg(feature = "exact-triple")]
    #[test]
    fn test_exact_triple_keeps_bits_the_rounded_kernel_drops() {
        // fl((1+u)²) loses the u² term; pair that element with one that
        // cancels the rounded value exactly, so everything the once-rounded
        // kernel produces sums to nothing and only the kept error term remains
        let u = 2f64.powi(-30);
        let q = (1.0 + u) * (1.0 + u); // fl((1+u)²) = 1 + 2⁻²⁹
        let xs = [1.0 + u, q];
        let ws = [1.0 + u, 1.0];
        let ys = [1.0, -1.0];
        let rounded_sum: f64 = xs
            .iter()
            .zip(&ws)
            .zip(&ys)
            .map(|((&x, &w), &y)| x * w * y)
            .sum();
        assert_eq!(rounded_sum, 0.0);
        let acc = exdot3(2, &xs[..], &ws[..], &ys[..]);
        assert_eq!(acc.round(), 2f64.powi(-60));
    }
}
