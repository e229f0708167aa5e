//! The superaccumulator: a long fixed-point number covering the full
//! binary64 exponent range, stored as overlapping 64-bit bins.
//!
//! Each bin holds a 56-bit digit plus 8 high-radix carry-save bits, so a bin
//! absorbs hundreds of additions before its carry has to be propagated — and
//! when a bin does overflow mid-stream, `accumulate_word` pushes the carry
//! into the next bin immediately without losing a bit. A full `normalize`
//! sweep reduces every bin to its canonical digit range, which makes equal
//! values byte-identical: the basis of cross-thread reproducibility.

/// High-radix carry-save bits per bin.
pub const KRX: u32 = 8;
/// Digit bits per bin.
pub const DIGITS: u32 = 64 - KRX;
/// Rescale factor between adjacent bins (2^DIGITS).
pub const DELTASCALE: f64 = (1u64 << DIGITS) as f64;
/// Bins at or above the 2^0 digit.
pub const F_WORDS: usize = 20;
/// Bins below the 2^0 digit.
pub const E_WORDS: usize = 19;
/// Total number of bins.
pub const BIN_COUNT: usize = F_WORDS + E_WORDS;
/// First bin index.
pub const IMIN: usize = 0;
/// Last bin index; carries the sign of the whole number once normalized.
pub const IMAX: usize = BIN_COUNT - 1;

/// Weight exponent of the least significant bit of bin 0: 2^(-DIGITS * F_WORDS).
const LSB_EXP: i64 = -(DIGITS as i64) * F_WORDS as i64;

/// Saturation state for non-finite summands.
///
/// Non-finite values never enter the bins; they join into this small lattice
/// instead (`PosInf ⊔ NegInf = Nan`, `Nan` absorbs everything). Rounding
/// consults the state before looking at the bins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Special {
    #[default]
    Finite,
    PosInf,
    NegInf,
    Nan,
}

impl Special {
    fn join(self, other: Self) -> Self {
        use Special::*;
        match (self, other) {
            (Finite, s) | (s, Finite) => s,
            (Nan, _) | (_, Nan) => Nan,
            (PosInf, PosInf) => PosInf,
            (NegInf, NegInf) => NegInf,
            (PosInf, NegInf) | (NegInf, PosInf) => Nan,
        }
    }

    /// Classify a non-finite value.
    fn of(x: f64) -> Self {
        if x.is_nan() {
            Special::Nan
        } else if x > 0.0 {
            Special::PosInf
        } else {
            Special::NegInf
        }
    }
}

/// Long fixed-point accumulator holding any sum of binary64 values exactly.
///
/// Bin `i` has weight `2^(DIGITS * (i - F_WORDS))`, so the 39 bins span
/// roughly [2^-1120, 2^1064) — strictly containing the binary64 range
/// including subnormals. Two normalized accumulators of equal logical value
/// (and equal `Special` state) compare equal bin-for-bin.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Superaccumulator {
    bins: [i64; BIN_COUNT],
    special: Special,
}

impl Default for Superaccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Superaccumulator {
    /// A zeroed accumulator (logical value 0).
    pub fn new() -> Self {
        Self {
            bins: [0; BIN_COUNT],
            special: Special::Finite,
        }
    }

    /// Raw bin view, the in-memory/wire format consumed by external rounding
    /// routines. Meaningful for the `Finite` state only.
    pub fn as_bins(&self) -> &[i64; BIN_COUNT] {
        &self.bins
    }

    /// Saturation state of the accumulator.
    pub fn special(&self) -> Special {
        self.special
    }

    /// Serialize the bins as little-endian two's-complement 64-bit words.
    pub fn to_le_bytes(&self) -> [u8; BIN_COUNT * 8] {
        let mut out = [0u8; BIN_COUNT * 8];
        for (i, b) in self.bins.iter().enumerate() {
            out[i * 8..(i + 1) * 8].copy_from_slice(&b.to_le_bytes());
        }
        out
    }

    /// Add a signed 64-bit word to bin `i`, propagating carry on overflow.
    ///
    /// When the bin addition overflows, the carried digits are recovered from
    /// the wrapped sum (`>> DIGITS`), cancelled out of the overflowed bin, and
    /// re-injected one bin up together with the `±2^KRX` carry bit that
    /// reinstates the weight lost to the wrap. Carry past `IMAX` is dropped:
    /// the whole accumulator saturates at its ~2^1064 capacity.
    pub fn accumulate_word(&mut self, mut i: usize, w: i64) {
        debug_assert!(i < BIN_COUNT);
        let mut carry = w;
        let mut old = self.bins[i];
        let (sum, mut overflow) = old.overflowing_add(w);
        self.bins[i] = sum;
        while overflow {
            carry = old.wrapping_add(carry) >> DIGITS;
            let carrybit = if old > 0 {
                1i64 << KRX
            } else {
                -(1i64 << KRX)
            };
            self.bins[i] = self.bins[i].wrapping_sub(carry << DIGITS);
            carry += carrybit;
            i += 1;
            if i >= BIN_COUNT {
                return;
            }
            old = self.bins[i];
            let (sum, ovf) = old.overflowing_add(carry);
            self.bins[i] = sum;
            overflow = ovf;
        }
    }

    /// Add a binary64 value exactly, splitting it by exponent into one or
    /// two bins (more while a rounded digit leaves a remainder).
    ///
    /// Zero is a no-op; non-finite values join the saturation state.
    pub fn accumulate(&mut self, x: f64) {
        if x == 0.0 {
            return;
        }
        if !x.is_finite() {
            self.special = self.special.join(Special::of(x));
            return;
        }
        let e = frexp_exponent(x);
        let exp_word = e / DIGITS as i32; // truncating division, same on both signs
        let mut i = exp_word + F_WORDS as i32;
        let mut xscaled = scale_pow2(x, -(DIGITS as i32) * exp_word);
        while xscaled != 0.0 {
            let xrounded = xscaled.round_ties_even();
            debug_assert!(i >= 0, "digit walked below bin 0");
            self.accumulate_word(i as usize, xrounded as i64);
            xscaled -= xrounded;
            xscaled *= DELTASCALE;
            i -= 1;
        }
    }

    /// Carry-propagation sweep reducing every bin below `IMAX` to its
    /// canonical `[0, 2^DIGITS)` range; the final carry folds back into the
    /// top bin, which keeps the sign of the whole number.
    ///
    /// Returns whether the accumulated value is negative. Idempotent.
    pub fn normalize(&mut self) -> bool {
        let mut carry = self.bins[IMIN] >> DIGITS;
        self.bins[IMIN] -= carry << DIGITS;
        for i in IMIN + 1..BIN_COUNT {
            self.bins[i] = self.bins[i].wrapping_add(carry);
            let c = self.bins[i] >> DIGITS;
            self.bins[i] -= c << DIGITS;
            carry = c;
        }
        self.bins[IMAX] += carry << DIGITS;
        carry < 0
    }

    /// Bin-wise addition of another accumulator into this one.
    ///
    /// Both operands must be normalized (a normalized bin is below 2^56, so
    /// the sums stay far from i64 overflow); the result may be unnormalized.
    pub fn merge_from(&mut self, other: &Self) {
        for i in IMIN..BIN_COUNT {
            self.bins[i] += other.bins[i];
        }
        self.special = self.special.join(other.special);
    }

    /// Correctly-rounded binary64 readout of the accumulated value.
    ///
    /// Round-to-nearest, ties to even, over the exact fixed-point value;
    /// overflow yields ±infinity, tiny values round through the subnormal
    /// range down to zero. The saturation state takes precedence.
    pub fn round(&self) -> f64 {
        match self.special {
            Special::PosInf => return f64::INFINITY,
            Special::NegInf => return f64::NEG_INFINITY,
            Special::Nan => return f64::NAN,
            Special::Finite => {}
        }
        let mut acc = self.clone();
        let negative = acc.normalize();

        // Sign + magnitude in base 2^DIGITS. The top digit needs headroom
        // beyond 56 bits, so it is held apart as an i128.
        let mut digits = [0u64; BIN_COUNT];
        for i in IMIN..IMAX {
            digits[i] = acc.bins[i] as u64;
        }
        let mut top = acc.bins[IMAX] as i128;
        if negative {
            // Two's-complement negation in base 2^DIGITS: invert, add one.
            let mask = (1u64 << DIGITS) - 1;
            let mut carry = 1u64;
            for d in digits[..IMAX].iter_mut() {
                let s = (!*d & mask) + carry;
                *d = s & mask;
                carry = s >> DIGITS;
            }
            top = -top - 1 + carry as i128;
        }
        debug_assert!(top >= 0);

        let digit = |i: usize| -> u128 {
            if i == IMAX {
                top as u128
            } else {
                digits[i] as u128
            }
        };

        // Locate the most significant bit (position counted from bin 0's LSB).
        let mut h = IMAX;
        while digit(h) == 0 {
            if h == IMIN {
                return 0.0;
            }
            h -= 1;
        }
        let top_bits = 128 - digit(h).leading_zeros() as usize;
        let msb = h * DIGITS as usize + top_bits - 1;
        let msb_exp = msb as i64 + LSB_EXP;

        // Round at the ulp of the result (clamped for subnormal results).
        let ulp_exp = (msb_exp - 52).max(-1074);
        let k = (ulp_exp - LSB_EXP) as usize; // bit position of the result ulp

        // Assemble the kept window [k, msb]; at most 53 bits by construction.
        let mut q: u128 = 0;
        for i in k / DIGITS as usize..=h {
            let pos = (i * DIGITS as usize) as i64 - k as i64;
            if pos >= 0 {
                q |= digit(i) << pos;
            } else {
                q |= digit(i) >> -pos;
            }
        }

        // Guard and sticky bits below the window.
        let gpos = k - 1;
        let (gd, gb) = (gpos / DIGITS as usize, gpos % DIGITS as usize);
        let guard = digit(gd) >> gb & 1 == 1;
        let mut sticky = digits[..gd.min(IMAX)].iter().any(|&d| d != 0);
        if !sticky && gb > 0 {
            sticky = digit(gd) & ((1u128 << gb) - 1) != 0;
        }

        if guard && (sticky || q & 1 == 1) {
            q += 1;
        }
        if q == 0 {
            return 0.0;
        }
        let q_msb_exp = 128 - q.leading_zeros() as i64 - 1 + ulp_exp;
        if q_msb_exp > 1023 {
            return if negative {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            };
        }
        // q < 2^54 and q * 2^ulp_exp is representable, so the scaling is exact.
        let mag = scale_pow2(q as f64, ulp_exp as i32);
        if negative {
            -mag
        } else {
            mag
        }
    }
}

/// frexp-style exponent: `x = m * 2^e` with `|m|` in [0.5, 1).
///
/// Bit-level so subnormals come out right without a libm call.
fn frexp_exponent(x: f64) -> i32 {
    let bits = x.to_bits();
    let biased = (bits >> 52 & 0x7ff) as i32;
    if biased != 0 {
        biased - 1022
    } else {
        // subnormal: exponent of the leading mantissa bit
        let mant = bits & 0x000f_ffff_ffff_ffff;
        debug_assert!(mant != 0);
        63 - mant.leading_zeros() as i32 - 1073
    }
}

/// 2^k for k in the normal-exponent range.
#[inline]
fn pow2(k: i32) -> f64 {
    debug_assert!((-1022..=1023).contains(&k));
    f64::from_bits(((k + 1023) as u64) << 52)
}

/// Exact multiplication by 2^k, |k| up to the full bin span.
///
/// Split into two factors when a single 2^k is not representable; callers
/// guarantee the result (and therefore both intermediates) stays in the
/// normal range, so every multiply is exact.
#[inline]
pub(crate) fn scale_pow2(x: f64, k: i32) -> f64 {
    if (-1022..=1023).contains(&k) {
        x * pow2(k)
    } else {
        let half = k / 2;
        x * pow2(half) * pow2(k - half)
    }
}
