//! Wei / ETH / MNT conversions.
//!
//! MNT values are display approximations, not ledger amounts. Wei stays a
//! 256-bit integer end to end. The rate is an `f64`, which is exactly
//! `mantissa * 2^exponent`, so conversions are done on that rational in
//! 512-bit integer arithmetic and only fall back to floats past 256 bits.

use primitive_types::{U256, U512};

use crate::error::{AmountError, RateError};

pub const ETH_DECIMALS: usize = 18;

/// Used when no rate is configured.
pub const DEFAULT_MNT_PER_ETH: f64 = 6_000_000.0;

pub fn wei_per_eth() -> U256 {
    U256::exp10(ETH_DECIMALS)
}

/// Tögrög per ether. Always finite and positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MntRate(f64);

impl MntRate {
    pub fn new(mnt_per_eth: f64) -> Result<Self, RateError> {
        if !mnt_per_eth.is_finite() {
            return Err(RateError::NotFinite(mnt_per_eth));
        }
        if mnt_per_eth <= 0.0 {
            return Err(RateError::NotPositive(mnt_per_eth));
        }
        Ok(Self(mnt_per_eth))
    }

    pub fn get(&self) -> f64 {
        self.0
    }

    /// The rate as `(mantissa, exponent)` with `rate == mantissa * 2^exponent`.
    fn parts(&self) -> (u64, i32) {
        let bits = self.0.to_bits();
        let biased = ((bits >> 52) & 0x7ff) as i32;
        let fraction = bits & ((1u64 << 52) - 1);
        if biased == 0 {
            (fraction, -1074)
        } else {
            (fraction | (1u64 << 52), biased - 1075)
        }
    }
}

impl Default for MntRate {
    fn default() -> Self {
        Self(DEFAULT_MNT_PER_ETH)
    }
}

/// `floor(wei / 1e18 * rate)`.
pub fn wei_to_mnt(wei: U256, rate: MntRate) -> U256 {
    if wei.is_zero() {
        return U256::zero();
    }
    let (mantissa, exponent) = rate.parts();
    let product = wei.full_mul(U256::from(mantissa));
    let divisor = U512::from(wei_per_eth());

    let exact = if exponent >= 0 {
        shl_checked(product, exponent as usize).map(|n| n / divisor)
    } else {
        Some((product / divisor) >> (-exponent) as usize)
    };

    match exact.and_then(|mnt| U256::try_from(mnt).ok()) {
        Some(mnt) => mnt,
        None => u256_from_f64_floor(wei_to_eth(wei) * rate.get()),
    }
}

/// Wei needed to cover `mnt` tögrög at `rate`, rounded down.
pub fn mnt_to_wei(mnt: u64, rate: MntRate) -> U256 {
    let (mantissa, exponent) = rate.parts();
    let numerator = U256::from(mnt).full_mul(wei_per_eth());
    let mantissa = U512::from(mantissa);

    let exact = if exponent >= 0 {
        Some((numerator / mantissa) >> exponent as usize)
    } else {
        shl_checked(numerator, (-exponent) as usize).map(|n| n / mantissa)
    };

    match exact.and_then(|wei| U256::try_from(wei).ok()) {
        Some(wei) => wei,
        None => u256_from_f64_floor(mnt as f64 / rate.get() * 1e18),
    }
}

fn shl_checked(value: U512, shift: usize) -> Option<U512> {
    if value.bits() + shift > 512 {
        return None;
    }
    Some(value << shift)
}

/// Lossy ether value for display and percentages.
pub fn wei_to_eth(wei: U256) -> f64 {
    let whole = wei / wei_per_eth();
    let frac = (wei % wei_per_eth()).low_u64();
    u256_to_f64(whole) + frac as f64 / 1e18
}

/// Exact decimal ether string with trailing zeros trimmed: `1500000000000000000` -> `"1.5"`.
pub fn format_eth(wei: U256) -> String {
    let whole = wei / wei_per_eth();
    let frac = (wei % wei_per_eth()).low_u64();
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:018}", frac);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Parses a user-entered ether amount such as `"0.25"` into wei.
pub fn parse_eth(input: &str) -> Result<U256, AmountError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(AmountError::Empty);
    }

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(AmountError::Invalid(s.to_string()));
    }
    let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if !all_digits(whole) || !all_digits(frac) {
        return Err(AmountError::Invalid(s.to_string()));
    }
    if frac.len() > ETH_DECIMALS {
        return Err(AmountError::TooPrecise);
    }

    let whole = if whole.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(whole).map_err(|_| AmountError::Overflow)?
    };
    let frac = if frac.is_empty() {
        U256::zero()
    } else {
        let padded = format!("{:0<width$}", frac, width = ETH_DECIMALS);
        U256::from_dec_str(&padded).map_err(|_| AmountError::Invalid(s.to_string()))?
    };

    whole
        .checked_mul(wei_per_eth())
        .and_then(|w| w.checked_add(frac))
        .ok_or(AmountError::Overflow)
}

fn u256_to_f64(v: U256) -> f64 {
    if v.bits() <= 128 {
        v.low_u128() as f64
    } else {
        v.to_string().parse().unwrap_or(f64::MAX)
    }
}

fn u256_from_f64_floor(v: f64) -> U256 {
    if !v.is_finite() || v <= 0.0 {
        return U256::zero();
    }
    let v = v.floor();
    if v < u128::MAX as f64 {
        return U256::from(v as u128);
    }
    U256::from_dec_str(&format!("{:.0}", v)).unwrap_or(U256::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate(r: f64) -> MntRate {
        MntRate::new(r).unwrap()
    }

    fn eth(n: u64) -> U256 {
        U256::from(n) * wei_per_eth()
    }

    #[test]
    fn one_eth_at_fixed_rate() {
        assert_eq!(wei_to_mnt(wei_per_eth(), rate(6_000_000.0)), U256::from(6_000_000u64));
    }

    #[test]
    fn zero_wei_is_zero_mnt() {
        assert_eq!(wei_to_mnt(U256::zero(), rate(6_000_000.0)), U256::zero());
        assert_eq!(wei_to_mnt(U256::zero(), rate(0.5)), U256::zero());
    }

    #[test]
    fn conversion_floors() {
        // 1 wei at 6M MNT/ETH is 6e-12 MNT.
        assert_eq!(wei_to_mnt(U256::one(), rate(6_000_000.0)), U256::zero());
        // 0.3333.. ETH
        let third = wei_per_eth() / U256::from(3u64);
        assert_eq!(wei_to_mnt(third, rate(6_000_000.0)), U256::from(1_999_999u64));
        // fractional rate
        assert_eq!(wei_to_mnt(eth(3), rate(2.5)), U256::from(7u64));
        assert_eq!(wei_to_mnt(wei_per_eth() / U256::from(2u64), rate(9_876_543.21)), U256::from(4_938_271u64));
    }

    #[test]
    fn rates_with_many_decimals_still_floor() {
        assert_eq!(wei_to_mnt(wei_per_eth(), rate(2.9999999)), U256::from(2u64));
        assert_eq!(wei_to_mnt(eth(1), rate(11_850_000.9999999)), U256::from(11_850_000u64));
        assert_eq!(wei_to_mnt(eth(10), rate(0.12345678901)), U256::one());
    }

    #[test]
    fn tiny_rates_are_accepted() {
        let r = rate(1e-7);
        assert_eq!(wei_to_mnt(eth(1), r), U256::zero());
        assert_eq!(wei_to_mnt(eth(9_999_999), r), U256::zero());
        assert_eq!(wei_to_mnt(eth(10_000_001), r), U256::one());
        let subnormal = rate(f64::MIN_POSITIVE / 4.0);
        assert_eq!(wei_to_mnt(U256::MAX, subnormal), U256::zero());
    }

    #[test]
    fn never_exceeds_the_float_product() {
        for r in [0.3, 2.9999999, 6_000_000.0, 9_876_543.21, 11_850_000.123456789] {
            for wei in [U256::one(), wei_per_eth() / U256::from(7u64), eth(3), eth(1_000)] {
                let mnt = wei_to_mnt(wei, rate(r));
                let float = wei_to_eth(wei) * r;
                assert!(mnt.low_u128() as f64 <= float.floor() + 1.0, "rate {} wei {}", r, wei);
            }
        }
    }

    #[test]
    fn huge_amounts_fall_back_without_panicking() {
        let mnt = wei_to_mnt(U256::MAX, rate(6_000_000.0));
        assert!(mnt > U256::exp10(60));
    }

    #[test]
    fn rate_validation() {
        assert!(matches!(MntRate::new(f64::NAN), Err(RateError::NotFinite(_))));
        assert!(matches!(MntRate::new(f64::INFINITY), Err(RateError::NotFinite(_))));
        assert!(matches!(MntRate::new(0.0), Err(RateError::NotPositive(_))));
        assert!(matches!(MntRate::new(-5.0), Err(RateError::NotPositive(_))));
        assert!(MntRate::new(1e-7).is_ok());
        assert!(MntRate::new(f64::MIN_POSITIVE / 4.0).is_ok());
        assert_eq!(MntRate::default().get(), 6_000_000.0);
    }

    #[test]
    fn mnt_to_wei_inverts_for_whole_units() {
        let r = rate(6_000_000.0);
        assert_eq!(mnt_to_wei(6_000_000, r), wei_per_eth());
        assert_eq!(mnt_to_wei(3_000_000, r), wei_per_eth() / U256::from(2u64));
        assert_eq!(mnt_to_wei(0, r), U256::zero());
        assert_eq!(mnt_to_wei(5, rate(2.5)), U256::from(2u64) * wei_per_eth());
        assert_eq!(mnt_to_wei(1, rate(3.0)), U256::from_dec_str("333333333333333333").unwrap());
    }

    #[test]
    fn format_trims_trailing_zeros() {
        assert_eq!(format_eth(U256::zero()), "0");
        assert_eq!(format_eth(eth(12)), "12");
        assert_eq!(format_eth(U256::from_dec_str("1500000000000000000").unwrap()), "1.5");
        assert_eq!(format_eth(U256::one()), "0.000000000000000001");
    }

    #[test]
    fn parse_eth_accepts_common_inputs() {
        assert_eq!(parse_eth("1").unwrap(), wei_per_eth());
        assert_eq!(parse_eth(" 0.25 ").unwrap(), U256::from_dec_str("250000000000000000").unwrap());
        assert_eq!(parse_eth(".5").unwrap(), wei_per_eth() / U256::from(2u64));
        assert_eq!(parse_eth("2.").unwrap(), eth(2));
        assert_eq!(parse_eth("0.000000000000000001").unwrap(), U256::one());
    }

    #[test]
    fn parse_eth_rejects_bad_inputs() {
        assert_eq!(parse_eth(""), Err(AmountError::Empty));
        assert_eq!(parse_eth("."), Err(AmountError::Invalid(".".into())));
        assert!(matches!(parse_eth("-1"), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_eth("1e18"), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_eth("1.2.3"), Err(AmountError::Invalid(_))));
        assert_eq!(parse_eth("0.0000000000000000001"), Err(AmountError::TooPrecise));
    }

    #[test]
    fn eth_float_matches_format() {
        let wei = U256::from_dec_str("2500000000000000000").unwrap();
        assert!((wei_to_eth(wei) - 2.5).abs() < 1e-12);
    }
}
