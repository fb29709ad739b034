//! Exact U256 fixed-point arithmetic for borrow-cap utilization.
//!
//! All monetary math runs on integers: base-unit amounts span up to 27
//! (ray) orders of magnitude and f64 would drift. Floats appear only at
//! the display boundary via [`wad_to_f64`].

use alloy::primitives::U256;

/// WAD constant: 1e18 for 18-decimal fixed-point arithmetic.
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// RAY: 1e27, the scaling base of variable borrow indexes.
pub fn ray() -> U256 {
    U256::from(10u128.pow(27))
}

/// Power of 10 as U256. Exact up to 10^38 via u128, slower beyond.
#[inline]
pub fn pow10(exp: u8) -> U256 {
    if exp <= 38 {
        U256::from(10u128.pow(exp as u32))
    } else {
        U256::from(10u64).pow(U256::from(exp))
    }
}

/// Convert WAD (18 decimals) to f64. Display and threshold use only.
#[inline]
pub fn wad_to_f64(wad: U256) -> f64 {
    if wad <= U256::from(u128::MAX) {
        let value: u128 = wad.to();
        value as f64 / 1e18
    } else {
        let mut value = 0.0f64;
        for (i, limb) in wad.as_limbs().iter().enumerate() {
            value += *limb as f64 * 2f64.powi(64 * i as i32);
        }
        value / 1e18
    }
}

/// Convert a non-negative f64 token amount to WAD.
#[inline]
pub fn f64_to_wad(value: f64) -> U256 {
    if value <= 0.0 || !value.is_finite() {
        return U256::ZERO;
    }
    U256::from((value * 1e18) as u128)
}
