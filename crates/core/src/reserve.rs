//! Utilization engine: raw reserve state to borrowed/cap/utilization.

use alloy::primitives::U256;
use capwatch_api::MarketReserve;

use crate::math::{f64_to_wad, pow10, ray, WAD};

/// Derived borrow utilization for one asset.
///
/// Amounts are WAD-scaled (1e18) token quantities so the API path and the
/// page-scrape path share one representation. `utilization_wad` is a WAD
/// ratio; `None` means the market has no cap data (cap is zero or could
/// not be read), which is a distinct state from zero utilization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UtilizationReading {
    /// Total borrowed, WAD-scaled tokens.
    pub borrowed_wad: U256,
    /// Borrow cap, WAD-scaled tokens.
    pub cap_wad: U256,
    /// borrowed / cap as a WAD ratio, `None` when cap is unknown.
    pub utilization_wad: Option<U256>,
}

impl UtilizationReading {
    /// Reading for a source that produced no usable cap data this cycle.
    pub fn no_data() -> Self {
        Self::default()
    }

    /// Build a reading from whole-token amounts (page-scrape path).
    pub fn from_tokens(borrowed: f64, cap: f64) -> Self {
        let borrowed_wad = f64_to_wad(borrowed);
        let cap_wad = f64_to_wad(cap);
        let utilization_wad = if cap_wad > U256::ZERO {
            Some(borrowed_wad * WAD / cap_wad)
        } else {
            None
        };
        Self {
            borrowed_wad,
            cap_wad,
            utilization_wad,
        }
    }

    /// Spare capacity in WAD-scaled tokens.
    pub fn available_wad(&self) -> U256 {
        self.cap_wad.saturating_sub(self.borrowed_wad)
    }

    pub fn borrowed_tokens(&self) -> f64 {
        crate::math::wad_to_f64(self.borrowed_wad)
    }

    pub fn cap_tokens(&self) -> f64 {
        crate::math::wad_to_f64(self.cap_wad)
    }

    pub fn available_tokens(&self) -> f64 {
        crate::math::wad_to_f64(self.available_wad())
    }

    /// Utilization as a plain ratio, display use only.
    pub fn utilization(&self) -> Option<f64> {
        self.utilization_wad.map(crate::math::wad_to_f64)
    }
}

/// Compute borrowed amount, cap, and utilization for one reserve.
///
/// Pure integer arithmetic:
/// - `variable_debt_base = scaled_variable_debt * variable_borrow_index / RAY`
/// - `total_borrow_base  = variable_debt_base + stable_principal_base`
/// - `utilization        = total_borrow_base / (borrow_cap * 10^decimals)`
///
/// Intermediate products on sane markets stay far below 2^256 (debt
/// ~1e21 times index ~1e27). `None` means some product overflowed: the
/// record parsed but its magnitudes are absurd, and the caller skips it
/// rather than report wrapped figures.
pub fn compute_utilization(reserve: &MarketReserve) -> Option<UtilizationReading> {
    let variable_debt_base = reserve
        .total_scaled_variable_debt
        .checked_mul(reserve.variable_borrow_index)?
        / ray();
    let total_borrow_base =
        variable_debt_base.checked_add(reserve.total_principal_stable_debt)?;
    let scale = pow10(reserve.decimals);

    let borrowed_base_wad = total_borrow_base.checked_mul(WAD)?;
    let borrowed_wad = borrowed_base_wad / scale;
    let cap_wad = reserve.borrow_cap.checked_mul(WAD)?;
    let utilization_wad = if reserve.borrow_cap > U256::ZERO {
        Some(borrowed_base_wad / reserve.borrow_cap.checked_mul(scale)?)
    } else {
        None
    };

    Some(UtilizationReading {
        borrowed_wad,
        cap_wad,
        utilization_wad,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reserve(json: &str) -> MarketReserve {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_compute_utilization_exact() {
        // 950 tokens borrowed against a 1000-token cap at index 1.0
        let r = reserve(
            r#"{
                "underlyingAsset": "0xd8fc8f0b03eba61f64d08b0bef69d80916e5dda9",
                "symbol": "beHYPE",
                "decimals": 18,
                "borrowCap": "1000",
                "totalScaledVariableDebt": "950000000000000000000",
                "variableBorrowIndex": "1000000000000000000000000000",
                "totalPrincipalStableDebt": "0"
            }"#,
        );

        let reading = compute_utilization(&r).unwrap();
        assert_eq!(reading.borrowed_wad, U256::from(950u64) * WAD);
        assert_eq!(reading.cap_wad, U256::from(1000u64) * WAD);
        // exactly 0.95 in WAD, no float rounding
        assert_eq!(
            reading.utilization_wad,
            Some(U256::from(950_000_000_000_000_000u64))
        );
    }

    #[test]
    fn test_compute_utilization_is_deterministic() {
        let r = reserve(
            r#"{
                "underlyingAsset": "0xabc",
                "decimals": 6,
                "borrowCap": "333",
                "totalScaledVariableDebt": "111111111",
                "variableBorrowIndex": "1043567890123456789012345678",
                "totalPrincipalStableDebt": "7"
            }"#,
        );

        assert_eq!(compute_utilization(&r), compute_utilization(&r));
    }

    #[test]
    fn test_interest_index_scales_debt() {
        // index 2.0 doubles the scaled debt
        let r = reserve(
            r#"{
                "underlyingAsset": "0xabc",
                "decimals": 18,
                "borrowCap": "1000",
                "totalScaledVariableDebt": "250000000000000000000",
                "variableBorrowIndex": "2000000000000000000000000000"
            }"#,
        );

        let reading = compute_utilization(&r).unwrap();
        assert_eq!(reading.borrowed_wad, U256::from(500u64) * WAD);
        assert_eq!(
            reading.utilization_wad,
            Some(U256::from(500_000_000_000_000_000u64))
        );
    }

    #[test]
    fn test_stable_debt_adds_to_total() {
        let r = reserve(
            r#"{
                "underlyingAsset": "0xabc",
                "decimals": 6,
                "borrowCap": "100",
                "totalScaledVariableDebt": "40000000",
                "totalPrincipalStableDebt": "10000000"
            }"#,
        );

        let reading = compute_utilization(&r).unwrap();
        assert_eq!(reading.borrowed_wad, U256::from(50u64) * WAD);
        assert_eq!(
            reading.utilization_wad,
            Some(U256::from(500_000_000_000_000_000u64))
        );
    }

    #[test]
    fn test_zero_cap_is_unknown_not_zero() {
        let r = reserve(
            r#"{
                "underlyingAsset": "0xabc",
                "decimals": 18,
                "borrowCap": "0",
                "totalScaledVariableDebt": "950000000000000000000"
            }"#,
        );

        let reading = compute_utilization(&r).unwrap();
        assert_eq!(reading.utilization_wad, None);
        assert!(reading.borrowed_wad > U256::ZERO);
    }

    #[test]
    fn test_absurd_magnitudes_are_rejected_not_wrapped() {
        // cap * WAD overflows U256; the record must be skipped, not
        // reported with a wrapped cap.
        let r = reserve(&format!(
            r#"{{
                "underlyingAsset": "0xabc",
                "decimals": 18,
                "borrowCap": "1{zeros}",
                "totalScaledVariableDebt": "950000000000000000000"
            }}"#,
            zeros = "0".repeat(62),
        ));

        assert_eq!(compute_utilization(&r), None);
    }

    #[test]
    fn test_from_tokens() {
        let reading = UtilizationReading::from_tokens(800.0, 1000.0);
        assert_eq!(
            reading.utilization_wad,
            Some(U256::from(800_000_000_000_000_000u64))
        );
        assert!((reading.available_tokens() - 200.0).abs() < 1e-9);

        let large = UtilizationReading::from_tokens(3_200_000.0, 4_000_000.0);
        assert!((large.utilization().unwrap() - 0.8).abs() < 1e-9);

        let no_cap = UtilizationReading::from_tokens(10.0, 0.0);
        assert_eq!(no_cap.utilization_wad, None);
    }
}
