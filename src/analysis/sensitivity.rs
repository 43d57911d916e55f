use crate::errors::{EngineError, EngineResult};
use crate::models::{BinaryPricer, PricingInput, PricingResult};
use serde::Serialize;

pub const DEFAULT_SHIFTS: [f64; 4] = [-0.03, -0.02, 0.02, 0.03];

/// Shifted vols never go below this.
pub const DEFAULT_MIN_VOL_FLOOR: f64 = 0.01;

pub const BASE_LABEL: &str = "base";

/// One repricing under a shifted volatility.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityRow {
    pub label: String,
    pub shift: f64,
    pub volatility: f64,
    pub result: PricingResult,
}

/// Rows ordered by signed shift ascending, the unshifted "base" row at shift 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensitivityTable {
    rows: Vec<SensitivityRow>,
    #[serde(skip)]
    base: PricingResult,
}

impl SensitivityTable {
    pub fn rows(&self) -> &[SensitivityRow] {
        &self.rows
    }

    pub fn get(&self, label: &str) -> Option<&PricingResult> {
        self.rows.iter().find(|r| r.label == label).map(|r| &r.result)
    }

    /// The unshifted pricing.
    pub fn base(&self) -> &PricingResult {
        &self.base
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// "base" for a zero shift, otherwise the signed shift in shortest exact form.
pub fn shift_label(shift: f64) -> String {
    if shift == 0.0 {
        BASE_LABEL.to_string()
    } else {
        format!("{shift:+}")
    }
}

/// Labelled volatilities for the base case and every shift, ascending by shift.
/// Shifted values are floored at `min_vol_floor`.
pub fn sensitivity_vols(
    base_vol: f64,
    shifts: &[f64],
    min_vol_floor: f64,
) -> EngineResult<Vec<(String, f64, f64)>> {
    if !(base_vol > 0.0) || !base_vol.is_finite() {
        return Err(EngineError::InvalidInput(format!(
            "base volatility must be positive, got {base_vol}"
        )));
    }
    if !(min_vol_floor > 0.0) || !min_vol_floor.is_finite() {
        return Err(EngineError::InvalidInput(format!(
            "volatility floor must be positive, got {min_vol_floor}"
        )));
    }
    if let Some(bad) = shifts.iter().find(|s| !s.is_finite()) {
        return Err(EngineError::InvalidInput(format!("volatility shift must be finite, got {bad}")));
    }

    let mut ordered: Vec<f64> = shifts.iter().copied().chain(std::iter::once(0.0)).collect();
    ordered.sort_by(f64::total_cmp);
    ordered.dedup_by(|a, b| a == b);

    Ok(ordered
        .into_iter()
        .map(|shift| {
            let vol = if shift == 0.0 {
                base_vol
            } else {
                (base_vol + shift).max(min_vol_floor)
            };
            (shift_label(shift), shift, vol)
        })
        .collect())
}

/// Reprice `input` once per volatility shift plus the base case.
/// Rows are independent; order only follows the shift values.
pub fn price_with_sensitivity(
    pricer: &dyn BinaryPricer,
    input: &PricingInput,
    shifts: &[f64],
    min_vol_floor: f64,
) -> EngineResult<SensitivityTable> {
    let vols = sensitivity_vols(input.volatility, shifts, min_vol_floor)?;
    let base = pricer.price(input)?;
    let rows = vols
        .into_iter()
        .map(|(label, shift, volatility)| {
            let result = if shift == 0.0 {
                base
            } else {
                pricer.price(&input.with_volatility(volatility))?
            };
            Ok(SensitivityRow { label, shift, volatility, result })
        })
        .collect::<EngineResult<Vec<_>>>()?;
    Ok(SensitivityTable { rows, base })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::black_scholes::DigitalPricer;
    use crate::models::touch_barrier::TouchPricer;
    use crate::models::Direction;

    fn otm_touch() -> PricingInput {
        PricingInput {
            spot: 100.0,
            level: 120.0,
            time_to_expiry: 1.0,
            rate: 0.05,
            dividend_yield: 0.0,
            volatility: 0.30,
        }
    }

    #[test]
    fn test_labels_and_order() {
        let table = price_with_sensitivity(&TouchPricer::new(), &otm_touch(), &DEFAULT_SHIFTS, 0.01).unwrap();
        let labels: Vec<&str> = table.rows().iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["-0.03", "-0.02", "base", "+0.02", "+0.03"]);
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn test_unordered_shifts_are_sorted() {
        let table = price_with_sensitivity(&TouchPricer::new(), &otm_touch(), &[0.03, -0.02, 0.0, 0.02, -0.02], 0.01).unwrap();
        let shifts: Vec<f64> = table.rows().iter().map(|r| r.shift).collect();
        assert_eq!(shifts, vec![-0.02, 0.0, 0.02, 0.03]);
    }

    #[test]
    fn test_base_row_matches_direct_pricing() {
        let pricer = DigitalPricer::new(Direction::Above);
        let input = PricingInput { level: 100.0, ..otm_touch() };
        let table = price_with_sensitivity(&pricer, &input, &DEFAULT_SHIFTS, 0.01).unwrap();
        assert_eq!(table.base(), &pricer.price(&input).unwrap());
        assert_eq!(table.get(BASE_LABEL), Some(table.base()));
    }

    #[test]
    fn test_otm_touch_increases_with_vol() {
        let table = price_with_sensitivity(&TouchPricer::new(), &otm_touch(), &DEFAULT_SHIFTS, 0.01).unwrap();
        let base = table.base().probability;
        let up = table.get("+0.02").unwrap().probability;
        let down = table.get("-0.02").unwrap().probability;
        assert!(up >= base, "+0.02 ({up}) should be >= base ({base})");
        assert!(down <= base, "-0.02 ({down}) should be <= base ({base})");
    }

    #[test]
    fn test_floor_applies_to_shifted_vols() {
        let vols = sensitivity_vols(0.02, &DEFAULT_SHIFTS, 0.01).unwrap();
        let by_label: Vec<(&str, f64)> = vols.iter().map(|(l, _, v)| (l.as_str(), *v)).collect();
        assert_eq!(by_label[0], ("-0.03", 0.01));
        assert_eq!(by_label[1], ("-0.02", 0.01));
        assert_eq!(by_label[2], ("base", 0.02));
        assert!((by_label[3].1 - 0.04).abs() < 1e-15);

        let low = PricingInput { volatility: 0.02, ..otm_touch() };
        let table = price_with_sensitivity(&TouchPricer::new(), &low, &DEFAULT_SHIFTS, 0.01).unwrap();
        assert!(table.rows().iter().all(|r| r.volatility >= 0.01));
    }

    #[test]
    fn test_close_shifts_keep_distinct_rows() {
        let table = price_with_sensitivity(&TouchPricer::new(), &otm_touch(), &[0.025, 0.03, -0.001, 0.001], 0.01).unwrap();
        let rows: Vec<(&str, f64)> = table.rows().iter().map(|r| (r.label.as_str(), r.shift)).collect();
        assert_eq!(
            rows,
            vec![("-0.001", -0.001), ("base", 0.0), ("+0.001", 0.001), ("+0.025", 0.025), ("+0.03", 0.03)]
        );
        assert!(table.get("+0.025").unwrap().probability < table.get("+0.03").unwrap().probability);
    }

    #[test]
    fn test_rejects_bad_arguments() {
        assert!(sensitivity_vols(0.2, &DEFAULT_SHIFTS, 0.0).is_err());
        assert!(sensitivity_vols(0.0, &DEFAULT_SHIFTS, 0.01).is_err());
        assert!(sensitivity_vols(0.2, &[f64::NAN], 0.01).is_err());
    }

    #[test]
    fn test_empty_shifts_gives_base_only() {
        let table = price_with_sensitivity(&TouchPricer::new(), &otm_touch(), &[], 0.01).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].label, BASE_LABEL);
    }
}
