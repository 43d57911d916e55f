//! Volatility term structure.
//!
//! Interpolates total variance w(t) = sigma^2 * t linearly in time between the
//! bracketing expiries, then recovers sigma = sqrt(w / t). Linear interpolation
//! of sigma itself does not preserve total variance and is not offered.

use crate::errors::{EngineError, EngineResult};
use chrono::NaiveDate;
use serde::Serialize;
use smallvec::SmallVec;

/// ACT/365 year fraction.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Two times closer than this (in years) are the same expiry.
const TIME_TOLERANCE: f64 = 1e-9;

/// One expiry of the term structure. `expiry` is on the same clock as the
/// target time passed to `interpolate_term_structure`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolTermPoint {
    pub expiry: f64,
    pub volatility: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TermStructureWarning {
    /// Target precedes the earliest expiry; earliest vol used flat.
    ExtrapolatedBefore,
    /// Target is past the latest expiry; latest vol used flat.
    ExtrapolatedAfter,
    SingleExpiry,
    /// An expiry on or before the reference date was ignored.
    StaleExpiryDropped,
}

impl std::fmt::Display for TermStructureWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExtrapolatedBefore => write!(f, "extrapolated-before-first-expiry"),
            Self::ExtrapolatedAfter => write!(f, "extrapolated-after-last-expiry"),
            Self::SingleExpiry => write!(f, "single-expiry"),
            Self::StaleExpiryDropped => write!(f, "stale-expiry-dropped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermStructureVol {
    pub volatility: f64,
    pub warnings: SmallVec<[TermStructureWarning; 2]>,
}

impl TermStructureVol {
    fn exact(volatility: f64) -> Self {
        Self { volatility, warnings: SmallVec::new() }
    }

    fn flagged(volatility: f64, warning: TermStructureWarning) -> Self {
        let mut warnings = SmallVec::new();
        warnings.push(warning);
        Self { volatility, warnings }
    }
}

/// Volatility at `target_time` from the given expiries. All times are
/// measured from `reference_time` and must lie strictly after it.
pub fn interpolate_term_structure(
    target_time: f64,
    points: &[VolTermPoint],
    reference_time: f64,
) -> EngineResult<TermStructureVol> {
    if points.is_empty() {
        return Err(EngineError::InvalidTermStructure("no term points provided".into()));
    }

    let target_t = target_time - reference_time;
    if !(target_t > 0.0) || !target_t.is_finite() {
        return Err(EngineError::InvalidTermStructure(format!(
            "target time must be after reference time, got {target_t} years"
        )));
    }

    let mut curve: Vec<(f64, f64)> = Vec::with_capacity(points.len());
    for p in points {
        let t = p.expiry - reference_time;
        if !(t > 0.0) || !t.is_finite() {
            return Err(EngineError::InvalidTermStructure(format!(
                "expiry time must be positive, got {t} years"
            )));
        }
        if !(p.volatility > 0.0) || !p.volatility.is_finite() {
            return Err(EngineError::InvalidTermStructure(format!(
                "volatility must be positive, got {} at t={t}",
                p.volatility
            )));
        }
        curve.push((t, p.volatility));
    }
    curve.sort_by(|a, b| a.0.total_cmp(&b.0));

    if let Some(w) = curve.windows(2).find(|w| (w[1].0 - w[0].0).abs() < TIME_TOLERANCE) {
        return Err(EngineError::InvalidTermStructure(format!(
            "duplicate expiry at t={}",
            w[0].0
        )));
    }

    if let Some(&(_, vol)) = curve.iter().find(|(t, _)| (t - target_t).abs() < TIME_TOLERANCE) {
        return Ok(TermStructureVol::exact(vol));
    }

    let (first, last) = (curve[0], curve[curve.len() - 1]);
    if curve.len() == 1 {
        return Ok(TermStructureVol::flagged(first.1, TermStructureWarning::SingleExpiry));
    }
    if target_t < first.0 {
        return Ok(TermStructureVol::flagged(first.1, TermStructureWarning::ExtrapolatedBefore));
    }
    if target_t > last.0 {
        return Ok(TermStructureVol::flagged(last.1, TermStructureWarning::ExtrapolatedAfter));
    }

    // Inside the range and not on a node, so some later node exists past index 0.
    let j = curve.iter().position(|&(t, _)| t > target_t).unwrap_or(curve.len() - 1);
    let (t1, v1) = curve[j - 1];
    let (t2, v2) = curve[j];
    interpolate_total_variance(v1, t1, v2, t2, target_t).map(TermStructureVol::exact)
}

/// sigma at `target_t` from two bracketing expiries via linear total variance.
pub fn interpolate_total_variance(
    vol1: f64,
    t1: f64,
    vol2: f64,
    t2: f64,
    target_t: f64,
) -> EngineResult<f64> {
    if !(t1 > 0.0 && t2 > 0.0 && target_t > 0.0) {
        return Err(EngineError::InvalidTermStructure(format!(
            "all times must be positive: t1={t1}, t2={t2}, target={target_t}"
        )));
    }
    if !(vol1 > 0.0 && vol2 > 0.0) {
        return Err(EngineError::InvalidTermStructure(format!(
            "all vols must be positive: vol1={vol1}, vol2={vol2}"
        )));
    }
    if t1 >= t2 {
        return Err(EngineError::InvalidTermStructure(format!(
            "first expiry must precede second: t1={t1} >= t2={t2}"
        )));
    }
    if target_t < t1 || target_t > t2 {
        return Err(EngineError::InvalidTermStructure(format!(
            "target {target_t} outside [{t1}, {t2}]"
        )));
    }

    let w1 = vol1 * vol1 * t1;
    let w2 = vol2 * vol2 * t2;
    let w = w1 + (w2 - w1) * (target_t - t1) / (t2 - t1);

    if !(w > 0.0) {
        return Err(EngineError::InvalidTermStructure(format!(
            "interpolated total variance is non-positive: {w}"
        )));
    }

    Ok((w / target_t).sqrt())
}

/// Year fraction (ACT/365) from `reference` to `expiry`.
pub fn time_to_expiry_years(expiry: NaiveDate, reference: NaiveDate) -> EngineResult<f64> {
    let days = (expiry - reference).num_days();
    if days <= 0 {
        return Err(EngineError::InvalidTermStructure(format!(
            "expiry {expiry} is not after reference date {reference}"
        )));
    }
    Ok(days as f64 / DAYS_PER_YEAR)
}

/// Date-keyed variant of `interpolate_term_structure`. Expiries on or before
/// `reference` are dropped with a warning.
pub fn interpolate_term_structure_by_date(
    target: NaiveDate,
    pairs: &[(NaiveDate, f64)],
    reference: NaiveDate,
) -> EngineResult<TermStructureVol> {
    if pairs.is_empty() {
        return Err(EngineError::InvalidTermStructure("no expiries provided".into()));
    }
    let target_t = time_to_expiry_years(target, reference)?;

    let mut stale = false;
    let mut points = Vec::with_capacity(pairs.len());
    for &(expiry, volatility) in pairs {
        if expiry <= reference {
            stale = true;
            continue;
        }
        points.push(VolTermPoint { expiry: time_to_expiry_years(expiry, reference)?, volatility });
    }

    if points.is_empty() {
        return Err(EngineError::InvalidTermStructure(format!(
            "no expiries after reference date {reference}"
        )));
    }

    let mut result = interpolate_term_structure(target_t, &points, 0.0)?;
    if stale {
        result.warnings.insert(0, TermStructureWarning::StaleExpiryDropped);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[(f64, f64)]) -> Vec<VolTermPoint> {
        raw.iter()
            .map(|&(expiry, volatility)| VolTermPoint { expiry, volatility })
            .collect()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_endpoints_are_exact() {
        let curve = pts(&[(0.25, 0.20), (0.50, 0.30)]);
        let at_t1 = interpolate_term_structure(0.25, &curve, 0.0).unwrap();
        let at_t2 = interpolate_term_structure(0.50, &curve, 0.0).unwrap();
        assert_eq!(at_t1.volatility, 0.20);
        assert_eq!(at_t2.volatility, 0.30);
        assert!(at_t1.warnings.is_empty() && at_t2.warnings.is_empty());
    }

    #[test]
    fn test_total_variance_interpolation() {
        let curve = pts(&[(0.25, 0.20), (0.50, 0.30)]);
        let r = interpolate_term_structure(0.40, &curve, 0.0).unwrap();
        // w = 0.01 + (0.045 - 0.01) * 0.6 = 0.031; sigma = sqrt(0.031 / 0.4)
        let expected = (0.031f64 / 0.4).sqrt();
        assert!((r.volatility - expected).abs() < 1e-12, "vol={}", r.volatility);
        // Linear-in-vol would give 0.26.
        assert!((r.volatility - 0.26).abs() > 0.01);
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn test_flat_vol_stays_flat() {
        let curve = pts(&[(0.1, 0.25), (1.0, 0.25), (2.0, 0.25)]);
        for &t in &[0.2, 0.7, 1.3, 1.99] {
            let v = interpolate_term_structure(t, &curve, 0.0).unwrap().volatility;
            assert!((v - 0.25).abs() < 1e-12, "t={t} vol={v}");
        }
    }

    #[test]
    fn test_unsorted_points_pick_correct_bracket() {
        let curve = pts(&[(1.0, 0.30), (0.25, 0.20), (0.5, 0.25)]);
        let v = interpolate_term_structure(0.75, &curve, 0.0).unwrap().volatility;
        let expected = interpolate_total_variance(0.25, 0.5, 0.30, 1.0, 0.75).unwrap();
        assert_eq!(v, expected);
    }

    #[test]
    fn test_extrapolation_is_flat_and_flagged() {
        let curve = pts(&[(0.25, 0.20), (0.50, 0.30)]);
        let before = interpolate_term_structure(0.1, &curve, 0.0).unwrap();
        assert_eq!(before.volatility, 0.20);
        assert_eq!(before.warnings.as_slice(), &[TermStructureWarning::ExtrapolatedBefore]);

        let after = interpolate_term_structure(2.0, &curve, 0.0).unwrap();
        assert_eq!(after.volatility, 0.30);
        assert_eq!(after.warnings.as_slice(), &[TermStructureWarning::ExtrapolatedAfter]);
    }

    #[test]
    fn test_single_point() {
        let r = interpolate_term_structure(1.0, &pts(&[(0.5, 0.22)]), 0.0).unwrap();
        assert_eq!(r.volatility, 0.22);
        assert_eq!(r.warnings.as_slice(), &[TermStructureWarning::SingleExpiry]);
    }

    #[test]
    fn test_reference_time_shifts_clock() {
        let curve = pts(&[(1.25, 0.20), (1.50, 0.30)]);
        let shifted = interpolate_term_structure(1.40, &curve, 1.0).unwrap().volatility;
        let plain = interpolate_term_structure(0.40, &pts(&[(0.25, 0.20), (0.50, 0.30)]), 0.0)
            .unwrap()
            .volatility;
        assert!((shifted - plain).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_term_structures() {
        let cases: Vec<(f64, Vec<VolTermPoint>)> = vec![
            (0.5, vec![]),
            (0.5, pts(&[(0.0, 0.2), (1.0, 0.3)])),
            (0.5, pts(&[(-1.0, 0.2)])),
            (0.5, pts(&[(0.25, 0.0), (1.0, 0.3)])),
            (0.5, pts(&[(0.25, 0.2), (0.25, 0.3)])),
            (0.0, pts(&[(0.25, 0.2)])),
        ];
        for (target, curve) in cases {
            let err = interpolate_term_structure(target, &curve, 0.0).unwrap_err();
            assert!(matches!(err, EngineError::InvalidTermStructure(_)), "{curve:?}: {err:?}");
        }
    }

    #[test]
    fn test_interpolate_total_variance_validation() {
        assert!(interpolate_total_variance(0.2, 0.5, 0.3, 0.25, 0.4).is_err());
        assert!(interpolate_total_variance(0.2, 0.25, 0.3, 0.5, 0.6).is_err());
        assert!(interpolate_total_variance(-0.2, 0.25, 0.3, 0.5, 0.4).is_err());
    }

    #[test]
    fn test_time_to_expiry_years() {
        let t = time_to_expiry_years(date(2025, 7, 1), date(2025, 1, 1)).unwrap();
        assert!((t - 181.0 / 365.0).abs() < 1e-12, "t={t}");
        assert!(time_to_expiry_years(date(2025, 1, 1), date(2025, 1, 1)).is_err());
        assert!(time_to_expiry_years(date(2024, 12, 31), date(2025, 1, 1)).is_err());
    }

    #[test]
    fn test_by_date_matches_year_fractions() {
        let reference = date(2025, 1, 1);
        let pairs = [(date(2025, 3, 15), 0.20), (date(2025, 6, 20), 0.30)];
        let r = interpolate_term_structure_by_date(date(2025, 5, 1), &pairs, reference).unwrap();

        let t1 = 73.0 / 365.0;
        let t2 = 170.0 / 365.0;
        let tt = 120.0 / 365.0;
        let expected = interpolate_total_variance(0.20, t1, 0.30, t2, tt).unwrap();
        assert!((r.volatility - expected).abs() < 1e-12, "vol={}", r.volatility);
    }

    #[test]
    fn test_by_date_drops_stale_expiries() {
        let reference = date(2025, 4, 1);
        let pairs = [(date(2025, 3, 15), 0.50), (date(2025, 6, 20), 0.30)];
        let r = interpolate_term_structure_by_date(date(2025, 5, 1), &pairs, reference).unwrap();
        assert_eq!(r.volatility, 0.30);
        assert_eq!(
            r.warnings.as_slice(),
            &[TermStructureWarning::StaleExpiryDropped, TermStructureWarning::SingleExpiry]
        );

        let all_stale = [(date(2025, 3, 15), 0.50)];
        let err = interpolate_term_structure_by_date(date(2025, 5, 1), &all_stale, reference).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTermStructure(_)));
    }
}
