//! Strike-region IV extraction.
//!
//! Picks the quotes whose strikes lie within a moneyness window around the
//! target level and interpolates IV at the target in log-moneyness
//! x = ln(K / level). The window widens geometrically up to a 20% ceiling
//! when it holds fewer than two strikes.

use crate::errors::{EngineError, EngineResult};
use crate::vol::chain::OptionChainSnapshot;
use serde::Serialize;
use smallvec::SmallVec;

pub const DEFAULT_WINDOW_PCT: f64 = 0.05;

/// Ceiling for automatic window widening.
pub const MAX_WINDOW_PCT: f64 = 0.20;

/// Window multiplier per widening step: 5% -> 10% -> 20%.
const WINDOW_GROWTH: f64 = 2.0;

const MIN_STRIKES: usize = 2;

/// 500% annualised vol is not a believable input.
const HIGH_VOL_THRESHOLD: f64 = 5.0;

/// Non-fatal conditions attached to a successful extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IvWarning {
    SparseData,
    SingleStrikeFallback,
    ExtrapolatedStrike,
    HighVolatility,
}

impl std::fmt::Display for IvWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SparseData => write!(f, "sparse-data"),
            Self::SingleStrikeFallback => write!(f, "single-strike-fallback"),
            Self::ExtrapolatedStrike => write!(f, "extrapolated-strike"),
            Self::HighVolatility => write!(f, "high-volatility"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IvExtraction {
    pub volatility: f64,
    pub strikes_used: usize,
    /// Window actually used, after any widening.
    pub window_pct: f64,
    pub warnings: SmallVec<[IvWarning; 4]>,
}

/// Extract a single IV for `target_level` from one expiry's chain.
pub fn extract_volatility(
    snapshot: &OptionChainSnapshot,
    target_level: f64,
    window_pct: f64,
) -> EngineResult<IvExtraction> {
    if !(target_level > 0.0) || !target_level.is_finite() {
        return Err(EngineError::InvalidInput(format!(
            "target level must be positive, got {target_level}"
        )));
    }
    if !(window_pct > 0.0 && window_pct < 1.0) {
        return Err(EngineError::InvalidInput(format!(
            "window percentage must be in (0, 1), got {window_pct}"
        )));
    }
    if snapshot.is_empty() {
        return Err(EngineError::InsufficientData("option chain is empty".into()));
    }

    let mut warnings = SmallVec::new();

    let usable = snapshot.usable();
    let dropped = snapshot.len() - usable.len();
    if dropped * 2 > snapshot.len() {
        warnings.push(IvWarning::SparseData);
    }
    if usable.is_empty() {
        return Err(EngineError::InsufficientData(
            "no strikes carry an implied volatility".into(),
        ));
    }

    let mut window = window_pct;
    let mut selected = strikes_in_window(&usable, target_level, window);
    while selected.len() < MIN_STRIKES && window < MAX_WINDOW_PCT {
        window = (window * WINDOW_GROWTH).min(MAX_WINDOW_PCT);
        selected = strikes_in_window(&usable, target_level, window);
    }

    let (volatility, strikes_used) = if selected.len() < MIN_STRIKES {
        let (_, iv) = match (selected.first(), usable.as_slice()) {
            (Some(&only), _) => only,
            (None, &[only]) => only,
            _ => {
                return Err(EngineError::InsufficientData(format!(
                    "no strikes with implied volatility within ±{:.0}% of {target_level}",
                    window * 100.0
                )))
            }
        };
        warnings.push(IvWarning::SingleStrikeFallback);
        if boundary_strike(&usable, target_level).is_some() {
            warnings.push(IvWarning::ExtrapolatedStrike);
        }
        (iv, 1)
    } else if let Some(&(_, iv)) = boundary_strike(&usable, target_level) {
        warnings.push(IvWarning::ExtrapolatedStrike);
        (iv, 1)
    } else {
        let (iv, bracketed) = interpolate_log_moneyness(&selected, target_level);
        if !bracketed {
            warnings.push(IvWarning::ExtrapolatedStrike);
        }
        (iv, selected.len())
    };

    if !(volatility > 0.0) || !volatility.is_finite() {
        return Err(EngineError::InsufficientData(format!(
            "extracted volatility is non-positive: {volatility}"
        )));
    }
    if volatility > HIGH_VOL_THRESHOLD {
        warnings.push(IvWarning::HighVolatility);
    }

    Ok(IvExtraction { volatility, strikes_used, window_pct: window, warnings })
}

/// Simple mean of the IVs inside the window. Coarser than interpolation but
/// usable as a sanity cross-check.
pub fn average_region_iv(
    snapshot: &OptionChainSnapshot,
    target_level: f64,
    window_pct: f64,
) -> Option<f64> {
    let usable = snapshot.usable();
    let region = strikes_in_window(&usable, target_level, window_pct);
    if region.is_empty() {
        return None;
    }
    let avg = region.iter().map(|&(_, iv)| iv).sum::<f64>() / region.len() as f64;
    (avg > 0.0).then_some(avg)
}

fn strikes_in_window(usable: &[(f64, f64)], level: f64, window: f64) -> Vec<(f64, f64)> {
    let lower = level * (1.0 - window);
    let upper = level * (1.0 + window);
    usable
        .iter()
        .copied()
        .filter(|&(k, _)| k >= lower && k <= upper)
        .collect()
}

/// Nearest boundary strike when the level is outside the whole chain.
fn boundary_strike(usable: &[(f64, f64)], level: f64) -> Option<&(f64, f64)> {
    let first = usable.first()?;
    let last = usable.last()?;
    if level < first.0 {
        Some(first)
    } else if level > last.0 {
        Some(last)
    } else {
        None
    }
}

/// Linear interpolation of IV in x = ln(K/level), evaluated at x = 0.
/// Uses the pair bracketing x = 0, or the nearest two when the points all sit
/// on one side; the flag reports whether x = 0 was bracketed.
/// `points` is sorted by strike and holds at least two entries.
fn interpolate_log_moneyness(points: &[(f64, f64)], level: f64) -> (f64, bool) {
    let xs: SmallVec<[f64; 16]> = points.iter().map(|&(k, _)| (k / level).ln()).collect();

    let upper = xs.iter().position(|&x| x >= 0.0);
    if let Some(j) = upper {
        if xs[j] == 0.0 {
            return (points[j].1, true);
        }
    }

    let (lo, hi, bracketed) = match upper {
        Some(0) => (0, 1, false),
        Some(j) => (j - 1, j, true),
        None => (xs.len() - 2, xs.len() - 1, false),
    };

    let (x0, x1) = (xs[lo], xs[hi]);
    let (v0, v1) = (points[lo].1, points[hi].1);
    let w = (0.0 - x0) / (x1 - x0);
    (v0 + w * (v1 - v0), bracketed)
}
