//! Fair-vs-market classification.
//!
//! Fair when |market - fair| <= abs_tol, or when fair > 0 and
//! |market - fair| / fair <= pct_tol. Outside tolerance the market is
//! Cheap below fair value and Expensive above it.
//!
//! All functions are pure.

use serde::{Deserialize, Serialize};

pub const DEFAULT_ABS_TOL: f64 = 0.01;
pub const DEFAULT_PCT_TOL: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Fair,
    Cheap,
    Expensive,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fair => write!(f, "Fair"),
            Self::Cheap => write!(f, "Cheap"),
            Self::Expensive => write!(f, "Expensive"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerdictThresholds {
    pub abs_tol: f64,
    pub pct_tol: f64,
}

impl Default for VerdictThresholds {
    fn default() -> Self {
        Self { abs_tol: DEFAULT_ABS_TOL, pct_tol: DEFAULT_PCT_TOL }
    }
}

impl VerdictThresholds {
    #[inline]
    pub fn classify(&self, market_price: f64, fair_pv: f64) -> Verdict {
        compute_verdict(market_price, fair_pv, self.abs_tol, self.pct_tol)
    }
}

#[inline]
pub fn compute_verdict(market_price: f64, fair_pv: f64, abs_tol: f64, pct_tol: f64) -> Verdict {
    let abs_diff = (market_price - fair_pv).abs();

    // With a zero fair value the relative test is undefined; only abs_tol applies.
    let within_pct = fair_pv > 0.0 && abs_diff / fair_pv <= pct_tol;

    if abs_diff <= abs_tol || within_pct {
        Verdict::Fair
    } else if market_price < fair_pv {
        Verdict::Cheap
    } else {
        Verdict::Expensive
    }
}

/// Signed gap between market and model. `percent` is None when fair value is 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Mispricing {
    pub absolute: f64,
    pub percent: Option<f64>,
}

impl Mispricing {
    pub fn new(market_price: f64, fair_pv: f64) -> Self {
        let absolute = market_price - fair_pv;
        let percent = (fair_pv > 0.0).then(|| absolute / fair_pv);
        Self { absolute, percent }
    }
}
