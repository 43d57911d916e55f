use crate::errors::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionSide {
    Call,
    Put,
}

/// One row of an option chain. IV is a decimal (0.25, not 25); `None` when
/// the data source had no quote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    pub strike: f64,
    #[serde(default)]
    pub implied_vol: Option<f64>,
}

/// Strike/IV pairs for a single expiry and side, sorted by strike.
/// Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionChainSnapshot {
    side: OptionSide,
    quotes: Vec<OptionQuote>,
}

impl OptionChainSnapshot {
    /// Sorts by strike. Rejects non-positive strikes, duplicate strikes and
    /// present IVs that are not positive finite decimals.
    pub fn new(side: OptionSide, mut quotes: Vec<OptionQuote>) -> EngineResult<Self> {
        for q in &quotes {
            if !(q.strike > 0.0) || !q.strike.is_finite() {
                return Err(EngineError::InvalidInput(format!(
                    "strike must be positive, got {}",
                    q.strike
                )));
            }
            if let Some(iv) = q.implied_vol {
                if !(iv > 0.0) || !iv.is_finite() {
                    return Err(EngineError::InvalidInput(format!(
                        "implied vol at strike {} must be positive, got {iv}",
                        q.strike
                    )));
                }
            }
        }

        quotes.sort_by(|a, b| a.strike.total_cmp(&b.strike));

        if let Some(dup) = quotes.windows(2).find(|w| w[0].strike == w[1].strike) {
            return Err(EngineError::InvalidInput(format!(
                "duplicate strike {} in option chain",
                dup[0].strike
            )));
        }

        Ok(Self { side, quotes })
    }

    #[inline]
    pub fn side(&self) -> OptionSide {
        self.side
    }

    #[inline]
    pub fn quotes(&self) -> &[OptionQuote] {
        &self.quotes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// (strike, iv) for quotes that carry an IV, ascending by strike.
    pub fn usable(&self) -> Vec<(f64, f64)> {
        self.quotes
            .iter()
            .filter_map(|q| q.implied_vol.map(|iv| (q.strike, iv)))
            .collect()
    }
}
