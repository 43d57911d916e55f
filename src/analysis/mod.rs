pub mod sensitivity;
pub mod verdict;

use crate::analysis::sensitivity::{price_with_sensitivity, SensitivityTable};
use crate::analysis::verdict::{Mispricing, Verdict, VerdictThresholds};
use crate::config::AppConfig;
use crate::errors::{EngineError, EngineResult};
use crate::models::{EventKind, PricingInput, PricingResult};
use crate::vol::chain::{OptionChainSnapshot, OptionQuote, OptionSide};
use crate::vol::iv_extract::extract_volatility;
use crate::vol::term_structure::{interpolate_term_structure_by_date, time_to_expiry_years};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

fn default_side() -> OptionSide {
    OptionSide::Call
}

/// One expiry's option chain as supplied by the market-data collaborator.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainInput {
    pub expiry: NaiveDate,
    #[serde(default = "default_side")]
    pub side: OptionSide,
    pub quotes: Vec<OptionQuote>,
}

/// Where the pricing volatility comes from.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum IvMode {
    /// Extract from option chains and interpolate to the contract expiry.
    Auto { chains: Vec<ChainInput> },
    /// Use the given volatility as is.
    Manual { volatility: f64 },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRequest {
    pub ticker: String,
    pub event: EventKind,
    pub spot: f64,
    /// Strike for above/below, barrier for touch.
    pub level: f64,
    pub expiry: NaiveDate,
    /// Defaults to today (UTC).
    #[serde(default)]
    pub reference_date: Option<NaiveDate>,
    pub rate: f64,
    #[serde(default)]
    pub dividend_yield: f64,
    /// Observed price of the Yes contract.
    pub market_price: f64,
    pub iv: IvMode,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub ticker: String,
    pub event: EventKind,
    pub model: &'static str,
    pub spot: f64,
    pub level: f64,
    pub expiry: NaiveDate,
    pub reference_date: NaiveDate,
    pub time_to_expiry: f64,
    pub rate: f64,
    pub dividend_yield: f64,
    pub volatility: f64,
    pub iv_source: String,
    pub pricing: PricingResult,
    pub sensitivity: SensitivityTable,
    pub market_price: f64,
    pub verdict: Verdict,
    pub mispricing: Mispricing,
    pub warnings: Vec<String>,
}

/// Volatility chosen for the contract, with everything worth surfacing.
#[derive(Debug, Clone)]
struct SelectedVol {
    volatility: f64,
    source: String,
    warnings: Vec<String>,
}

/// Run one full valuation: vol selection, pricing, sensitivity and verdict.
pub fn analyze(request: &AnalysisRequest, config: &AppConfig) -> EngineResult<AnalysisReport> {
    validate_request(request)?;

    let reference_date = request
        .reference_date
        .unwrap_or_else(|| chrono::Utc::now().date_naive());
    let time_to_expiry = time_to_expiry_years(request.expiry, reference_date)
        .map_err(|e| EngineError::InvalidInput(e.to_string()))?;

    let selected = select_volatility(request, reference_date, config)?;
    for w in &selected.warnings {
        tracing::warn!(ticker = %request.ticker, warning = %w, "volatility selection warning");
    }
    tracing::debug!(
        ticker = %request.ticker,
        volatility = selected.volatility,
        source = %selected.source,
        "volatility selected"
    );

    let input = PricingInput {
        spot: request.spot,
        level: request.level,
        time_to_expiry,
        rate: request.rate,
        dividend_yield: request.dividend_yield,
        volatility: selected.volatility,
    };

    let pricer = request.event.pricer();
    let sensitivity = price_with_sensitivity(
        &*pricer,
        &input,
        &config.sensitivity_shifts,
        config.min_vol_floor,
    )?;
    let pricing = *sensitivity.base();

    let thresholds = VerdictThresholds { abs_tol: config.abs_tol, pct_tol: config.pct_tol };
    let verdict = thresholds.classify(request.market_price, pricing.present_value);
    let mispricing = Mispricing::new(request.market_price, pricing.present_value);

    tracing::debug!(
        ticker = %request.ticker,
        model = pricer.name(),
        probability = pricing.probability,
        pv = pricing.present_value,
        market = request.market_price,
        verdict = %verdict,
        "priced"
    );

    Ok(AnalysisReport {
        ticker: request.ticker.clone(),
        event: request.event,
        model: pricer.name(),
        spot: request.spot,
        level: request.level,
        expiry: request.expiry,
        reference_date,
        time_to_expiry,
        rate: request.rate,
        dividend_yield: request.dividend_yield,
        volatility: selected.volatility,
        iv_source: selected.source,
        pricing,
        sensitivity,
        market_price: request.market_price,
        verdict,
        mispricing,
        warnings: selected.warnings,
    })
}

fn validate_request(request: &AnalysisRequest) -> EngineResult<()> {
    if !(request.spot > 0.0) || !request.spot.is_finite() {
        return Err(EngineError::InvalidInput(format!(
            "spot must be positive, got {}",
            request.spot
        )));
    }
    if !(request.level > 0.0) || !request.level.is_finite() {
        return Err(EngineError::InvalidInput(format!(
            "level must be positive, got {}",
            request.level
        )));
    }
    if !(0.0..=1.0).contains(&request.market_price) {
        return Err(EngineError::InvalidInput(format!(
            "market price must be in [0, 1], got {}",
            request.market_price
        )));
    }
    if !(request.dividend_yield >= 0.0) {
        return Err(EngineError::InvalidInput(format!(
            "dividend yield must be non-negative, got {}",
            request.dividend_yield
        )));
    }
    Ok(())
}

fn select_volatility(
    request: &AnalysisRequest,
    reference_date: NaiveDate,
    config: &AppConfig,
) -> EngineResult<SelectedVol> {
    let chains = match &request.iv {
        IvMode::Manual { volatility } => {
            if !(*volatility > 0.0) || !volatility.is_finite() {
                return Err(EngineError::InvalidInput(format!(
                    "manual volatility must be positive, got {volatility}"
                )));
            }
            return Ok(SelectedVol {
                volatility: *volatility,
                source: "manual".into(),
                warnings: Vec::new(),
            });
        }
        IvMode::Auto { chains } => chains,
    };

    let mut warnings = Vec::new();
    let mut pairs = Vec::with_capacity(chains.len());

    for chain in chains {
        let snapshot = OptionChainSnapshot::new(chain.side, chain.quotes.clone())?;
        match extract_volatility(&snapshot, request.level, config.iv_strike_window) {
            Ok(extraction) => {
                warnings.extend(extraction.warnings.iter().map(|w| format!("{}: {w}", chain.expiry)));
                pairs.push((chain.expiry, extraction.volatility));
            }
            Err(EngineError::InsufficientData(reason)) => {
                warnings.push(format!("{}: skipped ({reason})", chain.expiry));
            }
            Err(e) => return Err(e),
        }
    }

    if pairs.is_empty() {
        return Err(EngineError::InsufficientData(format!(
            "no usable option chain for {} near {}",
            request.ticker, request.level
        )));
    }

    let term = interpolate_term_structure_by_date(request.expiry, &pairs, reference_date)?;
    warnings.extend(term.warnings.iter().map(|w| format!("term structure: {w}")));

    Ok(SelectedVol {
        volatility: term.volatility,
        source: format!("auto ({} expiries)", pairs.len()),
        warnings,
    })
}
