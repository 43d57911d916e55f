pub mod black_scholes;
pub mod touch_barrier;

use crate::errors::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

/// Exponent ceiling for `safe_exp`. exp(709.78) is the largest finite f64.
const MAX_EXP_INPUT: f64 = 700.0;

/// All binary payoff pricers implement this trait.
/// price() must be a pure function: deterministic output from inputs only.
/// Send + Sync so a pricer can be shared across threads.
pub trait BinaryPricer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Risk-neutral probability and discounted value of a $1 payoff.
    /// Probability and PV are always in [0, 1].
    fn price(&self, input: &PricingInput) -> EngineResult<PricingResult>;
}

/// Terminal condition for a digital payoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Above,
    Below,
}

/// Event type of the contract being valued. Picks the pricer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Above,
    Below,
    Touch,
}

impl EventKind {
    pub fn pricer(self) -> Box<dyn BinaryPricer> {
        match self {
            Self::Above => Box::new(black_scholes::DigitalPricer::new(Direction::Above)),
            Self::Below => Box::new(black_scholes::DigitalPricer::new(Direction::Below)),
            Self::Touch => Box::new(touch_barrier::TouchPricer::new()),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Above => write!(f, "above"),
            Self::Below => write!(f, "below"),
            Self::Touch => write!(f, "touch"),
        }
    }
}

/// Where a touch barrier sits relative to spot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarrierSide {
    Upper,
    Lower,
    AtSpot,
}

/// Inputs to one pricing call. `level` is the strike for digitals and the
/// barrier for touches. Rates and vol are annual decimals, time in years.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricingInput {
    pub spot: f64,
    pub level: f64,
    pub time_to_expiry: f64,
    pub rate: f64,
    pub dividend_yield: f64,
    pub volatility: f64,
}

impl PricingInput {
    pub fn validate(&self) -> EngineResult<()> {
        let positive = [
            ("spot", self.spot),
            ("level", self.level),
            ("time to expiry", self.time_to_expiry),
            ("volatility", self.volatility),
        ];
        for (name, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(EngineError::InvalidInput(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if !self.rate.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "rate must be finite, got {}",
                self.rate
            )));
        }
        if !(self.dividend_yield >= 0.0) || !self.dividend_yield.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "dividend yield must be non-negative, got {}",
                self.dividend_yield
            )));
        }
        Ok(())
    }

    /// Same contract, different volatility.
    #[inline]
    pub fn with_volatility(&self, volatility: f64) -> Self {
        Self { volatility, ..*self }
    }

    /// Risk-neutral log drift mu = r - q - sigma^2/2.
    #[inline]
    pub fn drift(&self) -> f64 {
        self.rate - self.dividend_yield - 0.5 * self.volatility * self.volatility
    }

    /// sigma * sqrt(T)
    #[inline]
    pub fn sigma_sqrt_t(&self) -> f64 {
        self.volatility * self.time_to_expiry.sqrt()
    }

    /// e^(-rT)
    #[inline]
    pub fn discount_factor(&self) -> f64 {
        safe_exp(-self.rate * self.time_to_expiry)
    }
}

/// Output of a pricer call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingResult {
    pub probability: f64,
    pub present_value: f64,
    pub drift: f64,
    /// Terminal d2 statistic, digital pricing only.
    pub d2: Option<f64>,
    /// Resolved barrier side, touch pricing only.
    pub barrier_side: Option<BarrierSide>,
}

impl PricingResult {
    /// Clamp the probability, then discount it. PV is clamped as well since
    /// a negative rate makes the discount factor exceed one.
    pub(crate) fn from_probability(raw_probability: f64, input: &PricingInput) -> Self {
        let probability = clamp_unit(raw_probability);
        let present_value = clamp_unit(input.discount_factor() * probability);
        Self {
            probability,
            present_value,
            drift: input.drift(),
            d2: None,
            barrier_side: None,
        }
    }
}

/// Standard normal distribution, built once per pricer.
pub(crate) fn standard_normal() -> Normal {
    Normal::new(0.0, 1.0).unwrap_or(Normal::standard())
}

/// Phi(z). Infinite arguments map to the exact limits.
#[inline]
pub(crate) fn norm_cdf(normal: &Normal, z: f64) -> f64 {
    if z == f64::INFINITY {
        1.0
    } else if z == f64::NEG_INFINITY {
        0.0
    } else {
        normal.cdf(z)
    }
}

/// Ratio num/den for a positive denominator that may have underflowed.
/// A vanishing denominator sends the ratio to +-inf by the sign of num, or 0 when num is 0.
#[inline]
pub(crate) fn stable_ratio(num: f64, den: f64) -> f64 {
    let z = num / den;
    if z.is_nan() || den <= 0.0 {
        if num > 0.0 {
            f64::INFINITY
        } else if num < 0.0 {
            f64::NEG_INFINITY
        } else {
            0.0
        }
    } else {
        z
    }
}

#[inline]
pub(crate) fn safe_exp(x: f64) -> f64 {
    x.min(MAX_EXP_INPUT).exp()
}

/// Clamp to [0, 1]. NaN is mapped to 0 so it can never leak into a result.
#[inline]
pub(crate) fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
