use crate::errors::EngineResult;
use crate::models::{
    norm_cdf, safe_exp, stable_ratio, standard_normal, BarrierSide, BinaryPricer, PricingInput,
    PricingResult,
};
use statrs::distribution::Normal;

/// Relative |B - S| / S below which the barrier counts as already touched.
const AT_SPOT_TOLERANCE: f64 = 1e-10;

/// |mu| below which the driftless reflection identity is used.
const DRIFTLESS_THRESHOLD: f64 = 1e-10;

/// One-touch pricing: probability that GBM hits the barrier before expiry.
///
/// With a = ln(B/S), mu = r - q - sigma^2/2, lambda = mu / sigma^2, s = sigma*sqrt(T):
///
///   upper (a > 0): Phi(-(a - mu*T)/s) + e^(2*lambda*a) * Phi(-(a + mu*T)/s)
///   lower (a < 0): Phi( (a - mu*T)/s) + e^(2*lambda*a) * Phi( (a + mu*T)/s)
///   driftless:     2 * Phi(-|a|/s)
///
/// PV = e^(-rT) * P(hit). Both are clamped to [0, 1] after evaluation, since the
/// exponential term can overshoot when |lambda*a| is large.
pub struct TouchPricer {
    normal: Normal,
}

impl TouchPricer {
    pub fn new() -> Self {
        Self { normal: standard_normal() }
    }
}

impl Default for TouchPricer {
    fn default() -> Self {
        Self::new()
    }
}

/// Log-space barrier geometry shared by every branch.
#[derive(Debug, Clone, Copy)]
struct FirstPassage {
    /// ln(B/S)
    a: f64,
    /// Risk-neutral log drift
    mu: f64,
    /// mu / sigma^2
    lambda: f64,
    t: f64,
    sigma_sqrt_t: f64,
}

impl FirstPassage {
    fn new(input: &PricingInput) -> Self {
        let sigma_sq = input.volatility * input.volatility;
        let mu = input.drift();
        Self {
            a: (input.level / input.spot).ln(),
            mu,
            lambda: mu / sigma_sq,
            t: input.time_to_expiry,
            sigma_sqrt_t: input.sigma_sqrt_t(),
        }
    }

    #[inline]
    fn is_driftless(&self) -> bool {
        self.mu.abs() < DRIFTLESS_THRESHOLD
    }
}

/// Resolve the barrier side once, up front.
pub fn classify_barrier(spot: f64, barrier: f64) -> BarrierSide {
    if ((barrier - spot) / spot).abs() < AT_SPOT_TOLERANCE {
        BarrierSide::AtSpot
    } else if barrier > spot {
        BarrierSide::Upper
    } else {
        BarrierSide::Lower
    }
}

impl BinaryPricer for TouchPricer {
    #[inline]
    fn name(&self) -> &'static str {
        "Touch-Barrier"
    }

    fn price(&self, input: &PricingInput) -> EngineResult<PricingResult> {
        input.validate()?;

        let side = classify_barrier(input.spot, input.level);
        let fp = FirstPassage::new(input);

        let p = match side {
            BarrierSide::AtSpot => 1.0,
            _ if fp.is_driftless() => driftless_hit(&self.normal, &fp),
            BarrierSide::Upper => upper_hit(&self.normal, &fp),
            BarrierSide::Lower => lower_hit(&self.normal, &fp),
        };

        let mut result = PricingResult::from_probability(p, input);
        result.barrier_side = Some(side);
        Ok(result)
    }
}

/// Reflection principle for a driftless walk, either side.
fn driftless_hit(normal: &Normal, fp: &FirstPassage) -> f64 {
    2.0 * norm_cdf(normal, stable_ratio(-fp.a.abs(), fp.sigma_sqrt_t))
}

fn upper_hit(normal: &Normal, fp: &FirstPassage) -> f64 {
    let mu_t = fp.mu * fp.t;
    let direct = norm_cdf(normal, stable_ratio(-(fp.a - mu_t), fp.sigma_sqrt_t));
    let reflected = norm_cdf(normal, stable_ratio(-(fp.a + mu_t), fp.sigma_sqrt_t));
    direct + reflection_term(2.0 * fp.lambda * fp.a, reflected)
}

fn lower_hit(normal: &Normal, fp: &FirstPassage) -> f64 {
    let mu_t = fp.mu * fp.t;
    let direct = norm_cdf(normal, stable_ratio(fp.a - mu_t, fp.sigma_sqrt_t));
    let reflected = norm_cdf(normal, stable_ratio(fp.a + mu_t, fp.sigma_sqrt_t));
    direct + reflection_term(2.0 * fp.lambda * fp.a, reflected)
}

/// e^x * phi, evaluated as e^(x + ln phi) so a huge e^x against a vanishing
/// tail probability cannot become inf * 0.
#[inline]
fn reflection_term(x: f64, phi: f64) -> f64 {
    if phi <= 0.0 {
        0.0
    } else {
        safe_exp(x + phi.ln())
    }
}

/// Price a barrier-touch-before-expiry payoff.
pub fn price_touch(input: &PricingInput) -> EngineResult<PricingResult> {
    TouchPricer::new().price(input)
}
