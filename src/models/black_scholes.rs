use crate::errors::EngineResult;
use crate::models::{
    norm_cdf, stable_ratio, standard_normal, BinaryPricer, Direction, PricingInput, PricingResult,
};
use statrs::distribution::Normal;

/// Black-Scholes digital (cash-or-nothing) pricing.
///
/// P(S_T > K) = Phi(d2),  P(S_T < K) = Phi(-d2)
///
/// where d2 = (ln(S/K) + (r - q - sigma^2/2)*T) / (sigma * sqrt(T))
/// and PV = e^(-rT) * P.
///
/// As sigma*sqrt(T) -> 0, d2 goes to +-inf by the sign of the numerator and
/// the probability collapses to 0 or 1. The probability is clamped after Phi.
pub struct DigitalPricer {
    direction: Direction,
    /// Standard normal distribution (created once, reused)
    normal: Normal,
}

impl DigitalPricer {
    pub fn new(direction: Direction) -> Self {
        Self { direction, normal: standard_normal() }
    }
}

impl BinaryPricer for DigitalPricer {
    #[inline]
    fn name(&self) -> &'static str {
        "Digital"
    }

    fn price(&self, input: &PricingInput) -> EngineResult<PricingResult> {
        input.validate()?;

        let log_moneyness = (input.spot / input.level).ln();
        let d2 = stable_ratio(
            log_moneyness + input.drift() * input.time_to_expiry,
            input.sigma_sqrt_t(),
        );

        let p = match self.direction {
            Direction::Above => norm_cdf(&self.normal, d2),
            Direction::Below => norm_cdf(&self.normal, -d2),
        };

        let mut result = PricingResult::from_probability(p, input);
        result.d2 = Some(d2);
        Ok(result)
    }
}

/// Price a terminal above/below payoff.
pub fn price_digital(input: &PricingInput, direction: Direction) -> EngineResult<PricingResult> {
    DigitalPricer::new(direction).price(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EngineError;

    fn atm() -> PricingInput {
        PricingInput {
            spot: 100.0,
            level: 100.0,
            time_to_expiry: 1.0,
            rate: 0.05,
            dividend_yield: 0.0,
            volatility: 0.20,
        }
    }

    #[test]
    fn test_atm_reference_value() {
        let r = price_digital(&atm(), Direction::Above).unwrap();
        // Phi(0.15) = 0.559618, discounted at 5% for one year.
        assert!((r.probability - 0.559618).abs() < 1e-6, "prob={}", r.probability);
        let pv = (-0.05f64).exp() * 0.559618;
        assert!((r.present_value - pv).abs() < 1e-6, "pv={}", r.present_value);
        assert!((r.d2.unwrap() - 0.15).abs() < 1e-12, "d2={:?}", r.d2);
        assert!((r.drift - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_deep_itm() {
        let input = PricingInput { spot: 130.0, ..atm() };
        let p = price_digital(&input, Direction::Above).unwrap().probability;
        assert!(p > 0.9, "deep ITM prob={p} should be > 0.9");
    }

    #[test]
    fn test_deep_otm() {
        let input = PricingInput { spot: 70.0, ..atm() };
        let p = price_digital(&input, Direction::Above).unwrap().probability;
        assert!(p < 0.1, "deep OTM prob={p} should be < 0.1");
    }

    #[test]
    fn test_dividend_lowers_above_probability() {
        let base = price_digital(&atm(), Direction::Above).unwrap().probability;
        let with_q = price_digital(&PricingInput { dividend_yield: 0.03, ..atm() }, Direction::Above)
            .unwrap()
            .probability;
        assert!(with_q < base, "dividend yield should lower P(above): {with_q} vs {base}");
    }

    #[test]
    fn test_rejects_invalid_inputs() {
        for bad in [
            PricingInput { spot: 0.0, ..atm() },
            PricingInput { level: 0.0, ..atm() },
            PricingInput { time_to_expiry: -1.0, ..atm() },
            PricingInput { volatility: 0.0, ..atm() },
        ] {
            let err = price_digital(&bad, Direction::Below).unwrap_err();
            assert!(matches!(err, EngineError::InvalidInput(_)), "{bad:?} -> {err:?}");
        }
    }

    #[test]
    fn test_degenerate_limits_stay_finite() {
        // Vanishing sigma*sqrt(T): the outcome is decided by the sign of S - K.
        let tiny = PricingInput { volatility: 1e-300, time_to_expiry: 1e-300, rate: 0.0, ..atm() };
        let itm = PricingInput { spot: 101.0, ..tiny };
        let otm = PricingInput { spot: 99.0, ..tiny };

        let p_itm = price_digital(&itm, Direction::Above).unwrap();
        let p_otm = price_digital(&otm, Direction::Above).unwrap();
        assert_eq!(p_itm.probability, 1.0);
        assert_eq!(p_otm.probability, 0.0);
        assert!(p_itm.present_value.is_finite() && p_otm.present_value.is_finite());

        let at = price_digital(&tiny, Direction::Above).unwrap();
        assert!((0.0..=1.0).contains(&at.probability), "at-strike prob={}", at.probability);
    }

    #[test]
    fn test_above_plus_below_is_one() {
        for &sigma in &[0.01, 0.1, 0.3, 1.0, 2.5, 5.0] {
            for &t in &[0.001, 0.1, 1.0, 4.0, 10.0] {
                for &ratio in &[0.1, 0.5, 0.95, 1.0, 1.05, 2.0, 10.0] {
                    for &(r, q) in &[(0.0, 0.0), (0.05, 0.0), (0.04, 0.02), (-0.01, 0.0)] {
                        let input = PricingInput {
                            spot: 100.0 * ratio,
                            level: 100.0,
                            time_to_expiry: t,
                            rate: r,
                            dividend_yield: q,
                            volatility: sigma,
                        };
                        let up = price_digital(&input, Direction::Above).unwrap();
                        let down = price_digital(&input, Direction::Below).unwrap();
                        let sum = up.probability + down.probability;
                        assert!((sum - 1.0).abs() < 1e-9, "sum={sum} for {input:?}");
                        for res in [up, down] {
                            assert!((0.0..=1.0).contains(&res.probability), "{input:?}");
                            assert!((0.0..=1.0).contains(&res.present_value), "{input:?}");
                        }
                    }
                }
            }
        }
    }
}
