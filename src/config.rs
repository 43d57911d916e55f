use crate::errors::{EngineError, EngineResult};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub iv_strike_window: f64,
    pub abs_tol: f64,
    pub pct_tol: f64,
    pub sensitivity_shifts: Vec<f64>,
    pub min_vol_floor: f64,
    pub request_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            iv_strike_window: 0.05,
            abs_tol: 0.01,
            pct_tol: 0.05,
            sensitivity_shifts: vec![-0.03, -0.02, 0.02, 0.03],
            min_vol_floor: 0.01,
            request_path: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();

        let iv_strike_window = env_var_or("IV_STRIKE_WINDOW", "0.05")
            .parse::<f64>()
            .map_err(|e| EngineError::Config(format!("IV_STRIKE_WINDOW: {e}")))?;

        let abs_tol = env_var_or("VERDICT_ABS_TOL", "0.01")
            .parse::<f64>()
            .map_err(|e| EngineError::Config(format!("VERDICT_ABS_TOL: {e}")))?;

        let pct_tol = env_var_or("VERDICT_PCT_TOL", "0.05")
            .parse::<f64>()
            .map_err(|e| EngineError::Config(format!("VERDICT_PCT_TOL: {e}")))?;

        let sensitivity_shifts = parse_shifts(&env_var_or("SENSITIVITY_SHIFTS", "-0.03,-0.02,0.02,0.03"))?;

        let min_vol_floor = env_var_or("MIN_VOL_FLOOR", "0.01")
            .parse::<f64>()
            .map_err(|e| EngineError::Config(format!("MIN_VOL_FLOOR: {e}")))?;

        let cfg = Self {
            iv_strike_window,
            abs_tol,
            pct_tol,
            sensitivity_shifts,
            min_vol_floor,
            request_path: std::env::var("ANALYSIS_REQUEST_PATH").ok().map(PathBuf::from),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if !(self.iv_strike_window > 0.0 && self.iv_strike_window < 1.0) {
            return Err(EngineError::Config(format!(
                "IV_STRIKE_WINDOW must be in (0, 1), got {}",
                self.iv_strike_window
            )));
        }
        if !(self.abs_tol >= 0.0) || !(self.pct_tol >= 0.0) {
            return Err(EngineError::Config(format!(
                "verdict tolerances must be non-negative, got abs={} pct={}",
                self.abs_tol, self.pct_tol
            )));
        }
        if !(self.min_vol_floor > 0.0) {
            return Err(EngineError::Config(format!(
                "MIN_VOL_FLOOR must be positive, got {}",
                self.min_vol_floor
            )));
        }
        Ok(())
    }
}

/// Parse a comma-separated list of volatility shifts, e.g. "-0.03,-0.02,0.02,0.03".
fn parse_shifts(raw: &str) -> EngineResult<Vec<f64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| EngineError::Config(format!("SENSITIVITY_SHIFTS: bad value {s:?}")))
        })
        .collect()
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
