use fairvol::analysis::{analyze, AnalysisRequest};
use fairvol::config::AppConfig;
use fairvol::errors::EngineResult;
use std::path::{Path, PathBuf};

fn main() {
    // Structured logging on stderr so stdout carries only the report.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cfg = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    let path = match std::env::args().nth(1).map(PathBuf::from).or_else(|| cfg.request_path.clone()) {
        Some(p) => p,
        None => {
            tracing::error!("no analysis request: pass a JSON path or set ANALYSIS_REQUEST_PATH");
            std::process::exit(1);
        }
    };

    match run(&path, &cfg) {
        Ok(report) => println!("{report}"),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "analysis failed");
            std::process::exit(1);
        }
    }
}

/// Read the request, value it, and render the report as pretty JSON.
fn run(path: &Path, cfg: &AppConfig) -> EngineResult<String> {
    let raw = std::fs::read_to_string(path)?;
    let request: AnalysisRequest = serde_json::from_str(&raw)?;

    tracing::info!(
        ticker = %request.ticker,
        event = %request.event,
        level = request.level,
        expiry = %request.expiry,
        "analysis starting"
    );

    let report = analyze(&request, cfg)?;

    tracing::info!(
        ticker = %report.ticker,
        model = report.model,
        volatility = report.volatility,
        fair_pv = report.pricing.present_value,
        market = report.market_price,
        verdict = %report.verdict,
        "analysis complete"
    );

    Ok(serde_json::to_string_pretty(&report)?)
}
