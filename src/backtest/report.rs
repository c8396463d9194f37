//! JSON backtest reports

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

use super::BacktestResult;

/// `<dir>/backtest_report_<SYMBOL>.json`
pub fn report_path(dir: &Path, symbol: &str) -> PathBuf {
    dir.join(format!("backtest_report_{symbol}.json"))
}

/// Write the result as pretty JSON, returning the file path
pub fn write_report(result: &BacktestResult, dir: &Path) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory {}", dir.display()))?;

    let path = report_path(dir, &result.symbol);
    let json = serde_json::to_string_pretty(result)?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;

    tracing::info!(path = %path.display(), "Backtest report written");
    Ok(path)
}
