//! Persisted operational state
//!
//! JSON files read by operational tooling: a status record, the open
//! positions, and a capped trade history. The risk-state snapshot is the
//! only file read back in-process, and only when persistence is enabled.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::StateConfig;
use crate::risk::{Position, RiskState, Trade};

pub const STATUS_FILE: &str = "bot_status.json";
pub const POSITIONS_FILE: &str = "active_positions.json";
pub const HISTORY_FILE: &str = "trade_history.json";
pub const RISK_STATE_FILE: &str = "risk_state.json";

/// State persistence errors
#[derive(Debug, Error)]
pub enum StateError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Status record for dashboards and process monitors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotStatus {
    pub running: bool,
    pub open_positions: usize,
    pub total_pnl: Decimal,
    pub last_update: DateTime<Utc>,
}

/// Reads and writes the state directory
pub struct StatusStore {
    dir: PathBuf,
    history_cap: usize,
}

impl StatusStore {
    pub fn new(config: &StateConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            history_cap: config.history_cap.max(1),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Write via a temporary file so readers never see a partial document
    fn write_json<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<(), StateError> {
        let path = self.path(file);
        let io_err = |source| StateError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let json = serde_json::to_vec_pretty(value).map_err(|source| StateError::Json {
            path: path.clone(),
            source,
        })?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &path).map_err(io_err)?;
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>, StateError> {
        let path = self.path(file);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StateError::Io { path, source }),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StateError::Json { path, source })
    }

    pub fn write_status(&self, status: &BotStatus) -> Result<(), StateError> {
        self.write_json(STATUS_FILE, status)
    }

    pub fn read_status(&self) -> Result<Option<BotStatus>, StateError> {
        self.read_json(STATUS_FILE)
    }

    pub fn write_positions(&self, positions: &[Position]) -> Result<(), StateError> {
        self.write_json(POSITIONS_FILE, positions)
    }

    pub fn read_positions(&self) -> Result<Vec<Position>, StateError> {
        Ok(self.read_json(POSITIONS_FILE)?.unwrap_or_default())
    }

    /// Append to the history, dropping the oldest entries past the cap
    pub fn append_trade(&self, trade: &Trade) -> Result<(), StateError> {
        let mut history = self.read_history()?;
        history.push(trade.clone());
        if history.len() > self.history_cap {
            let excess = history.len() - self.history_cap;
            history.drain(..excess);
        }
        self.write_json(HISTORY_FILE, &history)
    }

    pub fn read_history(&self) -> Result<Vec<Trade>, StateError> {
        Ok(self.read_json(HISTORY_FILE)?.unwrap_or_default())
    }

    pub fn save_risk_state(&self, state: &RiskState) -> Result<(), StateError> {
        self.write_json(RISK_STATE_FILE, state)
    }

    pub fn load_risk_state(&self) -> Result<Option<RiskState>, StateError> {
        self.read_json(RISK_STATE_FILE)
    }
}
