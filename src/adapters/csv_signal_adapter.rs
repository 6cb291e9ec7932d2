//! Semicolon-delimited signal file adapter.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::error::TraderError;
use crate::domain::signal_row::SignalRow;
use crate::ports::signal_source_port::SignalSourcePort;

const REQUIRED_HEADERS: [&str; 10] = [
    "Magic Number",
    "Month",
    "Symbol",
    "Entry",
    "TP",
    "SL",
    "SL Type",
    "Risk",
    "Direction",
    "Type",
];

pub struct CsvSignalAdapter {
    path: PathBuf,
}

impl CsvSignalAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse signal rows from CSV text.
    pub fn parse(content: &str) -> Result<Vec<Result<SignalRow, TraderError>>, TraderError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b';')
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers = rdr.headers().map_err(|e| TraderError::Source {
            reason: format!("CSV header error: {e}"),
        })?;
        if let Some(missing) = REQUIRED_HEADERS
            .iter()
            .find(|h| !headers.iter().any(|c| c == **h))
        {
            return Err(TraderError::Source {
                reason: format!("missing column {missing:?} (is the file ';'-delimited?)"),
            });
        }

        Ok(rdr
            .deserialize::<SignalRow>()
            .map(|row| {
                row.map_err(|e| TraderError::Source {
                    reason: match e.position() {
                        Some(pos) => format!("line {}: {e}", pos.line()),
                        None => e.to_string(),
                    },
                })
            })
            .collect())
    }
}

impl SignalSourcePort for CsvSignalAdapter {
    fn load_rows(&self) -> Result<Vec<Result<SignalRow, TraderError>>, TraderError> {
        let content = fs::read_to_string(&self.path).map_err(|e| TraderError::Source {
            reason: format!("failed to read {}: {e}", self.path.display()),
        })?;
        Self::parse(&content)
    }
}
