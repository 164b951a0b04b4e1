//! Rendering of result records as text tables, JSON or CSV.

use crate::result::{MinimumVolatilityResult, OptimizationResult};
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

const RULE_WIDTH: usize = 48;

/// Errors that can occur while exporting a result.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    /// Human-readable table.
    #[default]
    Text,

    /// Comma-separated values, one row per ticker.
    Csv,

    /// Compact JSON.
    Json,

    /// Pretty-printed JSON.
    PrettyJson,
}

impl ExportFormat {
    /// File extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Text => "txt",
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Csv => "csv",
            Self::Json => "json",
            Self::PrettyJson => "pretty-json",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "table" => Ok(Self::Text),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty_json" | "pretty" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// Trait for types that can be exported in multiple formats.
pub trait Exporter {
    /// Export to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

impl OptimizationResult {
    /// Render as a table.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("\nOptimal Portfolio ({})\n", self.expected_return_source));
        output.push_str(&format!("Date: {}\n", self.date));
        output.push_str(&"=".repeat(RULE_WIDTH));
        output.push('\n');
        push_weights(&mut output, self.allocations());

        output.push_str(&format!(
            "{:<20} {:>12.2}%\n",
            "Expected Return",
            self.expected_return * 100.0
        ));
        output.push_str(&format!("{:<20} {:>12.2}%\n", "Volatility", self.volatility * 100.0));
        output.push_str(&format!("{:<20} {:>13.4}\n", "Sharpe Ratio", self.sharpe_ratio));
        output.push_str(&format!(
            "{:<20} {:>12.2}%\n",
            "Min Volatility",
            self.min_volatility * 100.0
        ));
        output.push_str(&format!(
            "{:<20} {:>12.2}%\n",
            "Risk-Free Rate",
            self.risk_free_rate * 100.0
        ));
        if self.risk_ceiling_infeasible {
            output.push_str("\nRisk ceiling is below the minimum achievable volatility;\n");
            output.push_str("showing the minimum-volatility portfolio.\n");
        } else if self.risk_ceiling_active {
            output.push_str("\nRisk ceiling is active at the optimum.\n");
        }
        output
    }
}

impl MinimumVolatilityResult {
    /// Render as a table.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str("\nMinimum Volatility Portfolio\n");
        output.push_str(&format!("Date: {}\n", self.date));
        output.push_str(&"=".repeat(RULE_WIDTH));
        output.push('\n');
        push_weights(&mut output, self.allocations());

        output.push_str(&format!(
            "{:<20} {:>12.2}%\n",
            "Min Volatility",
            self.min_volatility * 100.0
        ));
        output
    }
}

fn push_weights<'a>(output: &mut String, allocations: impl Iterator<Item = (&'a str, f64)>) {
    output.push_str(&format!("{:<20} {:>13}\n", "Ticker", "Weight"));
    output.push_str(&"-".repeat(RULE_WIDTH));
    output.push('\n');
    for (ticker, weight) in allocations {
        output.push_str(&format!("{:<20} {:>12.2}%\n", ticker, weight * 100.0));
    }
    output.push_str(&"-".repeat(RULE_WIDTH));
    output.push('\n');
}

fn weights_csv<'a>(
    allocations: impl Iterator<Item = (&'a str, f64)>,
) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["ticker", "weight"])?;
    for (ticker, weight) in allocations {
        wtr.write_record([ticker.to_string(), weight.to_string()])?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
}

impl Exporter for OptimizationResult {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Text => Ok(self.to_ascii_table()),
            ExportFormat::Csv => {
                let mut output = String::new();

                output.push_str(&format!("# date: {}\n", self.date));
                output.push_str(&format!("# model: {}\n", self.expected_return_source));
                output.push_str(&format!("# expected_return: {}\n", self.expected_return));
                output.push_str(&format!("# volatility: {}\n", self.volatility));
                output.push_str(&format!("# sharpe_ratio: {}\n", self.sharpe_ratio));
                output.push_str(&format!("# min_volatility: {}\n", self.min_volatility));
                output.push_str(&format!("# risk_free_rate: {}\n", self.risk_free_rate));
                output.push_str(&format!(
                    "# risk_ceiling_infeasible: {}\n",
                    self.risk_ceiling_infeasible
                ));
                output.push_str(&format!(
                    "# risk_ceiling_active: {}\n",
                    self.risk_ceiling_active
                ));
                output.push_str(&weights_csv(self.allocations())?);
                Ok(output)
            }
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

impl Exporter for MinimumVolatilityResult {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Text => Ok(self.to_ascii_table()),
            ExportFormat::Csv => {
                let mut output = String::new();

                output.push_str(&format!("# date: {}\n", self.date));
                output.push_str(&format!("# min_volatility: {}\n", self.min_volatility));
                output.push_str(&weights_csv(self.allocations())?);
                Ok(output)
            }
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}
