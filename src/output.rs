// Output module - writes rendered metrics for downstream forwarding
//
// The collector itself never talks to a metrics backend; it prints the final
// list so a wrapper (cron job, agent, shell pipe) can ship it.

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::metrics::facet::RenderedMetric;

/// Errors that can occur while writing output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write metrics: {0}")]
    WriteError(#[from] std::io::Error),

    #[error("Failed to serialize metrics: {0}")]
    SerializeError(#[from] serde_json::Error),

    #[error("Unknown output format: {0}")]
    UnknownFormat(String),
}

/// How rendered metrics are printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `name value`
    #[default]
    Plain,
    /// `name value timestamp` (Graphite plaintext protocol)
    Graphite,
    /// JSON array of `{"name": ..., "value": ...}`
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = OutputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain" => Ok(OutputFormat::Plain),
            "graphite" => Ok(OutputFormat::Graphite),
            "json" => Ok(OutputFormat::Json),
            other => Err(OutputError::UnknownFormat(other.to_string())),
        }
    }
}

/// Writes rendered metrics in a fixed format
///
/// The timestamp is captured once so every line of a run shares it.
pub struct MetricWriter {
    format: OutputFormat,
    timestamp: DateTime<Utc>,
}

impl MetricWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self::with_timestamp(format, Utc::now())
    }

    pub fn with_timestamp(format: OutputFormat, timestamp: DateTime<Utc>) -> Self {
        MetricWriter { format, timestamp }
    }

    /// Writes all metrics to `out`
    pub fn write_all<W: Write>(&self, out: &mut W, metrics: &[RenderedMetric]) -> Result<(), OutputError> {
        debug!("Writing {} metric(s) as {:?}", metrics.len(), self.format);

        match self.format {
            OutputFormat::Plain => {
                for metric in metrics {
                    writeln!(out, "{} {}", metric.name, metric.value)?;
                }
            }
            OutputFormat::Graphite => {
                let epoch = self.timestamp.timestamp();
                for metric in metrics {
                    writeln!(out, "{} {} {}", metric.name, metric.value, epoch)?;
                }
            }
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *out, metrics)?;
                writeln!(out)?;
            }
        }

        out.flush()?;
        Ok(())
    }
}
