// Configuration module - handles collector settings
//
// This module is responsible for:
// 1. Loading settings from an optional JSON file
// 2. Filling in defaults for everything not specified
// 3. Validating naming templates before any HTTP call is made

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::metrics::facet::{Template, TemplateError};
use crate::output::OutputFormat;

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings format: {0}")]
    InvalidSettings(#[from] serde_json::Error),

    #[error("Invalid template: {0}")]
    InvalidTemplate(#[from] TemplateError),

    #[error("Missing required setting: {0}")]
    MissingRequiredSetting(String),
}

/// Collector settings
///
/// Every field has a default, so an empty document (or no file at all) is valid.
///
/// # Example Settings File
/// ```json
/// {
///   "templates": [
///     "{metric}",
///     "{cluster_name}.{metric}",
///     "emr.{job_flow_id}.{job_name}.{job_index}.{metric}"
///   ],
///   "history_server": { "address": "10.0.0.5", "port": 19888 },
///   "cluster_name": "analytics-prod",
///   "request_timeout_secs": 10,
///   "output_format": "graphite"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorSettings {
    /// Naming templates, applied to every metric in this order
    pub templates: Vec<String>,

    /// Where to find the HistoryServer
    pub history_server: HistoryServerSettings,

    /// Base URL of the EC2 instance metadata service (with trailing slash)
    pub metadata_endpoint: String,

    /// EMR job flow info file
    pub job_flow_file: PathBuf,

    /// Display name of the cluster, if known
    pub cluster_name: Option<String>,

    /// Timeout for every HTTP request, in seconds
    pub request_timeout_secs: u64,

    pub output_format: OutputFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryServerSettings {
    /// Host to query; falls back to this instance's private address
    pub address: Option<String>,

    pub port: u16,
}

impl Default for HistoryServerSettings {
    fn default() -> Self {
        HistoryServerSettings {
            address: None,
            port: 19888,
        }
    }
}

impl Default for CollectorSettings {
    fn default() -> Self {
        CollectorSettings {
            templates: vec!["{metric}".to_string()],
            history_server: HistoryServerSettings::default(),
            metadata_endpoint: "http://169.254.169.254/latest/meta-data/".to_string(),
            job_flow_file: PathBuf::from("/mnt/var/lib/info/job-flow.json"),
            cluster_name: None,
            request_timeout_secs: 10,
            output_format: OutputFormat::default(),
        }
    }
}

impl CollectorSettings {
    /// Loads settings from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading collector settings from {}", path.display());

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json(&raw)
    }

    /// Parses settings from a JSON string
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let settings: CollectorSettings = serde_json::from_str(raw)?;
        Ok(settings)
    }

    /// Parses and validates the configured templates
    ///
    /// # Errors
    /// - No templates configured
    /// - A template is malformed or references an unknown placeholder
    pub fn parsed_templates(&self) -> Result<Vec<Template>, ConfigError> {
        if self.templates.is_empty() {
            return Err(ConfigError::MissingRequiredSetting("templates".to_string()));
        }

        self.templates
            .iter()
            .map(|source| -> Result<Template, ConfigError> {
                let template = Template::parse(source)?;
                template.validate()?;
                Ok(template)
            })
            .collect()
    }

    /// Logs the effective settings for visibility
    pub fn log_summary(&self) {
        info!(
            "HistoryServer: {}:{}",
            self.history_server.address.as_deref().unwrap_or("<local address>"),
            self.history_server.port
        );
        info!("Output format: {:?}", self.output_format);
        for template in &self.templates {
            info!("  Template: {}", template);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = CollectorSettings::from_json("{}").unwrap();

        assert_eq!(settings.templates, vec!["{metric}".to_string()]);
        assert_eq!(settings.history_server.port, 19888);
        assert!(settings.history_server.address.is_none());
        assert_eq!(
            settings.job_flow_file,
            PathBuf::from("/mnt/var/lib/info/job-flow.json")
        );
        assert_eq!(settings.request_timeout_secs, 10);
        assert_eq!(settings.output_format, OutputFormat::Plain);
    }

    #[test]
    fn test_partial_settings() {
        let raw = r#"{
            "templates": ["{cluster_name}.{metric}"],
            "history_server": { "address": "10.0.0.5" },
            "cluster_name": "analytics",
            "output_format": "graphite"
        }"#;

        let settings = CollectorSettings::from_json(raw).unwrap();

        assert_eq!(settings.history_server.address.as_deref(), Some("10.0.0.5"));
        assert_eq!(settings.history_server.port, 19888);
        assert_eq!(settings.cluster_name.as_deref(), Some("analytics"));
        assert_eq!(settings.output_format, OutputFormat::Graphite);
        assert_eq!(settings.parsed_templates().unwrap().len(), 1);
    }

    #[test]
    fn test_template_validation() {
        let mut settings = CollectorSettings::default();

        settings.templates = vec![];
        assert!(matches!(
            settings.parsed_templates(),
            Err(ConfigError::MissingRequiredSetting(_))
        ));

        settings.templates = vec!["{metric}".to_string(), "{availability_zone}.{metric}".to_string()];
        assert!(matches!(
            settings.parsed_templates(),
            Err(ConfigError::InvalidTemplate(TemplateError::UnknownPlaceholder { .. }))
        ));

        settings.templates = vec!["{metric".to_string()];
        assert!(matches!(
            settings.parsed_templates(),
            Err(ConfigError::InvalidTemplate(TemplateError::UnbalancedBrace { .. }))
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            CollectorSettings::from_json("{\"templates\": 5}"),
            Err(ConfigError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            CollectorSettings::load(Path::new("/nonexistent/collector.json")),
            Err(ConfigError::ReadError { .. })
        ));
    }
}
