// EMR Counter Collector - Hadoop job counter sampler
//
// Collects job counters from the MapReduce HistoryServer, normalizes them into
// `hadoop.counters.*` metric paths, and expands every metric through a set of
// naming templates filled in with cluster, instance and job context.
//
// # Features
// - Counter group normalization (FileSystemCounter -> fs, TaskCounter -> task, ...)
// - Per-run indexing of repeated job names
// - Template-based naming with clean elision of unknown context values
// - Plain, Graphite and JSON output on stdout
//
// # Usage
// emr-counter-collector [--config <path>] [--history-server <host>]
//                       [--cluster-name <name>] [--template <tpl>]... [--format <fmt>]
//
// Example:
// emr-counter-collector --cluster-name analytics --template "{cluster_name}.{metric}" --format graphite

use anyhow::{Context, Result};
use std::env;
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Module declarations
mod config;
mod context;
mod history;
mod metrics;
mod output;
mod pipeline;

use config::CollectorSettings;
use context::{resolve_context, Ec2ContextProvider};
use history::HistoryServerClient;
use output::{MetricWriter, OutputFormat};
use pipeline::CounterPipeline;

/// Application entry point
///
/// This function:
/// 1. Initializes logging
/// 2. Parses command-line arguments and loads settings
/// 3. Resolves the run context (instance, job flow, cluster)
/// 4. Runs the counter pipeline against the HistoryServer
/// 5. Prints the rendered metrics to stdout
///
/// Any failure aborts the run; the next scheduled invocation is the retry.
#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("=== EMR Counter Collector Starting ===");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args = parse_arguments(env::args().collect())?;

    let mut settings = match &args.config_path {
        Some(path) => CollectorSettings::load(path).context("Failed to load collector settings")?,
        None => CollectorSettings::default(),
    };
    args.apply(&mut settings);
    settings.log_summary();

    // Validate templates before touching the network
    let templates = settings
        .parsed_templates()
        .context("Invalid naming templates")?;

    let provider = Ec2ContextProvider::new(&settings).context("Failed to build metadata client")?;
    let context = resolve_context(&provider).await;

    // Not all YARN services listen on localhost, so prefer the private address
    let host = match (&settings.history_server.address, context.get("local_address")) {
        (Some(address), _) if !address.is_empty() => address.clone(),
        (_, Some(local)) => local.to_string(),
        (_, None) => {
            warn!("No HistoryServer address configured or discovered, using localhost");
            "localhost".to_string()
        }
    };

    let history = HistoryServerClient::new(&host, &settings)
        .context("Failed to build HistoryServer client")?;

    let rendered = CounterPipeline::new(&history, &templates)
        .run(&context)
        .await
        .context("Counter collection failed")?;

    let writer = MetricWriter::new(settings.output_format);
    writer
        .write_all(&mut io::stdout().lock(), &rendered)
        .context("Failed to write metrics")?;

    info!("=== EMR Counter Collector Finished ===");
    Ok(())
}

/// Application options parsed from command-line arguments
///
/// Anything given here overrides the settings file.
#[derive(Debug, Default)]
struct AppConfig {
    /// Path to a JSON settings file
    config_path: Option<PathBuf>,

    /// HistoryServer host
    history_server: Option<String>,

    /// Cluster display name
    cluster_name: Option<String>,

    /// Naming templates (replace the configured list when non-empty)
    templates: Vec<String>,

    format: Option<OutputFormat>,
}

impl AppConfig {
    fn apply(&self, settings: &mut CollectorSettings) {
        if let Some(host) = &self.history_server {
            settings.history_server.address = Some(host.clone());
        }
        if let Some(name) = &self.cluster_name {
            settings.cluster_name = Some(name.clone());
        }
        if !self.templates.is_empty() {
            settings.templates = self.templates.clone();
        }
        if let Some(format) = self.format {
            settings.output_format = format;
        }
    }
}

/// Parses command-line arguments
///
/// # Arguments (all optional)
/// - --config <path> - JSON settings file
/// - --history-server <host> - HistoryServer host
/// - --cluster-name <name> - Cluster display name
/// - --template <tpl> - Naming template, may be repeated
/// - --format <plain|graphite|json> - Output format
///
/// # Examples
/// ```bash
/// emr-counter-collector --config /etc/emr-counter-collector.json
/// emr-counter-collector --template "{metric}" --template "{cluster_name}.{metric}"
/// ```
fn parse_arguments(args: Vec<String>) -> Result<AppConfig> {
    // Helper function to find argument value
    let find_arg = |flag: &str| -> Option<String> {
        args.iter()
            .position(|arg| arg == flag)
            .and_then(|pos| args.get(pos + 1))
            .map(|s| s.to_string())
    };

    let templates = args
        .windows(2)
        .filter(|pair| pair[0] == "--template")
        .map(|pair| pair[1].clone())
        .collect();

    let format = find_arg("--format")
        .map(|raw| raw.parse::<OutputFormat>())
        .transpose()
        .context("Invalid --format")?;

    Ok(AppConfig {
        config_path: find_arg("--config").map(PathBuf::from),
        history_server: find_arg("--history-server"),
        cluster_name: find_arg("--cluster-name"),
        templates,
        format,
    })
}

/// Initializes the logging subsystem
///
/// Logs go to stderr so stdout only carries metric output.
/// JSON format under systemd, human-readable otherwise.
///
/// # Log Levels
/// Default: INFO
/// Can be overridden with RUST_LOG environment variable
fn init_logging() {
    // Systemd sets INVOCATION_ID environment variable
    let is_systemd = env::var("INVOCATION_ID").is_ok();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if is_systemd {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(io::stderr)
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true),
            )
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        std::iter::once("emr-counter-collector")
            .chain(raw.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_arguments() {
        let parsed = parse_arguments(args(&[
            "--config",
            "/etc/collector.json",
            "--template",
            "{metric}",
            "--template",
            "{cluster_name}.{metric}",
            "--format",
            "json",
        ]))
        .unwrap();

        assert_eq!(parsed.config_path, Some(PathBuf::from("/etc/collector.json")));
        assert_eq!(parsed.templates, vec!["{metric}", "{cluster_name}.{metric}"]);
        assert_eq!(parsed.format, Some(OutputFormat::Json));
        assert!(parsed.history_server.is_none());
    }

    #[test]
    fn test_invalid_format() {
        assert!(parse_arguments(args(&["--format", "xml"])).is_err());
    }

    #[test]
    fn test_arguments_override_settings() {
        let parsed = parse_arguments(args(&[
            "--history-server",
            "10.1.2.3",
            "--cluster-name",
            "analytics",
            "--template",
            "{job_name}.{metric}",
        ]))
        .unwrap();

        let mut settings = CollectorSettings::default();
        parsed.apply(&mut settings);

        assert_eq!(settings.history_server.address.as_deref(), Some("10.1.2.3"));
        assert_eq!(settings.cluster_name.as_deref(), Some("analytics"));
        assert_eq!(settings.templates, vec!["{job_name}.{metric}"]);
        assert_eq!(settings.output_format, OutputFormat::Plain);
    }

    #[test]
    fn test_no_arguments() {
        let parsed = parse_arguments(args(&[])).unwrap();
        assert!(parsed.config_path.is_none());
        assert!(parsed.templates.is_empty());
    }
}
