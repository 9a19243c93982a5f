// Run context resolution
//
// Gathers facts about where the collector is running (EC2 instance, EMR job
// flow, cluster display name). Every lookup may fail independently; a failed
// lookup is recorded as an absent value rather than aborting the run.

use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::CollectorSettings;

/// Keys every `RunContext` carries, present or not
pub const CONTEXT_KEYS: &[&str] = &["instance_id", "job_flow_id", "cluster_name", "local_address"];

/// Contextual key/value pairs for one run
///
/// All [`CONTEXT_KEYS`] are always present in the map; unknown values are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    values: BTreeMap<String, Option<String>>,
}

impl RunContext {
    /// Creates a context with every known key set to absent
    pub fn new() -> Self {
        let values = CONTEXT_KEYS
            .iter()
            .map(|key| (key.to_string(), None))
            .collect();
        RunContext { values }
    }

    /// Sets a value; empty strings are stored as absent
    pub fn set(&mut self, key: &str, value: Option<String>) {
        self.values
            .insert(key.to_string(), value.filter(|v| !v.is_empty()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Owned copy of the underlying map, used as the base for template rendering
    pub fn to_map(&self) -> BTreeMap<String, Option<String>> {
        self.values.clone()
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

type LookupResult = Result<Option<String>, Box<dyn Error + Send + Sync>>;

/// Source of environment facts
///
/// Each method is independent; `Ok(None)` means "not applicable here" and
/// `Err` means the lookup itself failed. Both end up as absent values.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn instance_id(&self) -> LookupResult;
    async fn local_address(&self) -> LookupResult;
    async fn job_flow_id(&self) -> LookupResult;
    async fn cluster_name(&self) -> LookupResult;
}

/// Builds the run context from a provider, downgrading failures to absent values
pub async fn resolve_context(provider: &dyn ContextProvider) -> RunContext {
    let mut context = RunContext::new();

    context.set("instance_id", settle("instance_id", provider.instance_id().await));
    context.set("local_address", settle("local_address", provider.local_address().await));
    context.set("job_flow_id", settle("job_flow_id", provider.job_flow_id().await));
    context.set("cluster_name", settle("cluster_name", provider.cluster_name().await));

    info!("Context for this run:");
    for (key, value) in context.iter() {
        info!("  {} => {}", key, value.unwrap_or("<absent>"));
    }

    context
}

fn settle(key: &str, result: LookupResult) -> Option<String> {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!("Could not resolve '{}', leaving it absent: {}", key, e);
            None
        }
    }
}

/// Contents of the EMR job flow info file
#[derive(Debug, Deserialize)]
struct JobFlowInfo {
    #[serde(rename = "jobFlowId", default)]
    job_flow_id: Option<String>,
}

/// Context provider for EMR nodes running on EC2
///
/// - instance id and private address come from the instance metadata service
/// - job flow id comes from the job flow file EMR drops on every node
/// - cluster name is taken from configuration
pub struct Ec2ContextProvider {
    http_client: reqwest::Client,
    metadata_endpoint: String,
    job_flow_file: PathBuf,
    cluster_name: Option<String>,
}

impl Ec2ContextProvider {
    pub fn new(settings: &CollectorSettings) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(Ec2ContextProvider {
            http_client,
            metadata_endpoint: settings.metadata_endpoint.clone(),
            job_flow_file: settings.job_flow_file.clone(),
            cluster_name: settings.cluster_name.clone(),
        })
    }

    /// Queries the metadata service and returns the raw response body
    async fn query_metadata(&self, path: &str) -> LookupResult {
        let url = format!("{}{}", self.metadata_endpoint, path);
        debug!("Querying instance metadata: {}", url);

        let body = self
            .http_client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let body = body.trim();
        Ok((!body.is_empty()).then(|| body.to_string()))
    }
}

#[async_trait]
impl ContextProvider for Ec2ContextProvider {
    async fn instance_id(&self) -> LookupResult {
        self.query_metadata("instance-id").await
    }

    async fn local_address(&self) -> LookupResult {
        self.query_metadata("local-ipv4").await
    }

    async fn job_flow_id(&self) -> LookupResult {
        let raw = tokio::fs::read_to_string(&self.job_flow_file).await?;
        parse_job_flow_id(&raw)
    }

    async fn cluster_name(&self) -> LookupResult {
        Ok(self.cluster_name.clone().filter(|name| !name.is_empty()))
    }
}

fn parse_job_flow_id(raw: &str) -> LookupResult {
    let info: JobFlowInfo = serde_json::from_str(raw)?;
    Ok(info.job_flow_id.filter(|id| !id.is_empty()))
}
