// HistoryServer access
//
// Defines the job enumeration interface the pipeline consumes and an
// implementation backed by the MapReduce HistoryServer REST API
// (`/ws/v1/history/mapreduce/...`).

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::CollectorSettings;

/// Errors that can occur while talking to the HistoryServer
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("HistoryServer request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Unexpected HistoryServer response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A completed job as listed by the HistoryServer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobSummary {
    pub id: String,
    pub name: String,
}

/// A named group of counters, e.g. `org.apache.hadoop.mapreduce.TaskCounter`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterGroup {
    pub counter_group_name: String,
    #[serde(default)]
    pub counter: Vec<Counter>,
}

/// One counter with its per-stage readings
///
/// All stage values are required; a response missing one is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counter {
    pub name: String,
    pub total_counter_value: i64,
    pub map_counter_value: i64,
    pub reduce_counter_value: i64,
}

/// Source of completed jobs and their counters
#[async_trait]
pub trait JobEnumerator: Send + Sync {
    /// Lists completed jobs with their full raw names
    async fn list_completed_jobs(&self) -> Result<Vec<JobSummary>, HistoryError>;

    /// Fetches the counter groups of one job
    async fn job_counters(&self, job_id: &str) -> Result<Vec<CounterGroup>, HistoryError>;
}

#[derive(Debug, Deserialize)]
struct JobsResponse {
    jobs: Option<JobList>,
}

#[derive(Debug, Deserialize)]
struct JobList {
    #[serde(default)]
    job: Vec<JobSummary>,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    job: JobSummary,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobCountersResponse {
    job_counters: JobCounters,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobCounters {
    #[serde(default)]
    counter_group: Vec<CounterGroup>,
}

fn decode<T: DeserializeOwned>(url: &str, body: &str) -> Result<T, HistoryError> {
    serde_json::from_str(body).map_err(|source| HistoryError::Decode {
        url: url.to_string(),
        source,
    })
}

fn parse_job_list(url: &str, body: &str) -> Result<Vec<JobSummary>, HistoryError> {
    let response: JobsResponse = decode(url, body)?;
    Ok(response.jobs.map(|list| list.job).unwrap_or_default())
}

fn parse_job(url: &str, body: &str) -> Result<JobSummary, HistoryError> {
    let response: JobResponse = decode(url, body)?;
    Ok(response.job)
}

fn parse_job_counters(url: &str, body: &str) -> Result<Vec<CounterGroup>, HistoryError> {
    let response: JobCountersResponse = decode(url, body)?;
    Ok(response.job_counters.counter_group)
}

/// HistoryServer REST client
pub struct HistoryServerClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl HistoryServerClient {
    /// Creates a client for the HistoryServer at `host:port`
    pub fn new(host: &str, settings: &CollectorSettings) -> Result<Self, HistoryError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        let base_url = format!(
            "http://{}:{}/ws/v1/history/mapreduce",
            host, settings.history_server.port
        );
        info!("Targeting HistoryServer at {}", base_url);

        Ok(HistoryServerClient {
            http_client,
            base_url,
        })
    }

    async fn get(&self, path: &str) -> Result<(String, String), HistoryError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let body = self
            .http_client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok((url, body))
    }
}

#[async_trait]
impl JobEnumerator for HistoryServerClient {
    async fn list_completed_jobs(&self) -> Result<Vec<JobSummary>, HistoryError> {
        let (url, body) = self.get("/jobs").await?;
        let listed = parse_job_list(&url, &body)?;

        // The listing can carry truncated names, so fetch each job for its full name
        let mut jobs = Vec::with_capacity(listed.len());
        for job in listed {
            let (url, body) = self.get(&format!("/jobs/{}", job.id)).await?;
            jobs.push(parse_job(&url, &body)?);
        }

        Ok(jobs)
    }

    async fn job_counters(&self, job_id: &str) -> Result<Vec<CounterGroup>, HistoryError> {
        let (url, body) = self.get(&format!("/jobs/{}/counters", job_id)).await?;
        parse_job_counters(&url, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const URL: &str = "http://test/ws/v1/history/mapreduce";

    #[test]
    fn test_parse_job_list() {
        let body = json!({
            "jobs": {
                "job": [
                    {"id": "job_1_0001", "name": "ImportTask(table=a)", "state": "SUCCEEDED"},
                    {"id": "job_1_0002", "name": "ImportTask(table=b)", "state": "SUCCEEDED"}
                ]
            }
        })
        .to_string();

        let jobs = parse_job_list(URL, &body).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].id, "job_1_0002");
        assert_eq!(jobs[1].name, "ImportTask(table=b)");
    }

    #[test]
    fn test_parse_empty_job_list() {
        assert!(parse_job_list(URL, r#"{"jobs": null}"#).unwrap().is_empty());
        assert!(parse_job_list(URL, r#"{"jobs": {}}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_job_counters() {
        let body = json!({
            "jobCounters": {
                "id": "job_1_0001",
                "counterGroup": [{
                    "counterGroupName": "org.apache.hadoop.mapreduce.JobCounter",
                    "counter": [{
                        "name": "TOTAL_LAUNCHED_MAPS",
                        "totalCounterValue": 9,
                        "mapCounterValue": 3,
                        "reduceCounterValue": 6
                    }]
                }]
            }
        })
        .to_string();

        let groups = parse_job_counters(URL, &body).unwrap();
        assert_eq!(
            groups,
            vec![CounterGroup {
                counter_group_name: "org.apache.hadoop.mapreduce.JobCounter".to_string(),
                counter: vec![Counter {
                    name: "TOTAL_LAUNCHED_MAPS".to_string(),
                    total_counter_value: 9,
                    map_counter_value: 3,
                    reduce_counter_value: 6,
                }],
            }]
        );
    }

    #[test]
    fn test_missing_stage_is_schema_violation() {
        let body = json!({
            "jobCounters": {
                "counterGroup": [{
                    "counterGroupName": "TaskCounter",
                    "counter": [{
                        "name": "SPILLED_RECORDS",
                        "totalCounterValue": 9,
                        "mapCounterValue": 3
                    }]
                }]
            }
        })
        .to_string();

        let err = parse_job_counters(URL, &body).unwrap_err();
        assert!(matches!(err, HistoryError::Decode { .. }));
        assert!(err.to_string().contains("reduceCounterValue"));
    }

    #[test]
    fn test_missing_group_name_is_schema_violation() {
        let body = r#"{"jobCounters": {"counterGroup": [{"counter": []}]}}"#;
        assert!(matches!(
            parse_job_counters(URL, body),
            Err(HistoryError::Decode { .. })
        ));
    }
}
