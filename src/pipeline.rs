// Pipeline module - drives one collection run
//
// Enumerates completed jobs, flattens each job's counters, indexes repeated
// job names, and expands everything through the naming templates.
//
// # Flow
// JobEnumerator -> extract_job_name -> JobIndexer -> flatten -> facet

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::context::RunContext;
use crate::history::{HistoryError, JobEnumerator};
use crate::metrics::facet::{facet, RenderedMetric, Template, TemplateError};
use crate::metrics::flatten::{flatten, FlatMetric};
use crate::metrics::indexer::JobIndexer;
use crate::metrics::normalize::extract_job_name;

/// Errors that abort a collection run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// One collection run over a job source
pub struct CounterPipeline<'a> {
    enumerator: &'a dyn JobEnumerator,
    templates: &'a [Template],
}

impl<'a> CounterPipeline<'a> {
    pub fn new(enumerator: &'a dyn JobEnumerator, templates: &'a [Template]) -> Self {
        CounterPipeline {
            enumerator,
            templates,
        }
    }

    /// Fetches and flattens the counters of every completed job
    ///
    /// The indexer is supplied by the caller so its state is scoped to the run.
    pub async fn collect_metrics(&self, indexer: &mut JobIndexer) -> Result<Vec<FlatMetric>, PipelineError> {
        let jobs = self.enumerator.list_completed_jobs().await?;

        if jobs.is_empty() {
            info!("No completed jobs found");
            return Ok(Vec::new());
        }

        let mut metrics = Vec::new();

        for job in jobs {
            let job_name = extract_job_name(&job.name);
            let job_index = indexer.next_index(job_name);
            info!("Found job '{}' #{} (id: {})", job_name, job_index, job.id);

            let groups = self.enumerator.job_counters(&job.id).await?;
            let flattened = flatten(&job.id, job_name, job_index, &groups);
            if flattened.is_empty() {
                warn!("Job {} reported no counters", job.id);
            } else {
                debug!("Job {} produced {} counter reading(s)", job.id, flattened.len());
            }

            metrics.extend(flattened.into_vec());
        }

        Ok(metrics)
    }

    /// Runs the full pipeline and returns the rendered metrics
    pub async fn run(&self, context: &RunContext) -> Result<Vec<RenderedMetric>, PipelineError> {
        let mut indexer = JobIndexer::new();
        let metrics = self.collect_metrics(&mut indexer).await?;
        let rendered = facet(&metrics, self.templates, context)?;

        info!(
            "Collection complete: {} counter reading(s), {} rendered metric(s)",
            metrics.len(),
            rendered.len()
        );

        Ok(rendered)
    }
}
