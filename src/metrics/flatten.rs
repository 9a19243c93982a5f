// Counter flattening
//
// Turns one job's nested counter groups into a flat, ordered list of
// `hadoop.counters.<prefix>.<counter>.<stage>` paths.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use super::normalize::normalize_group;
use crate::history::{Counter, CounterGroup};

/// Execution stage a counter reading belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Total,
    Map,
    Reduce,
}

impl Stage {
    /// All stages, in the order they are emitted
    pub const ALL: [Stage; 3] = [Stage::Total, Stage::Map, Stage::Reduce];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Total => "total",
            Stage::Map => "map",
            Stage::Reduce => "reduce",
        }
    }

    /// Reads this stage's value from a counter
    pub fn value_of(&self, counter: &Counter) -> i64 {
        match self {
            Stage::Total => counter.total_counter_value,
            Stage::Map => counter.map_counter_value,
            Stage::Reduce => counter.reduce_counter_value,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-job tags attached to every flattened metric
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTags {
    pub job_id: String,
    pub job_name: String,
    pub job_index: usize,
}

impl JobTags {
    /// Tag key/value pairs, as seen by the template renderer
    pub fn pairs(&self) -> [(&'static str, String); 3] {
        [
            ("job_id", self.job_id.clone()),
            ("job_name", self.job_name.clone()),
            ("job_index", self.job_index.to_string()),
        ]
    }
}

/// A single flattened counter reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatMetric {
    pub path: String,
    pub value: i64,
    pub tags: JobTags,
}

/// Ordered, path-unique metrics produced from one job
///
/// Inserting a path that already exists replaces its value in place
/// (last write wins, first position kept).
#[derive(Debug, Default)]
pub struct FlatMetrics {
    entries: Vec<FlatMetric>,
    positions: HashMap<String, usize>,
}

impl FlatMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, metric: FlatMetric) {
        match self.positions.get(&metric.path) {
            Some(&pos) => {
                debug!("Counter path '{}' seen twice, keeping latest value", metric.path);
                self.entries[pos] = metric;
            }
            None => {
                self.positions.insert(metric.path.clone(), self.entries.len());
                self.entries.push(metric);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<FlatMetric> {
        self.entries
    }
}

/// Flattens one job's counter groups
///
/// Every counter yields exactly one entry per [`Stage`], zeros included.
pub fn flatten(
    job_id: &str,
    job_name: &str,
    job_index: usize,
    counter_groups: &[CounterGroup],
) -> FlatMetrics {
    let tags = JobTags {
        job_id: job_id.to_string(),
        job_name: job_name.to_string(),
        job_index,
    };

    let mut metrics = FlatMetrics::new();

    for group in counter_groups {
        let prefix = normalize_group(&group.counter_group_name);

        for counter in &group.counter {
            let counter_name = counter.name.to_lowercase();

            for stage in Stage::ALL {
                metrics.insert(FlatMetric {
                    path: format!("{}.{}.{}", prefix, counter_name, stage),
                    value: stage.value_of(counter),
                    tags: tags.clone(),
                });
            }
        }
    }

    metrics
}
