// Run-scoped occurrence indexing for repeated job names

use std::collections::HashMap;

/// Assigns zero-based occurrence indexes to job names within a single run
///
/// Repeated invocations of the same job template (e.g. a nightly import that
/// runs once per table) share a display name; the index keeps their metrics
/// apart. Indexes are only meaningful within one run: a fresh `JobIndexer`
/// starts every name at 0 again.
#[derive(Debug, Default)]
pub struct JobIndexer {
    seen: HashMap<String, usize>,
}

impl JobIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next index for `job_name` and advances its counter
    pub fn next_index(&mut self, job_name: &str) -> usize {
        let count = self.seen.entry(job_name.to_string()).or_insert(0);
        let index = *count;
        *count += 1;
        index
    }
}
