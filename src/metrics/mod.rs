// Metrics module - counter normalization and faceting
//
// The pure, synchronous core of the collector. Nothing in here performs I/O:
// - `normalize`: counter group and job name normalization
// - `flatten`: nested counter groups to flat `hadoop.counters.*` paths
// - `indexer`: run-scoped indexes for repeated job names
// - `facet`: template expansion of flat metrics into final names

pub mod facet;
pub mod flatten;
pub mod indexer;
pub mod normalize;
