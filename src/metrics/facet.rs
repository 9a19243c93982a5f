// Faceting engine
//
// Expands each flattened metric into one output name per configured template.
// Templates are `.`-separated segments containing `{name}` placeholders;
// a segment whose placeholder resolves to an absent value is dropped along
// with its separator, so `{cluster_name}.{metric}` renders as just the metric
// path when the cluster name is unknown.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::flatten::FlatMetric;
use crate::context::{RunContext, CONTEXT_KEYS};

/// Per-metric tag keys available to templates
pub const TAG_KEYS: &[&str] = &["job_id", "job_name", "job_index"];

/// Keys bound to the metric path itself
pub const METRIC_KEYS: &[&str] = &["metric", "metric_name"];

/// Errors raised while parsing or rendering templates
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unbalanced brace at byte {position} in template '{template}'")]
    UnbalancedBrace { template: String, position: usize },

    #[error("Empty placeholder in template '{0}'")]
    EmptyPlaceholder(String),

    #[error("Unknown placeholder '{{{name}}}' in template '{template}'")]
    UnknownPlaceholder { template: String, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Placeholder(String),
}

/// A parsed naming template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Vec<Piece>>,
}

impl Template {
    /// Parses a template string
    ///
    /// `{{` and `}}` produce literal braces. Any `.` outside a placeholder
    /// starts a new segment.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let unbalanced = |position| TemplateError::UnbalancedBrace {
            template: source.to_string(),
            position,
        };

        let mut segments = Vec::new();
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((inner, '{')) => return Err(unbalanced(inner)),
                            Some((_, ch)) => name.push(ch),
                            None => return Err(unbalanced(pos)),
                        }
                    }
                    let name = name.trim().to_string();
                    if name.is_empty() {
                        return Err(TemplateError::EmptyPlaceholder(source.to_string()));
                    }
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(Piece::Placeholder(name));
                }
                '}' => return Err(unbalanced(pos)),
                '.' => {
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(std::mem::take(&mut pieces));
                }
                _ => literal.push(c),
            }
        }

        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }
        segments.push(pieces);

        Ok(Template {
            source: source.to_string(),
            segments,
        })
    }

    /// Placeholder names referenced by this template, in order of appearance
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().flatten().filter_map(|piece| match piece {
            Piece::Placeholder(name) => Some(name.as_str()),
            Piece::Literal(_) => None,
        })
    }

    /// Checks every placeholder against the keys the renderer can supply
    pub fn validate(&self) -> Result<(), TemplateError> {
        for name in self.placeholders() {
            let known = CONTEXT_KEYS.contains(&name)
                || TAG_KEYS.contains(&name)
                || METRIC_KEYS.contains(&name);
            if !known {
                return Err(self.unknown(name));
            }
        }
        Ok(())
    }

    /// Renders the template against a fully-populated context
    ///
    /// Segments referencing an absent (`None` or empty) value are omitted.
    /// A key that is missing from `values` entirely is an error.
    pub fn render(&self, values: &BTreeMap<String, Option<String>>) -> Result<String, TemplateError> {
        let mut rendered = Vec::with_capacity(self.segments.len());

        'segments: for segment in &self.segments {
            let mut out = String::new();
            for piece in segment {
                match piece {
                    Piece::Literal(text) => out.push_str(text),
                    Piece::Placeholder(name) => match values.get(name) {
                        Some(Some(value)) if !value.is_empty() => out.push_str(value),
                        Some(_) => continue 'segments,
                        None => return Err(self.unknown(name)),
                    },
                }
            }
            rendered.push(out);
        }

        Ok(rendered.join("."))
    }

    fn unknown(&self, name: &str) -> TemplateError {
        TemplateError::UnknownPlaceholder {
            template: self.source.clone(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Final output pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedMetric {
    pub name: String,
    pub value: i64,
}

/// Renders every metric through every template
///
/// Output order is metric-outer, template-inner. A template that elides
/// down to an empty name produces no entry for that metric.
pub fn facet(
    metrics: &[FlatMetric],
    templates: &[Template],
    context: &RunContext,
) -> Result<Vec<RenderedMetric>, TemplateError> {
    let mut output = Vec::with_capacity(metrics.len() * templates.len());

    for metric in metrics {
        let mut values = context.to_map();
        for (key, value) in metric.tags.pairs() {
            values.insert(key.to_string(), Some(value));
        }
        for key in METRIC_KEYS {
            values.insert(key.to_string(), Some(metric.path.clone()));
        }

        for template in templates {
            let name = template.render(&values)?;
            if name.is_empty() {
                debug!(
                    "Template '{}' elided to nothing for metric '{}', skipping",
                    template, metric.path
                );
                continue;
            }
            output.push(RenderedMetric {
                name,
                value: metric.value,
            });
        }
    }

    Ok(output)
}
