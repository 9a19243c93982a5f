// Counter name normalization
//
// Maps Hadoop counter group names (usually fully-qualified Java class names)
// onto short, stable metric path prefixes, and strips Luigi-style parameter
// lists off job names.

/// Root namespace for every counter path produced by this collector
pub const COUNTER_NAMESPACE: &str = "hadoop.counters.";

/// Known counter group aliases, keyed by the last segment of the group name
const GROUP_ALIASES: &[(&str, &str)] = &[
    ("FileSystemCounter", "fs"),
    ("JobCounter", "job"),
    ("TaskCounter", "task"),
    ("Shuffle Errors", "shuffle"),
    ("FileInputFormatCounter", "file_input"),
    ("FileOutputFormatCounter", "file_output"),
];

/// Converts a raw counter group name into a metric path prefix
///
/// Only the last `.`-separated segment is considered. Known groups map to
/// their short alias; anything else is lower-cased with spaces turned into
/// underscores.
///
/// # Examples
/// ```text
/// "org.apache.hadoop.mapreduce.FileSystemCounter" -> "hadoop.counters.fs"
/// "com.example.Custom Group"                      -> "hadoop.counters.custom_group"
/// ```
pub fn normalize_group(raw_group_name: &str) -> String {
    // rsplit always yields at least one item, even for ""
    let segment = raw_group_name.rsplit('.').next().unwrap_or_default();

    let short = match GROUP_ALIASES.iter().find(|(class, _)| *class == segment) {
        Some((_, alias)) => (*alias).to_string(),
        None => segment.to_lowercase().replace(' ', "_"),
    };

    format!("{}{}", COUNTER_NAMESPACE, short)
}

/// Extracts the job name from a Luigi task id such as `ImportTask(date=2024-01-15)`
///
/// Returns everything before the first `(`, or the whole string if there is none.
pub fn extract_job_name(raw_task_id: &str) -> &str {
    match raw_task_id.split_once('(') {
        Some((name, _)) => name,
        None => raw_task_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_aliases() {
        let cases = [
            ("org.apache.hadoop.mapreduce.FileSystemCounter", "hadoop.counters.fs"),
            ("org.apache.hadoop.mapreduce.JobCounter", "hadoop.counters.job"),
            ("org.apache.hadoop.mapreduce.TaskCounter", "hadoop.counters.task"),
            ("Shuffle Errors", "hadoop.counters.shuffle"),
            (
                "org.apache.hadoop.mapreduce.lib.input.FileInputFormatCounter",
                "hadoop.counters.file_input",
            ),
            (
                "org.apache.hadoop.mapreduce.lib.output.FileOutputFormatCounter",
                "hadoop.counters.file_output",
            ),
        ];

        for (raw, expected) in cases {
            assert_eq!(normalize_group(raw), expected, "group {}", raw);
        }
    }

    #[test]
    fn test_unknown_group_fallback() {
        assert_eq!(
            normalize_group("com.example.Custom Group Name"),
            "hadoop.counters.custom_group_name"
        );
        assert_eq!(normalize_group("already_lower"), "hadoop.counters.already_lower");
        assert_eq!(normalize_group("NoDots"), "hadoop.counters.nodots");
    }

    #[test]
    fn test_degenerate_group_names() {
        assert_eq!(normalize_group(""), "hadoop.counters.");
        assert_eq!(normalize_group("trailing."), "hadoop.counters.");
    }

    #[test]
    fn test_extract_job_name() {
        assert_eq!(extract_job_name("Foo(a=1,b=2)"), "Foo");
        assert_eq!(extract_job_name("Bar"), "Bar");
        assert_eq!(extract_job_name("Nested(a=f(x))"), "Nested");
        assert_eq!(extract_job_name(""), "");
    }
}
