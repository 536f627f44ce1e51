//! Selects, out of a directory listing, the file names that belong to a
//! configuration's rotation family, and decides which name the writer should
//! use for a given instant.

use chrono::NaiveDateTime;

use crate::config::Config;
use crate::name::{self, FileNameParts};

/// Filters `names` down to the members of `config`'s rotation family.
///
/// A name belongs to the family when its prefix and extension equal the
/// configured ones (absence and the empty string are equivalent), it carries
/// an index, and, under interval rotation, its date stamp sits on an interval
/// bucket boundary. When `target` is supplied, only names stamped with the
/// target's (bucketed) date survive.
///
/// Order is preserved; callers sort when order matters.
pub fn matches<'a, I>(
    names: I,
    config: &Config,
    target: Option<NaiveDateTime>,
) -> Vec<FileNameParts<'a>>
where
    I: IntoIterator<Item = &'a str>,
{
    let target_date_string = target.map(|instant| name::date_string(config, instant));
    names
        .into_iter()
        .filter_map(name::parse)
        .filter(|parts| {
            component_matches(&config.file_name, parts.file_name)
                && component_matches(&config.file_extension, parts.extension)
                && parts.index.is_some()
                && (config.interval_ms == 0 || is_bucket_aligned(config, parts.date))
                && target_date_string
                    .as_deref()
                    .map_or(true, |date_string| parts.date_string == date_string)
        })
        .collect()
}

/// Picks the file name the writer should use for `instant`: the matching name
/// with the greatest numeric index, or a freshly composed name with index 0.
///
/// The returned name may still collide with an existing file; the rotation
/// engine increments it until it is unique.
pub fn select(names: &[String], config: &Config, instant: NaiveDateTime) -> String {
    matches(names.iter().map(String::as_str), config, Some(instant))
        .into_iter()
        .max_by_key(|parts| parts.index)
        .map(|parts| parts.full.to_string())
        .unwrap_or_else(|| name::compose(config, instant, 0))
}

/// Absent components compare equal to an empty configured value.
fn component_matches(configured: &str, parsed: Option<&str>) -> bool {
    if configured.is_empty() {
        parsed.unwrap_or("").is_empty()
    } else {
        parsed == Some(configured)
    }
}

/// `instant mod interval == start_of_day mod interval`, in local wall-clock
/// milliseconds.
fn is_bucket_aligned(config: &Config, instant: NaiveDateTime) -> bool {
    let instant_ms = instant.and_utc().timestamp_millis();
    instant_ms.rem_euclid(config.interval_ms) == config.start_of_day_ms.rem_euclid(config.interval_ms)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::config::Encoding;

    fn test_config(file_name: &str, extension: &str, interval_ms: i64) -> Config {
        Config {
            file_name: file_name.to_string(),
            file_extension: extension.to_string(),
            byte_limit: 2_000_000_000,
            interval_ms,
            start_of_day_ms: 0,
            delimiter: "\n".to_string(),
            encoding: Encoding::Utf8,
        }
    }

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    fn store() -> Vec<String> {
        vec![
            "foo.2000-01-01-090000.0.log".to_string(),
            "foo.2000-01-01-100000.0.log".to_string(),
            "foo.2000-01-01-110000.0.log".to_string(),
        ]
    }

    #[test]
    fn test_select_existing_bucket() {
        let config = test_config("foo", "log", 0);
        let selected = select(&store(), &config, dt(2000, 1, 1, 10, 0, 0));
        assert_eq!(selected, "foo.2000-01-01-100000.0.log");
    }

    #[test]
    fn test_select_new_bucket_composes_fresh_name() {
        let config = test_config("foo", "log", 0);
        let selected = select(&store(), &config, dt(2000, 1, 1, 12, 0, 0));
        assert_eq!(selected, "foo.2000-01-01-120000.0.log");
    }

    #[test]
    fn test_select_takes_greatest_numeric_index() {
        let config = test_config("foo", "log", 0);
        let names: Vec<String> = vec![
            "foo.2000-01-01-100000.2.log".to_string(),
            "foo.2000-01-01-100000.10.log".to_string(),
            "foo.2000-01-01-100000.9.log".to_string(),
        ];
        // numeric, not lexicographic: 10 beats 9
        let selected = select(&names, &config, dt(2000, 1, 1, 10, 0, 0));
        assert_eq!(selected, "foo.2000-01-01-100000.10.log");
    }

    #[test]
    fn test_select_with_interval_snaps_target() {
        let config = test_config("foo", "log", 3_600_000);
        let selected = select(&store(), &config, dt(2000, 1, 1, 10, 42, 13));
        assert_eq!(selected, "foo.2000-01-01-100000.0.log");
    }

    #[test]
    fn test_matches_filters_foreign_prefix_and_extension() {
        let config = test_config("foo", "log", 0);
        let names = [
            "foo.2000-01-01-100000.0.log",
            "bar.2000-01-01-100000.0.log",
            "foo.2000-01-01-100000.0.txt",
            "2000-01-01-100000.0.log",
            "README.md",
        ];
        let matched = matches(names, &config, None);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].full, "foo.2000-01-01-100000.0.log");
    }

    #[test]
    fn test_matches_requires_index() {
        let config = test_config("foo", "log", 0);
        let matched = matches(["foo.2000-01-01-100000.log"], &config, None);
        assert!(matched.is_empty());
    }

    #[test]
    fn test_matches_empty_prefix_equivalence() {
        let config = test_config("", "log", 0);
        let matched = matches(
            ["2000-01-01-100000.0.log", ".2000-01-01-100000.0.log"],
            &config,
            None,
        );
        // both the absent and the empty prefix belong to the "" family
        assert_eq!(matched.len(), 2);
    }

    #[test]
    fn test_matches_interval_alignment() {
        let config = test_config("foo", "log", 3_600_000);
        let names = [
            "foo.2000-01-01-100000.0.log",
            "foo.2000-01-01-103000.0.log",
        ];
        let matched = matches(names, &config, None);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].date_string, "2000-01-01-100000");
    }

    #[test]
    fn test_matches_interval_alignment_with_start_of_day() {
        let mut config = test_config("foo", "log", 3_600_000);
        config.start_of_day_ms = 1_800_000; // 0:30
        let names = [
            "foo.2000-01-01-100000.0.log",
            "foo.2000-01-01-103000.0.log",
        ];
        let matched = matches(names, &config, None);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].date_string, "2000-01-01-103000");
    }

    #[test]
    fn test_matches_is_deterministic_and_order_preserving() {
        let config = test_config("foo", "log", 0);
        let names = store();
        let first = matches(names.iter().map(String::as_str), &config, None);
        let second = matches(names.iter().map(String::as_str), &config, None);
        let full_names: Vec<&str> = first.iter().map(|parts| parts.full).collect();
        assert_eq!(full_names, names.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(first, second);
    }
}
