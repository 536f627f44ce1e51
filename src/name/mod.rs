//! File name codec for the rolling family:
//! `[<fileName>.]<YYYY-MM-DD-HHmmss>.<index>[.<extension>]`
//!
//! Pure functions, no I/O. The fixed-width date stamp is the parsing anchor:
//! everything before it is the prefix, everything after it (past the numeric
//! index) is the extension, which lets both the prefix and the extension
//! contain literal dots.

use chrono::{Duration, NaiveDateTime, NaiveTime};

use crate::config::Config;


pub const DATE_FORMAT: &str = "%Y-%m-%d-%H%M%S";

const DATE_STAMP_LEN: usize = "YYYY-MM-DD-HHmmss".len();

/// The components of a well-formed rolling file name, borrowed from the
/// parsed string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNameParts<'a> {
    pub file_name: Option<&'a str>,
    pub date: NaiveDateTime,
    pub date_string: &'a str,
    pub index: Option<u64>,
    pub extension: Option<&'a str>,
    pub full: &'a str,
}

/// Builds a file name for the given instant and index.
///
/// The index suffix is always emitted, so names stay unique under pure
/// size-based rotation too. When interval rotation is configured the instant
/// is snapped to the start of its interval bucket first.
pub fn compose(config: &Config, instant: NaiveDateTime, index: u64) -> String {
    let mut name = String::new();
    if !config.file_name.is_empty() {
        name.push_str(&config.file_name);
        name.push('.');
    }
    name.push_str(&date_string(config, instant));
    name.push('.');
    name.push_str(&index.to_string());
    if !config.file_extension.is_empty() {
        name.push('.');
        name.push_str(&config.file_extension);
    }
    name
}

/// Formats the (bucketed, when an interval is configured) instant as the
/// date component of a file name.
pub fn date_string(config: &Config, instant: NaiveDateTime) -> String {
    let instant = if config.interval_ms > 0 {
        bucket_start(config, instant)
    } else {
        instant
    };
    instant.format(DATE_FORMAT).to_string()
}

/// Parses a file name back into its components.
///
/// Returns `None` when the name does not belong to any rolling family; this
/// is the normal filter path, not a failure.
pub fn parse(name: &str) -> Option<FileNameParts<'_>> {
    // Only plain spaces are tolerated as whitespace inside a name.
    if name.chars().any(|c| c.is_whitespace() && c != ' ') {
        return None;
    }
    let bytes = name.as_bytes();
    let mut anchor = 0usize;
    while anchor + DATE_STAMP_LEN <= name.len() {
        if (anchor == 0 || bytes[anchor - 1] == b'.')
            && is_date_stamp(&bytes[anchor..anchor + DATE_STAMP_LEN])
        {
            let date_string = &name[anchor..anchor + DATE_STAMP_LEN];
            if let Some(date) = parse_date_stamp(date_string) {
                if let Some((index, extension)) = parse_suffix(&name[anchor + DATE_STAMP_LEN..]) {
                    let file_name = (anchor > 0).then(|| &name[..anchor - 1]);
                    return Some(FileNameParts {
                        file_name,
                        date,
                        date_string,
                        index,
                        extension,
                        full: name,
                    });
                }
            }
        }
        anchor += 1;
    }
    None
}

/// Returns the same name with its index incremented, or the name unchanged
/// if it has no index component.
pub fn increment(name: &str) -> String {
    let Some(parts) = parse(name) else {
        return name.to_string();
    };
    let Some(index) = parts.index else {
        return name.to_string();
    };
    let mut incremented = String::new();
    if let Some(file_name) = parts.file_name {
        incremented.push_str(file_name);
        incremented.push('.');
    }
    incremented.push_str(parts.date_string);
    incremented.push('.');
    incremented.push_str(&(index + 1).to_string());
    if let Some(extension) = parts.extension {
        incremented.push('.');
        incremented.push_str(extension);
    }
    incremented
}

/// Snaps an instant to the start of its interval bucket.
///
/// Buckets are anchored on the instant's local midnight plus the configured
/// start-of-day offset; euclidean division keeps instants that fall before
/// the day anchor in the preceding bucket. Idempotent.
pub fn bucket_start(config: &Config, instant: NaiveDateTime) -> NaiveDateTime {
    debug_assert!(config.interval_ms > 0);
    let day_start = instant.date().and_time(NaiveTime::MIN);
    let since_anchor = (instant - day_start).num_milliseconds() - config.start_of_day_ms;
    let buckets = since_anchor.div_euclid(config.interval_ms);
    day_start + Duration::milliseconds(config.start_of_day_ms + buckets * config.interval_ms)
}

fn is_date_stamp(window: &[u8]) -> bool {
    debug_assert_eq!(window.len(), DATE_STAMP_LEN);
    window.iter().enumerate().all(|(pos, &byte)| match pos {
        4 | 7 | 10 => byte == b'-',
        _ => byte.is_ascii_digit(),
    })
}

fn parse_date_stamp(date_string: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(date_string, DATE_FORMAT).ok()
}

/// Parses the `[.<index>][.<extension>]` tail that follows the date stamp.
///
/// Returns `None` when the tail is not introduced by a dot, which rejects
/// names where the date stamp runs straight into other characters.
fn parse_suffix(rest: &str) -> Option<(Option<u64>, Option<&str>)> {
    if rest.is_empty() {
        return Some((None, None));
    }
    let tail = rest.strip_prefix('.')?;
    let segment = &tail[..tail.find('.').unwrap_or(tail.len())];
    if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(index) = segment.parse::<u64>() {
            let extension = tail[segment.len()..].strip_prefix('.');
            return Some((Some(index), extension));
        }
    }
    Some((None, Some(tail)))
}
