use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub(crate) const MS_PER_DAY: i64 = 86_400_000;

/// A loose, partially specified configuration, as accepted from the outside
/// world (builder style, or deserialized from a config file).
///
/// Every field is optional; [`RawConfig::normalize`] applies the defaults and
/// coerces the human-friendly forms ("2GB", "1h", "6:00") into [`Config`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RawConfig {
    pub file_name: Option<String>,
    pub file_extension: Option<String>,
    pub byte_limit: Option<ByteLimit>,
    pub delimiter: Option<String>,
    pub encoding: Option<String>,
    pub interval: Option<String>,
    pub start_of_day: Option<String>,
}

/// A byte limit, either a plain number of bytes or a string with an optional
/// metric prefix, e.g. `2_000_000_000`, `"2GB"`, `"2000KB"`, `"1.5m"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ByteLimit {
    Bytes(u64),
    Human(String),
}

impl RawConfig {
    /// Normalizes into the canonical numeric configuration.
    ///
    /// Deterministic and side-effect free; callers are expected to normalize
    /// once per distinct raw configuration.
    pub fn normalize(&self) -> Result<Config, ConfigError> {
        let byte_limit = match &self.byte_limit {
            None => 2_000_000_000,
            Some(ByteLimit::Bytes(0)) => {
                return Err(ConfigError::InvalidByteLimit("0".to_string()))
            }
            Some(ByteLimit::Bytes(num_bytes)) => *num_bytes,
            Some(ByteLimit::Human(human)) => parse_byte_limit(human)
                .ok_or_else(|| ConfigError::InvalidByteLimit(human.clone()))?,
        };
        let interval_ms = match &self.interval {
            None => 0,
            Some(interval) => parse_interval(interval)
                .ok_or_else(|| ConfigError::InvalidInterval(interval.clone()))?,
        };
        let start_of_day_ms = match &self.start_of_day {
            None => 0,
            Some(start_of_day) => parse_start_of_day(start_of_day)
                .ok_or_else(|| ConfigError::InvalidStartOfDay(start_of_day.clone()))?,
        };
        let encoding = match &self.encoding {
            None => Encoding::Utf8,
            Some(name) => Encoding::from_name(name)
                .ok_or_else(|| ConfigError::UnsupportedEncoding(name.clone()))?,
        };
        Ok(Config {
            file_name: self.file_name.clone().unwrap_or_default(),
            file_extension: self
                .file_extension
                .clone()
                .unwrap_or_else(|| "log".to_string()),
            byte_limit,
            interval_ms,
            start_of_day_ms,
            delimiter: self.delimiter.clone().unwrap_or_else(|| "\n".to_string()),
            encoding,
        })
    }
}

/// The fully normalized configuration.
///
/// One rolling writer exists per distinct `(directory, Config)` pair; the
/// registry keys on the canonical JSON serialization of this struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    /// File name prefix. Empty means no prefix component. May contain dots.
    pub file_name: String,
    /// File extension. Empty means no extension component. May contain dots.
    pub file_extension: String,
    /// Maximum number of record bytes per file. Always positive.
    pub byte_limit: u64,
    /// Interval rotation bucket width in milliseconds. `0` disables interval
    /// rotation.
    pub interval_ms: i64,
    /// Offset from local midnight, in `[0, 86_400_000)`, anchoring the
    /// interval bucketing clock.
    pub start_of_day_ms: i64,
    /// Inserted between consecutive records of the same file.
    pub delimiter: String,
    pub encoding: Encoding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Utf8,
    Ascii,
    Utf16Le,
}

impl Encoding {
    pub fn from_name(name: &str) -> Option<Encoding> {
        match name.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Some(Encoding::Utf8),
            "ascii" => Some(Encoding::Ascii),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Some(Encoding::Utf16Le),
            _ => None,
        }
    }

    /// Encodes a record into its on-disk bytes.
    pub fn encode<'a>(&self, record: &'a str) -> Cow<'a, [u8]> {
        match self {
            Encoding::Utf8 => Cow::Borrowed(record.as_bytes()),
            Encoding::Ascii => {
                if record.is_ascii() {
                    Cow::Borrowed(record.as_bytes())
                } else {
                    // non-ASCII scalar values degrade to '?'
                    Cow::Owned(
                        record
                            .chars()
                            .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                            .collect(),
                    )
                }
            }
            Encoding::Utf16Le => Cow::Owned(
                record
                    .encode_utf16()
                    .flat_map(|unit| unit.to_le_bytes())
                    .collect(),
            ),
        }
    }
}

/// Parses `<number><metric prefix?>`, case-insensitive, factor 1000 per
/// prefix step. Trailing characters after the prefix are tolerated, so
/// "2GB", "2 giga" and "2000" all parse.
fn parse_byte_limit(value: &str) -> Option<u64> {
    let (num, rest) = take_number(value)?;
    let prefixes = ['k', 'm', 'g', 't', 'p', 'e', 'z', 'y'];
    let factor = match rest.trim_start_matches(' ').chars().next() {
        None => 1f64,
        Some(unit) => {
            let step = prefixes
                .iter()
                .position(|&p| p == unit.to_ascii_lowercase())?;
            1000f64.powi(step as i32 + 1)
        }
    };
    let num_bytes = (num * factor).round();
    if !(num_bytes > 0.0) || num_bytes > u64::MAX as f64 {
        return None;
    }
    Some(num_bytes as u64)
}

/// Parses `<number><unit?>` with unit in `{s, m, h, d}`, defaulting to
/// milliseconds.
fn parse_interval(value: &str) -> Option<i64> {
    let (num, rest) = take_number(value)?;
    let unit_ms = match rest.trim_start_matches(' ').chars().next() {
        None => 1f64,
        Some('s') | Some('S') => 1_000f64,
        Some('m') | Some('M') => 60_000f64,
        Some('h') | Some('H') => 3_600_000f64,
        Some('d') | Some('D') => MS_PER_DAY as f64,
        Some(_) => return None,
    };
    let interval_ms = (num * unit_ms).round();
    if !(interval_ms > 0.0) || interval_ms >= i64::MAX as f64 {
        return None;
    }
    Some(interval_ms as i64)
}

/// Parses `H:MM[:SS]` 24-hour time into a millisecond offset from midnight.
fn parse_start_of_day(value: &str) -> Option<i64> {
    let mut fields = value.split(':');
    let hours: i64 = parse_time_field(fields.next()?, 1, 2, 23)?;
    let minutes: i64 = parse_time_field(fields.next()?, 2, 2, 59)?;
    let seconds: i64 = match fields.next() {
        None => 0,
        Some(field) => parse_time_field(field, 2, 2, 59)?,
    };
    if fields.next().is_some() {
        return None;
    }
    Some(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000)
}

fn parse_time_field(field: &str, min_len: usize, max_len: usize, max: i64) -> Option<i64> {
    if field.len() < min_len || field.len() > max_len {
        return None;
    }
    if !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value = field.parse::<i64>().ok()?;
    if value > max {
        return None;
    }
    Some(value)
}

/// Splits a leading decimal number (`12`, `1.5`, `.5`) off `value`.
fn take_number(value: &str) -> Option<(f64, &str)> {
    let mut end = 0;
    let mut seen_dot = false;
    for (pos, byte) in value.bytes().enumerate() {
        match byte {
            b'0'..=b'9' => end = pos + 1,
            b'.' if !seen_dot => {
                seen_dot = true;
                end = pos + 1;
            }
            _ => break,
        }
    }
    let num = value[..end].parse::<f64>().ok()?;
    Some((num, &value[end..]))
}
