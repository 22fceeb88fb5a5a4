//! Timeframes: the "when does this observation apply" dimension of a context.
//!
//! A [`Timeframe`] is an inclusive interval `[start, end]` where either bound
//! may be missing (unbounded on that side). A timeframe with neither bound is
//! *unspecified* and overlaps everything.
//!
//! Timeframes are usually written as short codes and parsed with
//! [`parse_timeframe`]:
//! - quarters: `Q4_2025` (also `2025-Q4`)
//! - months: `2025-11`
//! - days: `2025-11-05`
//! - years: `2025`
//! - relative windows: `last_30_days`, `last_2_weeks`, `last_6_months`
//! - explicit ranges: `{ "start": "2025-01-01T00:00:00Z", "end": "2025-06" }`

use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, Months, NaiveDate, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The natural unit a timeframe was expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Day,
    Week,
    Month,
    Quarter,
    Year,
    Custom,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Day => write!(f, "day"),
            Self::Week => write!(f, "week"),
            Self::Month => write!(f, "month"),
            Self::Quarter => write!(f, "quarter"),
            Self::Year => write!(f, "year"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// An inclusive time interval with optional bounds.
///
/// # Examples
///
/// ```
/// use kyro_reconcile::{parse_timeframe, TimeframeSpec};
///
/// let q4 = parse_timeframe(&TimeframeSpec::code("Q4_2025")).unwrap();
/// let nov = parse_timeframe(&TimeframeSpec::code("2025-11")).unwrap();
/// let q1 = parse_timeframe(&TimeframeSpec::code("Q1_2026")).unwrap();
///
/// assert!(q4.overlaps(&nov));
/// assert!(!q4.overlaps(&q1));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timeframe {
    /// Start of the interval (inclusive). None means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,

    /// End of the interval (inclusive). None means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granularity: Option<Granularity>,
}

impl Timeframe {
    /// Creates a closed timeframe.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTimeRange` if `start > end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvalidTimeRange { start, end });
        }
        Ok(Self {
            start: Some(start),
            end: Some(end),
            granularity: None,
        })
    }

    /// A timeframe with neither bound.
    #[must_use]
    pub const fn unspecified() -> Self {
        Self {
            start: None,
            end: None,
            granularity: None,
        }
    }

    #[must_use]
    pub const fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
            granularity: None,
        }
    }

    #[must_use]
    pub const fn ending_at(end: DateTime<Utc>) -> Self {
        Self {
            start: None,
            end: Some(end),
            granularity: None,
        }
    }

    #[must_use]
    pub const fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = Some(granularity);
        self
    }

    /// True if neither bound is set.
    #[must_use]
    pub const fn is_unspecified(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Check if a timestamp falls within `[start, end]`.
    #[must_use]
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| time >= s) && self.end.map_or(true, |e| time <= e)
    }

    /// Inclusive overlap: `a.start <= b.end && b.start <= a.end`.
    ///
    /// Missing bounds extend to infinity; an unspecified timeframe on
    /// either side always overlaps.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        if self.is_unspecified() || other.is_unspecified() {
            return true;
        }
        let a_start = self.start.unwrap_or(DateTime::<Utc>::MIN_UTC);
        let a_end = self.end.unwrap_or(DateTime::<Utc>::MAX_UTC);
        let b_start = other.start.unwrap_or(DateTime::<Utc>::MIN_UTC);
        let b_end = other.end.unwrap_or(DateTime::<Utc>::MAX_UTC);
        a_start <= b_end && b_start <= a_end
    }

    /// Smallest timeframe covering both inputs. An unbounded side stays unbounded.
    #[must_use]
    pub fn hull(&self, other: &Self) -> Self {
        let start = match (self.start, other.start) {
            (Some(a), Some(b)) => Some(a.min(b)),
            _ => None,
        };
        let end = match (self.end, other.end) {
            (Some(a), Some(b)) => Some(a.max(b)),
            _ => None,
        };
        let granularity = if self.granularity == other.granularity {
            self.granularity
        } else {
            Some(Granularity::Custom)
        };
        Self {
            start,
            end,
            granularity,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.end) {
            (Some(s), Some(e)) => write!(f, "[{s} → {e}]"),
            (Some(s), None) => write!(f, "[{s} → ∞)"),
            (None, Some(e)) => write!(f, "(-∞ → {e}]"),
            (None, None) => write!(f, "(unspecified)"),
        }
    }
}

/// Unparsed timeframe input: a short code or an explicit range.
///
/// Range bounds accept RFC 3339 timestamps or any code; a code used as a
/// start bound contributes its first instant, as an end bound its last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeframeSpec {
    Code(String),
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<String>,
    },
}

impl TimeframeSpec {
    #[must_use]
    pub fn code(code: impl Into<String>) -> Self {
        Self::Code(code.into())
    }

    #[must_use]
    pub fn range(start: Option<&str>, end: Option<&str>) -> Self {
        Self::Range {
            start: start.map(str::to_string),
            end: end.map(str::to_string),
        }
    }
}

/// Parses a timeframe relative to the current time.
///
/// An `Err` means "cannot evaluate this timeframe constraint"; callers
/// should skip the constraint rather than abort.
///
/// # Errors
///
/// Returns `ValidationError::InvalidTimeframe` for unrecognized codes and
/// `ValidationError::InvalidTimeRange` for ranges whose start follows the end.
pub fn parse_timeframe(spec: &TimeframeSpec) -> Result<Timeframe, ValidationError> {
    parse_timeframe_at(spec, Utc::now())
}

/// Parses a timeframe, resolving relative windows against `now`.
///
/// # Errors
///
/// See [`parse_timeframe`].
pub fn parse_timeframe_at(
    spec: &TimeframeSpec,
    now: DateTime<Utc>,
) -> Result<Timeframe, ValidationError> {
    match spec {
        TimeframeSpec::Code(code) => parse_code(code, now),
        TimeframeSpec::Range { start, end } => {
            let start = start
                .as_deref()
                .map(|s| parse_bound(s, now).map(|tf| tf.start))
                .transpose()?
                .flatten();
            let end = end
                .as_deref()
                .map(|e| parse_bound(e, now).map(|tf| tf.end))
                .transpose()?
                .flatten();
            if let (Some(s), Some(e)) = (start, end) {
                if s > e {
                    return Err(ValidationError::InvalidTimeRange { start: s, end: e });
                }
            }
            Ok(Timeframe {
                start,
                end,
                granularity: Some(Granularity::Custom),
            })
        }
    }
}

/// Inclusive overlap of two optional timeframes.
///
/// If either side is absent or fully unspecified the timeframes are
/// considered overlapping.
#[must_use]
pub fn timeframes_overlap(a: Option<&Timeframe>, b: Option<&Timeframe>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.overlaps(b),
        _ => true,
    }
}

struct CodePatterns {
    quarter: Regex,
    year_quarter: Regex,
    year_month: Regex,
    date: Regex,
    year: Regex,
    relative: Regex,
}

fn code_patterns() -> Option<&'static CodePatterns> {
    static PATTERNS: OnceLock<Option<CodePatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(CodePatterns {
                quarter: Regex::new(r"^(?i)q([1-4])[_\- ]?(\d{4})$").ok()?,
                year_quarter: Regex::new(r"^(?i)(\d{4})[_\- ]?q([1-4])$").ok()?,
                year_month: Regex::new(r"^(\d{4})-(\d{1,2})$").ok()?,
                date: Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").ok()?,
                year: Regex::new(r"^(\d{4})$").ok()?,
                relative: Regex::new(r"^(?i)last_(\d+)_(days?|weeks?|months?)$").ok()?,
            })
        })
        .as_ref()
}

fn parse_bound(input: &str, now: DateTime<Utc>) -> Result<Timeframe, ValidationError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(input.trim()) {
        let ts = ts.with_timezone(&Utc);
        return Ok(Timeframe {
            start: Some(ts),
            end: Some(ts),
            granularity: None,
        });
    }
    parse_code(input, now)
}

fn parse_code(code: &str, now: DateTime<Utc>) -> Result<Timeframe, ValidationError> {
    let trimmed = code.trim();
    let patterns = code_patterns()
        .ok_or_else(|| ValidationError::timeframe(trimmed, "timeframe patterns unavailable"))?;

    if let Some(caps) = patterns.quarter.captures(trimmed) {
        return quarter(trimmed, &caps[2], &caps[1]);
    }
    if let Some(caps) = patterns.year_quarter.captures(trimmed) {
        return quarter(trimmed, &caps[1], &caps[2]);
    }
    if let Some(caps) = patterns.date.captures(trimmed) {
        let year = parse_num::<i32>(trimmed, &caps[1])?;
        let month = parse_num::<u32>(trimmed, &caps[2])?;
        let day = parse_num::<u32>(trimmed, &caps[3])?;
        let first = date(trimmed, year, month, day)?;
        let next = first
            .succ_opt()
            .ok_or_else(|| ValidationError::timeframe(trimmed, "date out of range"))?;
        return period(first, next, Granularity::Day);
    }
    if let Some(caps) = patterns.year_month.captures(trimmed) {
        let year = parse_num::<i32>(trimmed, &caps[1])?;
        let month = parse_num::<u32>(trimmed, &caps[2])?;
        let first = date(trimmed, year, month, 1)?;
        let next = add_months(trimmed, first, 1)?;
        return period(first, next, Granularity::Month);
    }
    if let Some(caps) = patterns.year.captures(trimmed) {
        let year = parse_num::<i32>(trimmed, &caps[1])?;
        let first = date(trimmed, year, 1, 1)?;
        let next = date(trimmed, year + 1, 1, 1)?;
        return period(first, next, Granularity::Year);
    }
    if let Some(caps) = patterns.relative.captures(trimmed) {
        let n = parse_num::<u32>(trimmed, &caps[1])?;
        if n == 0 {
            return Err(ValidationError::timeframe(trimmed, "relative window must be positive"));
        }
        let unit = caps[2].to_ascii_lowercase();
        let (start, granularity) = if unit.starts_with("day") {
            (now.checked_sub_signed(Duration::days(i64::from(n))), Granularity::Day)
        } else if unit.starts_with("week") {
            (now.checked_sub_signed(Duration::weeks(i64::from(n))), Granularity::Week)
        } else {
            (now.checked_sub_months(Months::new(n)), Granularity::Month)
        };
        let start =
            start.ok_or_else(|| ValidationError::timeframe(trimmed, "window out of range"))?;
        return Ok(Timeframe {
            start: Some(start),
            end: Some(now),
            granularity: Some(granularity),
        });
    }

    Err(ValidationError::timeframe(trimmed, "unrecognized timeframe code"))
}

fn quarter(input: &str, year: &str, q: &str) -> Result<Timeframe, ValidationError> {
    let year = parse_num::<i32>(input, year)?;
    let q = parse_num::<u32>(input, q)?;
    let first = date(input, year, (q - 1) * 3 + 1, 1)?;
    let next = add_months(input, first, 3)?;
    period(first, next, Granularity::Quarter)
}

/// `[first 00:00, next 00:00 - 1ms]`
fn period(
    first: NaiveDate,
    next: NaiveDate,
    granularity: Granularity,
) -> Result<Timeframe, ValidationError> {
    let (Some(start), Some(next_start)) = (midnight(first), midnight(next)) else {
        return Err(ValidationError::timeframe(first.to_string(), "date out of range"));
    };
    let end = next_start - Duration::milliseconds(1);
    Ok(Timeframe::new(start, end)?.with_granularity(granularity))
}

fn midnight(day: NaiveDate) -> Option<DateTime<Utc>> {
    day.and_hms_opt(0, 0, 0).map(|ndt| Utc.from_utc_datetime(&ndt))
}

fn date(input: &str, year: i32, month: u32, day: u32) -> Result<NaiveDate, ValidationError> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| ValidationError::timeframe(input, "no such calendar date"))
}

fn add_months(input: &str, day: NaiveDate, months: u32) -> Result<NaiveDate, ValidationError> {
    day.checked_add_months(Months::new(months))
        .ok_or_else(|| ValidationError::timeframe(input, "date out of range"))
}

fn parse_num<T: std::str::FromStr>(input: &str, digits: &str) -> Result<T, ValidationError> {
    digits
        .parse::<T>()
        .map_err(|_| ValidationError::timeframe(input, format!("'{digits}' is not a number")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_parse_quarter_code() {
        let tf = parse_timeframe(&TimeframeSpec::code("Q4_2025")).unwrap();
        assert_eq!(tf.start, Some(ts("2025-10-01T00:00:00Z")));
        assert_eq!(tf.end, Some(ts("2025-12-31T23:59:59.999Z")));
        assert_eq!(tf.granularity, Some(Granularity::Quarter));

        let alt = parse_timeframe(&TimeframeSpec::code("2025-q4")).unwrap();
        assert_eq!(alt, tf);
    }

    #[test]
    fn test_parse_year_month() {
        let tf = parse_timeframe(&TimeframeSpec::code("2025-11")).unwrap();
        assert_eq!(tf.start, Some(ts("2025-11-01T00:00:00Z")));
        assert_eq!(tf.end, Some(ts("2025-11-30T23:59:59.999Z")));
        assert_eq!(tf.granularity, Some(Granularity::Month));
    }

    #[test]
    fn test_parse_december_rolls_year() {
        let tf = parse_timeframe(&TimeframeSpec::code("2025-12")).unwrap();
        assert_eq!(tf.end, Some(ts("2025-12-31T23:59:59.999Z")));
    }

    #[test]
    fn test_parse_day_and_year() {
        let day = parse_timeframe(&TimeframeSpec::code("2024-02-29")).unwrap();
        assert_eq!(day.end, Some(ts("2024-02-29T23:59:59.999Z")));
        assert_eq!(day.granularity, Some(Granularity::Day));

        let year = parse_timeframe(&TimeframeSpec::code("2024")).unwrap();
        assert_eq!(year.start, Some(ts("2024-01-01T00:00:00Z")));
        assert_eq!(year.end, Some(ts("2024-12-31T23:59:59.999Z")));
    }

    #[test]
    fn test_parse_relative_window() {
        let now = ts("2025-11-15T12:00:00Z");
        let tf = parse_timeframe_at(&TimeframeSpec::code("last_30_days"), now).unwrap();
        assert_eq!(tf.start, Some(ts("2025-10-16T12:00:00Z")));
        assert_eq!(tf.end, Some(now));

        let months = parse_timeframe_at(&TimeframeSpec::code("last_2_months"), now).unwrap();
        assert_eq!(months.start, Some(ts("2025-09-15T12:00:00Z")));
        assert_eq!(months.granularity, Some(Granularity::Month));
    }

    #[test]
    fn test_parse_explicit_range() {
        let spec = TimeframeSpec::range(Some("2025-01-01T00:00:00Z"), Some("2025-06"));
        let tf = parse_timeframe(&spec).unwrap();
        assert_eq!(tf.start, Some(ts("2025-01-01T00:00:00Z")));
        assert_eq!(tf.end, Some(ts("2025-06-30T23:59:59.999Z")));

        let open = parse_timeframe(&TimeframeSpec::range(Some("2025"), None)).unwrap();
        assert!(open.end.is_none());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_timeframe(&TimeframeSpec::code("Q5_2025")).is_err());
        assert!(parse_timeframe(&TimeframeSpec::code("2025-13")).is_err());
        assert!(parse_timeframe(&TimeframeSpec::code("someday")).is_err());
        assert!(parse_timeframe(&TimeframeSpec::code("last_0_days")).is_err());
        let inverted = TimeframeSpec::range(Some("2026"), Some("2025"));
        assert!(matches!(
            parse_timeframe(&inverted),
            Err(ValidationError::InvalidTimeRange { .. })
        ));
    }

    #[test]
    fn test_overlap_is_inclusive() {
        let a = Timeframe::new(ts("2025-01-01T00:00:00Z"), ts("2025-01-31T00:00:00Z")).unwrap();
        let b = Timeframe::new(ts("2025-01-31T00:00:00Z"), ts("2025-02-28T00:00:00Z")).unwrap();
        let c = Timeframe::new(ts("2025-03-01T00:00:00Z"), ts("2025-03-31T00:00:00Z")).unwrap();
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_overlap_unspecified_is_permissive() {
        let a = Timeframe::new(ts("2025-01-01T00:00:00Z"), ts("2025-01-31T00:00:00Z")).unwrap();
        assert!(a.overlaps(&Timeframe::unspecified()));
        assert!(timeframes_overlap(Some(&a), None));
        assert!(timeframes_overlap(None, None));
    }

    #[test]
    fn test_overlap_half_open() {
        let from_march = Timeframe::starting_at(ts("2025-03-01T00:00:00Z"));
        let jan = parse_timeframe(&TimeframeSpec::code("2025-01")).unwrap();
        let apr = parse_timeframe(&TimeframeSpec::code("2025-04")).unwrap();
        assert!(!from_march.overlaps(&jan));
        assert!(from_march.overlaps(&apr));
        assert!(Timeframe::ending_at(ts("2025-01-15T00:00:00Z")).overlaps(&jan));
    }

    #[test]
    fn test_hull() {
        let jan = parse_timeframe(&TimeframeSpec::code("2025-01")).unwrap();
        let mar = parse_timeframe(&TimeframeSpec::code("2025-03")).unwrap();
        let hull = jan.hull(&mar);
        assert_eq!(hull.start, jan.start);
        assert_eq!(hull.end, mar.end);
        assert_eq!(hull.granularity, Some(Granularity::Month));
        assert!(jan.hull(&Timeframe::starting_at(ts("2025-02-01T00:00:00Z"))).end.is_none());
    }

    #[test]
    fn test_spec_deserializes_code_or_range() {
        let code: TimeframeSpec = serde_json::from_str("\"Q1_2025\"").unwrap();
        assert_eq!(code, TimeframeSpec::code("Q1_2025"));
        let range: TimeframeSpec = serde_json::from_str("{\"start\":\"2025\"}").unwrap();
        assert_eq!(range, TimeframeSpec::range(Some("2025"), None));
    }
}
