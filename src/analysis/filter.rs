use crate::data::{EventRecord, EventTable};
use crate::error::{DashboardError, Result};
use chrono::{DateTime, Days, NaiveDate};
use rayon::prelude::*;
use regex::{Regex, RegexBuilder};
use std::fmt;

/// Closed day interval `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(DashboardError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Build from epoch seconds, flooring both bounds to their day
    pub fn from_timestamps(start: i64, end: i64) -> Result<Self> {
        Self::new(timestamp_day(start), timestamp_day(end))
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of days covered, both ends included
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Intersect with `outer`; falls back to `outer` when they are disjoint
    pub fn clamp_to(&self, outer: &DateRange) -> DateRange {
        if self.end < outer.start || self.start > outer.end {
            return *outer;
        }
        DateRange {
            start: self.start.max(outer.start),
            end: self.end.min(outer.end),
        }
    }

    /// Move the start bound by `days`, staying within `outer` and never past `end`
    pub fn shift_start(&self, days: i64, outer: &DateRange) -> DateRange {
        let base = self.clamp_to(outer);
        let start = shift_date(base.start, days).clamp(outer.start, base.end);
        DateRange { start, end: base.end }
    }

    /// Move the end bound by `days`, staying within `outer` and never before `start`
    pub fn shift_end(&self, days: i64, outer: &DateRange) -> DateRange {
        let base = self.clamp_to(outer);
        let end = shift_date(base.end, days).clamp(base.start, outer.end);
        DateRange { start: base.start, end }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start.format("%Y-%m-%d"), self.end.format("%Y-%m-%d"))
    }
}

fn timestamp_day(secs: i64) -> NaiveDate {
    DateTime::from_timestamp(secs.div_euclid(86_400) * 86_400, 0)
        .map(|dt| dt.date_naive())
        .unwrap_or(if secs < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

fn shift_date(date: NaiveDate, days: i64) -> NaiveDate {
    let magnitude = Days::new(days.unsigned_abs());
    let shifted = if days >= 0 {
        date.checked_add_days(magnitude)
    } else {
        date.checked_sub_days(magnitude)
    };
    shifted.unwrap_or(date)
}

/// Case-insensitive regex matched against either actor column
#[derive(Debug, Clone)]
pub struct ActorPattern {
    source: String,
    regex: Regex,
}

impl ActorPattern {
    /// Blank input means "no actor filtering" and yields `None`
    pub fn parse(text: &str) -> Result<Option<Self>> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let regex = RegexBuilder::new(trimmed)
            .case_insensitive(true)
            .build()
            .map_err(|source| DashboardError::InvalidPattern {
                pattern: trimmed.to_string(),
                source,
            })?;

        Ok(Some(Self {
            source: trimmed.to_string(),
            regex,
        }))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, event: &EventRecord) -> bool {
        self.regex.is_match(&event.actor1) || self.regex.is_match(&event.actor2)
    }
}

/// Active predicates applied to the full event table
#[derive(Debug, Clone)]
pub struct FilterState {
    pub range: DateRange,
    pub actor: Option<ActorPattern>,
    pub include_zero_fatalities: bool,
}

impl FilterState {
    /// Everything in `range`, no actor filter, zero-fatality events included
    pub fn new(range: DateRange) -> Self {
        Self {
            range,
            actor: None,
            include_zero_fatalities: true,
        }
    }

    pub fn apply(&self, events: &EventTable) -> EventTable {
        filter(events, &self.range, self.actor.as_ref(), self.include_zero_fatalities)
    }
}

fn accepts(
    event: &EventRecord,
    range: &DateRange,
    actor: Option<&ActorPattern>,
    include_zero_fatalities: bool,
) -> bool {
    range.contains(event.event_date)
        && (include_zero_fatalities || event.fatalities > 0)
        && actor.map_or(true, |p| p.matches(event))
}

/// Rows of `events` in `range`, matching `actor` if given, and with at least
/// one fatality unless `include_zero_fatalities` is set. Input order is kept.
pub fn filter(
    events: &EventTable,
    range: &DateRange,
    actor: Option<&ActorPattern>,
    include_zero_fatalities: bool,
) -> EventTable {
    let rows = events
        .rows()
        .par_iter()
        .filter(|event| accepts(event, range, actor, include_zero_fatalities))
        .cloned()
        .collect();
    EventTable::from_shared(rows)
}

/// One-line summary of the active range and row count
pub fn status_line(range: &DateRange, rows: usize) -> String {
    format!(
        "Showing data starting from {} to {} ({} events)",
        range.start.format("%Y-%m-%d"),
        range.end.format("%Y-%m-%d"),
        rows
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::events::tests::record;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn range(a: &str, b: &str) -> DateRange {
        DateRange::new(date(a), date(b)).unwrap()
    }

    fn three_days() -> EventTable {
        EventTable::new(vec![
            record("A", "2023-01-01", 0),
            record("B", "2023-01-02", 5),
            record("C", "2023-01-03", 3),
        ])
    }

    #[test]
    fn test_interval_and_zero_fatalities() {
        let view = filter(&three_days(), &range("2023-01-02", "2023-01-03"), None, false);
        let ids: Vec<&str> = view.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "C"]);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let view = filter(&three_days(), &range("2023-01-01", "2023-01-01"), None, true);
        assert_eq!(view.len(), 1);
        assert_eq!(view.rows()[0].id, "A");
    }

    #[test]
    fn test_refilter_is_noop() {
        let events = three_days();
        let r = range("2023-01-02", "2023-01-03");
        let once = filter(&events, &r, None, true);
        let twice = filter(&once, &r, None, true);
        let a: Vec<&str> = once.iter().map(|e| e.id.as_str()).collect();
        let b: Vec<&str> = twice.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_result() {
        let view = filter(&three_days(), &range("2024-01-01", "2024-12-31"), None, true);
        assert!(view.is_empty());
        assert_eq!(status_line(&range("2024-01-01", "2024-12-31"), view.len()),
            "Showing data starting from 2024-01-01 to 2024-12-31 (0 events)");
    }

    #[test]
    fn test_actor_pattern_matches_either_actor() {
        let pattern = ActorPattern::parse("ukraine|russia").unwrap().unwrap();

        let mut ukr = record("U", "2023-01-01", 1);
        ukr.actor1 = "Ukraine Government".to_string();
        let mut eu = record("E", "2023-01-01", 1);
        eu.actor1 = "France".to_string();
        eu.actor2 = "Germany".to_string();
        let mut second = record("S", "2023-01-01", 1);
        second.actor2 = "Military Forces of Russia (2000-)".to_string();

        assert!(pattern.matches(&ukr));
        assert!(!pattern.matches(&eu));
        assert!(pattern.matches(&second));
    }

    #[test]
    fn test_blank_pattern_matches_all() {
        assert!(ActorPattern::parse("").unwrap().is_none());
        assert!(ActorPattern::parse("   ").unwrap().is_none());
    }

    #[test]
    fn test_bad_pattern_is_an_error() {
        let err = ActorPattern::parse("(unclosed").unwrap_err();
        assert!(matches!(err, DashboardError::InvalidPattern { .. }));
        assert!(err.is_user_input());
    }

    #[test]
    fn test_crossing_range_rejected() {
        assert!(DateRange::new(date("2023-01-02"), date("2023-01-01")).is_err());
    }

    #[test]
    fn test_from_timestamps_floors_to_day() {
        // 2023-01-02 13:00 UTC .. 2023-01-03 00:00 UTC
        let r = DateRange::from_timestamps(1_672_664_400, 1_672_704_000).unwrap();
        assert_eq!(r, range("2023-01-02", "2023-01-03"));
        assert_eq!(r.days(), 2);
    }

    #[test]
    fn test_shift_never_crosses() {
        let outer = range("2023-01-01", "2023-01-31");
        let r = range("2023-01-10", "2023-01-12");

        assert_eq!(r.shift_start(7, &outer), range("2023-01-12", "2023-01-12"));
        assert_eq!(r.shift_start(-30, &outer), range("2023-01-01", "2023-01-12"));
        assert_eq!(r.shift_end(-7, &outer), range("2023-01-10", "2023-01-10"));
        assert_eq!(r.shift_end(40, &outer), range("2023-01-10", "2023-01-31"));
    }

    #[test]
    fn test_shift_from_outside_extent_stays_inside() {
        let outer = range("2023-01-01", "2023-01-31");
        let before = range("2022-11-01", "2022-11-05");
        let after = range("2023-03-01", "2023-03-09");

        assert_eq!(before.shift_start(1, &outer), range("2023-01-02", "2023-01-31"));
        assert_eq!(before.shift_end(-1, &outer), range("2023-01-01", "2023-01-30"));
        assert_eq!(after.shift_start(-1, &outer), range("2023-01-01", "2023-01-31"));
        assert_eq!(after.shift_end(1, &outer), outer);

        let straddling = range("2022-12-20", "2023-01-10");
        assert_eq!(straddling.shift_start(3, &outer), range("2023-01-04", "2023-01-10"));
    }

    #[test]
    fn test_clamp_to() {
        let outer = range("2023-01-01", "2023-01-31");
        assert_eq!(range("2022-12-01", "2023-01-05").clamp_to(&outer), range("2023-01-01", "2023-01-05"));
        assert_eq!(range("2024-01-01", "2024-02-01").clamp_to(&outer), outer);
    }

    #[test]
    fn test_filter_state_apply() {
        let mut state = FilterState::new(range("2023-01-01", "2023-01-03"));
        assert_eq!(state.apply(&three_days()).len(), 3);
        state.include_zero_fatalities = false;
        assert_eq!(state.apply(&three_days()).len(), 2);
    }
}
