use crate::data::{EventRecord, EventTable};
use chrono::NaiveDate;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Label of the synthetic bucket collecting small slices
pub const OTHER_LABEL: &str = "Other";

/// Categorical columns an aggregate can be keyed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    EventDate,
    EventType,
    SubEventType,
    Country,
    Admin1,
    Actor1,
    Actor2,
    Source,
}

impl Column {
    pub fn value<'a>(&self, event: &'a EventRecord) -> Cow<'a, str> {
        match self {
            Column::EventDate => Cow::Owned(event.event_date.format("%Y-%m-%d").to_string()),
            Column::EventType => Cow::Borrowed(&event.event_type),
            Column::SubEventType => Cow::Borrowed(&event.sub_event_type),
            Column::Country => Cow::Borrowed(&event.country),
            Column::Admin1 => Cow::Borrowed(&event.admin1),
            Column::Actor1 => Cow::Borrowed(&event.actor1),
            Column::Actor2 => Cow::Borrowed(&event.actor2),
            Column::Source => Cow::Borrowed(&event.source),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Column::EventDate => "event_date",
            Column::EventType => "event_type",
            Column::SubEventType => "sub_event_type",
            Column::Country => "country",
            Column::Admin1 => "admin1",
            Column::Actor1 => "actor1",
            Column::Actor2 => "actor2",
            Column::Source => "source",
        }
    }
}

/// What a cell accumulates: one per row, or the row's fatalities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Measure {
    #[default]
    Events,
    Fatalities,
}

impl Measure {
    pub fn of(&self, event: &EventRecord) -> u64 {
        match self {
            Measure::Events => 1,
            Measure::Fatalities => u64::from(event.fatalities),
        }
    }
}

/// Row count for one (source, sub_event_type) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCount {
    pub source: String,
    pub sub_event_type: String,
    pub count: u64,
}

/// Counts per (source, sub_event_type) for the `n` busiest sources.
///
/// Sources are ranked by row count; ties go to the source seen first.
/// Rows come out grouped by source in rank order, sub-event types
/// ascending within a source. The second value is the ranked source list.
pub fn top_n_by_source(events: &EventTable, n: usize) -> (Vec<SourceCount>, Vec<String>) {
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    let mut totals: Vec<(&str, u64)> = Vec::new();
    for event in events.iter() {
        let idx = *first_seen.entry(event.source.as_str()).or_insert_with(|| {
            totals.push((event.source.as_str(), 0));
            totals.len() - 1
        });
        totals[idx].1 += 1;
    }

    // Stable sort keeps first-seen order among equal counts
    totals.sort_by(|a, b| b.1.cmp(&a.1));
    totals.truncate(n);

    let rank: HashMap<&str, usize> = totals.iter().enumerate().map(|(i, (s, _))| (*s, i)).collect();

    let mut grouped: BTreeMap<(usize, &str), u64> = BTreeMap::new();
    for event in events.iter() {
        if let Some(&r) = rank.get(event.source.as_str()) {
            *grouped.entry((r, event.sub_event_type.as_str())).or_insert(0) += 1;
        }
    }

    let rows = grouped
        .into_iter()
        .map(|((r, sub), count)| SourceCount {
            source: totals[r].0.to_string(),
            sub_event_type: sub.to_string(),
            count,
        })
        .collect();
    let order = totals.iter().map(|(s, _)| s.to_string()).collect();

    (rows, order)
}

/// One combination of key values and how many rows carry it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCount {
    pub keys: Vec<String>,
    pub count: u64,
}

/// Row counts per distinct combination of `columns`, ordered by key.
/// Absent combinations are omitted.
pub fn grouped_count(events: &EventTable, columns: &[Column]) -> Vec<GroupCount> {
    let mut groups: BTreeMap<Vec<String>, u64> = BTreeMap::new();
    for event in events.iter() {
        let keys = columns.iter().map(|c| c.value(event).into_owned()).collect();
        *groups.entry(keys).or_insert(0) += 1;
    }
    groups
        .into_iter()
        .map(|(keys, count)| GroupCount { keys, count })
        .collect()
}

/// Per-category totals of `measure`, ordered by category name
pub fn totals_by(events: &EventTable, column: Column, measure: Measure) -> Vec<(String, u64)> {
    let mut totals: BTreeMap<String, u64> = BTreeMap::new();
    for event in events.iter() {
        *totals.entry(column.value(event).into_owned()).or_insert(0) += measure.of(event);
    }
    totals.into_iter().collect()
}

/// Date × category table of running totals
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CumulativeSeries {
    pub dates: Vec<NaiveDate>,
    pub categories: Vec<String>,
    /// `values[date][category]`
    pub values: Vec<Vec<u64>>,
}

impl CumulativeSeries {
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Running total of one category along the date axis
    pub fn series(&self, category: usize) -> Vec<u64> {
        self.values.iter().map(|row| row[category]).collect()
    }

    pub fn category_index(&self, name: &str) -> Option<usize> {
        self.categories.iter().position(|c| c == name)
    }

    /// Largest final total across categories
    pub fn max_total(&self) -> u64 {
        self.values
            .last()
            .and_then(|row| row.iter().copied().max())
            .unwrap_or(0)
    }
}

/// Pivot `events` into dates × `column` values, fill gaps with zero, then
/// accumulate down the date axis so each category is non-decreasing.
pub fn cumulative_over_time(events: &EventTable, column: Column, measure: Measure) -> CumulativeSeries {
    if events.is_empty() {
        return CumulativeSeries::default();
    }

    let categories: Vec<String> = events
        .iter()
        .map(|e| column.value(e).into_owned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let index: HashMap<&str, usize> = categories.iter().enumerate().map(|(i, c)| (c.as_str(), i)).collect();

    let mut per_day: BTreeMap<NaiveDate, Vec<u64>> = BTreeMap::new();
    for event in events.iter() {
        let row = per_day
            .entry(event.event_date)
            .or_insert_with(|| vec![0; categories.len()]);
        row[index[column.value(event).as_ref()]] += measure.of(event);
    }

    let mut running = vec![0u64; categories.len()];
    let mut dates = Vec::with_capacity(per_day.len());
    let mut values = Vec::with_capacity(per_day.len());
    for (date, counts) in per_day {
        for (acc, c) in running.iter_mut().zip(counts) {
            *acc += c;
        }
        dates.push(date);
        values.push(running.clone());
    }

    CumulativeSeries {
        dates,
        categories,
        values,
    }
}

/// Fold categories whose share of the grand total is below `threshold`
/// into a single "Other" entry. Output is sorted by value, descending.
/// A zero grand total yields an empty result.
pub fn small_slice_bucketing(totals: &[(String, u64)], threshold: f64) -> Vec<(String, u64)> {
    let grand: u64 = totals.iter().map(|(_, v)| v).sum();
    if grand == 0 {
        return Vec::new();
    }

    let mut kept: Vec<(String, u64)> = Vec::with_capacity(totals.len());
    let mut other: Option<u64> = None;
    for (name, value) in totals {
        if (*value as f64 / grand as f64) < threshold {
            *other.get_or_insert(0) += value;
        } else {
            kept.push((name.clone(), *value));
        }
    }

    if let Some(mut bucket) = other {
        // A real category called "Other" joins the bucket instead of duplicating it
        if let Some(pos) = kept.iter().position(|(name, _)| name == OTHER_LABEL) {
            bucket += kept.remove(pos).1;
        }
        kept.push((OTHER_LABEL.to_string(), bucket));
    }

    kept.sort_by(|a, b| b.1.cmp(&a.1));
    kept
}

/// Region × category event counts, zero-filled
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionPivot {
    pub regions: Vec<String>,
    pub categories: Vec<String>,
    /// `counts[region][category]`
    pub counts: Vec<Vec<u64>>,
}

impl RegionPivot {
    /// True when no events contributed (no category columns)
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn category_index(&self, category: &str) -> Option<usize> {
        self.categories.iter().position(|c| c == category)
    }

    pub fn count(&self, region: &str, category: &str) -> u64 {
        let (Some(r), Some(c)) = (
            self.regions.iter().position(|x| x == region),
            self.category_index(category),
        ) else {
            return 0;
        };
        self.counts[r][c]
    }

    /// (region, count) for one category column
    pub fn column(&self, category: usize) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.regions
            .iter()
            .zip(&self.counts)
            .map(move |(r, row)| (r.as_str(), row.get(category).copied().unwrap_or(0)))
    }

    /// Add a zero row for every region of `domain` not already present
    pub fn with_regions<I, S>(mut self, domain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut rows: BTreeMap<String, Vec<u64>> =
            self.regions.drain(..).zip(self.counts.drain(..)).collect();
        let width = self.categories.len();
        for region in domain {
            rows.entry(region.into()).or_insert_with(|| vec![0; width]);
        }
        let (regions, counts): (Vec<String>, Vec<Vec<u64>>) = rows.into_iter().unzip();
        self.regions = regions;
        self.counts = counts;
        self
    }
}

/// Count events per `region_col` × `category_col`. Every combination of an
/// observed region and an observed category is present, zero if unseen.
pub fn region_event_counts(events: &EventTable, region_col: Column, category_col: Column) -> RegionPivot {
    if events.is_empty() {
        return RegionPivot::default();
    }

    let mut regions: BTreeSet<String> = BTreeSet::new();
    let mut categories: BTreeSet<String> = BTreeSet::new();
    let mut cells: HashMap<(String, String), u64> = HashMap::new();
    for event in events.iter() {
        let region = region_col.value(event).into_owned();
        let category = category_col.value(event).into_owned();
        regions.insert(region.clone());
        categories.insert(category.clone());
        *cells.entry((region, category)).or_insert(0) += 1;
    }

    let regions: Vec<String> = regions.into_iter().collect();
    let categories: Vec<String> = categories.into_iter().collect();
    let counts = regions
        .iter()
        .map(|r| {
            categories
                .iter()
                .map(|c| cells.get(&(r.clone(), c.clone())).copied().unwrap_or(0))
                .collect()
        })
        .collect();

    RegionPivot {
        regions,
        categories,
        counts,
    }
}
