mod aggregate;
mod filter;

pub use aggregate::{
    cumulative_over_time, grouped_count, region_event_counts, small_slice_bucketing, top_n_by_source,
    totals_by, Column, CumulativeSeries, GroupCount, Measure, RegionPivot, SourceCount, OTHER_LABEL,
};
pub use filter::{filter, status_line, ActorPattern, DateRange, FilterState};
