use crate::analysis::{status_line, ActorPattern, DateRange, FilterState};
use crate::data::EventTable;
use crate::error::{DashboardError, Result};

/// Loaded table, active filter and the view derived from them.
///
/// Every mutation builds the next filter and view before assigning either,
/// so readers never see a view that disagrees with the filter or table.
pub struct DashboardState {
    table: EventTable,
    extent: DateRange,
    filter: FilterState,
    view: EventTable,
}

impl DashboardState {
    pub fn new(name: &str, table: EventTable) -> Result<Self> {
        let extent = table
            .date_extent()
            .ok_or_else(|| DashboardError::EmptyDataset(name.to_string()))?;
        let filter = FilterState::new(extent);
        let view = filter.apply(&table);
        Ok(Self {
            table,
            extent,
            filter,
            view,
        })
    }

    pub fn table(&self) -> &EventTable {
        &self.table
    }

    pub fn view(&self) -> &EventTable {
        &self.view
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    /// Full day range of the loaded table
    pub fn extent(&self) -> &DateRange {
        &self.extent
    }

    pub fn status_line(&self) -> String {
        status_line(&self.filter.range, self.view.len())
    }

    fn commit(&mut self, filter: FilterState) {
        let view = filter.apply(&self.table);
        self.filter = filter;
        self.view = view;
    }

    /// Replace the date range; it is clamped into the table's extent
    pub fn set_range(&mut self, range: DateRange) {
        let mut next = self.filter.clone();
        next.range = range.clamp_to(&self.extent);
        self.commit(next);
    }

    pub fn shift_start(&mut self, days: i64) {
        let range = self.filter.range.shift_start(days, &self.extent);
        self.set_range(range);
    }

    pub fn shift_end(&mut self, days: i64) {
        let range = self.filter.range.shift_end(days, &self.extent);
        self.set_range(range);
    }

    /// Apply a new actor pattern. A malformed pattern is returned as an
    /// error and the previous pattern and view stay in effect.
    pub fn set_actor_pattern(&mut self, text: &str) -> Result<()> {
        let actor = ActorPattern::parse(text)?;
        let mut next = self.filter.clone();
        next.actor = actor;
        self.commit(next);
        Ok(())
    }

    pub fn toggle_zero_fatalities(&mut self) {
        let mut next = self.filter.clone();
        next.include_zero_fatalities = !next.include_zero_fatalities;
        self.commit(next);
    }

    /// Swap in a newly loaded table. The range resets to the new extent;
    /// actor and fatality predicates carry over. An empty table is
    /// rejected and the current one kept.
    pub fn replace_dataset(&mut self, name: &str, table: EventTable) -> Result<()> {
        let extent = table
            .date_extent()
            .ok_or_else(|| DashboardError::EmptyDataset(name.to_string()))?;
        let mut filter = self.filter.clone();
        filter.range = extent;
        let view = filter.apply(&table);

        self.table = table;
        self.extent = extent;
        self.filter = filter;
        self.view = view;
        Ok(())
    }
}
