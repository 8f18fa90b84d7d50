pub mod boundaries;
pub mod events;

pub use boundaries::{load_region_boundaries, RegionAliases, RegionCollection, RegionShape};
pub use events::{load_dataset, year_marks, DatasetSource, EventRecord, EventTable};
