pub mod coordinator;
pub mod history;
pub mod marketstat;
pub mod orders;
pub mod planner;

pub use coordinator::{CycleResults, FetchCoordinator, FetchJob, JobState};
pub use history::HistorySync;
pub use marketstat::MarketStatSync;
pub use orders::{OrderSync, PageEnd, RegionBook};
pub use planner::plan;

/// Counts reported by one sync pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub jobs: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub rows_written: usize,
}
