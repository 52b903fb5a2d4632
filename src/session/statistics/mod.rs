pub mod tracker;

pub use tracker::{ArchiveOverview, SessionComparison, TrendPoint};
