//! Throughput accounting for embedding runs.
//!
//! [`ThroughputAggregator`] sums characters over the ordered result stream.
//! [`compute_statistics`] turns that total and the single dispatch wall-clock
//! time into a characters-per-second rate and two full-corpus projections:
//! one scaled by `down_scale`, one from the measured rate and the full corpus
//! character count.
//!
//! ```
//! use std::time::Duration;
//! use throughput::compute_statistics;
//!
//! let stats = compute_statistics(50_000, Duration::from_secs(10), 0.001, 50_000_000, 6).unwrap();
//! assert_eq!(stats.characters_per_second, 5000);
//! assert_eq!(stats.extrapolated_duration_fmt, "2:46:40");
//! ```

mod aggregator;
mod error;
mod report;
mod scale;
mod stats;

pub use crate::aggregator::ThroughputAggregator;
pub use crate::error::{ReportError, StatsError};
pub use crate::report::{append_report, read_reports};
pub use crate::scale::DownScale;
pub use crate::stats::{compute_statistics, format_hms, RunStatistics};
