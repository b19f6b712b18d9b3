//! # Data Split
//!
//! Reproducible, optionally stratified `trainval` / `test` split of a CSV
//! artifact, published back to the tracking service as `<partition>_data.csv`.
//!
//! ```ignore
//! use data_split::{DataSplitStep, SplitArgs, SplitOptions, Stratify};
//!
//! let options = SplitOptions::new(0.2, 0.2, 42, Stratify::None)?;
//! let report = DataSplitStep::new(&tracker)
//!     .run(&SplitArgs::new("sample.csv", options), workspace)
//!     .await?;
//! ```

mod split;
mod step;
mod table;

pub use split::{split_indices, test_count, Partition, PartitionSet, SplitOptions, Stratify};
pub use step::{DataSplitStep, PublishedPartition, SplitArgs, SplitReport, SPLIT_ARTIFACT_TYPE};
pub use table::Table;
