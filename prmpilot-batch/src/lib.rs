//! Batch runner for the PRM work-intake workflow: reads records from a
//! CSV export of the intake workbook and drives each one through the
//! fixed data-entry sequence over a single browser session.

pub mod batch;
pub mod config;
pub mod dates;
pub mod record;
pub mod workflow;

pub use batch::{BatchDriver, BatchReport, RecordFailure};
pub use config::Cli;
pub use record::{Derived, Record};
pub use workflow::{run_sequence, sequence, Auth, Step, StepData, StepFailure};
