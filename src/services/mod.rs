//! Services - report parsing, checks and scenario orchestration
//!
//! - `report` - Two-phase parser for the CSV visits report
//! - `report_checker` - Compares the parsed report with expected visits
//! - `visits_checker` - Assertions over the JSON visits query
//! - `scenario` - Builds a device timeline and the visits it should produce
//! - `scenarios` - Named scenarios run by the binary

pub mod report;
pub mod report_checker;
pub mod scenario;
pub mod scenarios;
pub mod visits_checker;

pub use report::VisitsReport;
pub use report_checker::ReportChecker;
pub use scenario::{AttachTo, ScenarioBuilder, ScenarioStep};
pub use scenarios::{Scenario, SCENARIOS};
pub use visits_checker::JsonVisitsChecker;
