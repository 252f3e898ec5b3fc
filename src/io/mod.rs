//! IO modules - external system interfaces
//!
//! - `api` - `MonitoringApi` trait: the monitoring service surface the scenarios drive
//! - `http` - reqwest implementation of `MonitoringApi`

pub mod api;
pub mod http;

pub use api::{make_unique_group_name, DeviceEvent, MonitoringApi, RecordingProps, ReportRequest};
pub use http::HttpApi;
