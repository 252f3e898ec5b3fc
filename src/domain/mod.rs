//! Domain models - identifiers, expected visits and report shapes
//!
//! This module contains the canonical data types used throughout the crate:
//! - `types` - ID newtypes and handles for users, devices, recordings, tracks
//! - `visit` - `ExpectedEvent` / `ExpectedVisit` built by the scenario builder
//! - `response` - typed JSON visits query response

pub mod response;
pub mod types;
pub mod visit;

pub use response::{AudioBaitEventJson, VisitJson, VisitsResponse};
pub use types::{AudioBait, DeviceHandle, DeviceId, Recording, Track, TrackTag, UserHandle};
pub use visit::{AnimalSummary, ExpectedEvent, ExpectedVisit, VisitField, VISIT_INTERVAL_SECS};
