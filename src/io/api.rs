//! Monitoring service API surface used by the scenarios
//!
//! The service is an external collaborator: the scenarios only need to
//! create users, groups and devices, upload recordings with tracks and tags,
//! record audio bait plays, and fetch the visits report.

use crate::domain::response::VisitsResponse;
use crate::domain::types::{
    AudioBait, AudioFileId, DeviceEventType, DeviceHandle, DeviceId, Recording, Track, TrackTag,
    UserHandle,
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use uuid::Uuid;

/// Default track start within a recording (seconds)
pub const DEFAULT_TRACK_START_S: f64 = 2.0;

/// Length of every synthetic track (seconds)
pub const TRACK_LENGTH_S: f64 = 8.0;

/// Properties of a recording upload
#[derive(Debug, Clone)]
pub struct RecordingProps {
    pub recording_time: DateTime<FixedOffset>,
    pub duration_s: f64,
}

/// A device event to record at one or more times
#[derive(Debug, Clone)]
pub struct DeviceEvent {
    pub kind: DeviceEventType,
    pub file_id: AudioFileId,
    pub volume: Option<u32>,
}

impl DeviceEvent {
    pub fn audio_bait(file_id: AudioFileId, volume: Option<u32>) -> Self {
        Self { kind: DeviceEventType::AudioBait, file_id, volume }
    }
}

/// Parameters of a visits report query
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub limit: u32,
    pub device_ids: Vec<DeviceId>,
}

impl ReportRequest {
    pub fn visits(limit: u32, device_ids: Vec<DeviceId>) -> Self {
        Self { limit, device_ids }
    }
}

#[async_trait]
pub trait MonitoringApi: Send + Sync {
    /// Session for the preconfigured admin user
    async fn admin_user(&self) -> anyhow::Result<UserHandle>;

    /// Register and log in a fresh user whose name starts with `name`
    async fn given_new_user(&self, name: &str) -> anyhow::Result<UserHandle>;

    async fn create_group(&self, user: &UserHandle, group: &str) -> anyhow::Result<()>;

    /// Register a fresh device in `group`
    async fn given_new_device(&self, name: &str, group: &str) -> anyhow::Result<DeviceHandle>;

    async fn upload_recording(
        &self,
        device: &DeviceHandle,
        props: &RecordingProps,
    ) -> anyhow::Result<Recording>;

    async fn record_event(
        &self,
        device: &DeviceHandle,
        event: &DeviceEvent,
        times: &[DateTime<FixedOffset>],
    ) -> anyhow::Result<()>;

    /// Add a track of `TRACK_LENGTH_S` starting at `start_s`
    /// (`DEFAULT_TRACK_START_S` when `None`)
    async fn add_track(
        &self,
        user: &UserHandle,
        recording: &Recording,
        start_s: Option<f64>,
    ) -> anyhow::Result<Track>;

    async fn tag_track(&self, user: &UserHandle, track: &Track, what: &str)
        -> anyhow::Result<TrackTag>;

    async fn upload_audio_bait(&self, user: &UserHandle, name: &str) -> anyhow::Result<AudioBait>;

    async fn query_visits(&self, user: &UserHandle) -> anyhow::Result<VisitsResponse>;

    /// Raw CSV body of the visits report
    async fn get_report(&self, user: &UserHandle, request: &ReportRequest)
        -> anyhow::Result<String>;
}

/// Group name that will not collide with earlier runs
pub fn make_unique_group_name(prefix: &str) -> String {
    unique_name(prefix)
}

pub fn unique_name(prefix: &str) -> String {
    let id = Uuid::now_v7().simple().to_string();
    // The random tail of a v7 id, the head is the timestamp
    format!("{}-{}", prefix, &id[id.len() - 12..])
}

/// Track span for a requested start
pub fn track_span(start_s: Option<f64>) -> (f64, f64) {
    let start = start_s.unwrap_or(DEFAULT_TRACK_START_S);
    (start, start + TRACK_LENGTH_S)
}
