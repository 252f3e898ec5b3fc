//! Shared identifier and handle types

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Newtype wrapper for device IDs to provide type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct DeviceId(pub u64);

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DeviceId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(DeviceId)
    }
}

/// Newtype wrapper for recording IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct RecordingId(pub u64);

impl std::fmt::Display for RecordingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype wrapper for track IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TrackId(pub u64);

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype wrapper for uploaded audio file IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct AudioFileId(pub u64);

impl std::fmt::Display for AudioFileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype wrapper for device event IDs (audio bait plays)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct EventId(pub u64);

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authenticated user session
#[derive(Debug, Clone)]
pub struct UserHandle {
    pub username: String,
    pub token: String,
}

/// Authenticated device session
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    pub id: DeviceId,
    pub name: String,
    pub group: String,
    pub token: String,
}

/// An uploaded recording
#[derive(Debug, Clone)]
pub struct Recording {
    pub id: RecordingId,
    pub recording_time: DateTime<FixedOffset>,
    pub duration_s: f64,
}

/// A track added to a recording, with its span relative to the recording start
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub recording_id: RecordingId,
    pub start_s: f64,
    pub end_s: f64,
}

/// A tag placed on a track
#[derive(Debug, Clone, PartialEq)]
pub struct TrackTag {
    pub what: String,
}

/// An uploaded audio bait sound
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBait {
    pub id: AudioFileId,
    pub name: String,
}

/// Device event kinds the scenarios record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEventType {
    AudioBait,
}

impl DeviceEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceEventType::AudioBait => "audioBait",
        }
    }
}
