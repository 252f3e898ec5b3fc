//! Expected visit model built alongside the uploaded scenario data

use crate::domain::types::{Recording, RecordingId, Track, TrackTag};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use smallvec::SmallVec;

/// Inactivity gap the service uses to split visits (10 minutes)
pub const VISIT_INTERVAL_SECS: u64 = 600;

/// Time format used by the report for Start/End columns
pub const REPORT_TIME_FORMAT: &str = "%H:%M:%S";

/// Visit table columns an expected event can be compared against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisitField {
    RecId,
    What,
    Start,
    End,
    AudioPlayed,
}

impl VisitField {
    /// Column header in the visits table
    pub fn column(&self) -> &'static str {
        match self {
            VisitField::RecId => "Rec ID",
            VisitField::What => "What",
            VisitField::Start => "Start",
            VisitField::End => "End",
            VisitField::AudioPlayed => "Audio Played",
        }
    }
}

impl std::fmt::Display for VisitField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// One event expected inside a visit block of the report
#[derive(Debug, Clone, PartialEq)]
pub enum ExpectedEvent {
    Track {
        rec_id: RecordingId,
        what: String,
        start: String,
        end: String,
        timestamp: DateTime<Utc>,
    },
    Audio {
        what: String,
        start: String,
        audio_played: String,
        timestamp: DateTime<Utc>,
    },
}

impl ExpectedEvent {
    /// Expected row for a tagged track. Start and end are the track span
    /// offset from the recording time, rendered in the report zone.
    pub fn track(recording: &Recording, track: &Track, tag: &TrackTag, tz: Tz) -> Self {
        let rec_time = recording.recording_time.with_timezone(&Utc);
        let start = rec_time + seconds(track.start_s);
        let end = rec_time + seconds(track.end_s);
        ExpectedEvent::Track {
            rec_id: recording.id,
            what: tag.what.clone(),
            start: format_report_time(start, tz),
            end: format_report_time(end, tz),
            timestamp: start,
        }
    }

    /// Expected row for an audio bait play
    pub fn audio(file_name: &str, time: DateTime<Utc>, volume: Option<u32>, tz: Tz) -> Self {
        let audio_played = match volume {
            Some(volume) => format!("{} vol {}", file_name, volume),
            None => file_name.to_string(),
        };
        ExpectedEvent::Audio {
            what: file_name.to_string(),
            start: format_report_time(time, tz),
            audio_played,
            timestamp: time,
        }
    }

    /// Ordering key, never compared against the report
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ExpectedEvent::Track { timestamp, .. } | ExpectedEvent::Audio { timestamp, .. } => {
                *timestamp
            }
        }
    }

    pub fn what(&self) -> &str {
        match self {
            ExpectedEvent::Track { what, .. } | ExpectedEvent::Audio { what, .. } => what,
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, ExpectedEvent::Audio { .. })
    }

    /// Column values this event must match exactly
    pub fn fields(&self) -> SmallVec<[(VisitField, String); 5]> {
        let mut fields = SmallVec::new();
        match self {
            ExpectedEvent::Track { rec_id, what, start, end, .. } => {
                fields.push((VisitField::RecId, rec_id.to_string()));
                fields.push((VisitField::What, what.clone()));
                fields.push((VisitField::Start, start.clone()));
                fields.push((VisitField::End, end.clone()));
            }
            ExpectedEvent::Audio { what, start, audio_played, .. } => {
                fields.push((VisitField::What, what.clone()));
                fields.push((VisitField::Start, start.clone()));
                fields.push((VisitField::AudioPlayed, audio_played.clone()));
            }
        }
        fields
    }
}

/// Events expected to be grouped into a single visit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpectedVisit {
    pub events: SmallVec<[ExpectedEvent; 4]>,
}

impl ExpectedVisit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: ExpectedEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events in report order: newest first. Ties keep construction order.
    pub fn newest_first(&self) -> Vec<&ExpectedEvent> {
        let mut events: Vec<&ExpectedEvent> = self.events.iter().collect();
        events.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
        events
    }

    pub fn audio_events(&self) -> impl Iterator<Item = &ExpectedEvent> {
        self.events.iter().filter(|e| e.is_audio())
    }
}

/// Expected per-animal line of the device summary table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimalSummary {
    pub what: String,
    pub visits: u32,
    pub audio_bait: bool,
}

impl AnimalSummary {
    pub fn new(what: &str, visits: u32, audio_bait: bool) -> Self {
        Self { what: what.to_string(), visits, audio_bait }
    }
}

/// Render an instant the way the report does
pub fn format_report_time(time: DateTime<Utc>, tz: Tz) -> String {
    time.with_timezone(&tz).format(REPORT_TIME_FORMAT).to_string()
}

#[inline]
fn seconds(s: f64) -> Duration {
    Duration::milliseconds((s * 1000.0).round() as i64)
}
