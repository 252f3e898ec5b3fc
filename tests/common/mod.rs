//! In-memory monitoring service for integration tests
//!
//! Records every call and can answer the visits query and the CSV report
//! from what was uploaded, using a simplified grouping: tracks of one animal
//! closer than the visit interval form a visit, `unidentified` tracks join
//! the nearest visit, and an audio bait play belongs to every visit that
//! starts within one interval after it (or that it falls inside).

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::BTreeMap;
use visit_check::domain::response::VisitsResponse;
use visit_check::domain::types::{
    AudioBait, AudioFileId, DeviceHandle, DeviceId, Recording, RecordingId, Track, TrackId,
    TrackTag, UserHandle,
};
use visit_check::domain::visit::format_report_time;
use visit_check::io::api::{track_span, DeviceEvent, MonitoringApi, RecordingProps, ReportRequest};

const UNIDENTIFIED: &str = "unidentified";

#[derive(Debug, Clone)]
pub struct FakeRecording {
    pub id: RecordingId,
    pub device: DeviceId,
    pub time: DateTime<FixedOffset>,
    pub duration_s: f64,
}

#[derive(Debug, Clone)]
pub struct FakeTrack {
    pub id: TrackId,
    pub recording: RecordingId,
    pub start_s: f64,
    pub end_s: f64,
    pub tag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FakeEvent {
    pub id: u64,
    pub device: DeviceId,
    pub file_id: AudioFileId,
    pub volume: Option<u32>,
    pub time: DateTime<FixedOffset>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    next_id: u64,
    pub calls: Vec<String>,
    pub groups: Vec<String>,
    pub devices: Vec<DeviceHandle>,
    pub files: Vec<AudioBait>,
    pub recordings: Vec<FakeRecording>,
    pub tracks: Vec<FakeTrack>,
    pub events: Vec<FakeEvent>,
}

impl FakeState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn calls_named(&self, op: &str) -> usize {
        self.calls.iter().filter(|c| c.as_str() == op).count()
    }
}

/// A tagged track or audio play placed on the absolute timeline
#[derive(Debug, Clone)]
enum FakeItem {
    Track { rec_id: RecordingId, what: String, start: DateTime<Utc>, end: DateTime<Utc> },
    Audio { event_id: u64, file_name: String, volume: Option<u32>, time: DateTime<Utc> },
}

impl FakeItem {
    fn time(&self) -> DateTime<Utc> {
        match self {
            FakeItem::Track { start, .. } => *start,
            FakeItem::Audio { time, .. } => *time,
        }
    }
}

#[derive(Debug, Clone)]
struct FakeVisit {
    what: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    items: Vec<FakeItem>,
    audio_day: bool,
}

impl FakeVisit {
    fn audio(&self) -> impl Iterator<Item = &FakeItem> {
        self.items.iter().filter(|i| matches!(i, FakeItem::Audio { .. }))
    }

    /// Newest first
    fn sorted_items(&self) -> Vec<&FakeItem> {
        let mut items: Vec<&FakeItem> = self.items.iter().collect();
        items.sort_by(|a, b| b.time().cmp(&a.time()));
        items
    }
}

pub struct FakeApi {
    state: Mutex<FakeState>,
    tz: Tz,
    interval: Duration,
    fail_op: Mutex<Option<&'static str>>,
}

impl FakeApi {
    pub fn new(tz: Tz, interval_secs: i64) -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            tz,
            interval: Duration::seconds(interval_secs),
            fail_op: Mutex::new(None),
        }
    }

    pub fn state(&self) -> parking_lot::MutexGuard<'_, FakeState> {
        self.state.lock()
    }

    /// Make every later call of `op` fail
    pub fn fail_on(&self, op: &'static str) {
        *self.fail_op.lock() = Some(op);
    }

    fn record(&self, op: &'static str) -> anyhow::Result<()> {
        self.state.lock().calls.push(op.to_string());
        if *self.fail_op.lock() == Some(op) {
            anyhow::bail!("{} returned 500 Internal Server Error", op);
        }
        Ok(())
    }

    fn visits_for(&self, state: &FakeState, device: DeviceId) -> Vec<FakeVisit> {
        let mut tracks: Vec<FakeItem> = Vec::new();
        for track in &state.tracks {
            let Some(what) = &track.tag else { continue };
            let Some(rec) = state.recordings.iter().find(|r| r.id == track.recording) else {
                continue;
            };
            if rec.device != device {
                continue;
            }
            let base = rec.time.with_timezone(&Utc);
            tracks.push(FakeItem::Track {
                rec_id: rec.id,
                what: what.clone(),
                start: base + Duration::milliseconds((track.start_s * 1000.0) as i64),
                end: base + Duration::milliseconds((track.end_s * 1000.0) as i64),
            });
        }
        tracks.sort_by_key(FakeItem::time);

        let mut visits: Vec<FakeVisit> = Vec::new();
        let mut unidentified = Vec::new();
        for item in tracks {
            let (what, start, end) = match &item {
                FakeItem::Track { what, start, end, .. } => (what.clone(), *start, *end),
                FakeItem::Audio { .. } => continue,
            };
            if what == UNIDENTIFIED {
                unidentified.push((start, end, item));
                continue;
            }
            let open = visits
                .iter_mut()
                .rev()
                .find(|v| v.what == what && start <= v.end + self.interval);
            match open {
                Some(visit) => {
                    visit.end = visit.end.max(end);
                    visit.items.push(item);
                }
                None => visits.push(FakeVisit { what, start, end, items: vec![item], audio_day: false }),
            }
        }

        for (start, end, item) in unidentified {
            let nearest = visits.iter_mut().min_by_key(|v| (v.start - start).num_seconds().abs());
            if let Some(visit) = nearest {
                visit.start = visit.start.min(start);
                visit.end = visit.end.max(end);
                visit.items.push(item);
            }
        }

        for visit in &mut visits {
            for event in state.events.iter().filter(|e| e.device == device) {
                let time = event.time.with_timezone(&Utc);
                if (time - visit.start).num_hours().abs() < 12 {
                    visit.audio_day = true;
                }
                if time >= visit.start - self.interval && time <= visit.end {
                    let file_name = state
                        .files
                        .iter()
                        .find(|f| f.id == event.file_id)
                        .map(|f| f.name.clone())
                        .unwrap_or_default();
                    visit.items.push(FakeItem::Audio {
                        event_id: event.id,
                        file_name,
                        volume: event.volume,
                        time,
                    });
                }
            }
        }

        visits.sort_by(|a, b| b.start.cmp(&a.start));
        visits
    }

    fn visits_json(&self, state: &FakeState) -> serde_json::Value {
        let mut rows = serde_json::Map::new();
        let mut num_visits = 0;
        for device in &state.devices {
            let visits = self.visits_for(state, device.id);
            num_visits += visits.len();
            let mut animals: BTreeMap<String, Vec<serde_json::Value>> = BTreeMap::new();
            for visit in &visits {
                let events: Vec<serde_json::Value> = visit
                    .audio()
                    .filter_map(|item| match item {
                        FakeItem::Audio { event_id, file_name, time, .. } => Some(json!({
                            "id": event_id,
                            "fileName": file_name,
                            "dateTime": time.to_rfc3339(),
                        })),
                        FakeItem::Track { .. } => None,
                    })
                    .collect();
                animals.entry(visit.what.clone()).or_default().push(json!({
                    "start": visit.start.to_rfc3339(),
                    "end": visit.end.to_rfc3339(),
                    "audioBaitDay": visit.audio_day,
                    "audioBaitVisit": !events.is_empty(),
                    "audioBaitEvents": events,
                }));
            }
            let animals: serde_json::Map<String, serde_json::Value> = animals
                .into_iter()
                .map(|(what, visits)| (what, json!({ "visits": visits })))
                .collect();
            rows.insert(device.id.to_string(), json!({ "animals": animals }));
        }
        json!({ "numVisits": num_visits, "rows": rows })
    }

    fn report_lines(&self, state: &FakeState, devices: &[DeviceId]) -> Vec<String> {
        let time = |t: DateTime<Utc>| format_report_time(t, self.tz);
        let mut lines = vec![
            "Device ID,Device Name,Group Name,First Visit,Last Visit,# Visits,Avg Events per Visit,Animal,Visits,Using Audio Bait,,,".to_string(),
        ];
        let mut visit_lines = Vec::new();

        for device in state.devices.iter().filter(|d| devices.contains(&d.id)) {
            let visits = self.visits_for(state, device.id);
            let mut per_animal: BTreeMap<&str, Vec<&FakeVisit>> = BTreeMap::new();
            for visit in &visits {
                per_animal.entry(visit.what.as_str()).or_default().push(visit);
            }

            let summary = |what: &str, visits: &[&FakeVisit]| {
                let first = visits.iter().map(|v| v.start).min().map(time).unwrap_or_default();
                let last = visits.iter().map(|v| v.end).max().map(time).unwrap_or_default();
                let events: usize = visits.iter().map(|v| v.items.len()).sum();
                let avg = events as f64 / visits.len().max(1) as f64;
                let audio = visits.iter().any(|v| v.audio().next().is_some());
                (first, last, avg, audio, what.to_string())
            };

            let all: Vec<&FakeVisit> = visits.iter().collect();
            let (first, last, avg, audio, _) = summary("", &all);
            let names: Vec<&str> = per_animal.keys().copied().collect();
            let counts: Vec<String> = per_animal.values().map(|v| v.len().to_string()).collect();
            lines.push(format!(
                "{},{},{},{},{},{},{:.1},{},{},{}",
                device.id,
                device.name,
                device.group,
                first,
                last,
                all.len(),
                avg,
                names.join(";"),
                counts.join(";"),
                audio
            ));
            for (what, animal_visits) in &per_animal {
                let (first, last, avg, audio, what) = summary(what, animal_visits);
                lines.push(format!(
                    "{},{},{},{},{},{},{:.1},{},{},{}",
                    device.id,
                    device.name,
                    device.group,
                    first,
                    last,
                    animal_visits.len(),
                    avg,
                    what,
                    animal_visits.len(),
                    audio
                ));
            }

            for (index, visit) in visits.iter().enumerate() {
                visit_lines.push(format!(
                    "{},{},{},Visit,{},,{},{},{},,{},{},",
                    index + 1,
                    device.group,
                    device.name,
                    visit.what,
                    visit.start.with_timezone(&self.tz).format("%Y-%m-%d"),
                    time(visit.start),
                    time(visit.end),
                    visit.items.len(),
                    visit.audio().next().is_some()
                ));
                for item in visit.sorted_items() {
                    match item {
                        FakeItem::Track { rec_id, what, start, end } => visit_lines.push(format!(
                            ",,,Event,{},{},{},{},{},90%,,,http://browse/recording/{}",
                            what,
                            rec_id,
                            start.with_timezone(&self.tz).format("%Y-%m-%d"),
                            time(*start),
                            time(*end),
                            rec_id
                        )),
                        FakeItem::Audio { file_name, volume, time: at, .. } => {
                            let played = match volume {
                                Some(v) => format!("{} vol {}", file_name, v),
                                None => file_name.clone(),
                            };
                            visit_lines.push(format!(
                                ",,,Audio Bait,{},,{},{},,,,{},",
                                file_name,
                                at.with_timezone(&self.tz).format("%Y-%m-%d"),
                                time(*at),
                                played
                            ));
                        }
                    }
                }
            }
        }

        lines.push(String::new());
        lines.push("Visit ID,Group,Device,Type,What,Rec ID,Date,Start,End,Confidence,# Events,Audio Played,URL".to_string());
        lines.extend(visit_lines);
        lines
    }
}

#[async_trait]
impl MonitoringApi for FakeApi {
    async fn admin_user(&self) -> anyhow::Result<UserHandle> {
        self.record("admin_user")?;
        Ok(UserHandle { username: "admin_test".to_string(), token: "admin-token".to_string() })
    }

    async fn given_new_user(&self, name: &str) -> anyhow::Result<UserHandle> {
        self.record("given_new_user")?;
        let id = self.state.lock().next_id();
        Ok(UserHandle { username: format!("{}-{}", name, id), token: format!("user-token-{}", id) })
    }

    async fn create_group(&self, _user: &UserHandle, group: &str) -> anyhow::Result<()> {
        self.record("create_group")?;
        self.state.lock().groups.push(group.to_string());
        Ok(())
    }

    async fn given_new_device(&self, name: &str, group: &str) -> anyhow::Result<DeviceHandle> {
        self.record("given_new_device")?;
        let mut state = self.state.lock();
        let id = state.next_id();
        let device = DeviceHandle {
            id: DeviceId(id),
            name: format!("{}-{}", name, id),
            group: group.to_string(),
            token: format!("device-token-{}", id),
        };
        state.devices.push(device.clone());
        Ok(device)
    }

    async fn upload_recording(
        &self,
        device: &DeviceHandle,
        props: &RecordingProps,
    ) -> anyhow::Result<Recording> {
        self.record("upload_recording")?;
        let mut state = self.state.lock();
        let id = RecordingId(state.next_id());
        state.recordings.push(FakeRecording {
            id,
            device: device.id,
            time: props.recording_time,
            duration_s: props.duration_s,
        });
        Ok(Recording { id, recording_time: props.recording_time, duration_s: props.duration_s })
    }

    async fn record_event(
        &self,
        device: &DeviceHandle,
        event: &DeviceEvent,
        times: &[DateTime<FixedOffset>],
    ) -> anyhow::Result<()> {
        self.record("record_event")?;
        let mut state = self.state.lock();
        for time in times {
            let id = state.next_id();
            state.events.push(FakeEvent {
                id,
                device: device.id,
                file_id: event.file_id,
                volume: event.volume,
                time: *time,
            });
        }
        Ok(())
    }

    async fn add_track(
        &self,
        _user: &UserHandle,
        recording: &Recording,
        start_s: Option<f64>,
    ) -> anyhow::Result<Track> {
        self.record("add_track")?;
        let (start_s, end_s) = track_span(start_s);
        let mut state = self.state.lock();
        let id = TrackId(state.next_id());
        state.tracks.push(FakeTrack { id, recording: recording.id, start_s, end_s, tag: None });
        Ok(Track { id, recording_id: recording.id, start_s, end_s })
    }

    async fn tag_track(
        &self,
        _user: &UserHandle,
        track: &Track,
        what: &str,
    ) -> anyhow::Result<TrackTag> {
        self.record("tag_track")?;
        let mut state = self.state.lock();
        if let Some(t) = state.tracks.iter_mut().find(|t| t.id == track.id) {
            t.tag = Some(what.to_string());
        }
        Ok(TrackTag { what: what.to_string() })
    }

    async fn upload_audio_bait(&self, _user: &UserHandle, name: &str) -> anyhow::Result<AudioBait> {
        self.record("upload_audio_bait")?;
        let mut state = self.state.lock();
        let bait = AudioBait { id: AudioFileId(state.next_id()), name: name.to_string() };
        state.files.push(bait.clone());
        Ok(bait)
    }

    async fn query_visits(&self, _user: &UserHandle) -> anyhow::Result<VisitsResponse> {
        self.record("query_visits")?;
        let state = self.state.lock();
        Ok(serde_json::from_value(self.visits_json(&state))?)
    }

    async fn get_report(&self, _user: &UserHandle, request: &ReportRequest) -> anyhow::Result<String> {
        self.record("get_report")?;
        let state = self.state.lock();
        Ok(self.report_lines(&state, &request.device_ids).join("\n"))
    }
}
