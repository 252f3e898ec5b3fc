//! Scenario builder - uploads a device timeline and records the visits the
//! service is expected to group it into
//!
//! Every step mutates the service (recordings, tracks, tags, audio bait
//! events) and at the same time appends the matching `ExpectedEvent` to the
//! visit currently being built.

use crate::domain::types::{AudioBait, DeviceHandle, Recording, UserHandle};
use crate::domain::visit::{ExpectedEvent, ExpectedVisit};
use crate::io::api::{DeviceEvent, MonitoringApi, RecordingProps};
use anyhow::bail;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};

/// Which expected visits an audio bait play belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachTo {
    /// The visit being built
    Current,
    /// The visit being built and the one before it
    CurrentAndPrevious,
    /// No visit, e.g. a play far outside any visit window
    Nowhere,
}

/// One step of a scenario timeline
#[derive(Debug, Clone)]
pub enum ScenarioStep<'s> {
    /// Following tagged events belong to a new visit
    NewVisit,
    /// Recording with an untagged track, part of no visit
    Untagged { time: DateTime<Tz>, duration_s: f64 },
    /// Recording with one track tagged `what`
    Tagged { what: &'s str, time: DateTime<Tz>, duration_s: f64 },
    /// Another track on the last recording, tagged `what`
    ExtraTrack { what: &'s str, start_s: f64 },
    AudioBait { bait: &'s AudioBait, time: DateTime<Tz>, volume: Option<u32>, attach: AttachTo },
}

pub struct ScenarioBuilder<'a> {
    api: &'a dyn MonitoringApi,
    device: &'a DeviceHandle,
    user: &'a UserHandle,
    tz: Tz,
    visits: Vec<ExpectedVisit>,
    last_recording: Option<Recording>,
}

impl<'a> ScenarioBuilder<'a> {
    /// `user` adds the tracks and tags; `tz` is the zone report times are rendered in
    pub fn new(
        api: &'a dyn MonitoringApi,
        device: &'a DeviceHandle,
        user: &'a UserHandle,
        tz: Tz,
    ) -> Self {
        Self { api, device, user, tz, visits: Vec::new(), last_recording: None }
    }

    pub fn start_visit(&mut self) {
        self.visits.push(ExpectedVisit::new());
    }

    /// Visits built so far, in construction order
    pub fn visits(&self) -> &[ExpectedVisit] {
        &self.visits
    }

    pub fn finish(self) -> Vec<ExpectedVisit> {
        info!(device_id = %self.device.id, visits = self.visits.len(), "scenario_built");
        self.visits
    }

    pub async fn run(&mut self, steps: &[ScenarioStep<'_>]) -> anyhow::Result<()> {
        for step in steps {
            self.apply(step).await?;
        }
        Ok(())
    }

    pub async fn apply(&mut self, step: &ScenarioStep<'_>) -> anyhow::Result<()> {
        match step {
            ScenarioStep::NewVisit => self.start_visit(),
            ScenarioStep::Untagged { time, duration_s } => {
                self.untagged_recording(*time, *duration_s).await?;
            }
            ScenarioStep::Tagged { what, time, duration_s } => {
                self.tagged_recording(what, *time, *duration_s).await?;
            }
            ScenarioStep::ExtraTrack { what, start_s } => {
                self.tag_extra_track(what, *start_s).await?;
            }
            ScenarioStep::AudioBait { bait, time, volume, attach } => {
                self.audio_bait(bait, *time, *volume, *attach).await?;
            }
        }
        Ok(())
    }

    /// Upload a recording with one untagged track
    pub async fn untagged_recording(
        &mut self,
        time: DateTime<Tz>,
        duration_s: f64,
    ) -> anyhow::Result<Recording> {
        let recording = self.upload(time, duration_s).await?;
        self.api.add_track(self.user, &recording, None).await?;
        debug!(recording_id = %recording.id, "untagged_recording");
        self.last_recording = Some(recording.clone());
        Ok(recording)
    }

    /// Upload a recording with one track tagged `what`, part of the current visit
    pub async fn tagged_recording(
        &mut self,
        what: &str,
        time: DateTime<Tz>,
        duration_s: f64,
    ) -> anyhow::Result<ExpectedEvent> {
        self.ensure_visit(1)?;
        let recording = self.upload(time, duration_s).await?;
        self.last_recording = Some(recording);
        self.tag_new_track(what, None).await
    }

    /// Add and tag another track on the last uploaded recording
    pub async fn tag_extra_track(&mut self, what: &str, start_s: f64) -> anyhow::Result<ExpectedEvent> {
        self.ensure_visit(1)?;
        self.tag_new_track(what, Some(start_s)).await
    }

    /// Record an audio bait play on the device
    pub async fn audio_bait(
        &mut self,
        bait: &AudioBait,
        time: DateTime<Tz>,
        volume: Option<u32>,
        attach: AttachTo,
    ) -> anyhow::Result<ExpectedEvent> {
        match attach {
            AttachTo::Current => self.ensure_visit(1)?,
            AttachTo::CurrentAndPrevious => self.ensure_visit(2)?,
            AttachTo::Nowhere => {}
        }

        let event = DeviceEvent::audio_bait(bait.id, volume);
        self.api.record_event(self.device, &event, &[time.fixed_offset()]).await?;

        let expected = ExpectedEvent::audio(&bait.name, time.with_timezone(&Utc), volume, self.tz);
        let count = self.visits.len();
        match attach {
            AttachTo::Current => self.visits[count - 1].push(expected.clone()),
            AttachTo::CurrentAndPrevious => {
                self.visits[count - 2].push(expected.clone());
                self.visits[count - 1].push(expected.clone());
            }
            AttachTo::Nowhere => {}
        }
        debug!(file = %bait.name, attach = ?attach, "audio_bait_recorded");
        Ok(expected)
    }

    async fn upload(&self, time: DateTime<Tz>, duration_s: f64) -> anyhow::Result<Recording> {
        let props = RecordingProps { recording_time: time.fixed_offset(), duration_s };
        self.api.upload_recording(self.device, &props).await
    }

    async fn tag_new_track(&mut self, what: &str, start_s: Option<f64>) -> anyhow::Result<ExpectedEvent> {
        let Some(recording) = self.last_recording.as_ref() else {
            bail!("no recording to add a {} track to", what);
        };
        let track = self.api.add_track(self.user, recording, start_s).await?;
        let tag = self.api.tag_track(self.user, &track, what).await?;
        let event = ExpectedEvent::track(recording, &track, &tag, self.tz);

        if let Some(visit) = self.visits.last_mut() {
            visit.push(event.clone());
        }
        debug!(recording_id = %recording.id, track_id = %track.id, what = %what, "tagged_track");
        Ok(event)
    }

    fn ensure_visit(&self, needed: usize) -> anyhow::Result<()> {
        if self.visits.len() < needed {
            bail!("step needs {} started visit(s), have {}", needed, self.visits.len());
        }
        Ok(())
    }
}
