//! Assertions over the JSON visits query response

use crate::domain::response::{VisitJson, VisitsResponse};
use crate::domain::types::DeviceId;
use crate::error::{ensure_eq, CheckError};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;
use tracing::debug;

pub struct JsonVisitsChecker<'a> {
    response: &'a VisitsResponse,
    interval: Duration,
}

impl<'a> JsonVisitsChecker<'a> {
    pub fn new(response: &'a VisitsResponse, interval_secs: u64) -> Self {
        Self { response, interval: Duration::seconds(interval_secs as i64) }
    }

    pub fn check_num_visits(&self, expected: usize) -> Result<(), CheckError> {
        ensure_eq("numVisits", expected, self.response.num_visits)
    }

    /// Distinct animals seen on the device
    pub fn check_animals(&self, device: DeviceId, expected: &[&str]) -> Result<(), CheckError> {
        let animals: BTreeSet<&str> = self.device_animals(device)?.collect();
        let expected: BTreeSet<&str> = expected.iter().copied().collect();
        ensure_eq(format!("device {} animals", device), expected, animals)
    }

    /// Visit `index` of an animal, newest first
    pub fn visit(&self, device: DeviceId, animal: &str, index: usize) -> Result<&'a VisitJson, CheckError> {
        let visits = self.animal_visits(device, animal)?;
        visits.get(index).ok_or_else(|| CheckError::MissingVisit {
            device,
            animal: animal.to_string(),
            index,
        })
    }

    pub fn animal_visits(&self, device: DeviceId, animal: &str) -> Result<&'a [VisitJson], CheckError> {
        let visits = self.response.device(device).ok_or(CheckError::MissingDevice(device))?;
        let animal_visits = visits.animals.get(animal).ok_or_else(|| CheckError::MissingAnimal {
            device,
            animal: animal.to_string(),
        })?;
        Ok(&animal_visits.visits)
    }

    /// Consecutive visits of the same animal that share no audio bait event
    /// must be more than the visit interval apart
    pub fn check_visit_gaps(&self, device: DeviceId) -> Result<(), CheckError> {
        for animal in self.device_animals(device)? {
            let visits = self.animal_visits(device, animal)?;
            for (i, pair) in visits.windows(2).enumerate() {
                let (newer, older) = (&pair[0], &pair[1]);
                if newer.shares_audio_event(older) {
                    continue;
                }
                let earliest_start = older.end + self.interval;
                if newer.start <= earliest_start {
                    return Err(CheckError::VisitGap {
                        animal: animal.to_string(),
                        index: i,
                        start: newer.start,
                        previous_end: older.end,
                        interval_secs: self.interval.num_seconds(),
                    });
                }
            }
        }
        debug!(device_id = %device, "visit_gaps_checked");
        Ok(())
    }

    pub fn check_audio_flags(
        &self,
        device: DeviceId,
        animal: &str,
        index: usize,
        audio_bait_day: bool,
        audio_bait_visit: bool,
    ) -> Result<(), CheckError> {
        let visit = self.visit(device, animal, index)?;
        ensure_eq(format!("{} visit #{} audioBaitDay", animal, index), audio_bait_day, visit.audio_bait_day)?;
        ensure_eq(
            format!("{} visit #{} audioBaitVisit", animal, index),
            audio_bait_visit,
            visit.audio_bait_visit,
        )
    }

    /// Exactly these audio bait plays, matched by file name and time
    pub fn check_audio_events(
        &self,
        device: DeviceId,
        animal: &str,
        index: usize,
        expected: &[(&str, DateTime<Utc>)],
    ) -> Result<(), CheckError> {
        let visit = self.visit(device, animal, index)?;
        ensure_eq(
            format!("{} visit #{} audio events", animal, index),
            expected.len(),
            visit.audio_bait_events.len(),
        )?;

        for (file_name, time) in expected {
            let event = visit.audio_events_named(file_name).next().ok_or_else(|| {
                CheckError::MissingAudioEvent {
                    animal: animal.to_string(),
                    index,
                    file_name: file_name.to_string(),
                }
            })?;
            ensure_eq(
                format!("{} visit #{} {} time", animal, index, file_name),
                *time,
                event.date_time.with_timezone(&Utc),
            )?;
        }
        Ok(())
    }

    /// Both visits reference the same `file_name` audio event by id
    pub fn check_shared_audio_event(
        &self,
        device: DeviceId,
        first: (&str, usize),
        second: (&str, usize),
        file_name: &str,
    ) -> Result<(), CheckError> {
        let a = self.visit(device, first.0, first.1)?;
        let b = self.visit(device, second.0, second.1)?;
        let id_of = |visit: &VisitJson, animal: &str, index: usize| {
            visit.audio_events_named(file_name).next().map(|e| e.id).ok_or_else(|| {
                CheckError::MissingAudioEvent {
                    animal: animal.to_string(),
                    index,
                    file_name: file_name.to_string(),
                }
            })
        };
        ensure_eq(
            format!("{} audio event shared by {} and {}", file_name, first.0, second.0),
            id_of(a, first.0, first.1)?,
            id_of(b, second.0, second.1)?,
        )
    }

    fn device_animals(&self, device: DeviceId) -> Result<impl Iterator<Item = &'a str>, CheckError> {
        let visits = self.response.device(device).ok_or(CheckError::MissingDevice(device))?;
        Ok(visits.animals.keys().map(String::as_str))
    }
}
