//! JSON shape of the visits query response

use crate::domain::types::{DeviceId, EventId};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitsResponse {
    pub num_visits: usize,
    /// Keyed by device id, as a string
    #[serde(default)]
    pub rows: HashMap<String, DeviceVisits>,
}

impl VisitsResponse {
    pub fn device(&self, device_id: DeviceId) -> Option<&DeviceVisits> {
        self.rows.get(&device_id.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceVisits {
    #[serde(default)]
    pub animals: HashMap<String, AnimalVisits>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnimalVisits {
    /// Newest visit first
    #[serde(default)]
    pub visits: Vec<VisitJson>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitJson {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    /// Audio bait was played on the same day
    #[serde(default, deserialize_with = "null_as_false")]
    pub audio_bait_day: bool,
    /// Audio bait was played during this visit
    #[serde(default, deserialize_with = "null_as_false")]
    pub audio_bait_visit: bool,
    #[serde(default)]
    pub audio_bait_events: Vec<AudioBaitEventJson>,
}

impl VisitJson {
    pub fn audio_events_named<'a>(
        &'a self,
        file_name: &'a str,
    ) -> impl Iterator<Item = &'a AudioBaitEventJson> + 'a {
        self.audio_bait_events.iter().filter(move |e| e.file_name == file_name)
    }

    pub fn shares_audio_event(&self, other: &VisitJson) -> bool {
        self.audio_bait_events
            .iter()
            .any(|a| other.audio_bait_events.iter().any(|b| a.id == b.id))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioBaitEventJson {
    pub id: EventId,
    pub file_name: String,
    pub date_time: DateTime<FixedOffset>,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_visits_response() {
        let value = json!({
            "numVisits": 1,
            "rows": {
                "5": {
                    "animals": {
                        "cat": {
                            "visits": [{
                                "start": "2024-01-10T01:00:10.000Z",
                                "end": "2024-01-10T01:03:18.000Z",
                                "audioBaitDay": true,
                                "audioBaitVisit": null,
                                "audioBaitEvents": [{
                                    "id": 31,
                                    "fileName": "rodent-scream",
                                    "dateTime": "2024-01-10T00:55:00.000Z"
                                }]
                            }]
                        }
                    }
                }
            }
        });

        let response: VisitsResponse = serde_json::from_value(value).unwrap();
        assert_eq!(response.num_visits, 1);

        let device = response.device(DeviceId(5)).unwrap();
        let visit = &device.animals["cat"].visits[0];
        assert!(visit.audio_bait_day);
        assert!(!visit.audio_bait_visit);
        assert_eq!(visit.audio_bait_events[0].id, EventId(31));
        assert_eq!(visit.audio_events_named("rodent-scream").count(), 1);
        assert!(response.device(DeviceId(6)).is_none());
    }

    #[test]
    fn test_missing_audio_fields_default() {
        let visit: VisitJson = serde_json::from_value(json!({
            "start": "2024-01-10T01:00:10+13:00",
            "end": "2024-01-10T01:03:18+13:00"
        }))
        .unwrap();
        assert!(!visit.audio_bait_day);
        assert!(!visit.audio_bait_visit);
        assert!(visit.audio_bait_events.is_empty());
    }
}
