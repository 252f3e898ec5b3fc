//! HTTP implementation of `MonitoringApi` against the service's v1 REST API
//!
//! Users and devices authenticate with a JWT returned at login/registration,
//! sent back verbatim in the `Authorization` header. Recordings and audio
//! files are multipart uploads with a `data` JSON part and a `file` part.

use crate::domain::response::VisitsResponse;
use crate::domain::types::{
    AudioBait, AudioFileId, DeviceHandle, DeviceId, Recording, RecordingId, Track, TrackId,
    TrackTag, UserHandle,
};
use crate::infra::config::Config;
use crate::io::api::{
    track_span, unique_name, DeviceEvent, MonitoringApi, RecordingProps, ReportRequest,
};
use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

/// Recording type the service expects for thermal uploads
const RECORDING_TYPE: &str = "thermalRaw";

/// The report endpoint also serves recordings, only visits are checked
const REPORT_TYPE: &str = "visits";

/// Confidence attached to manual track tags
const TAG_CONFIDENCE: f64 = 0.9;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct DeviceResponse {
    token: String,
    id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordingResponse {
    recording_id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackResponse {
    track_id: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResponse {
    record_id: u64,
}

pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    admin_username: String,
    admin_password: String,
    user_password: String,
    recording_file: String,
    audio_file: String,
}

impl HttpApi {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        // One client for the whole run (connection pooling)
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.api_timeout_ms()))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api_base_url().to_string(),
            admin_username: config.admin_username().to_string(),
            admin_password: config.admin_password().to_string(),
            user_password: config.user_password().to_string(),
            recording_file: config.recording_file().to_string(),
            audio_file: config.audio_file().to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn authenticate_user(&self, username: &str, password: &str) -> anyhow::Result<UserHandle> {
        let request = self
            .client
            .post(self.url("/authenticate_user"))
            .json(&json!({ "username": username, "password": password }));
        let response: TokenResponse = send_json(request, "authenticate_user").await?;
        Ok(UserHandle { username: username.to_string(), token: response.token })
    }

    async fn read_fixture(path: &str) -> anyhow::Result<Vec<u8>> {
        tokio::fs::read(path).await.with_context(|| format!("Failed to read fixture {}", path))
    }
}

/// Send a request, failing on non-2xx with the body as context
async fn send_checked(request: RequestBuilder, op: &'static str) -> anyhow::Result<Response> {
    let response = request.send().await.with_context(|| format!("{} request failed", op))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("{} returned {}: {}", op, status, body);
    }
    debug!(op = %op, status = %status.as_u16(), "api_response");
    Ok(response)
}

/// Send a request and decode a JSON body
async fn send_json<T: DeserializeOwned>(request: RequestBuilder, op: &'static str) -> anyhow::Result<T> {
    let response = send_checked(request, op).await?;
    response.json::<T>().await.with_context(|| format!("{} returned unexpected body", op))
}

/// Send a request whose body is not needed
async fn send_ok(request: RequestBuilder, op: &'static str) -> anyhow::Result<()> {
    let _: serde_json::Value = send_json(request, op).await?;
    Ok(())
}

fn iso(time: &DateTime<FixedOffset>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, false)
}

#[async_trait]
impl MonitoringApi for HttpApi {
    async fn admin_user(&self) -> anyhow::Result<UserHandle> {
        self.authenticate_user(&self.admin_username, &self.admin_password).await
    }

    async fn given_new_user(&self, name: &str) -> anyhow::Result<UserHandle> {
        let username = unique_name(name);
        let request = self.client.post(self.url("/api/v1/users")).json(&json!({
            "username": username,
            "email": format!("{}@api.created.com", username),
            "password": self.user_password,
        }));
        let response: TokenResponse = send_json(request, "register_user").await?;
        info!(username = %username, "user_created");
        Ok(UserHandle { username, token: response.token })
    }

    async fn create_group(&self, user: &UserHandle, group: &str) -> anyhow::Result<()> {
        let request = self
            .client
            .post(self.url("/api/v1/groups"))
            .header("Authorization", &user.token)
            .json(&json!({ "groupname": group }));
        send_ok(request, "create_group").await?;
        info!(group = %group, owner = %user.username, "group_created");
        Ok(())
    }

    async fn given_new_device(&self, name: &str, group: &str) -> anyhow::Result<DeviceHandle> {
        let device_name = unique_name(name);
        let request = self.client.post(self.url("/api/v1/devices")).json(&json!({
            "devicename": device_name,
            "password": self.user_password,
            "group": group,
        }));
        let response: DeviceResponse = send_json(request, "register_device").await?;
        info!(device = %device_name, device_id = %response.id, group = %group, "device_created");
        Ok(DeviceHandle {
            id: DeviceId(response.id),
            name: device_name,
            group: group.to_string(),
            token: response.token,
        })
    }

    async fn upload_recording(
        &self,
        device: &DeviceHandle,
        props: &RecordingProps,
    ) -> anyhow::Result<Recording> {
        let bytes = Self::read_fixture(&self.recording_file).await?;
        let data = json!({
            "type": RECORDING_TYPE,
            "recordingDateTime": iso(&props.recording_time),
            "duration": props.duration_s,
        });
        let form = Form::new()
            .text("data", data.to_string())
            .part("file", Part::bytes(bytes).file_name("recording.cptv"));
        let request = self
            .client
            .post(self.url("/api/v1/recordings"))
            .header("Authorization", &device.token)
            .multipart(form);

        let response: RecordingResponse = send_json(request, "upload_recording").await?;
        debug!(
            recording_id = %response.recording_id,
            device_id = %device.id,
            at = %iso(&props.recording_time),
            "recording_uploaded"
        );
        Ok(Recording {
            id: RecordingId(response.recording_id),
            recording_time: props.recording_time,
            duration_s: props.duration_s,
        })
    }

    async fn record_event(
        &self,
        device: &DeviceHandle,
        event: &DeviceEvent,
        times: &[DateTime<FixedOffset>],
    ) -> anyhow::Result<()> {
        let mut details = json!({ "fileId": event.file_id.0 });
        if let Some(volume) = event.volume {
            details["volume"] = json!(volume);
        }
        let date_times: Vec<String> = times.iter().map(iso).collect();
        let request = self
            .client
            .post(self.url("/api/v1/events"))
            .header("Authorization", &device.token)
            .json(&json!({
                "description": { "type": event.kind.as_str(), "details": details },
                "dateTimes": date_times,
            }));
        send_ok(request, "record_event").await?;
        debug!(device_id = %device.id, kind = %event.kind.as_str(), count = times.len(), "event_recorded");
        Ok(())
    }

    async fn add_track(
        &self,
        user: &UserHandle,
        recording: &Recording,
        start_s: Option<f64>,
    ) -> anyhow::Result<Track> {
        let (start_s, end_s) = track_span(start_s);
        let data = json!({ "start_s": start_s, "end_s": end_s });
        let request = self
            .client
            .post(self.url(&format!("/api/v1/recordings/{}/tracks", recording.id)))
            .header("Authorization", &user.token)
            .json(&json!({ "data": data.to_string(), "algorithm": "{}" }));

        let response: TrackResponse = send_json(request, "add_track").await?;
        debug!(recording_id = %recording.id, track_id = %response.track_id, start_s, end_s, "track_added");
        Ok(Track { id: TrackId(response.track_id), recording_id: recording.id, start_s, end_s })
    }

    async fn tag_track(
        &self,
        user: &UserHandle,
        track: &Track,
        what: &str,
    ) -> anyhow::Result<TrackTag> {
        let request = self
            .client
            .post(self.url(&format!(
                "/api/v1/recordings/{}/tracks/{}/tags",
                track.recording_id, track.id
            )))
            .header("Authorization", &user.token)
            .json(&json!({ "what": what, "confidence": TAG_CONFIDENCE, "data": "{}" }));
        send_ok(request, "tag_track").await?;
        debug!(track_id = %track.id, what = %what, "track_tagged");
        Ok(TrackTag { what: what.to_string() })
    }

    async fn upload_audio_bait(&self, user: &UserHandle, name: &str) -> anyhow::Result<AudioBait> {
        let bytes = Self::read_fixture(&self.audio_file).await?;
        let data = json!({ "type": "audioBait", "details": { "name": name } });
        let form = Form::new()
            .text("data", data.to_string())
            .part("file", Part::bytes(bytes).file_name(format!("{}.mp3", name)));
        let request = self
            .client
            .post(self.url("/api/v1/files"))
            .header("Authorization", &user.token)
            .multipart(form);

        let response: FileResponse = send_json(request, "upload_audio_bait").await?;
        info!(file_id = %response.record_id, name = %name, "audio_bait_uploaded");
        Ok(AudioBait { id: AudioFileId(response.record_id), name: name.to_string() })
    }

    async fn query_visits(&self, user: &UserHandle) -> anyhow::Result<VisitsResponse> {
        let request = self
            .client
            .get(self.url("/api/v1/recordings/visits"))
            .header("Authorization", &user.token)
            .query(&[("where", "{}")]);
        send_json(request, "query_visits").await
    }

    async fn get_report(&self, user: &UserHandle, request: &ReportRequest) -> anyhow::Result<String> {
        let device_ids: Vec<u64> = request.device_ids.iter().map(|d| d.0).collect();
        let query = [
            ("type", REPORT_TYPE.to_string()),
            ("limit", request.limit.to_string()),
            ("deviceIds", serde_json::to_string(&device_ids)?),
            ("where", "{}".to_string()),
        ];
        let request = self
            .client
            .get(self.url("/api/v1/recordings/report"))
            .header("Authorization", &user.token)
            .query(&query);

        let response = send_checked(request, "get_report").await?;
        let body = response.text().await.context("get_report body unreadable")?;
        debug!(bytes = body.len(), "report_fetched");
        Ok(body)
    }
}
