//! Named end-to-end visit scenarios
//!
//! Both scenarios upload the same audio bait timeline to a fresh device and
//! then check a different view of it: the JSON visits query or the CSV
//! visits report.

use crate::domain::types::{AudioBait, DeviceHandle, UserHandle};
use crate::domain::visit::{AnimalSummary, ExpectedVisit};
use crate::infra::config::Config;
use crate::io::api::{make_unique_group_name, MonitoringApi, ReportRequest};
use crate::services::report_checker::ReportChecker;
use crate::services::scenario::{AttachTo, ScenarioBuilder, ScenarioStep};
use crate::services::visits_checker::JsonVisitsChecker;
use anyhow::{bail, Context};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use chrono_tz::Tz;
use tracing::info;

pub const SOUND1_NAME: &str = "rodent-scream";
pub const SOUND2_NAME: &str = "nice-bird";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioKind {
    VisitsJson,
    VisitsCsv,
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ScenarioKind,
}

pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "visits_json",
        description: "Audio bait timeline grouped into visits by the JSON query",
        kind: ScenarioKind::VisitsJson,
    },
    Scenario {
        name: "visits_csv",
        description: "Audio bait timeline in the CSV visits report",
        kind: ScenarioKind::VisitsCsv,
    },
];

pub fn scenario_names() -> Vec<&'static str> {
    SCENARIOS.iter().map(|s| s.name).collect()
}

pub fn get_scenario(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.name == name)
}

/// Scenarios for `all` or a comma separated list of names
pub fn select(arg: &str) -> anyhow::Result<Vec<&'static Scenario>> {
    if arg.trim() == "all" {
        return Ok(SCENARIOS.iter().collect());
    }
    let mut selected = Vec::new();
    for name in arg.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        match get_scenario(name) {
            Some(scenario) => selected.push(scenario),
            None => bail!("Unknown scenario: {} (available: {})", name, scenario_names().join(", ")),
        }
    }
    if selected.is_empty() {
        bail!("No scenarios selected");
    }
    Ok(selected)
}

/// Users, sounds and device a scenario runs against
struct Fixture {
    admin: UserHandle,
    user: UserHandle,
    device: DeviceHandle,
    sound1: AudioBait,
    sound2: AudioBait,
}

impl Fixture {
    async fn setup(api: &dyn MonitoringApi) -> anyhow::Result<Self> {
        let admin = api.admin_user().await.context("admin login failed")?;
        let sound1 = api.upload_audio_bait(&admin, SOUND1_NAME).await?;
        let sound2 = api.upload_audio_bait(&admin, SOUND2_NAME).await?;

        let user = api.given_new_user("cosmo").await?;
        let group = make_unique_group_name("cosmos_group");
        api.create_group(&user, &group).await?;
        let device = api.given_new_device("cosmo_device", &group).await?;

        Ok(Self { admin, user, device, sound1, sound2 })
    }
}

/// Timeline relative to `now`:
///
/// - untagged recording 20 minutes ago, not part of a visit
/// - possum just over one visit interval ago
/// - unidentified then cat a few minutes ago
/// - sound1 before the cat, close enough to count for both later visits
/// - possum now, with sound2 during it and a second possum track
/// - sound2 a day later, outside every visit
fn timeline<'f>(fixture: &'f Fixture, now: DateTime<Tz>, interval_secs: u64) -> Vec<ScenarioStep<'f>> {
    let minutes = Duration::minutes;
    vec![
        ScenarioStep::Untagged { time: now - minutes(20), duration_s: 90.0 },
        ScenarioStep::NewVisit,
        ScenarioStep::Tagged {
            what: "possum",
            time: now - Duration::seconds(interval_secs as i64 + 11),
            duration_s: 30.0,
        },
        ScenarioStep::NewVisit,
        ScenarioStep::Tagged { what: "unidentified", time: now - minutes(4), duration_s: 90.0 },
        ScenarioStep::Tagged { what: "cat", time: now - minutes(1), duration_s: 90.0 },
        ScenarioStep::NewVisit,
        ScenarioStep::AudioBait {
            bait: &fixture.sound1,
            time: now - minutes(9),
            volume: None,
            attach: AttachTo::CurrentAndPrevious,
        },
        ScenarioStep::Tagged { what: "possum", time: now, duration_s: 90.0 },
        ScenarioStep::AudioBait {
            bait: &fixture.sound2,
            time: now + Duration::seconds(40),
            volume: Some(9),
            attach: AttachTo::Current,
        },
        ScenarioStep::ExtraTrack { what: "possum", start_s: 80.0 },
        ScenarioStep::AudioBait {
            bait: &fixture.sound2,
            time: now + Duration::days(1) + Duration::seconds(1),
            volume: None,
            attach: AttachTo::Nowhere,
        },
    ]
}

impl Scenario {
    pub async fn run(&self, api: &dyn MonitoringApi, config: &Config) -> anyhow::Result<()> {
        info!(scenario = %self.name, "scenario_started");
        let tz = config.report_timezone();
        let fixture = Fixture::setup(api).await?;

        let now = Utc::now().with_timezone(&tz).trunc_subsecs(0);
        let steps = timeline(&fixture, now, config.visit_interval_secs());
        let mut builder = ScenarioBuilder::new(api, &fixture.device, &fixture.user, tz);
        builder.run(&steps).await?;
        let visits = builder.finish();

        match self.kind {
            ScenarioKind::VisitsJson => check_json(api, config, &fixture, now.with_timezone(&Utc)).await?,
            ScenarioKind::VisitsCsv => check_csv(api, config, &fixture, &visits).await?,
        }
        info!(scenario = %self.name, device_id = %fixture.device.id, "scenario_passed");
        Ok(())
    }
}

async fn check_json(
    api: &dyn MonitoringApi,
    config: &Config,
    fixture: &Fixture,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let response = api.query_visits(&fixture.user).await?;
    let checker = JsonVisitsChecker::new(&response, config.visit_interval_secs());
    let device = fixture.device.id;

    checker.check_num_visits(3)?;
    checker.check_animals(device, &["possum", "cat"])?;
    checker.check_visit_gaps(device)?;

    checker.check_audio_flags(device, "possum", 0, true, true)?;
    checker.check_audio_events(
        device,
        "possum",
        0,
        &[(SOUND1_NAME, now - Duration::minutes(9)), (SOUND2_NAME, now + Duration::seconds(40))],
    )?;
    checker.check_audio_flags(device, "possum", 1, true, false)?;

    checker.check_audio_flags(device, "cat", 0, true, true)?;
    checker.check_audio_events(device, "cat", 0, &[(SOUND1_NAME, now - Duration::minutes(9))])?;
    checker.check_shared_audio_event(device, ("cat", 0), ("possum", 0), SOUND1_NAME)?;
    Ok(())
}

async fn check_csv(
    api: &dyn MonitoringApi,
    config: &Config,
    fixture: &Fixture,
    visits: &[ExpectedVisit],
) -> anyhow::Result<()> {
    let request = ReportRequest::visits(config.report_limit(), vec![fixture.device.id]);
    let body = api.get_report(&fixture.admin, &request).await?;
    let mut checker = ReportChecker::new(&body)?;

    checker.check_summary(
        fixture.device.id,
        &[AnimalSummary::new("possum", 2, true), AnimalSummary::new("cat", 1, true)],
    )?;
    checker.check_visits(visits)?;
    Ok(())
}
