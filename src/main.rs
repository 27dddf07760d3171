//! Synthetic drive: simulates a vehicle recording three segments and prints
//! the finished session as JSON.
//!
//! Usage: `pavewatch [database-path]`

use std::{path::PathBuf, sync::Arc, thread, time::Duration};

use anyhow::{bail, Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use log::info;
use rand::Rng;
use tokio::sync::watch;

use pavewatch_lib::indices::{
    PciDistressItem, PciDistressType, SdiDistressItem, SdiDistressType, Severity,
};
use pavewatch_lib::models::DistressAssessment;
use pavewatch_lib::vibration::STANDARD_GRAVITY;
use pavewatch_lib::{
    init_logging, Database, LocationFix, RawAcceleration, RoadCondition, SegmentMetadata,
    SettingsStore, SurveySessionEngine, SurveyStore, Transition,
};

const FIXES_PER_SEGMENT: u32 = 12;
const SPEED_MPS: f64 = 12.0;
const METERS_PER_DEGREE: f64 = 111_195.0;

struct Leg {
    name: &'static str,
    /// Vertical noise amplitude in m/s².
    roughness: f64,
    assessment: Option<DistressAssessment>,
}

fn legs(sample_area_m2: f64, segment_length_m: f64) -> Vec<Leg> {
    vec![
        Leg {
            name: "Ring road, fresh overlay",
            roughness: 0.6,
            assessment: Some(DistressAssessment::Sdi {
                items: vec![SdiDistressItem::new(
                    SdiDistressType::Crack,
                    Severity::Low,
                    8.0,
                )],
                segment_length_m,
            }),
        },
        Leg {
            name: "Market street",
            roughness: 9.0,
            assessment: Some(DistressAssessment::Pci {
                items: vec![
                    PciDistressItem::new(
                        PciDistressType::AlligatorCracking,
                        Severity::Medium,
                        18.0,
                        sample_area_m2,
                    ),
                    PciDistressItem::new(
                        PciDistressType::Potholes,
                        Severity::High,
                        2.0,
                        sample_area_m2,
                    ),
                ],
                sample_area_m2,
            }),
        },
        Leg {
            name: "Harbour access",
            roughness: 3.0,
            assessment: None,
        },
    ]
}

/// Accelerometer at the configured rate until the session stops accepting
/// samples.
fn spawn_accelerometer(
    engine: &SurveySessionEngine,
    amplitude: watch::Receiver<f64>,
) -> Result<thread::JoinHandle<()>> {
    let feed = engine.motion_feed();
    let token = engine.acceptance_token();
    let rate_hz = engine.config().vibration.sample_rate_hz.max(1);
    let period = Duration::from_millis(1000 / u64::from(rate_hz));

    thread::Builder::new()
        .name("pavewatch-accel".into())
        .spawn(move || {
            let mut rng = rand::thread_rng();
            while !token.is_cancelled() {
                let amp = *amplitude.borrow();
                feed.push(RawAcceleration::new(
                    rng.gen_range(-0.2..0.2),
                    rng.gen_range(-0.2..0.2),
                    STANDARD_GRAVITY + rng.gen_range(-amp..=amp),
                ));
                thread::sleep(period);
            }
        })
        .context("failed to spawn accelerometer thread")
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let db_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("pavewatch.sqlite3"));
    let settings = SettingsStore::new(db_path.with_extension("settings.json"))?;
    let config = settings.config();
    let database = Database::new(db_path)?;

    let legs = legs(
        config.indices.pci_sample_area_m2,
        config.indices.sdi_segment_length_m,
    );
    let engine = SurveySessionEngine::new(config, Arc::new(database.clone()))?
        .with_device("synthetic-drive");

    let session = match engine.start().await? {
        Transition::Applied(session) => session,
        Transition::Ignored { phase } => bail!("engine refused to start in {phase:?}"),
    };
    info!("Driving session {}", session.id);

    let (amplitude_tx, amplitude_rx) = watch::channel(0.0);
    let accelerometer = spawn_accelerometer(&engine, amplitude_rx)?;

    let mut rng = rand::thread_rng();
    let mut timestamp = Utc::now();
    let mut lat = -6.2000;
    let mut first_segment = None;

    for leg in legs {
        let _ = amplitude_tx.send(leg.roughness);
        engine.start_segment();

        for _ in 0..FIXES_PER_SEGMENT {
            tokio::time::sleep(Duration::from_millis(250)).await;
            let speed_mps = SPEED_MPS + rng.gen_range(-1.5..1.5);
            lat -= speed_mps / METERS_PER_DEGREE;
            timestamp += ChronoDuration::seconds(1);
            engine.update_location(LocationFix {
                timestamp,
                lat,
                lon: 106.8167 + rng.gen_range(-0.000_01..0.000_01),
                altitude: 8.0,
                speed_mps,
                accuracy_m: rng.gen_range(3.0..9.0),
            });
        }

        let metadata = SegmentMetadata {
            name: Some(leg.name.to_string()),
            surface_type: Some("asphalt".into()),
            assessment: leg.assessment,
            ..SegmentMetadata::default()
        };
        if let Transition::Applied(segment) = engine.end_segment(metadata).await? {
            first_segment.get_or_insert(segment.id);
        }
    }

    if let Some(segment_id) = &first_segment {
        engine
            .override_condition(segment_id, Some(RoadCondition::Good))
            .await?;
    }

    let session = match engine.end().await {
        Transition::Applied(session) => session,
        Transition::Ignored { phase } => bail!("engine refused to end in {phase:?}"),
    };
    if accelerometer.join().is_err() {
        log::error!("Accelerometer thread panicked");
    }

    let segments = database.get_segments_for_session(&session.id).await?;
    let report = serde_json::json!({
        "session": session,
        "segments": segments,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
