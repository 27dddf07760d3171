use anyhow::Result;
use rusqlite::{params, Connection, Row};

use crate::db::{connection::Database, helpers::parse_datetime};
use crate::models::{GeoPoint, TelemetrySample};

fn row_to_sample(row: &Row) -> Result<TelemetrySample> {
    let timestamp: String = row.get("timestamp")?;

    Ok(TelemetrySample {
        session_id: row.get("session_id")?,
        timestamp: parse_datetime(&timestamp, "timestamp")?,
        position: GeoPoint {
            lat: row.get("lat")?,
            lon: row.get("lon")?,
            altitude: row.get("altitude")?,
        },
        speed_mps: row.get("speed_mps")?,
        accel_x: row.get("accel_x")?,
        accel_y: row.get("accel_y")?,
        accel_z: row.get("accel_z")?,
        gps_accuracy_m: row.get("gps_accuracy_m")?,
        distance_m: row.get("distance_m")?,
    })
}

/// Inserts `samples` on `conn`; the caller owns the transaction.
pub(crate) fn write_samples(conn: &Connection, samples: &[TelemetrySample]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO telemetry (
            session_id,
            timestamp,
            lat,
            lon,
            altitude,
            speed_mps,
            accel_x,
            accel_y,
            accel_z,
            gps_accuracy_m,
            distance_m
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;
    for sample in samples {
        stmt.execute(params![
            sample.session_id,
            sample.timestamp.to_rfc3339(),
            sample.position.lat,
            sample.position.lon,
            sample.position.altitude,
            sample.speed_mps,
            sample.accel_x,
            sample.accel_y,
            sample.accel_z,
            sample.gps_accuracy_m,
            sample.distance_m,
        ])?;
    }
    Ok(())
}

impl Database {
    /// Samples for a session in insertion order.
    pub async fn telemetry_for_session(&self, session_id: &str) -> Result<Vec<TelemetrySample>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT
                    session_id,
                    timestamp,
                    lat,
                    lon,
                    altitude,
                    speed_mps,
                    accel_x,
                    accel_y,
                    accel_z,
                    gps_accuracy_m,
                    distance_m
                FROM telemetry
                WHERE session_id = ?1
                ORDER BY id ASC",
            )?;

            let mut rows = stmt.query(params![session_id])?;
            let mut samples = Vec::new();
            while let Some(row) = rows.next()? {
                samples.push(row_to_sample(row)?);
            }
            Ok(samples)
        })
        .await
    }
}
