use anyhow::{bail, Result};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{
        from_optional_json, parse_datetime, parse_optional_datetime, parse_status,
        to_optional_json, to_u32, to_u8,
    },
};
use crate::models::SurveySession;

const SESSION_COLUMNS: &str = "id, started_at, ended_at, status, distance_m, average_confidence,
     average_pci, segment_count, device, start_location_json, end_location_json,
     created_at, updated_at";

fn row_to_session(row: &Row) -> Result<SurveySession> {
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let status: String = row.get("status")?;
    let average_confidence: i64 = row.get("average_confidence")?;
    let average_pci: Option<i64> = row.get("average_pci")?;
    let segment_count: i64 = row.get("segment_count")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(SurveySession {
        id: row.get("id")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_optional_datetime(ended_at, "ended_at")?,
        status: parse_status(&status)?,
        distance_m: row.get("distance_m")?,
        average_confidence: to_u8(average_confidence, "average_confidence")?,
        average_pci: average_pci
            .map(|value| to_u8(value, "average_pci"))
            .transpose()?,
        segment_count: to_u32(segment_count, "segment_count")?,
        device: row.get("device")?,
        start_location: from_optional_json(row.get("start_location_json")?, "start_location")?,
        end_location: from_optional_json(row.get("end_location_json")?, "end_location")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

impl Database {
    pub async fn insert_session(&self, session: &SurveySession) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, started_at, ended_at, status, distance_m, average_confidence,
                     average_pci, segment_count, device, start_location_json, end_location_json,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    record.id,
                    record.started_at.to_rfc3339(),
                    record.ended_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.status.as_str(),
                    record.distance_m,
                    record.average_confidence,
                    record.average_pci,
                    record.segment_count,
                    record.device,
                    to_optional_json(record.start_location.as_ref(), "start_location")?,
                    to_optional_json(record.end_location.as_ref(), "end_location")?,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn update_session_record(&self, session: &SurveySession) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            let changed = conn.execute(
                "UPDATE sessions
                 SET ended_at = ?1,
                     status = ?2,
                     distance_m = ?3,
                     average_confidence = ?4,
                     average_pci = ?5,
                     segment_count = ?6,
                     start_location_json = ?7,
                     end_location_json = ?8,
                     updated_at = ?9
                 WHERE id = ?10",
                params![
                    record.ended_at.as_ref().map(|dt| dt.to_rfc3339()),
                    record.status.as_str(),
                    record.distance_m,
                    record.average_confidence,
                    record.average_pci,
                    record.segment_count,
                    to_optional_json(record.start_location.as_ref(), "start_location")?,
                    to_optional_json(record.end_location.as_ref(), "end_location")?,
                    record.updated_at.to_rfc3339(),
                    record.id,
                ],
            )?;
            if changed == 0 {
                bail!("session {} not found", record.id);
            }
            Ok(())
        })
        .await
    }

    pub async fn find_session(&self, session_id: &str) -> Result<Option<SurveySession>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;

            let mut rows = stmt.query(params![session_id])?;
            let session = match rows.next()? {
                Some(row) => Some(row_to_session(row)?),
                None => None,
            };
            Ok(session)
        })
        .await
    }

    pub async fn list_sessions(&self) -> Result<Vec<SurveySession>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY started_at DESC"
            ))?;

            let mut rows = stmt.query([])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }
            Ok(sessions)
        })
        .await
    }

    /// Removes a session together with its telemetry and segments.
    pub async fn remove_session(&self, session_id: &str) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM telemetry WHERE session_id = ?1", params![session_id])?;
            tx.execute("DELETE FROM segments WHERE session_id = ?1", params![session_id])?;
            tx.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }
}
