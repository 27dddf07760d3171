use anyhow::{bail, Result};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{
        from_optional_json, parse_condition, parse_datetime, to_json, to_optional_json, to_u32,
        to_u8,
    },
};
use crate::models::RoadSegment;
use crate::scoring::ConfidenceLevel;
use crate::vibration::RoadCondition;

fn row_to_segment(row: &Row) -> Result<RoadSegment> {
    let started_at: String = row.get("started_at")?;
    let ended_at: String = row.get("ended_at")?;
    let confidence = to_u8(row.get("confidence")?, "confidence")?;
    let auto_condition: String = row.get("auto_condition")?;
    let manual_condition: Option<String> = row.get("manual_condition")?;
    let media_json: String = row.get("media_json")?;

    Ok(RoadSegment {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_datetime(&ended_at, "ended_at")?,
        start_distance_m: row.get("start_distance_m")?,
        end_distance_m: row.get("end_distance_m")?,
        start_location: from_optional_json(row.get("start_location_json")?, "start_location")?,
        end_location: from_optional_json(row.get("end_location_json")?, "end_location")?,
        roughness_rms: row.get("roughness_rms")?,
        consistency: row.get("consistency")?,
        confidence,
        confidence_level: ConfidenceLevel::from_score(confidence),
        auto_condition: parse_condition(&auto_condition)?,
        manual_condition: manual_condition
            .as_deref()
            .map(parse_condition)
            .transpose()?,
        index: from_optional_json(row.get("index_json")?, "index")?,
        sample_count: to_u32(row.get("sample_count")?, "sample_count")?,
        name: row.get("name")?,
        surface_type: row.get("surface_type")?,
        notes: row.get("notes")?,
        media: from_optional_json(Some(media_json), "media")?.unwrap_or_default(),
        assessment: from_optional_json(row.get("assessment_json")?, "assessment")?,
    })
}

impl Database {
    pub async fn insert_road_segment(&self, segment: &RoadSegment) -> Result<()> {
        let segment = segment.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO segments (
                    id,
                    session_id,
                    started_at,
                    ended_at,
                    start_distance_m,
                    end_distance_m,
                    start_location_json,
                    end_location_json,
                    roughness_rms,
                    consistency,
                    confidence,
                    auto_condition,
                    manual_condition,
                    index_json,
                    sample_count,
                    name,
                    surface_type,
                    notes,
                    media_json,
                    assessment_json
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
                params![
                    segment.id,
                    segment.session_id,
                    segment.started_at.to_rfc3339(),
                    segment.ended_at.to_rfc3339(),
                    segment.start_distance_m,
                    segment.end_distance_m,
                    to_optional_json(segment.start_location.as_ref(), "start_location")?,
                    to_optional_json(segment.end_location.as_ref(), "end_location")?,
                    segment.roughness_rms,
                    segment.consistency,
                    segment.confidence,
                    segment.auto_condition.as_str(),
                    segment.manual_condition.map(|c| c.as_str()),
                    to_optional_json(segment.index.as_ref(), "index")?,
                    segment.sample_count,
                    segment.name,
                    segment.surface_type,
                    segment.notes,
                    to_json(&segment.media, "media")?,
                    to_optional_json(segment.assessment.as_ref(), "assessment")?,
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Segments of a session ordered along the route.
    pub async fn segments_for_session(&self, session_id: &str) -> Result<Vec<RoadSegment>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT
                    id,
                    session_id,
                    started_at,
                    ended_at,
                    start_distance_m,
                    end_distance_m,
                    start_location_json,
                    end_location_json,
                    roughness_rms,
                    consistency,
                    confidence,
                    auto_condition,
                    manual_condition,
                    index_json,
                    sample_count,
                    name,
                    surface_type,
                    notes,
                    media_json,
                    assessment_json
                FROM segments
                WHERE session_id = ?1
                ORDER BY start_distance_m ASC, started_at ASC",
            )?;

            let mut rows = stmt.query(params![session_id])?;
            let mut segments = Vec::new();
            while let Some(row) = rows.next()? {
                segments.push(row_to_segment(row)?);
            }
            Ok(segments)
        })
        .await
    }

    pub async fn set_manual_condition(
        &self,
        segment_id: &str,
        manual_condition: Option<RoadCondition>,
    ) -> Result<()> {
        let segment_id = segment_id.to_string();
        self.execute(move |conn| {
            let changed = conn.execute(
                "UPDATE segments SET manual_condition = ?1 WHERE id = ?2",
                params![manual_condition.map(|c| c.as_str()), segment_id],
            )?;
            if changed == 0 {
                bail!("segment {segment_id} not found");
            }
            Ok(())
        })
        .await
    }
}
