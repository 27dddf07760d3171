use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::models::SessionStatus;
use crate::vibration::RoadCondition;

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} out of range: {value}"))
}

pub fn to_u8(value: i64, field: &str) -> Result<u8> {
    u8::try_from(value).map_err(|_| anyhow!("{field} out of range: {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_status(value: &str) -> Result<SessionStatus> {
    match value {
        "Active" => Ok(SessionStatus::Active),
        "Paused" => Ok(SessionStatus::Paused),
        "Completed" => Ok(SessionStatus::Completed),
        other => Err(anyhow!("unknown session status {other}")),
    }
}

pub fn parse_condition(value: &str) -> Result<RoadCondition> {
    RoadCondition::parse(value).ok_or_else(|| anyhow!("unknown road condition {value}"))
}

pub fn to_json<T: Serialize>(value: &T, field: &str) -> Result<String> {
    serde_json::to_string(value).with_context(|| format!("failed to serialize {field}"))
}

pub fn to_optional_json<T: Serialize>(value: Option<&T>, field: &str) -> Result<Option<String>> {
    value.map(|v| to_json(v, field)).transpose()
}

pub fn from_optional_json<T: DeserializeOwned>(
    value: Option<String>,
    field: &str,
) -> Result<Option<T>> {
    match value {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .with_context(|| format!("failed to parse {field}")),
        None => Ok(None),
    }
}
