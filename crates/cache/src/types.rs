//! Cache record and identifier types.

use std::fmt;

use {
    chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc},
    serde::{Deserialize, Serialize},
    tracing::warn,
};

use crate::error::{Result, StoreError};

/// Opaque, caller-supplied content identifier. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StreamId(String);

impl StreamId {
    /// Returns `None` for empty or whitespace-only input.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StreamId {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| "stream id must not be empty".to_string())
    }
}

impl From<StreamId> for String {
    fn from(id: StreamId) -> Self {
        id.0
    }
}

/// A resolved stream as persisted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    pub id: StreamId,
    /// Cache-epoch stamp, not the fetch time.
    pub recorded_at: DateTime<Utc>,
    pub manifest_url: String,
    pub subtitle_urls: Vec<String>,
}

impl CacheRecord {
    /// True when this record was stamped with `epoch`.
    ///
    /// Compared at millisecond precision: stores round-trip the stamp as
    /// RFC 3339 text and some drop sub-millisecond digits.
    pub fn is_current(&self, epoch: DateTime<Utc>) -> bool {
        self.recorded_at.timestamp_millis() == epoch.timestamp_millis()
    }
}

/// Row shape shared by the SQLite table and the PostgREST `streams` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StreamRow {
    pub id: String,
    pub date_time: String,
    pub stream: String,
    #[serde(default)]
    pub subtitle: Option<Vec<String>>,
}

impl StreamRow {
    pub(crate) fn into_record(self) -> Result<CacheRecord> {
        // An unreadable stamp can never equal the epoch, so the record is
        // served as stale and overwritten by the next live resolution.
        let recorded_at = parse_timestamp(&self.date_time).unwrap_or_else(|| {
            warn!(id = %self.id, value = %self.date_time, "unparseable cache timestamp");
            DateTime::<Utc>::MIN_UTC
        });
        let id = StreamId::new(self.id)
            .ok_or_else(|| StoreError::message("stored record has an empty id"))?;
        Ok(CacheRecord {
            id,
            recorded_at,
            manifest_url: self.stream,
            subtitle_urls: self.subtitle.unwrap_or_default(),
        })
    }
}

impl From<&CacheRecord> for StreamRow {
    fn from(record: &CacheRecord) -> Self {
        Self {
            id: record.id.to_string(),
            date_time: format_timestamp(record.recorded_at),
            stream: record.manifest_url.clone(),
            subtitle: Some(record.subtitle_urls.clone()),
        }
    }
}

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Offset-less values (a `timestamp without time zone` column) are read as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
