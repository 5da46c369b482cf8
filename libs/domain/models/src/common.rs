// [libs/domain/models/src/common.rs]
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Opaque tenant identifier issued by the external identity provider.
/// The core never creates or mutates organizations, only references them.
pub type OrganizationId = String;

/// Accepts either a unix-millis integer or an RFC3339 string on
/// deserialization and normalizes both to `DateTime<Utc>`.
///
/// Resolves the open question about `expiresAt` being persisted
/// inconsistently across code paths: once a value passes through this
/// type, the inconsistency is gone.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TimestampOrString(#[serde(with = "chrono::serde::ts_milliseconds")] pub DateTime<Utc>);

impl<'de> Deserialize<'de> for TimestampOrString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Millis(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Millis(millis) => Utc
                .timestamp_millis_opt(millis)
                .single()
                .map(TimestampOrString)
                .ok_or_else(|| serde::de::Error::custom("timestamp out of range")),
            Raw::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| TimestampOrString(dt.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
        }
    }
}

impl From<TimestampOrString> for DateTime<Utc> {
    fn from(value: TimestampOrString) -> Self {
        value.0
    }
}
