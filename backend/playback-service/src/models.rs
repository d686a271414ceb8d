/// Catalog record and playback response types
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::services::drm::DrmType;

/// Reserved id prefix for scheduled events
pub const EVENT_ID_PREFIX: &str = "event-";

/// Delivery fields of a record. Server-side only.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSecrets {
    #[serde(default, deserialize_with = "nullable")]
    pub stream_url: String,

    #[serde(default, deserialize_with = "nullable")]
    pub license_url: String,

    #[serde(default, deserialize_with = "nullable")]
    pub request_headers_for_stream: BTreeMap<String, String>,

    #[serde(default, deserialize_with = "nullable")]
    pub request_headers_for_license: BTreeMap<String, String>,
}

impl StreamSecrets {
    pub fn is_empty(&self) -> bool {
        *self == StreamSecrets::default()
    }
}

impl fmt::Debug for StreamSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSecrets")
            .field("has_stream_url", &!self.stream_url.is_empty())
            .field("has_license_url", &!self.license_url.is_empty())
            .field("stream_headers", &self.request_headers_for_stream.len())
            .field("license_headers", &self.request_headers_for_license.len())
            .finish()
    }
}

/// Linear channel or scheduled event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRecord {
    pub id: String,

    #[serde(default, deserialize_with = "nullable")]
    pub name: String,

    #[serde(default, deserialize_with = "nullable")]
    pub image: String,

    #[serde(default, deserialize_with = "nullable")]
    pub country: String,

    #[serde(default, deserialize_with = "nullable")]
    pub tagline: String,

    #[serde(default, deserialize_with = "nullable")]
    pub category: String,

    #[serde(default, deserialize_with = "nullable")]
    pub premium: bool,

    #[serde(default, deserialize_with = "nullable")]
    pub live: bool,

    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,

    /// Free-text container/DRM hint, e.g. `hls`, `dash-clearkey`
    #[serde(default, deserialize_with = "nullable")]
    pub stream_kind: String,

    #[serde(flatten)]
    pub secrets: StreamSecrets,
}

impl ChannelRecord {
    pub fn is_event(&self) -> bool {
        self.id.starts_with(EVENT_ID_PREFIX)
    }
}

/// Treat an explicit `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrmDescriptor {
    #[serde(rename = "type")]
    pub drm_type: DrmType,
    pub license_proxy_url: Option<String>,
}

/// Client-safe delivery instructions for one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackDescriptor {
    pub stream_url: String,
    pub should_proxy: bool,
    pub drm: DrmDescriptor,
}

/// Body of the playback endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackResponse {
    pub channel_id: String,
    #[serde(flatten)]
    pub descriptor: PlaybackDescriptor,
    /// Kept for client compatibility; stream tokens travel inside `streamUrl`
    pub proxy_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaybackQuery {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_record() {
        let record: ChannelRecord = serde_json::from_str(
            r#"{
                "id": "c1",
                "name": "News",
                "premium": true,
                "streamKind": "hls",
                "streamUrl": "https://cdn.example/live.m3u8",
                "licenseUrl": "https://lic.example/wv",
                "requestHeadersForStream": {"Referer": "https://origin.example"},
                "requestHeadersForLicense": {"X-Token": "abc"},
                "startsAt": "2024-05-01T18:00:00Z"
            }"#,
        )
        .unwrap();

        assert_eq!(record.name, "News");
        assert!(record.premium);
        assert_eq!(record.secrets.stream_url, "https://cdn.example/live.m3u8");
        assert_eq!(record.secrets.request_headers_for_stream.len(), 1);
        assert!(record.starts_at.is_some());
        assert!(!record.is_event());
    }

    #[test]
    fn test_nulls_and_missing_fields_default_to_empty() {
        let record: ChannelRecord = serde_json::from_str(
            r#"{"id": "event-1", "name": null, "streamUrl": null, "requestHeadersForStream": null, "live": null}"#,
        )
        .unwrap();

        assert_eq!(record.name, "");
        assert!(!record.live);
        assert!(record.secrets.is_empty());
        assert!(record.is_event());
    }

    #[test]
    fn test_debug_never_prints_secrets() {
        let mut record = ChannelRecord {
            id: "c1".into(),
            ..Default::default()
        };
        record.secrets.stream_url = "https://cdn.example/secret-path.m3u8".into();
        record
            .secrets
            .request_headers_for_license
            .insert("Authorization".into(), "Bearer hidden".into());

        let printed = format!("{:?}", record);
        assert!(!printed.contains("secret-path"));
        assert!(!printed.contains("hidden"));
    }

    #[test]
    fn test_playback_response_shape() {
        let response = PlaybackResponse {
            channel_id: "c1".into(),
            descriptor: PlaybackDescriptor {
                stream_url: "https://cdn.example/x.m3u8".into(),
                should_proxy: false,
                drm: DrmDescriptor {
                    drm_type: DrmType::None,
                    license_proxy_url: None,
                },
            },
            proxy_token: None,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "channelId": "c1",
                "streamUrl": "https://cdn.example/x.m3u8",
                "shouldProxy": false,
                "proxyToken": null,
                "drm": {"type": "none", "licenseProxyUrl": null}
            })
        );
    }
}
