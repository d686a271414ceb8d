/// Playback resolution
///
/// Turns a full catalog record into a [`PlaybackDescriptor`]. Anything secret
/// the client still needs (stream headers, license endpoint, ClearKey keys)
/// leaves the server only inside a signed token.
use crypto_core::{TokenError, TokenGrant, TokenSigner};
use std::sync::Arc;

use crate::models::{ChannelRecord, DrmDescriptor, PlaybackDescriptor};
use crate::services::drm::{classify, is_license_server_url, split_clearkey_pair, DrmType, StreamKind};

/// Proxy endpoints a descriptor may point at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackPaths {
    pub proxy_path: String,
    pub license_path: String,
}

impl PlaybackPaths {
    pub fn new(proxy_path: impl Into<String>, license_path: impl Into<String>) -> Self {
        Self {
            proxy_path: proxy_path.into(),
            license_path: license_path.into(),
        }
    }
}

/// `path?token=…`, or `path&token=…` when the path already has a query.
pub fn with_token(path: &str, token: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{}{}token={}", path, separator, token)
}

#[derive(Clone)]
pub struct PlaybackResolver {
    signer: Arc<TokenSigner>,
    token_ttl_secs: i64,
}

impl PlaybackResolver {
    pub fn new(signer: Arc<TokenSigner>, token_ttl_secs: i64) -> Self {
        Self {
            signer,
            token_ttl_secs,
        }
    }

    /// Callers reject records without a stream URL before resolving.
    pub fn resolve(
        &self,
        record: &ChannelRecord,
        paths: &PlaybackPaths,
    ) -> Result<PlaybackDescriptor, TokenError> {
        self.resolve_at(record, paths, chrono::Utc::now().timestamp())
    }

    pub fn resolve_at(
        &self,
        record: &ChannelRecord,
        paths: &PlaybackPaths,
        now: i64,
    ) -> Result<PlaybackDescriptor, TokenError> {
        let secrets = &record.secrets;
        let should_proxy = !secrets.request_headers_for_stream.is_empty();

        let stream_url = if should_proxy {
            let grant = TokenGrant::StreamProxy {
                stream_url: secrets.stream_url.clone(),
                stream_headers: secrets.request_headers_for_stream.clone(),
            };
            with_token(&paths.proxy_path, &self.issue(&grant, now)?)
        } else {
            secrets.stream_url.clone()
        };

        let drm_type = classify(&secrets.license_url, StreamKind::parse(&record.stream_kind));
        let license_proxy_url = match self.license_grant(record, drm_type) {
            Some(grant) => Some(with_token(&paths.license_path, &self.issue(&grant, now)?)),
            None => None,
        };

        Ok(PlaybackDescriptor {
            stream_url,
            should_proxy,
            drm: DrmDescriptor {
                drm_type,
                license_proxy_url,
            },
        })
    }

    fn license_grant(&self, record: &ChannelRecord, drm_type: DrmType) -> Option<TokenGrant> {
        let secrets = &record.secrets;

        let forward = || TokenGrant::WidevineLicense {
            license_url: secrets.license_url.trim().to_string(),
            license_headers: secrets.request_headers_for_license.clone(),
        };

        match drm_type {
            DrmType::None => None,
            DrmType::Widevine => Some(forward()),
            // A ClearKey channel backed by a license server is brokered like
            // any other upstream license
            DrmType::Clearkey if is_license_server_url(&secrets.license_url) => Some(forward()),
            DrmType::Clearkey => {
                let (key_id, key) = split_clearkey_pair(&secrets.license_url);
                Some(TokenGrant::ClearkeyLicense { key_id, key })
            }
        }
    }

    fn issue(&self, grant: &TokenGrant, now: i64) -> Result<String, TokenError> {
        self.signer.issue_at(grant, self.token_ttl_secs, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn signer() -> Arc<TokenSigner> {
        Arc::new(TokenSigner::new("resolver-test-signing-secret").unwrap())
    }

    fn resolver(signer: Arc<TokenSigner>) -> PlaybackResolver {
        PlaybackResolver::new(signer, 300)
    }

    fn paths() -> PlaybackPaths {
        PlaybackPaths::new("/api/stream", "/api/license")
    }

    fn record(stream_url: &str, license_url: &str, kind: &str) -> ChannelRecord {
        let mut record = ChannelRecord {
            id: "c1".into(),
            stream_kind: kind.into(),
            ..Default::default()
        };
        record.secrets.stream_url = stream_url.into();
        record.secrets.license_url = license_url.into();
        record
    }

    fn token_of(url: &str) -> &str {
        url.split_once("token=").map(|(_, t)| t).unwrap()
    }

    #[test]
    fn test_license_less_record_has_no_drm() {
        for kind in ["", "hls", "clearkey", "widevine"] {
            let descriptor = resolver(signer())
                .resolve_at(&record("http://cdn/x.m3u8", "", kind), &paths(), NOW)
                .unwrap();

            assert_eq!(descriptor.drm.drm_type, DrmType::None);
            assert!(descriptor.drm.license_proxy_url.is_none());
            assert_eq!(descriptor.stream_url, "http://cdn/x.m3u8");
            assert!(!descriptor.should_proxy);
        }
    }

    #[test]
    fn test_stream_headers_force_proxy() {
        let signer = signer();
        let mut record = record("http://cdn/x.m3u8", "http://lic/x", "hls");
        record
            .secrets
            .request_headers_for_stream
            .insert("Referer".into(), "https://origin.example".into());

        let descriptor = resolver(signer.clone()).resolve_at(&record, &paths(), NOW).unwrap();

        assert!(descriptor.should_proxy);
        assert_ne!(descriptor.stream_url, "http://cdn/x.m3u8");
        assert!(descriptor.stream_url.starts_with("/api/stream?token="));
        assert!(!descriptor.stream_url.contains("cdn"));

        match signer.verify_at(token_of(&descriptor.stream_url), NOW) {
            Some(TokenGrant::StreamProxy {
                stream_url,
                stream_headers,
            }) => {
                assert_eq!(stream_url, "http://cdn/x.m3u8");
                assert_eq!(stream_headers, record.secrets.request_headers_for_stream);
            }
            other => panic!("unexpected grant {:?}", other),
        }
    }

    #[test]
    fn test_widevine_token_carries_license_material() {
        let signer = signer();
        let mut record = record("http://cdn/x.m3u8", "http://lic/x", "dash");
        record
            .secrets
            .request_headers_for_license
            .insert("X-Custom".into(), "secret".into());

        let descriptor = resolver(signer.clone()).resolve_at(&record, &paths(), NOW).unwrap();
        let license_proxy_url = descriptor.drm.license_proxy_url.unwrap();

        assert_eq!(descriptor.drm.drm_type, DrmType::Widevine);
        assert!(license_proxy_url.starts_with("/api/license?token="));
        assert!(!license_proxy_url.contains("lic/x"));
        assert_eq!(
            signer.verify_at(token_of(&license_proxy_url), NOW),
            Some(TokenGrant::WidevineLicense {
                license_url: "http://lic/x".into(),
                license_headers: record.secrets.request_headers_for_license.clone(),
            })
        );
    }

    #[test]
    fn test_clearkey_token_carries_key_pair() {
        let signer = signer();
        let descriptor = resolver(signer.clone())
            .resolve_at(&record("http://cdn/x.mpd", "k1:v1", "dash-clearkey"), &paths(), NOW)
            .unwrap();
        let license_proxy_url = descriptor.drm.license_proxy_url.unwrap();

        assert_eq!(descriptor.drm.drm_type, DrmType::Clearkey);
        assert!(!license_proxy_url.contains("k1"));
        assert_eq!(
            signer.verify_at(token_of(&license_proxy_url), NOW),
            Some(TokenGrant::ClearkeyLicense {
                key_id: "k1".into(),
                key: "v1".into(),
            })
        );
    }

    #[test]
    fn test_clearkey_with_license_server_is_forwarded() {
        let signer = signer();
        let descriptor = resolver(signer.clone())
            .resolve_at(&record("http://cdn/x.mpd", "https://ck.example/lic", "clearkey"), &paths(), NOW)
            .unwrap();
        let license_proxy_url = descriptor.drm.license_proxy_url.unwrap();

        assert_eq!(descriptor.drm.drm_type, DrmType::Clearkey);
        assert!(matches!(
            signer.verify_at(token_of(&license_proxy_url), NOW),
            Some(TokenGrant::WidevineLicense { .. })
        ));
    }

    #[test]
    fn test_unknown_kind_with_license_defaults_to_widevine() {
        let descriptor = resolver(signer())
            .resolve_at(&record("http://cdn/x", "http://lic/x", "mystery-format"), &paths(), NOW)
            .unwrap();

        assert_eq!(descriptor.drm.drm_type, DrmType::Widevine);
    }

    #[test]
    fn test_with_token_respects_existing_query() {
        assert_eq!(with_token("/p", "t"), "/p?token=t");
        assert_eq!(with_token("/p?a=1", "t"), "/p?a=1&token=t");
    }
}
