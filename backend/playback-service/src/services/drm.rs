/// DRM classification and ClearKey key material
///
/// Catalog records describe their DRM scheme only through a free-text
/// `streamKind` hint plus the license field. The hint is tokenized and mapped
/// onto [`StreamKind`]; [`classify`] then maps that onto [`DrmType`] with an
/// explicit table.
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DrmType {
    None,
    Widevine,
    Clearkey,
}

impl DrmType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrmType::None => "none",
            DrmType::Widevine => "widevine",
            DrmType::Clearkey => "clearkey",
        }
    }
}

/// DRM scheme named by a stream-kind hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// No DRM scheme mentioned (plain `hls`, `mp4`, empty, unknown text)
    Unspecified,
    ClearKey,
    Widevine,
    /// Both schemes mentioned
    Conflicting,
}

impl StreamKind {
    pub fn parse(hint: &str) -> Self {
        let lowered = hint.to_ascii_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();

        let clearkey = tokens.iter().any(|t| matches!(*t, "clearkey" | "ck"))
            || tokens.windows(2).any(|w| w == ["clear", "key"]);
        let widevine = tokens.iter().any(|t| matches!(*t, "widevine" | "wv"));

        match (clearkey, widevine) {
            (false, false) => StreamKind::Unspecified,
            (true, false) => StreamKind::ClearKey,
            (false, true) => StreamKind::Widevine,
            (true, true) => StreamKind::Conflicting,
        }
    }
}

/// A record needs DRM only when it has a license field. A ClearKey hint
/// selects ClearKey; every other hint falls back to Widevine.
pub fn classify(license: &str, kind: StreamKind) -> DrmType {
    if license.trim().is_empty() {
        return DrmType::None;
    }

    match kind {
        StreamKind::ClearKey => DrmType::Clearkey,
        StreamKind::Widevine | StreamKind::Unspecified | StreamKind::Conflicting => {
            DrmType::Widevine
        }
    }
}

/// License fields that point at a license server rather than holding keys
pub fn is_license_server_url(license: &str) -> bool {
    let license = license.trim();
    let lowered = license.get(..8).unwrap_or(license).to_ascii_lowercase();
    lowered.starts_with("http://") || lowered.starts_with("https://")
}

/// Split a `keyId:key` license field. Validation happens at redemption.
pub fn split_clearkey_pair(license: &str) -> (String, String) {
    match license.trim().split_once(':') {
        Some((key_id, key)) => (key_id.trim().to_string(), key.trim().to_string()),
        None => (license.trim().to_string(), String::new()),
    }
}

/// Normalize one half of a ClearKey pair to the base64url form a JSON Web Key
/// expects. 32 hex digits (a 16-byte key) are converted; anything else must
/// already be unpadded base64url.
pub fn normalize_key_part(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.len() == 32 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
        return hex::decode(raw).ok().map(|bytes| BASE64_URL.encode(bytes));
    }

    if raw
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        Some(raw.to_string())
    } else {
        None
    }
}
