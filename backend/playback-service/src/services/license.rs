/// ClearKey license synthesis
///
/// ClearKey licenses are plain JSON Web Key sets, so they are built locally
/// from the key pair sealed in the token.
use serde::Serialize;
use thiserror::Error;

use crate::services::drm::normalize_key_part;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LicenseError {
    #[error("malformed ClearKey key id")]
    MalformedKeyId,

    #[error("malformed ClearKey key")]
    MalformedKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClearKeyLicense {
    pub keys: Vec<JsonWebKey>,
    #[serde(rename = "type")]
    pub session_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JsonWebKey {
    pub kty: &'static str,
    pub kid: String,
    pub k: String,
}

pub fn clearkey_license(key_id: &str, key: &str) -> Result<ClearKeyLicense, LicenseError> {
    let kid = normalize_key_part(key_id).ok_or(LicenseError::MalformedKeyId)?;
    let k = normalize_key_part(key).ok_or(LicenseError::MalformedKey)?;

    Ok(ClearKeyLicense {
        keys: vec![JsonWebKey {
            kty: "oct",
            kid,
            k,
        }],
        session_type: "temporary",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_license_body_shape() {
        let license = clearkey_license("k1", "v1").unwrap();

        assert_eq!(
            serde_json::to_value(&license).unwrap(),
            serde_json::json!({
                "keys": [{"kty": "oct", "kid": "k1", "k": "v1"}],
                "type": "temporary"
            })
        );
    }

    #[test]
    fn test_hex_pair_is_normalized() {
        let license = clearkey_license(
            "000102030405060708090a0b0c0d0e0f",
            "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF",
        )
        .unwrap();

        assert_eq!(license.keys[0].kid, "AAECAwQFBgcICQoLDA0ODw");
        assert_eq!(license.keys[0].k, "_____________________w");
    }

    #[test]
    fn test_malformed_material_is_rejected() {
        assert_eq!(clearkey_license("", "v1"), Err(LicenseError::MalformedKeyId));
        assert_eq!(clearkey_license("k1", ""), Err(LicenseError::MalformedKey));
        assert_eq!(clearkey_license("k1", "not base64!"), Err(LicenseError::MalformedKey));
    }
}
