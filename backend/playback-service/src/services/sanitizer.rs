/// Public projection of catalog records
use crate::models::{ChannelRecord, StreamSecrets};

/// Copy of `record` with every delivery field emptied. The stream kind goes
/// too; it hints at the DRM scheme.
pub fn sanitize(record: &ChannelRecord) -> ChannelRecord {
    ChannelRecord {
        stream_kind: String::new(),
        secrets: StreamSecrets::default(),
        ..record.clone()
    }
}

pub fn sanitize_many(records: &[ChannelRecord]) -> Vec<ChannelRecord> {
    records.iter().map(sanitize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn private_record() -> ChannelRecord {
        let mut record = ChannelRecord {
            id: "c1".into(),
            name: "News".into(),
            image: "/img/news.png".into(),
            country: "UY".into(),
            premium: true,
            stream_kind: "dash-clearkey".into(),
            ..Default::default()
        };
        record.secrets.stream_url = "https://cdn.example/raw.mpd".into();
        record.secrets.license_url = "0123:4567".into();
        record
            .secrets
            .request_headers_for_stream
            .insert("Referer".into(), "https://origin.example".into());
        record
            .secrets
            .request_headers_for_license
            .insert("Authorization".into(), "Bearer x".into());
        record
    }

    #[test]
    fn test_private_fields_are_emptied() {
        let public = sanitize(&private_record());

        assert!(public.secrets.is_empty());
        assert_eq!(public.stream_kind, "");

        let json = serde_json::to_string(&public).unwrap();
        assert!(!json.contains("cdn.example"));
        assert!(!json.contains("Bearer"));
        assert!(json.contains("\"streamUrl\":\"\""));
    }

    #[test]
    fn test_public_fields_pass_through() {
        let original = private_record();
        let public = sanitize(&original);

        assert_eq!(public.id, original.id);
        assert_eq!(public.name, original.name);
        assert_eq!(public.image, original.image);
        assert_eq!(public.country, original.country);
        assert_eq!(public.premium, original.premium);
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let once = sanitize(&private_record());
        assert_eq!(sanitize(&once), once);

        let bare = ChannelRecord::default();
        assert_eq!(sanitize(&bare), bare);
    }

    #[test]
    fn test_sanitize_many_preserves_order() {
        let mut second = private_record();
        second.id = "event-2".into();

        let public = sanitize_many(&[private_record(), second]);

        assert_eq!(public.len(), 2);
        assert_eq!(public[1].id, "event-2");
        assert!(public.iter().all(|r| r.secrets.is_empty()));
    }
}
