/// HLS playlist rewriting for the stream proxy
///
/// A proxied playlist must not leak the origin: every URI it references
/// (segments, variant playlists, keys, init maps) is resolved against the
/// playlist's own URL and swapped for a fresh proxy URL whose token carries
/// the same request headers.
use crypto_core::{TokenError, TokenGrant, TokenSigner};
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

use crate::services::resolver::with_token;

pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Largest playlist the proxy buffers for rewriting
pub const MAX_PLAYLIST_BYTES: usize = 2 * 1024 * 1024;

/// Bytes to look at before deciding an unlabelled body is a playlist
pub const SNIFF_BYTES: usize = 64;

const PLAYLIST_SIGNATURE: &[u8] = b"#EXTM3U";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const URI_ATTRIBUTE: &str = "URI=\"";

/// Playlists are recognized by content type or by a `.m3u8` path. Origins
/// that serve HLS from other paths as `text/plain` are caught by
/// [`starts_like_playlist`].
pub fn is_playlist(url: &str, content_type: Option<&str>) -> bool {
    if let Some(content_type) = content_type {
        if content_type.to_ascii_lowercase().contains("mpegurl") {
            return true;
        }
    }

    Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase().ends_with(".m3u8"))
        .unwrap_or(false)
}

/// Whether the first bytes of a body carry the `#EXTM3U` header.
pub fn starts_like_playlist(head: &[u8]) -> bool {
    let head = head.strip_prefix(UTF8_BOM).unwrap_or(head);
    let start = head
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(head.len());
    head[start..].starts_with(PLAYLIST_SIGNATURE)
}

#[derive(Clone)]
pub struct PlaylistRewriter {
    signer: Arc<TokenSigner>,
    token_ttl_secs: i64,
}

impl PlaylistRewriter {
    pub fn new(signer: Arc<TokenSigner>, token_ttl_secs: i64) -> Self {
        Self {
            signer,
            token_ttl_secs,
        }
    }

    /// Rewrite `body`, fetched from `base`, so that every reference goes
    /// through `proxy_path`.
    pub fn rewrite(
        &self,
        body: &str,
        base: &Url,
        headers: &BTreeMap<String, String>,
        proxy_path: &str,
        now: i64,
    ) -> Result<String, TokenError> {
        let proxied = |reference: &str| -> Result<Option<String>, TokenError> {
            let Some(target) = resolve_reference(base, reference) else {
                return Ok(None);
            };
            let grant = TokenGrant::StreamProxy {
                stream_url: target.to_string(),
                stream_headers: headers.clone(),
            };
            let token = self.signer.issue_at(&grant, self.token_ttl_secs, now)?;
            Ok(Some(with_token(proxy_path, &token)))
        };

        let mut output = String::with_capacity(body.len() * 2);
        for line in body.lines() {
            let trimmed = line.trim();

            if trimmed.is_empty() {
                output.push_str(line);
            } else if trimmed.starts_with('#') {
                output.push_str(&rewrite_uri_attributes(line, &proxied)?);
            } else {
                match proxied(trimmed)? {
                    Some(url) => output.push_str(&url),
                    None => output.push_str(line),
                }
            }
            output.push('\n');
        }

        Ok(output)
    }
}

/// Only http(s) references are proxied; `data:` and vendor key schemes stay.
fn resolve_reference(base: &Url, reference: &str) -> Option<Url> {
    let target = base.join(reference).ok()?;
    matches!(target.scheme(), "http" | "https").then_some(target)
}

fn rewrite_uri_attributes<F>(line: &str, proxied: &F) -> Result<String, TokenError>
where
    F: Fn(&str) -> Result<Option<String>, TokenError>,
{
    let mut output = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(start) = rest.find(URI_ATTRIBUTE) {
        let value_start = start + URI_ATTRIBUTE.len();
        let Some(length) = rest[value_start..].find('"') else {
            break;
        };
        let value = &rest[value_start..value_start + length];

        output.push_str(&rest[..value_start]);
        match proxied(value)? {
            Some(url) => output.push_str(&url),
            None => output.push_str(value),
        }
        rest = &rest[value_start + length..];
    }

    output.push_str(rest);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    const MASTER: &str = "#EXTM3U\n\
#EXT-X-VERSION:6\n\
#EXT-X-KEY:METHOD=AES-128,URI=\"keys/k.bin\",IV=0x1\n\
#EXT-X-MAP:URI=\"init.mp4\"\n\
#EXTINF:6.0,\n\
seg-1.ts\n\
\n\
#EXTINF:6.0,\n\
https://other.example/abs/seg-2.ts\n\
#EXT-X-SESSION-KEY:METHOD=SAMPLE-AES,URI=\"skd://vendor-key\"\n";

    fn signer() -> Arc<TokenSigner> {
        Arc::new(TokenSigner::new("stream-proxy-test-secret").unwrap())
    }

    fn headers() -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert("Referer".to_string(), "https://origin.example".to_string());
        headers
    }

    fn tokens_in(body: &str) -> Vec<String> {
        body.split("token=")
            .skip(1)
            .map(|rest| {
                rest.chars()
                    .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_' || *c == '.')
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_playlist_detection() {
        assert!(is_playlist("https://cdn/x/index.M3U8?sig=1", None));
        assert!(is_playlist("https://cdn/x/index", Some("application/x-mpegURL")));
        assert!(!is_playlist("https://cdn/x/seg.ts", Some("video/mp2t")));
        assert!(!is_playlist("not a url", None));
    }

    #[test]
    fn test_playlist_signature_sniffing() {
        assert!(starts_like_playlist(b"#EXTM3U\n#EXTINF:6.0,\nseg-1.ts"));
        assert!(starts_like_playlist(b"\xEF\xBB\xBF#EXTM3U\n"));
        assert!(starts_like_playlist(b"\r\n  #EXTM3U"));
        assert!(!starts_like_playlist(b"#EXTM3"));
        assert!(!starts_like_playlist(b"\x47\x40\x00\x10"));
        assert!(!starts_like_playlist(b""));
    }

    #[test]
    fn test_rewrite_hides_origin_and_proxies_every_reference() {
        let signer = signer();
        let rewriter = PlaylistRewriter::new(signer.clone(), 300);
        let base = Url::parse("https://cdn.example/live/index.m3u8").unwrap();

        let output = rewriter
            .rewrite(MASTER, &base, &headers(), "/api/stream", NOW)
            .unwrap();

        assert!(!output.contains("cdn.example"));
        assert!(!output.contains("other.example"));
        assert!(output.contains("#EXT-X-VERSION:6"));
        assert!(output.contains(",IV=0x1"));
        assert!(output.contains("URI=\"skd://vendor-key\""));

        let targets: Vec<String> = tokens_in(&output)
            .iter()
            .map(|token| match signer.verify_at(token, NOW) {
                Some(TokenGrant::StreamProxy {
                    stream_url,
                    stream_headers,
                }) => {
                    assert_eq!(stream_headers, headers());
                    stream_url
                }
                other => panic!("unexpected grant {:?}", other),
            })
            .collect();

        assert_eq!(
            targets,
            vec![
                "https://cdn.example/live/keys/k.bin",
                "https://cdn.example/live/init.mp4",
                "https://cdn.example/live/seg-1.ts",
                "https://other.example/abs/seg-2.ts",
            ]
        );
    }

    #[test]
    fn test_unterminated_attribute_is_left_alone() {
        let rewriter = PlaylistRewriter::new(signer(), 300);
        let base = Url::parse("https://cdn.example/index.m3u8").unwrap();

        let output = rewriter
            .rewrite("#EXT-X-MAP:URI=\"init.mp4\n", &base, &headers(), "/api/stream", NOW)
            .unwrap();

        assert_eq!(output, "#EXT-X-MAP:URI=\"init.mp4\n");
    }
}
