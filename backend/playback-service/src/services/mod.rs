/// Playback business logic
///
/// - `sanitizer`: public projection of catalog records
/// - `drm`: DRM classification and ClearKey key handling
/// - `resolver`: record to playback descriptor
/// - `license`: ClearKey license synthesis
/// - `stream_proxy`: HLS playlist rewriting
/// - `upstream`: outbound HTTP to license servers and stream origins
pub mod drm;
pub mod license;
pub mod resolver;
pub mod sanitizer;
pub mod stream_proxy;
pub mod upstream;

pub use resolver::{PlaybackPaths, PlaybackResolver};
pub use stream_proxy::PlaylistRewriter;
pub use upstream::{UpstreamClient, UpstreamError};
