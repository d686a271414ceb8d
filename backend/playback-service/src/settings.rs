/// Administrative playback switches
use crate::config::PlaybackFlags;
use crate::services::resolver::PlaybackPaths;

/// Client surface a request arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Web,
    Mobile,
}

impl Surface {
    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::Web => "web",
            Surface::Mobile => "mobile",
        }
    }

    /// Proxy endpoints handed out to clients of this surface
    pub fn paths(&self) -> PlaybackPaths {
        match self {
            Surface::Web => PlaybackPaths::new("/api/stream", "/api/license"),
            Surface::Mobile => PlaybackPaths::new("/api/mobile/stream", "/api/mobile/license"),
        }
    }
}

pub trait PlaybackSettings: Send + Sync {
    fn playback_enabled(&self, surface: Surface) -> bool;
}

/// Flags fixed at startup
#[derive(Debug, Clone, Copy)]
pub struct StaticSettings {
    flags: PlaybackFlags,
}

impl StaticSettings {
    pub fn new(flags: PlaybackFlags) -> Self {
        Self { flags }
    }
}

impl PlaybackSettings for StaticSettings {
    fn playback_enabled(&self, surface: Surface) -> bool {
        match surface {
            Surface::Web => self.flags.web_enabled,
            Surface::Mobile => self.flags.mobile_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surfaces_are_independent() {
        let settings = StaticSettings::new(PlaybackFlags {
            web_enabled: true,
            mobile_enabled: false,
        });

        assert!(settings.playback_enabled(Surface::Web));
        assert!(!settings.playback_enabled(Surface::Mobile));
    }

    #[test]
    fn test_mobile_paths_stay_on_mobile_surface() {
        let paths = Surface::Mobile.paths();
        assert!(paths.proxy_path.starts_with("/api/mobile/"));
        assert!(paths.license_path.starts_with("/api/mobile/"));
    }
}
