use std::num::NonZeroU32;

/// What the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadMode {
    /// Merged video and audio, video height capped at the resolution
    Video { resolution: NonZeroU32 },
    /// Audio only, optionally re-encoded to MP3
    Audio { convert: bool },
}

impl DownloadMode {
    /// Title used when the engine does not report one
    pub fn placeholder_title(self) -> &'static str {
        match self {
            DownloadMode::Video { .. } => "video",
            DownloadMode::Audio { .. } => "audio",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub source_url: String,
    pub mode: DownloadMode,
}

impl DownloadRequest {
    pub fn video(source_url: impl Into<String>, resolution: NonZeroU32) -> Self {
        Self {
            source_url: source_url.into(),
            mode: DownloadMode::Video { resolution },
        }
    }

    pub fn audio(source_url: impl Into<String>, convert: bool) -> Self {
        Self {
            source_url: source_url.into(),
            mode: DownloadMode::Audio { convert },
        }
    }
}
