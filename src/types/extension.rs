/// Output containers the service produces itself.
///
/// Containers picked by the extraction engine (e.g. `.webm`, `.m4a`) are not
/// listed here: their extension is only known once the download has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    Mkv,
    Mp3,
}

impl Extension {
    /// Return the extension with the leading dot.
    /// e.g. ".ext"
    pub fn with_dot(self) -> &'static str {
        match self {
            Extension::Mkv => ".mkv",
            Extension::Mp3 => ".mp3",
        }
    }

    /// Return the extension without the leading dot.
    pub fn with_no_dot(self) -> &'static str {
        &self.with_dot()[1..]
    }
}

/// Audio codecs the transcoding engine can re-encode into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    Mp3,
}

impl AudioCodec {
    /// Name of the engine encoder
    pub fn encoder(self) -> &'static str {
        match self {
            AudioCodec::Mp3 => "libmp3lame",
        }
    }

    /// Name of the engine muxer
    pub fn format(self) -> &'static str {
        match self {
            AudioCodec::Mp3 => "mp3",
        }
    }

    pub fn extension(self) -> Extension {
        match self {
            AudioCodec::Mp3 => Extension::Mp3,
        }
    }
}
