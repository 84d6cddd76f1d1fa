use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

/// Placeholder the extraction engine replaces with the real file extension.
pub const EXT_PLACEHOLDER: &str = "%(ext)s";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Video => "video",
            StreamKind::Audio => "audio",
        }
    }
}

impl Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stream the extraction engine should pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSelector {
    /// Best video-only stream whose height does not exceed the ceiling (inclusive)
    BestVideoUpTo(u32),
    BestAudio,
}

impl FormatSelector {
    pub fn kind(self) -> StreamKind {
        match self {
            FormatSelector::BestVideoUpTo(_) => StreamKind::Video,
            FormatSelector::BestAudio => StreamKind::Audio,
        }
    }
}

impl Display for FormatSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatSelector::BestVideoUpTo(height) => write!(f, "bestvideo[height<={height}]"),
            FormatSelector::BestAudio => f.write_str("bestaudio"),
        }
    }
}

/// A single stream download owned by one request.
///
/// The final extension is unknown until the engine has written the file,
/// so the handle only knows the directory and the file name prefix.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    pub kind: StreamKind,
    pub selector: FormatSelector,
    dir: PathBuf,
    stem: String,
}

impl StreamHandle {
    /// Handle for a temp stream file named `<video_id>_<kind>.<ext>`
    pub fn temp(dir: &Path, video_id: &str, selector: FormatSelector) -> Self {
        let kind = selector.kind();
        Self {
            kind,
            selector,
            dir: dir.to_path_buf(),
            stem: format!("{video_id}_{kind}"),
        }
    }

    /// Handle for a file written directly under its final name stem
    pub fn named(dir: &Path, stem: &str, selector: FormatSelector) -> Self {
        Self {
            kind: selector.kind(),
            selector,
            dir: dir.to_path_buf(),
            stem: stem.to_owned(),
        }
    }

    /// Output path template handed to the extraction engine.
    /// Literal `%` are doubled so the engine does not read them as fields.
    pub fn template(&self) -> PathBuf {
        let literal = self.dir.join(&self.stem).to_string_lossy().replace('%', "%%");
        PathBuf::from(format!("{literal}.{EXT_PLACEHOLDER}"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name prefix every candidate file starts with
    pub fn prefix(&self) -> String {
        format!("{}.", self.stem)
    }
}
