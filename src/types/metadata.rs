/// What the extraction engine reports about a video without downloading it.
///
/// Every field is optional: the engine is free to omit any of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub duration: Option<u64>,
}

/// Video metadata, resolved once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub id: String,
    pub title: String,
    pub duration_seconds: u64,
}

/// What the extraction engine reports after a stream download.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineInfo {
    /// Final path of the downloaded file, when the engine is able to tell
    pub filepath: Option<std::path::PathBuf>,
}
