use std::path::PathBuf;

use serde::Serialize;

/// The final file produced by a successful request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub local_path: PathBuf,
    #[serde(rename = "url")]
    pub public_url: String,
    pub title: String,
    #[serde(rename = "duration")]
    pub duration_seconds: u64,
}
