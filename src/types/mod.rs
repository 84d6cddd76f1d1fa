mod artifact;
mod extension;
mod metadata;
mod request;
mod stream;
mod video_id;

pub use artifact::Artifact;
pub use extension::{AudioCodec, Extension};
pub use metadata::{EngineInfo, ProbeInfo, VideoMetadata};
pub use request::{DownloadMode, DownloadRequest};
pub use stream::{FormatSelector, StreamHandle, StreamKind, EXT_PLACEHOLDER};
pub use video_id::VideoId;
