use std::{path::PathBuf, process::ExitStatus};

use derive_more::{Display, Error};

use crate::types::StreamKind;

/// Failure of an external program invocation.
#[derive(Debug, Display, Error)]
pub enum CommandError {
    #[display("could not run {program}: {source}")]
    Io {
        program: String,
        source: std::io::Error,
    },

    #[display("{program} did run but was not successful ({status}): {stderr}")]
    Unsuccessful {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[display("{program} did not finish before the request deadline")]
    TimedOut { program: String },

    #[display("{program} was cancelled")]
    Cancelled { program: String },
}

impl CommandError {
    /// Whether the command was stopped by us rather than failing on its own
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::TimedOut { .. } | Self::Cancelled { .. })
    }
}

/// Failure of the extraction engine while probing or downloading.
#[derive(Debug, Display, Error)]
pub enum FetchError {
    #[display("{source}")]
    Command { source: CommandError },

    #[display("the stream is unavailable")]
    Unavailable,

    #[display("unexpected engine output: {reason}")]
    InvalidOutput {
        #[error(not(source))]
        reason: String,
    },

    #[display("the engine did not report a title")]
    MissingTitle,
}

impl FetchError {
    pub fn invalid_output(reason: impl Into<String>) -> Self {
        Self::InvalidOutput {
            reason: reason.into(),
        }
    }

    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Command { source } if source.is_interrupt())
    }
}

impl From<CommandError> for FetchError {
    fn from(source: CommandError) -> Self {
        Self::Command { source }
    }
}

/// Failure of the transcoding step.
#[derive(Debug, Display, Error)]
pub enum MergeError {
    #[display("input file not found: {}", path.display())]
    NotFound {
        #[error(not(source))]
        path: PathBuf,
    },

    #[display("transcoding engine failed: {source}")]
    EngineFailure { source: CommandError },
}

impl From<CommandError> for MergeError {
    fn from(source: CommandError) -> Self {
        Self::EngineFailure { source }
    }
}

/// Pipeline step a request was in when it stopped.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    FetchingMetadata,
    FetchingStreams,
    Merging,
    Finalized,
}

#[derive(Debug, Display, Error)]
pub enum PipelineErrorKind {
    #[display("the URL does not identify a video")]
    UnrecognizedUrl,

    #[display("the extraction engine rejected the URL")]
    ValidationFailed,

    #[display("could not fetch metadata: {source}")]
    Metadata { source: FetchError },

    #[display("could not fetch a stream: {source}")]
    Fetch { source: FetchError },

    #[display("no downloaded {kind} file could be located")]
    MissingArtifact {
        #[error(not(source))]
        kind: StreamKind,
    },

    #[display("{source}")]
    Merge { source: MergeError },

    #[display("filesystem error: {source}")]
    Io { source: std::io::Error },

    #[display("{source}")]
    Interrupted { source: CommandError },
}

/// A failed request, tagged with the stage it failed in.
#[derive(Debug, Display, Error)]
#[display("{stage} failed: {kind}")]
pub struct PipelineError {
    #[error(not(source))]
    pub stage: Stage,
    #[error(source)]
    pub kind: PipelineErrorKind,
}

impl PipelineError {
    pub fn new(stage: Stage, kind: PipelineErrorKind) -> Self {
        Self { stage, kind }
    }

    pub fn io(stage: Stage, source: std::io::Error) -> Self {
        Self::new(stage, PipelineErrorKind::Io { source })
    }

    /// Route an engine error: interruptions keep their own kind so the
    /// caller can tell a timeout from a real engine failure.
    pub fn fetch(stage: Stage, err: FetchError) -> Self {
        match err {
            FetchError::Command { source } if source.is_interrupt() => {
                Self::new(stage, PipelineErrorKind::Interrupted { source })
            }
            source if stage == Stage::FetchingMetadata => {
                Self::new(stage, PipelineErrorKind::Metadata { source })
            }
            source => Self::new(stage, PipelineErrorKind::Fetch { source }),
        }
    }

    pub fn merge(err: MergeError) -> Self {
        match err {
            MergeError::EngineFailure { source } if source.is_interrupt() => {
                Self::new(Stage::Merging, PipelineErrorKind::Interrupted { source })
            }
            source => Self::new(Stage::Merging, PipelineErrorKind::Merge { source }),
        }
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
