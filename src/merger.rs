use std::{path::Path, sync::Arc};

use tracing::{error, info};

use crate::{
    context::RequestContext,
    io::remove_best_effort,
    outside::StreamTransformer,
    result::MergeError,
    types::AudioCodec,
};

/// Produces final containers out of downloaded streams.
///
/// Inputs are deleted once the output is written; on failure they are
/// left where they are.
#[derive(Debug, Clone)]
pub struct Merger {
    stream_tsf: Arc<dyn StreamTransformer>,
}

impl Merger {
    pub fn new(stream_tsf: Arc<dyn StreamTransformer>) -> Self {
        Self { stream_tsf }
    }

    /// Copy the video and audio streams into one container, without re-encoding.
    pub fn mux(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        ctx: &RequestContext,
    ) -> Result<(), MergeError> {
        info!(parent: ctx.span(), "Merging video and audio streams");

        ensure_exists(video)?;
        ensure_exists(audio)?;

        self.stream_tsf
            .copy_streams(video, audio, output, ctx.limits())
            .map_err(|err| {
                error!(parent: ctx.span(), "Error merging video and audio: {err}");
                err
            })?;

        remove_best_effort(video, ctx.span());
        remove_best_effort(audio, ctx.span());

        info!(parent: ctx.span(), "Video and audio merged successfully");
        Ok(())
    }

    /// Re-encode a single audio stream into `codec`.
    pub fn transcode_audio(
        &self,
        input: &Path,
        output: &Path,
        codec: AudioCodec,
        ctx: &RequestContext,
    ) -> Result<(), MergeError> {
        info!(parent: ctx.span(), "Converting audio to {}", codec.format());

        ensure_exists(input)?;

        self.stream_tsf
            .encode_audio(input, output, codec, ctx.limits())
            .map_err(|err| {
                error!(parent: ctx.span(), "Error converting to {}: {err}", codec.format());
                err
            })?;

        remove_best_effort(input, ctx.span());

        info!(parent: ctx.span(), "Audio converted successfully");
        Ok(())
    }
}

fn ensure_exists(path: &Path) -> Result<(), MergeError> {
    if path.exists() {
        Ok(())
    } else {
        Err(MergeError::NotFound {
            path: path.to_path_buf(),
        })
    }
}
