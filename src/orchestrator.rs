use std::{
    num::NonZeroU32,
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    config::{DownloaderSettings, FetchFailurePolicy},
    context::RequestContext,
    fetcher::{AwaitedArtifact, StreamFetcher},
    io::{FilenameGenerator, RequestWorkspace},
    merger::Merger,
    outside::{StreamDownloader, StreamTransformer},
    result::{PipelineError, PipelineErrorKind, Result, Stage},
    types::{
        Artifact, AudioCodec, DownloadMode, DownloadRequest, EngineInfo, Extension,
        FormatSelector, StreamHandle, VideoMetadata,
    },
};

/// Runs one request through
/// `Validating -> FetchingMetadata -> FetchingStreams -> Merging -> Finalized`.
///
/// Every step runs on the calling thread, one after the other.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    fetcher: StreamFetcher,
    merger: Merger,
    names: FilenameGenerator,
    download_dir: PathBuf,
    temp_dir: PathBuf,
    base_url: String,
    policy: FetchFailurePolicy,
}

impl Orchestrator {
    pub fn new(
        settings: &DownloaderSettings,
        stream_dl: Arc<dyn StreamDownloader>,
        stream_tsf: Arc<dyn StreamTransformer>,
        names: FilenameGenerator,
    ) -> Self {
        Self {
            fetcher: StreamFetcher::new(stream_dl),
            merger: Merger::new(stream_tsf),
            names,
            download_dir: settings.download_dir.clone(),
            temp_dir: settings.temp_dir.clone(),
            base_url: settings.base_url.clone(),
            policy: settings.fetch_failure_policy,
        }
    }

    pub fn run(&self, request: &DownloadRequest, ctx: &RequestContext) -> Result<Artifact> {
        let url = request.source_url.as_str();
        info!(parent: ctx.span(), "Request to download {:?}", request.mode);

        let res = self.run_stages(url, request.mode, ctx);
        match &res {
            Ok(artifact) => info!(
                parent: ctx.span(),
                stage = %Stage::Finalized,
                "Download complete: {}",
                artifact.local_path.display()
            ),
            Err(err) => error!(parent: ctx.span(), stage = %err.stage, "Error downloading from {url}: {err}"),
        }
        res
    }

    fn run_stages(&self, url: &str, mode: DownloadMode, ctx: &RequestContext) -> Result<Artifact> {
        debug!(parent: ctx.span(), stage = %Stage::Validating, "Entering stage");
        StreamFetcher::resolve_identifier(url).ok_or_else(|| {
            PipelineError::new(Stage::Validating, PipelineErrorKind::UnrecognizedUrl)
        })?;
        if !self.fetcher.validate(url, ctx) {
            self.check_interrupted(Stage::Validating, ctx)?;
            return Err(PipelineError::new(
                Stage::Validating,
                PipelineErrorKind::ValidationFailed,
            ));
        }

        debug!(parent: ctx.span(), stage = %Stage::FetchingMetadata, "Entering stage");
        let metadata = self
            .fetcher
            .fetch_metadata(url, Some(mode.placeholder_title()), ctx)
            .map_err(|err| PipelineError::fetch(Stage::FetchingMetadata, err))?;

        debug!(parent: ctx.span(), stage = %Stage::FetchingStreams, "Entering stage");
        let local_path = match mode {
            DownloadMode::Video { resolution } => {
                self.download_video(url, &metadata, resolution, ctx)?
            }
            DownloadMode::Audio { convert: true } => {
                self.download_audio_converted(url, &metadata, AudioCodec::Mp3, ctx)?
            }
            DownloadMode::Audio { convert: false } => {
                self.download_audio_direct(url, &metadata, ctx)?
            }
        };

        Ok(self.finalize(local_path, metadata))
    }

    /// Video and audio downloaded separately, then merged into a `.mkv`.
    fn download_video(
        &self,
        url: &str,
        metadata: &VideoMetadata,
        resolution: NonZeroU32,
        ctx: &RequestContext,
    ) -> Result<PathBuf> {
        let video_id = metadata.id.as_str();
        let workspace = self.workspace(video_id)?;

        let output_filename = self.names.generate(
            &metadata.title,
            video_id,
            Some(&format!("{resolution}p")),
            Some(Extension::Mkv.with_dot()),
        );
        let output = self.download_dir.join(&output_filename);

        let video = StreamHandle::temp(
            workspace.path(),
            video_id,
            FormatSelector::BestVideoUpTo(resolution.get()),
        );
        let audio = StreamHandle::temp(workspace.path(), video_id, FormatSelector::BestAudio);

        // Both downloads are attempted even if the first one failed
        let video_info = self.fetch(url, &video, ctx)?;
        let audio_info = self.fetch(url, &audio, ctx)?;

        let video_file = self.await_file(&video, video_info, ctx)?;
        let audio_file = self.await_file(&audio, audio_info, ctx)?;

        debug!(parent: ctx.span(), stage = %Stage::Merging, "Entering stage");
        self.merger
            .mux(&video_file, &audio_file, &output, ctx)
            .map_err(PipelineError::merge)?;

        workspace.discard(ctx.span());
        Ok(output)
    }

    /// Audio downloaded to the workspace, then re-encoded into the download directory.
    fn download_audio_converted(
        &self,
        url: &str,
        metadata: &VideoMetadata,
        codec: AudioCodec,
        ctx: &RequestContext,
    ) -> Result<PathBuf> {
        let video_id = metadata.id.as_str();
        let workspace = self.workspace(video_id)?;

        let extension = codec.extension();
        let output_filename = self.names.generate(
            &metadata.title,
            video_id,
            Some(extension.with_no_dot()),
            Some(extension.with_dot()),
        );
        let output = self.download_dir.join(&output_filename);

        let audio = StreamHandle::temp(workspace.path(), video_id, FormatSelector::BestAudio);
        let audio_info = self.fetch(url, &audio, ctx)?;
        let audio_file = self.await_file(&audio, audio_info, ctx)?;

        debug!(parent: ctx.span(), stage = %Stage::Merging, "Entering stage");
        self.merger
            .transcode_audio(&audio_file, &output, codec, ctx)
            .map_err(PipelineError::merge)?;

        workspace.discard(ctx.span());
        Ok(output)
    }

    /// Audio downloaded straight into the download directory, in its original container.
    fn download_audio_direct(
        &self,
        url: &str,
        metadata: &VideoMetadata,
        ctx: &RequestContext,
    ) -> Result<PathBuf> {
        let video_id = metadata.id.as_str();
        // No extension: the engine appends the one of the container it picked
        let stem = self
            .names
            .generate(&metadata.title, video_id, Some("audio"), None);

        let audio = StreamHandle::named(&self.download_dir, &stem, FormatSelector::BestAudio);
        let audio_info = self.fetch(url, &audio, ctx)?;
        self.await_file(&audio, audio_info, ctx)
    }

    fn workspace(&self, video_id: &str) -> Result<RequestWorkspace> {
        RequestWorkspace::create(&self.temp_dir, video_id)
            .map_err(|err| PipelineError::io(Stage::FetchingStreams, err))
    }

    /// Download a stream, applying the fetch failure policy.
    ///
    /// `Ok(None)` means the download failed but the request goes on: the file
    /// lookup that follows decides whether the request fails. Timeouts and
    /// cancellations always stop the request.
    fn fetch(
        &self,
        url: &str,
        handle: &StreamHandle,
        ctx: &RequestContext,
    ) -> Result<Option<EngineInfo>> {
        match self.fetcher.fetch_stream(url, handle, ctx) {
            Ok(info) => Ok(Some(info)),
            Err(err) if err.is_interrupt() => Err(PipelineError::fetch(Stage::FetchingStreams, err)),
            Err(err) => match self.policy {
                FetchFailurePolicy::FailFast => Err(PipelineError::fetch(Stage::FetchingStreams, err)),
                FetchFailurePolicy::ContinueToLocate => {
                    warn!(
                        parent: ctx.span(),
                        "{} download failed, looking for a usable file anyway",
                        handle.kind
                    );
                    Ok(None)
                }
            },
        }
    }

    fn await_file(
        &self,
        handle: &StreamHandle,
        info: Option<EngineInfo>,
        ctx: &RequestContext,
    ) -> Result<PathBuf> {
        AwaitedArtifact::new(handle, info).resolve(ctx).ok_or_else(|| {
            PipelineError::new(
                Stage::FetchingStreams,
                PipelineErrorKind::MissingArtifact { kind: handle.kind },
            )
        })
    }

    /// Validation swallows engine errors into `false`: tell an interrupted probe apart.
    fn check_interrupted(&self, stage: Stage, ctx: &RequestContext) -> Result<()> {
        ctx.limits()
            .check("extraction engine")
            .map_err(|source| PipelineError::new(stage, PipelineErrorKind::Interrupted { source }))
    }

    fn finalize(&self, local_path: PathBuf, metadata: VideoMetadata) -> Artifact {
        let filename = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Artifact {
            public_url: public_url(&self.base_url, &filename),
            local_path,
            title: metadata.title,
            duration_seconds: metadata.duration_seconds,
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }
}

/// Join the public base URL and a file name.
///
/// The file name is percent-encoded when the base is an absolute URL.
pub fn public_url(base_url: &str, filename: &str) -> String {
    if let Ok(mut url) = Url::parse(base_url) {
        let pushed = match url.path_segments_mut() {
            Ok(mut segments) => {
                segments.pop_if_empty().push(filename);
                true
            }
            // Cannot-be-a-base URLs such as `mailto:`
            Err(()) => false,
        };
        if pushed {
            return url.to_string();
        }
    }
    format!("{}/{filename}", base_url.trim_end_matches('/'))
}
