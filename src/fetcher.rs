use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{debug, error, info, warn};

use crate::{
    context::RequestContext,
    io::{is_partial_download, locate_downloaded},
    outside::StreamDownloader,
    result::FetchError,
    types::{EngineInfo, StreamHandle, VideoId, VideoMetadata},
};

/// Talks to the extraction engine on behalf of one request at a time.
#[derive(Debug, Clone)]
pub struct StreamFetcher {
    stream_dl: Arc<dyn StreamDownloader>,
}

impl StreamFetcher {
    pub fn new(stream_dl: Arc<dyn StreamDownloader>) -> Self {
        Self { stream_dl }
    }

    pub fn resolve_identifier(url: &str) -> Option<VideoId> {
        VideoId::resolve(url)
    }

    /// True if the URL carries a video id and the engine can probe it.
    ///
    /// URLs without a recognizable id never reach the engine.
    pub fn validate(&self, url: &str, ctx: &RequestContext) -> bool {
        info!(parent: ctx.span(), "Validating URL");

        if Self::resolve_identifier(url).is_none() {
            warn!(parent: ctx.span(), "Not a recognized video URL: {url}");
            return false;
        }

        match self.stream_dl.probe(url, ctx.limits()) {
            Ok(_) => true,
            Err(err) => {
                error!(parent: ctx.span(), "Error validating URL {url}: {err}");
                false
            }
        }
    }

    /// Probe the engine for the video metadata.
    ///
    /// A missing title is an error, unless `placeholder_title` is given.
    /// A missing duration is 0.
    pub fn fetch_metadata(
        &self,
        url: &str,
        placeholder_title: Option<&str>,
        ctx: &RequestContext,
    ) -> Result<VideoMetadata, FetchError> {
        info!(parent: ctx.span(), "Getting video info");

        let probe = self.stream_dl.probe(url, ctx.limits()).map_err(|err| {
            error!(parent: ctx.span(), "Error getting video info from {url}: {err}");
            err
        })?;

        let title = probe
            .title
            .or_else(|| placeholder_title.map(str::to_owned))
            .ok_or(FetchError::MissingTitle)?;

        let id = Self::resolve_identifier(url)
            .map(|id| id.to_string())
            .or(probe.id)
            .unwrap_or_default();

        info!(parent: ctx.span(), "Retrieved video info: {title}");

        Ok(VideoMetadata {
            id,
            title,
            duration_seconds: probe.duration.unwrap_or(0),
        })
    }

    /// Download one stream, codecs copied, to the handle's template path.
    ///
    /// Failures are logged here and returned: whether a failed stream is fatal
    /// is for the caller to decide.
    pub fn fetch_stream(
        &self,
        url: &str,
        handle: &StreamHandle,
        ctx: &RequestContext,
    ) -> Result<EngineInfo, FetchError> {
        info!(parent: ctx.span(), "Downloading {} stream", handle.kind);

        match self
            .stream_dl
            .download(url, handle.selector, &handle.template(), ctx.limits())
        {
            Ok(info) => {
                info!(parent: ctx.span(), "{} stream downloaded", capitalize(handle.kind.as_str()));
                Ok(info)
            }
            Err(err) => {
                error!(parent: ctx.span(), "Error downloading {} from {url}: {err}", handle.kind);
                Err(err)
            }
        }
    }

    /// Find a downloaded file by name prefix, its extension being unknown.
    pub fn locate_downloaded(directory: &Path, prefix: &str) -> Option<PathBuf> {
        locate_downloaded(directory, prefix)
    }
}

/// A download whose final path is not known in advance.
///
/// The engine-reported path is trusted when it exists; otherwise the handle's
/// directory is searched by prefix.
#[derive(Debug)]
pub struct AwaitedArtifact<'a> {
    handle: &'a StreamHandle,
    reported: Option<PathBuf>,
}

impl<'a> AwaitedArtifact<'a> {
    pub fn new(handle: &'a StreamHandle, info: Option<EngineInfo>) -> Self {
        Self {
            handle,
            reported: info.and_then(|info| info.filepath),
        }
    }

    pub fn resolve(&self, ctx: &RequestContext) -> Option<PathBuf> {
        if let Some(path) = self
            .reported
            .as_ref()
            .filter(|p| p.is_file() && !is_partial_download(p))
        {
            debug!(parent: ctx.span(), "Engine reported {}", path.display());
            return Some(path.clone());
        }

        let prefix = self.handle.prefix();
        let found = StreamFetcher::locate_downloaded(self.handle.dir(), &prefix);
        match &found {
            Some(path) => debug!(parent: ctx.span(), "Found file with original extension: {}", path.display()),
            None => warn!(
                parent: ctx.span(),
                "No files found matching {}*",
                self.handle.dir().join(&prefix).display()
            ),
        }
        found
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}
