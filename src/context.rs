use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{info_span, Span};

use crate::{
    io::random_hex8,
    outside::RunLimits,
    types::{DownloadMode, DownloadRequest},
};

/// Everything a request carries through the pipeline besides its input:
/// the span its events are attached to, and the limits its engine calls run under.
///
/// Components receive it explicitly and log with `parent: ctx.span()`.
#[derive(Debug, Clone)]
pub struct RequestContext {
    span: Span,
    limits: RunLimits,
}

impl RequestContext {
    pub fn new(span: Span, limits: RunLimits) -> Self {
        Self { span, limits }
    }

    /// Context for a request, with a fresh id and a deadline `timeout` from now
    pub fn for_request(request: &DownloadRequest, timeout: Option<Duration>) -> Self {
        let mode = match request.mode {
            DownloadMode::Video { .. } => "video",
            DownloadMode::Audio { convert: false } => "audio",
            DownloadMode::Audio { convert: true } => "mp3",
        };
        let span = info_span!(
            "request",
            id = %random_hex8(),
            mode,
            url = %request.source_url,
        );
        let deadline = timeout.map(|timeout| Instant::now() + timeout);

        Self::new(span, RunLimits::new(deadline, CancellationToken::new()))
    }

    /// Context without a span, deadline or external cancellation
    pub fn detached() -> Self {
        Self::new(Span::none(), RunLimits::unbounded())
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn limits(&self) -> &RunLimits {
        &self.limits
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.limits.cancel
    }
}
