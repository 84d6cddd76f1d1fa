use derive_more::{Display, Error};
use tokio::sync::oneshot;

use crate::{
    context::RequestContext,
    result::PipelineError,
    types::{Artifact, DownloadRequest},
};

pub type JobResult = Result<Artifact, PipelineError>;

/// One request waiting for a worker.
#[derive(Debug)]
pub struct DownloadJob {
    pub request: DownloadRequest,
    pub ctx: RequestContext,
    pub reply: oneshot::Sender<JobResult>,
}

#[derive(Debug, Display, Error)]
pub enum JobError {
    #[display("{source}")]
    Pipeline { source: PipelineError },

    #[display("the worker pool is shut down")]
    PoolClosed,

    #[display("the worker dropped the job without answering")]
    NoReply,
}
