use std::{sync::Arc, thread::JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use miette::{Context, IntoDiagnostic, Result};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::{context::RequestContext, orchestrator::Orchestrator, types::{Artifact, DownloadRequest}};

use super::{Actor, DownloadActor, DownloadJob, JobError};

/// Fixed number of worker threads sharing one job queue.
///
/// A job occupies its worker for its whole duration, so at most `size`
/// requests are processed at the same time; the others wait in the queue.
#[derive(Debug)]
pub struct WorkerPool {
    input: Sender<DownloadJob>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start(size: usize, orchestrator: Arc<Orchestrator>) -> Result<Self> {
        let (input, receive) = unbounded();

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let mut actor = DownloadActor::new(id, orchestrator.clone());
            actor.set_receive_channel(receive.clone());

            let handle = std::thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || {
                    if let Err(err) = actor.run() {
                        error!("Worker {id} stopped: {err:?}");
                    }
                })
                .into_diagnostic()
                .wrap_err("Could not spawn worker thread")?;
            workers.push(handle);
        }

        info!("{size} workers started");
        Ok(Self { input, workers })
    }

    /// Queue a request and wait for its result.
    ///
    /// Dropping the returned future, e.g. because the client disconnected,
    /// cancels the request and kills whatever engine it is running.
    pub async fn execute(
        &self,
        request: DownloadRequest,
        ctx: RequestContext,
    ) -> Result<Artifact, JobError> {
        let _cancel_on_drop = ctx.cancel_token().clone().drop_guard();

        let (reply, result) = oneshot::channel();
        self.input
            .send(DownloadJob {
                request,
                ctx,
                reply,
            })
            .map_err(|_| JobError::PoolClosed)?;

        match result.await {
            Ok(res) => res.map_err(|source| JobError::Pipeline { source }),
            Err(_) => Err(JobError::NoReply),
        }
    }

    /// Stop accepting jobs and wait for the running ones to finish.
    pub fn shutdown(self) {
        let Self { input, workers } = self;
        drop(input);

        for worker in workers {
            let name = worker.thread().name().unwrap_or("<unnamed>").to_owned();
            if worker.join().is_err() {
                error!("{name} panicked");
            } else {
                debug!("{name} joined");
            }
        }
        info!("All workers stopped");
    }
}
