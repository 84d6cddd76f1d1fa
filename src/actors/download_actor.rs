use std::sync::Arc;

use crossbeam_channel::Receiver;
use miette::{miette, Result};
use tracing::{debug, warn};

use crate::orchestrator::Orchestrator;

use super::{Actor, DownloadJob};

/// A worker: takes jobs one at a time and runs them to completion.
#[derive(Debug)]
pub struct DownloadActor {
    id: usize,
    orchestrator: Arc<Orchestrator>,

    receive_channel: Option<Receiver<DownloadJob>>,
}

impl Actor<DownloadJob> for DownloadActor {
    fn set_receive_channel(&mut self, channel: Receiver<DownloadJob>) {
        self.receive_channel = Some(channel);
    }

    fn run(mut self) -> Result<()> {
        let receive_channel = self
            .receive_channel
            .take()
            .ok_or_else(|| miette!("Receive channel not set"))?;

        debug!("{}: Actor started, waiting for a job", self.id);

        for DownloadJob {
            request,
            ctx,
            reply,
        } in receive_channel
        {
            let _enter = ctx.span().enter();

            if reply.is_closed() || ctx.cancel_token().is_cancelled() {
                debug!("{}: Client went away while the job was queued. Skipping it", self.id);
                continue;
            }

            let res = self.orchestrator.run(&request, &ctx);

            if reply.send(res).is_err() {
                warn!("{}: Client went away before the result was ready", self.id);
            }

            debug!("{}: Iteration completed. Waiting for next job", self.id);
        }

        debug!("{}: All iterations completed. Stopping the actor.", self.id);
        Ok(())
    }
}

impl DownloadActor {
    pub fn new(id: usize, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            id,
            orchestrator,
            receive_channel: None,
        }
    }
}
