mod download_actor;
mod message;
mod pool;

use crossbeam_channel::Receiver;
pub use download_actor::DownloadActor;
pub use message::*;
pub use pool::WorkerPool;

use miette::Result;

pub trait Actor<From> {
    fn set_receive_channel(&mut self, channel: Receiver<From>);

    fn run(self) -> Result<()>;
}
