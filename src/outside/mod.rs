mod command;
mod ffmpeg;
mod ytdl;

pub use command::{run_command, Capture, RunLimits};
pub use ffmpeg::{Ffmpeg, StreamTransformer};
pub use ytdl::{parse_probe, StreamDownloader, Ytdl};
