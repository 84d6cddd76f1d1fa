use std::{ffi::OsStr, fmt::Debug, path::Path};

use crate::{result::CommandError, types::AudioCodec};

use super::command::{assert_success_command, RunLimits, FFMPEG, FFXXX_DEFAULT_ARGS};

pub trait StreamTransformer: Send + Sync + Debug {
    /// Put the video stream of `video` and the audio stream of `audio`
    /// in one container at `output`, copying both without re-encoding.
    fn copy_streams(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        limits: &RunLimits,
    ) -> Result<(), CommandError>;

    /// Re-encode the audio stream of `input` into `codec`.
    fn encode_audio(
        &self,
        input: &Path,
        output: &Path,
        codec: AudioCodec,
        limits: &RunLimits,
    ) -> Result<(), CommandError>;
}

/// Interface for the [ffmpeg](https://ffmpeg.org) program
#[derive(Debug)]
pub struct Ffmpeg;

impl Ffmpeg {
    /// Verify that the `ffmpeg` binary is reachable
    pub fn new() -> Result<Self, CommandError> {
        assert_success_command(FFMPEG, |cmd| cmd.arg("-version"), &RunLimits::unbounded())?;

        Ok(Self)
    }
}

impl StreamTransformer for Ffmpeg {
    fn copy_streams(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        limits: &RunLimits,
    ) -> Result<(), CommandError> {
        assert_success_command(
            FFMPEG,
            |cmd| {
                cmd.args(FFXXX_DEFAULT_ARGS)
                    .arg("-y")
                    .args([OsStr::new("-i"), video.as_os_str()])
                    .args([OsStr::new("-i"), audio.as_os_str()])
                    .args(["-map", "0:v:0", "-map", "1:a:0"])
                    .args(["-c:v", "copy", "-c:a", "copy"])
                    .arg("--")
                    .arg(output)
            },
            limits,
        )
    }

    fn encode_audio(
        &self,
        input: &Path,
        output: &Path,
        codec: AudioCodec,
        limits: &RunLimits,
    ) -> Result<(), CommandError> {
        assert_success_command(
            FFMPEG,
            |cmd| {
                cmd.args(FFXXX_DEFAULT_ARGS)
                    .arg("-y")
                    .args([OsStr::new("-i"), input.as_os_str()])
                    .arg("-vn")
                    .args(["-c:a", codec.encoder()])
                    .args(["-f", codec.format()])
                    .arg("--")
                    .arg(output)
            },
            limits,
        )
    }
}
