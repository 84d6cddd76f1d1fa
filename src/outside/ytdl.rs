use std::{
    ffi::OsStr,
    fmt::Debug,
    path::{Path, PathBuf},
    process::{Command, Output},
};

use serde_json::Value;

use super::command::{
    assert_success_command, ensure_success, run_command, Capture, RunLimits, YT_DL, YT_DLP,
};
use crate::{
    result::{CommandError, FetchError},
    types::{EngineInfo, FormatSelector, ProbeInfo},
};

/// Interface for resolving and downloading the streams of a video
pub trait StreamDownloader: Send + Sync + Debug {
    /// Get the video metadata without downloading anything
    fn probe(&self, url: &str, limits: &RunLimits) -> Result<ProbeInfo, FetchError>;

    /// Download the stream picked by `selector` as-is, without re-encoding.
    ///
    /// `template` is a path whose `%(ext)s` placeholder the engine replaces
    /// with the real extension of the stream it picked.
    fn download(
        &self,
        url: &str,
        selector: FormatSelector,
        template: &Path,
        limits: &RunLimits,
    ) -> Result<EngineInfo, FetchError>;
}

/// Interface for the [yt-dlp](https://github.com/yt-dlp/yt-dlp) program,
/// or its [youtube-dl](https://github.com/ytdl-org/youtube-dl) ancestor
#[derive(Debug)]
pub struct Ytdl {
    program: &'static str,
}

impl Ytdl {
    /// Verify that the `yt-dlp` or `youtube-dl` binaries are reachable
    pub fn new() -> Result<Self, CommandError> {
        let limits = RunLimits::unbounded();

        // Check `yt-dlp`
        match assert_success_command(YT_DLP, |cmd| cmd.arg("--version"), &limits) {
            Ok(()) => Ok(Self { program: YT_DLP }),
            Err(err) => {
                // Check `youtube-dl`
                if assert_success_command(YT_DL, |cmd| cmd.arg("--version"), &limits).is_ok() {
                    Ok(Self { program: YT_DL })
                } else {
                    Err(err)
                }
            }
        }
    }

    pub fn program(&self) -> &'static str {
        self.program
    }

    /// Only `yt-dlp` can print the final path of a download
    fn reports_filepath(&self) -> bool {
        self.program == YT_DLP
    }

    /// Run the command and check if it failed with saying the stream is unavailable.
    /// In that case, return [`FetchError::Unavailable`].
    ///
    /// In other cases, return the output handle.
    pub fn run_check_availability<F>(
        &self,
        f: F,
        capture: Capture,
        limits: &RunLimits,
    ) -> Result<Output, FetchError>
    where
        F: FnOnce(&mut Command) -> &mut Command,
    {
        let res = run_command(self.program, f, capture | Capture::STDERR, limits)?;

        let stderr = String::from_utf8_lossy(&res.stderr);
        if is_unavailable(&stderr) {
            Err(FetchError::Unavailable)
        } else {
            Ok(ensure_success(self.program, res)?)
        }
    }
}

impl StreamDownloader for Ytdl {
    fn probe(&self, url: &str, limits: &RunLimits) -> Result<ProbeInfo, FetchError> {
        let res = self.run_check_availability(
            |cmd| {
                cmd.arg("-q")
                    .arg("--no-warnings")
                    .arg("--skip-download")
                    .arg("-j")
                    .arg("--")
                    .arg(url)
            },
            Capture::STDOUT,
            limits,
        )?;

        parse_probe(&String::from_utf8_lossy(&res.stdout))
    }

    fn download(
        &self,
        url: &str,
        selector: FormatSelector,
        template: &Path,
        limits: &RunLimits,
    ) -> Result<EngineInfo, FetchError> {
        let reports_filepath = self.reports_filepath();
        let res = self.run_check_availability(
            |cmd| {
                let cmd = cmd
                    .arg("-q")
                    .arg("--no-warnings")
                    .arg("--no-progress")
                    .arg("--no-continue") // Or else fails when file already exists, even an empty one
                    .args(["-f", &selector.to_string()])
                    .args([OsStr::new("-o"), template.as_os_str()])
                    // Keep the streams as they are, no re-encoding
                    .args(["--postprocessor-args", "ffmpeg:-c:v copy -c:a copy"]);

                if reports_filepath {
                    // `--print` implies a simulation unless told otherwise
                    cmd.args(["--print", "after_move:filepath"])
                        .arg("--no-simulate");
                }

                cmd.arg("--").arg(url)
            },
            Capture::STDOUT,
            limits,
        )?;

        let filepath = if reports_filepath {
            last_line(&String::from_utf8_lossy(&res.stdout)).map(PathBuf::from)
        } else {
            None
        };

        Ok(EngineInfo { filepath })
    }
}

fn is_unavailable(stderr: &str) -> bool {
    stderr
        .lines()
        .any(|line| line.starts_with("ERROR:") && line.to_lowercase().contains("unavailable"))
}

fn last_line(output: &str) -> Option<&str> {
    output.lines().map(str::trim).filter(|l| !l.is_empty()).last()
}

/// Parse the JSON document printed by a metadata probe
pub fn parse_probe(output: &str) -> Result<ProbeInfo, FetchError> {
    // Playlists print one document per line, the first one is the video asked for
    let document = output
        .lines()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| FetchError::invalid_output("empty output"))?;

    let json = serde_json::from_str::<Value>(document)
        .map_err(|err| FetchError::invalid_output(format!("could not parse JSON: {err}")))?;
    let json = json
        .as_object()
        .ok_or_else(|| FetchError::invalid_output("JSON is not an object"))?;

    let get_str = |key: &str| json.get(key).and_then(Value::as_str).map(str::to_owned);

    // Durations are integers for most sites, but floats for some
    let duration = json
        .get("duration")
        .and_then(|d| d.as_u64().or_else(|| d.as_f64().filter(|f| *f >= 0.).map(|f| f as u64)));

    Ok(ProbeInfo {
        id: get_str("id"),
        title: get_str("title"),
        duration,
    })
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn probe_output_is_parsed() {
        let output = indoc! {r#"
            {"id": "abc123", "title": "A title", "duration": 212, "formats": []}
        "#};
        let info = parse_probe(output).unwrap();
        assert_eq!(info.id.as_deref(), Some("abc123"));
        assert_eq!(info.title.as_deref(), Some("A title"));
        assert_eq!(info.duration, Some(212));
    }

    #[test]
    fn float_and_missing_fields_are_tolerated() {
        let info = parse_probe(r#"{"id": "x", "duration": 61.9}"#).unwrap();
        assert_eq!(info.title, None);
        assert_eq!(info.duration, Some(61));

        let info = parse_probe(r#"{"duration": null}"#).unwrap();
        assert_eq!(info, ProbeInfo::default());
    }

    #[test]
    fn garbage_output_is_an_error() {
        assert!(matches!(parse_probe(""), Err(FetchError::InvalidOutput { .. })));
        assert!(matches!(parse_probe("[1, 2]"), Err(FetchError::InvalidOutput { .. })));
        assert!(matches!(parse_probe("nope"), Err(FetchError::InvalidOutput { .. })));
    }

    #[test]
    fn unavailable_streams_are_detected() {
        let stderr = indoc! {"
            WARNING: something harmless
            ERROR: [youtube] abc123: Video unavailable
        "};
        assert!(is_unavailable(stderr));
        assert!(!is_unavailable("ERROR: HTTP Error 403: Forbidden"));
    }

    #[test]
    fn reported_filepath_is_the_last_line() {
        let stdout = "/tmp/ws/abc_video.webm\n\n";
        assert_eq!(last_line(stdout), Some("/tmp/ws/abc_video.webm"));
        assert_eq!(last_line("  \n"), None);
    }
}
