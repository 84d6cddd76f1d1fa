#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use time::UtcOffset;
use youtube_downloader_api::{
    config::{DownloaderSettings, FetchFailurePolicy},
    io::FilenameGenerator,
    orchestrator::Orchestrator,
    outside::{RunLimits, StreamDownloader, StreamTransformer},
    result::{CommandError, FetchError},
    types::{AudioCodec, EngineInfo, FormatSelector, ProbeInfo, StreamKind, EXT_PLACEHOLDER},
};

pub const VIDEO_URL: &str = "https://www.youtube.com/watch?v=abc123";
pub const BASE_URL: &str = "http://localhost:5000/media";

/// When the fake engine reports a stream download as failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    None,
    /// Fails without writing anything
    Before(StreamKind),
    /// Writes the file, then reports an error
    After(StreamKind),
    /// Leaves a `.part` file behind, then reports an error
    Partial(StreamKind),
}

/// Extraction engine double writing small files where the template says.
#[derive(Debug)]
pub struct FakeEngine {
    pub probe: Option<ProbeInfo>,
    pub video_ext: &'static str,
    pub audio_ext: &'static str,
    pub failure: Failure,
    pub report_path: bool,
    pub probes: AtomicUsize,
    pub downloads: AtomicUsize,
}

impl FakeEngine {
    pub fn new(title: &str) -> Self {
        Self {
            probe: Some(ProbeInfo {
                id: Some("abc123".into()),
                title: Some(title.into()),
                duration: Some(42),
            }),
            video_ext: "webm",
            audio_ext: "m4a",
            failure: Failure::None,
            report_path: true,
            probes: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
        }
    }

    /// Every probe fails, as for a removed video
    pub fn unavailable() -> Self {
        Self {
            probe: None,
            ..Self::new("")
        }
    }

    pub fn failing(mut self, failure: Failure) -> Self {
        self.failure = failure;
        self
    }

    pub fn silent(mut self) -> Self {
        self.report_path = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.probes.load(Ordering::SeqCst) + self.downloads.load(Ordering::SeqCst)
    }
}

impl StreamDownloader for FakeEngine {
    fn probe(&self, _url: &str, limits: &RunLimits) -> Result<ProbeInfo, FetchError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        limits.check("fake-dl")?;
        self.probe.clone().ok_or(FetchError::Unavailable)
    }

    fn download(
        &self,
        _url: &str,
        selector: FormatSelector,
        template: &Path,
        limits: &RunLimits,
    ) -> Result<EngineInfo, FetchError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        limits.check("fake-dl")?;

        let kind = selector.kind();
        if self.failure == Failure::Before(kind) {
            return Err(FetchError::invalid_output("no stream"));
        }

        let ext = match kind {
            StreamKind::Video => self.video_ext,
            StreamKind::Audio => self.audio_ext,
        };
        let path = materialize(template, ext);
        if self.failure == Failure::Partial(kind) {
            let mut partial = path.into_os_string();
            partial.push(".part");
            fs::write(partial, "half").unwrap();
            return Err(FetchError::invalid_output("interrupted"));
        }

        let content = match kind {
            StreamKind::Video => "V",
            StreamKind::Audio => "A",
        };
        fs::write(&path, content).unwrap();

        if self.failure == Failure::After(kind) {
            return Err(FetchError::invalid_output("postprocessing failed"));
        }

        Ok(EngineInfo {
            filepath: self.report_path.then_some(path),
        })
    }
}

/// Path the engine would write for `template` once it knows the extension
pub fn materialize(template: &Path, ext: &str) -> PathBuf {
    let template = template.to_string_lossy();
    let stem = template
        .strip_suffix(EXT_PLACEHOLDER)
        .expect("template ends with the extension placeholder");
    PathBuf::from(format!("{}{ext}", stem.replace("%%", "%")))
}

/// Transcoding engine double concatenating its inputs
#[derive(Debug, Default)]
pub struct FakeTransformer {
    pub fail: bool,
}

impl StreamTransformer for FakeTransformer {
    fn copy_streams(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        limits: &RunLimits,
    ) -> Result<(), CommandError> {
        limits.check("fake-ffmpeg")?;
        if self.fail {
            return Err(engine_crash());
        }
        let mut data = fs::read(video).unwrap();
        data.extend(fs::read(audio).unwrap());
        fs::write(output, data).unwrap();
        Ok(())
    }

    fn encode_audio(
        &self,
        input: &Path,
        output: &Path,
        _codec: AudioCodec,
        limits: &RunLimits,
    ) -> Result<(), CommandError> {
        limits.check("fake-ffmpeg")?;
        if self.fail {
            return Err(engine_crash());
        }
        fs::write(output, [b"MP3:".as_slice(), &fs::read(input).unwrap()].concat()).unwrap();
        Ok(())
    }
}

fn engine_crash() -> CommandError {
    CommandError::Io {
        program: "fake-ffmpeg".into(),
        source: std::io::Error::other("crashed"),
    }
}

/// Download and temp directories living as long as the test
pub struct Dirs {
    pub root: tempfile::TempDir,
}

impl Dirs {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
        }
    }

    pub fn download_dir(&self) -> PathBuf {
        self.root.path().join("downloads")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.path().join("temp")
    }

    pub fn static_dir(&self) -> PathBuf {
        self.root.path().join("static")
    }

    pub fn settings(&self, policy: FetchFailurePolicy) -> DownloaderSettings {
        fs::create_dir_all(self.download_dir()).unwrap();
        fs::create_dir_all(self.temp_dir()).unwrap();
        let mut settings = DownloaderSettings::new(self.download_dir(), self.temp_dir(), BASE_URL);
        settings.fetch_failure_policy = policy;
        settings
    }
}

pub fn orchestrator(
    settings: &DownloaderSettings,
    engine: Arc<FakeEngine>,
    transformer: FakeTransformer,
) -> Orchestrator {
    Orchestrator::new(
        settings,
        engine,
        Arc::new(transformer),
        FilenameGenerator::new(UtcOffset::UTC),
    )
}

/// Names of the entries of `dir`, sorted
pub fn list(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
