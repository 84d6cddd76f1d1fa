mod common;

use std::{
    fs,
    num::NonZeroU32,
    sync::{atomic::Ordering, Arc},
    time::Instant,
};

use common::{list, orchestrator, Dirs, Failure, FakeEngine, FakeTransformer, BASE_URL, VIDEO_URL};
use regex::Regex;
use rstest::rstest;
use tokio_util::sync::CancellationToken;
use tracing::Span;
use youtube_downloader_api::{
    config::FetchFailurePolicy,
    context::RequestContext,
    outside::RunLimits,
    result::{CommandError, PipelineErrorKind, Stage},
    types::{DownloadRequest, ProbeInfo, StreamKind},
};

fn res(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap()
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

#[test]
fn video_is_merged_and_workspace_removed() {
    let dirs = Dirs::new();
    let settings = dirs.settings(FetchFailurePolicy::ContinueToLocate);
    let engine = Arc::new(FakeEngine::new("My: Clip?"));
    let orch = orchestrator(&settings, engine.clone(), FakeTransformer::default());

    let artifact = orch
        .run(&DownloadRequest::video(VIDEO_URL, res(720)), &RequestContext::detached())
        .unwrap();

    let name = file_name(&artifact.local_path);
    let pattern = Regex::new(r"^My_ Clip__abc123_720p_\d{14}_[0-9a-f]{8}\.mkv$").unwrap();
    assert!(pattern.is_match(&name), "unexpected name {name}");

    assert_eq!(artifact.local_path.parent(), Some(dirs.download_dir().as_path()));
    assert_eq!(fs::read(&artifact.local_path).unwrap(), b"VA");
    assert_eq!(artifact.public_url, format!("{BASE_URL}/{}", name.replace(' ', "%20")));
    assert_eq!(artifact.title, "My: Clip?");
    assert_eq!(artifact.duration_seconds, 42);

    assert!(list(&dirs.temp_dir()).is_empty());
    assert_eq!(list(&dirs.download_dir()), vec![name]);
    // 1 validation probe, 1 metadata probe, 2 stream downloads
    assert_eq!(engine.calls(), 4);
}

#[test]
fn missing_audio_fails_and_keeps_the_workspace() {
    let dirs = Dirs::new();
    let settings = dirs.settings(FetchFailurePolicy::ContinueToLocate);
    let engine = Arc::new(FakeEngine::new("Clip").failing(Failure::Before(StreamKind::Audio)));
    let orch = orchestrator(&settings, engine.clone(), FakeTransformer::default());

    let err = orch
        .run(&DownloadRequest::video(VIDEO_URL, res(480)), &RequestContext::detached())
        .unwrap_err();

    assert_eq!(err.stage, Stage::FetchingStreams);
    assert!(matches!(
        err.kind,
        PipelineErrorKind::MissingArtifact {
            kind: StreamKind::Audio
        }
    ));

    let workspaces = list(&dirs.temp_dir());
    assert_eq!(workspaces.len(), 1);
    assert!(workspaces[0].starts_with("abc123_"));
    assert_eq!(
        list(&dirs.temp_dir().join(&workspaces[0])),
        vec!["abc123_video.webm".to_owned()]
    );
    assert!(list(&dirs.download_dir()).is_empty());
    // Audio was attempted even though nothing came out of it
    assert_eq!(engine.downloads.load(Ordering::SeqCst), 2);
}

#[rstest]
#[case(FetchFailurePolicy::ContinueToLocate, true)]
#[case(FetchFailurePolicy::FailFast, false)]
fn failure_policy_decides_on_files_written_before_an_error(
    #[case] policy: FetchFailurePolicy,
    #[case] succeeds: bool,
) {
    let dirs = Dirs::new();
    let settings = dirs.settings(policy);
    let engine = Arc::new(
        FakeEngine::new("Clip")
            .failing(Failure::After(StreamKind::Video))
            .silent(),
    );
    let orch = orchestrator(&settings, engine, FakeTransformer::default());

    let res = orch.run(&DownloadRequest::video(VIDEO_URL, res(720)), &RequestContext::detached());

    if succeeds {
        let artifact = res.unwrap();
        assert_eq!(fs::read(artifact.local_path).unwrap(), b"VA");
    } else {
        let err = res.unwrap_err();
        assert_eq!(err.stage, Stage::FetchingStreams);
        assert!(matches!(err.kind, PipelineErrorKind::Fetch { .. }));
    }
}

#[rstest]
#[case::video(StreamKind::Video, DownloadRequest::video(VIDEO_URL, res(720)))]
#[case::mp3(StreamKind::Audio, DownloadRequest::audio(VIDEO_URL, true))]
#[case::direct_audio(StreamKind::Audio, DownloadRequest::audio(VIDEO_URL, false))]
fn partial_files_are_never_served(#[case] kind: StreamKind, #[case] request: DownloadRequest) {
    let dirs = Dirs::new();
    let settings = dirs.settings(FetchFailurePolicy::ContinueToLocate);
    let engine = Arc::new(FakeEngine::new("Clip").failing(Failure::Partial(kind)).silent());
    let orch = orchestrator(&settings, engine, FakeTransformer::default());

    let err = orch.run(&request, &RequestContext::detached()).unwrap_err();

    assert_eq!(err.stage, Stage::FetchingStreams);
    assert!(
        matches!(err.kind, PipelineErrorKind::MissingArtifact { kind: k } if k == kind),
        "{err}"
    );
}

#[test]
fn engine_id_never_overrides_the_url_id() {
    let dirs = Dirs::new();
    let settings = dirs.settings(FetchFailurePolicy::ContinueToLocate);
    let mut engine = FakeEngine::new("Clip");
    engine.probe = Some(ProbeInfo {
        id: Some("other".into()),
        title: Some("Clip".into()),
        duration: None,
    });
    let orch = orchestrator(&settings, Arc::new(engine), FakeTransformer::default());

    let artifact = orch
        .run(&DownloadRequest::audio(VIDEO_URL, true), &RequestContext::detached())
        .unwrap();

    assert!(file_name(&artifact.local_path).starts_with("Clip_abc123_mp3_"));
}

#[test]
fn mp3_conversion_leaves_only_the_mp3() {
    let dirs = Dirs::new();
    let settings = dirs.settings(FetchFailurePolicy::ContinueToLocate);
    let orch = orchestrator(&settings, Arc::new(FakeEngine::new("Song")), FakeTransformer::default());

    let artifact = orch
        .run(&DownloadRequest::audio(VIDEO_URL, true), &RequestContext::detached())
        .unwrap();

    let name = file_name(&artifact.local_path);
    let pattern = Regex::new(r"^Song_abc123_mp3_\d{14}_[0-9a-f]{8}\.mp3$").unwrap();
    assert!(pattern.is_match(&name), "unexpected name {name}");
    assert_eq!(fs::read(&artifact.local_path).unwrap(), b"MP3:A");
    assert_eq!(list(&dirs.download_dir()), vec![name]);
    assert!(list(&dirs.temp_dir()).is_empty());
}

#[rstest]
#[case::reported(false)]
#[case::searched(true)]
fn direct_audio_keeps_the_engine_container(#[case] silent: bool) {
    let dirs = Dirs::new();
    let settings = dirs.settings(FetchFailurePolicy::ContinueToLocate);
    let mut engine = FakeEngine::new("Song");
    engine.audio_ext = "opus";
    if silent {
        engine = engine.silent();
    }
    let orch = orchestrator(&settings, Arc::new(engine), FakeTransformer::default());

    let artifact = orch
        .run(&DownloadRequest::audio(VIDEO_URL, false), &RequestContext::detached())
        .unwrap();

    let name = file_name(&artifact.local_path);
    let pattern = Regex::new(r"^Song_abc123_audio_\d{14}_[0-9a-f]{8}\.opus$").unwrap();
    assert!(pattern.is_match(&name), "unexpected name {name}");
    assert_eq!(artifact.local_path.parent(), Some(dirs.download_dir().as_path()));
    assert!(list(&dirs.temp_dir()).is_empty());
}

#[test]
fn unrelated_url_never_reaches_the_engine() {
    let dirs = Dirs::new();
    let settings = dirs.settings(FetchFailurePolicy::ContinueToLocate);
    let engine = Arc::new(FakeEngine::new("Clip"));
    let orch = orchestrator(&settings, engine.clone(), FakeTransformer::default());

    let err = orch
        .run(
            &DownloadRequest::video("https://example.com/page", res(720)),
            &RequestContext::detached(),
        )
        .unwrap_err();

    assert_eq!(err.stage, Stage::Validating);
    assert!(matches!(err.kind, PipelineErrorKind::UnrecognizedUrl));
    assert_eq!(engine.calls(), 0);
}

#[test]
fn unavailable_video_fails_validation() {
    let dirs = Dirs::new();
    let settings = dirs.settings(FetchFailurePolicy::ContinueToLocate);
    let engine = Arc::new(FakeEngine::unavailable());
    let orch = orchestrator(&settings, engine.clone(), FakeTransformer::default());

    let err = orch
        .run(&DownloadRequest::audio(VIDEO_URL, true), &RequestContext::detached())
        .unwrap_err();

    assert!(matches!(err.kind, PipelineErrorKind::ValidationFailed));
    assert_eq!(engine.downloads.load(Ordering::SeqCst), 0);
}

#[test]
fn placeholder_title_when_the_engine_reports_none() {
    let dirs = Dirs::new();
    let settings = dirs.settings(FetchFailurePolicy::ContinueToLocate);
    let mut engine = FakeEngine::new("");
    engine.probe = Some(Default::default());
    let orch = orchestrator(&settings, Arc::new(engine), FakeTransformer::default());

    let artifact = orch
        .run(&DownloadRequest::video(VIDEO_URL, res(360)), &RequestContext::detached())
        .unwrap();

    assert_eq!(artifact.title, "video");
    assert_eq!(artifact.duration_seconds, 0);
    assert!(file_name(&artifact.local_path).starts_with("video_abc123_360p_"));
}

#[test]
fn merge_failure_keeps_the_streams() {
    let dirs = Dirs::new();
    let settings = dirs.settings(FetchFailurePolicy::ContinueToLocate);
    let orch = orchestrator(
        &settings,
        Arc::new(FakeEngine::new("Clip")),
        FakeTransformer { fail: true },
    );

    let err = orch
        .run(&DownloadRequest::video(VIDEO_URL, res(720)), &RequestContext::detached())
        .unwrap_err();

    assert_eq!(err.stage, Stage::Merging);
    assert!(matches!(err.kind, PipelineErrorKind::Merge { .. }));
    let workspaces = list(&dirs.temp_dir());
    assert_eq!(workspaces.len(), 1);
    assert_eq!(
        list(&dirs.temp_dir().join(&workspaces[0])),
        vec!["abc123_audio.m4a".to_owned(), "abc123_video.webm".to_owned()]
    );
}

#[test]
fn cancelled_request_is_interrupted() {
    let dirs = Dirs::new();
    let settings = dirs.settings(FetchFailurePolicy::ContinueToLocate);
    let engine = Arc::new(FakeEngine::new("Clip"));
    let orch = orchestrator(&settings, engine.clone(), FakeTransformer::default());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let ctx = RequestContext::new(Span::none(), RunLimits::new(None, cancel));

    let err = orch
        .run(&DownloadRequest::video(VIDEO_URL, res(720)), &ctx)
        .unwrap_err();

    assert_eq!(err.stage, Stage::Validating);
    assert!(matches!(
        err.kind,
        PipelineErrorKind::Interrupted {
            source: CommandError::Cancelled { .. }
        }
    ));
    assert_eq!(engine.downloads.load(Ordering::SeqCst), 0);
}

#[test]
fn expired_deadline_is_interrupted() {
    let dirs = Dirs::new();
    let settings = dirs.settings(FetchFailurePolicy::ContinueToLocate);
    let orch = orchestrator(&settings, Arc::new(FakeEngine::new("Clip")), FakeTransformer::default());

    let ctx = RequestContext::new(
        Span::none(),
        RunLimits::new(Some(Instant::now()), CancellationToken::new()),
    );

    let err = orch
        .run(&DownloadRequest::audio(VIDEO_URL, false), &ctx)
        .unwrap_err();

    assert!(matches!(
        err.kind,
        PipelineErrorKind::Interrupted {
            source: CommandError::TimedOut { .. }
        }
    ));
}

#[test]
fn concurrent_requests_for_the_same_video_do_not_collide() {
    let dirs = Dirs::new();
    let settings = dirs.settings(FetchFailurePolicy::ContinueToLocate);
    let orch = Arc::new(orchestrator(
        &settings,
        Arc::new(FakeEngine::new("Clip")),
        FakeTransformer::default(),
    ));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let orch = orch.clone();
            std::thread::spawn(move || {
                orch.run(&DownloadRequest::video(VIDEO_URL, res(720)), &RequestContext::detached())
            })
        })
        .collect();

    let mut paths: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().unwrap().local_path)
        .collect();
    paths.sort();
    paths.dedup();

    assert_eq!(paths.len(), 4);
    for path in &paths {
        assert_eq!(fs::read(path).unwrap(), b"VA");
    }
    assert!(list(&dirs.temp_dir()).is_empty());
}
