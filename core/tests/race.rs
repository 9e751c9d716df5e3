mod common;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{init_logging, png_magic_input, Script, ScriptedBackend};
use image_arbiter::{
    arbitrate, race, BackendId, CompressError, CompressOptions, ContainerType, NoopSink, RaceEvent, Registry,
};

#[tokio::test]
async fn one_attempt_per_backend_in_dispatch_order() {
    init_logging();
    let registry = Registry::new()
        .with(ScriptedBackend::new(BackendId::Codec, Script::Size(40)).delayed(30))
        .with(ScriptedBackend::new(BackendId::Optimizer, Script::Size(20)).delayed(1))
        .with(ScriptedBackend::new(BackendId::Pixel, Script::Size(30)).delayed(10));
    let order = [BackendId::Codec, BackendId::Optimizer, BackendId::Pixel];

    let attempts = race(&registry, png_magic_input(), &CompressOptions::default(), &order, &NoopSink)
        .await
        .unwrap();

    let ids: Vec<_> = attempts.iter().map(|a| a.backend()).collect();
    assert_eq!(ids, order);
    assert!(attempts.iter().all(|a| a.is_success() && a.size() == a.bytes().len()));
}

#[tokio::test(start_paused = true)]
async fn backends_run_concurrently() {
    let registry = Registry::new()
        .with(ScriptedBackend::new(BackendId::Codec, Script::Size(10)).delayed(1000))
        .with(ScriptedBackend::new(BackendId::Optimizer, Script::Size(10)).delayed(1000))
        .with(ScriptedBackend::new(BackendId::Pixel, Script::Size(10)).delayed(1000));
    let order = [BackendId::Codec, BackendId::Optimizer, BackendId::Pixel];

    let started = tokio::time::Instant::now();
    let attempts = race(&registry, png_magic_input(), &CompressOptions::default(), &order, &NoopSink)
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_millis(2000));
    for attempt in &attempts {
        assert!(attempt.duration_ms() >= 1000, "{} took {}ms", attempt.backend(), attempt.duration_ms());
    }
}

#[tokio::test]
async fn failures_are_isolated() {
    init_logging();
    let input = png_magic_input();
    let registry = Registry::new()
        .with(ScriptedBackend::new(BackendId::Codec, Script::Panic))
        .with(ScriptedBackend::new(BackendId::Optimizer, Script::Fail("quantizer exploded")))
        .with(ScriptedBackend::new(BackendId::Pixel, Script::Empty))
        .with(ScriptedBackend::new(BackendId::Tinify, Script::Size(12)));
    let order = [BackendId::Codec, BackendId::Optimizer, BackendId::Pixel, BackendId::Tinify];

    let attempts = race(&registry, input.clone(), &CompressOptions::default(), &order, &NoopSink)
        .await
        .unwrap();

    assert_eq!(attempts.len(), 4);
    for failed in &attempts[..3] {
        assert!(!failed.is_success());
        assert_eq!(failed.bytes(), &input);
        assert!(!failed.error().unwrap_or_default().is_empty());
    }
    assert!(attempts[0].error().unwrap().contains("task failed"));
    assert!(attempts[1].error().unwrap().contains("quantizer exploded"));
    assert!(attempts[2].error().unwrap().contains("empty"));
    assert!(attempts[3].is_success());
    assert_eq!(arbitrate(&attempts, &input, 0.6).backend(), BackendId::Tinify);
}

#[tokio::test]
async fn unavailable_and_unregistered_backends_fail_without_invocation() {
    let input = png_magic_input();
    let broken = ScriptedBackend::new(BackendId::Pixel, Script::Size(1)).unavailable();
    let calls = broken.counter();
    let registry = Registry::new()
        .with(broken)
        .with(ScriptedBackend::new(BackendId::Codec, Script::Size(50)));

    let attempts = race(
        &registry,
        input.clone(),
        &CompressOptions::default(),
        &[BackendId::Pixel, BackendId::Tinify, BackendId::Codec],
        &NoopSink,
    )
    .await
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(attempts[0].error().unwrap().contains("library not installed"));
    assert!(attempts[1].error().unwrap().contains("not registered"));
    assert_eq!(attempts[1].bytes(), &input);
    assert!(attempts[2].is_success());
}

#[tokio::test]
async fn metadata_filter_fails_before_dispatch() {
    let remote = ScriptedBackend::new(BackendId::Tinify, Script::Size(1)).without_metadata();
    let calls = remote.counter();
    let registry = Registry::new().with(remote);
    let options = CompressOptions {
        preserve_metadata: true,
        ..CompressOptions::default()
    };

    let err = race(&registry, png_magic_input(), &options, &[BackendId::Tinify], &NoopSink)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CompressError::NoCapableBackend {
            container: ContainerType::Png
        }
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn metadata_filter_keeps_capable_in_order() {
    let remote = ScriptedBackend::new(BackendId::Tinify, Script::Size(1)).without_metadata();
    let remote_calls = remote.counter();
    let registry = Registry::new()
        .with(remote)
        .with(ScriptedBackend::new(BackendId::Optimizer, Script::Size(30)))
        .with(ScriptedBackend::new(BackendId::Codec, Script::Size(30)));
    let options = CompressOptions {
        preserve_metadata: true,
        ..CompressOptions::default()
    };
    let events = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&events);
    let sink = move |event: &RaceEvent| recorded.lock().unwrap().push(event.clone());

    let attempts = race(
        &registry,
        png_magic_input(),
        &options,
        &[BackendId::Optimizer, BackendId::Tinify, BackendId::Codec],
        &sink,
    )
    .await
    .unwrap();

    assert_eq!(remote_calls.load(Ordering::SeqCst), 0);
    let ids: Vec<_> = attempts.iter().map(|a| a.backend()).collect();
    assert_eq!(ids, vec![BackendId::Optimizer, BackendId::Codec]);

    let events = events.lock().unwrap();
    assert_eq!(
        events[0],
        RaceEvent::CandidatesFiltered {
            kept: vec![BackendId::Optimizer, BackendId::Codec]
        }
    );
    assert_eq!(events.len(), 3);
}

#[tokio::test]
async fn tie_is_resolved_by_dispatch_not_completion() {
    let input = png_magic_input();
    let registry = Registry::new()
        .with(ScriptedBackend::new(BackendId::Codec, Script::Size(25)).delayed(40))
        .with(ScriptedBackend::new(BackendId::Optimizer, Script::Size(25)));

    for _ in 0..5 {
        let attempts = race(
            &registry,
            input.clone(),
            &CompressOptions::default(),
            &[BackendId::Codec, BackendId::Optimizer],
            &NoopSink,
        )
        .await
        .unwrap();
        assert_eq!(arbitrate(&attempts, &input, 0.6).backend(), BackendId::Codec);
    }
}

#[tokio::test]
async fn empty_backend_list_is_rejected() {
    let registry = Registry::new().with(ScriptedBackend::new(BackendId::Codec, Script::Size(3)));

    let err = race(&registry, png_magic_input(), &CompressOptions::default(), &[], &NoopSink)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CompressError::NoCapableBackend {
            container: ContainerType::Png
        }
    ));
}
