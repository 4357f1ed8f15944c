use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;

use super::activity_log::Severity;
use super::fallback::BridgeClient;
use super::instance_pool::InstancePool;
use super::metadata::ResolvedMetadata;
use super::models::{
    AppError, AppResult, AttemptOutcome, Delivery, DeliveryMode, HandoffReceipt, SessionState,
    VideoQuality,
};
use super::orchestrator::{CancelHandle, DownloadOutcome, Orchestrator, OrchestratorSettings};
use super::swarm::{SwarmRequest, SwarmTransport, TransportResponse};
use super::test_support::*;

struct Harness {
    orchestrator: Orchestrator,
    transport: Arc<ScriptedTransport>,
    resolver: Arc<RecordingResolver>,
    handoff: Arc<RecordingHandoff>,
}

fn harness_with(
    urls: Vec<String>,
    transport: ScriptedTransport,
    settings: OrchestratorSettings,
    seed: u64,
) -> Harness {
    let transport = Arc::new(transport);
    let resolver = Arc::new(RecordingResolver::titled("Sample"));
    let handoff = Arc::new(RecordingHandoff::default());
    let orchestrator = Orchestrator::new(
        InstancePool::new(urls),
        transport.clone(),
        resolver.clone(),
        settings,
    )
    .with_handoff(handoff.clone())
    .with_rng(StdRng::seed_from_u64(seed));

    Harness {
        orchestrator,
        transport,
        resolver,
        handoff,
    }
}

fn harness(n: usize, scripts: Vec<NodeScript>) -> Harness {
    harness_with(
        endpoints(n),
        ScriptedTransport::by_order(scripts),
        OrchestratorSettings::default(),
        7,
    )
}

async fn ready(h: &mut Harness, quality: VideoQuality) {
    h.orchestrator.select_quality(quality).unwrap();
    h.orchestrator.analyze(SAMPLE_URL).await.unwrap();
    assert_eq!(h.orchestrator.session().state(), SessionState::Ready);
}

#[tokio::test]
async fn test_third_node_serves_after_two_failures() {
    let mut h = harness(
        3,
        vec![
            NodeScript::failing(500),
            NodeScript::failing(500),
            NodeScript::serving("https://cdn/x.mp4"),
        ],
    );
    ready(&mut h, VideoQuality::Q1080).await;

    let outcome = h.orchestrator.download().await.unwrap();

    assert_eq!(h.orchestrator.session().state(), SessionState::Completed);
    assert_eq!(h.orchestrator.session().progress(), 100);
    assert_eq!(h.transport.contacted().len(), 3);
    assert_eq!(h.handoff.urls(), vec!["https://cdn/x.mp4".to_string()]);
    match outcome {
        DownloadOutcome::Completed {
            mode: DeliveryMode::Swarm,
            delivery: Delivery::Link { download_url, .. },
        } => assert_eq!(download_url, "https://cdn/x.mp4"),
        other => panic!("unexpected outcome: {:?}", other),
    }

    let attempts = h.orchestrator.session().attempts();
    assert_eq!(attempts.len(), 3);
    assert_eq!(attempts.iter().filter(|a| a.outcome.is_success()).count(), 1);
    assert!(attempts[2].outcome.is_success());
}

#[tokio::test]
async fn test_success_short_circuits_traversal() {
    let mut h = harness(5, vec![NodeScript::serving("https://cdn/first.mp4")]);
    ready(&mut h, VideoQuality::Q720).await;

    h.orchestrator.download().await.unwrap();

    assert_eq!(h.transport.calls().len(), 1);
    assert_eq!(h.transport.contacted().len(), 1);
    assert!(h.orchestrator.session().log().contains("[success] Tunnel established via"));
    assert!(h.orchestrator.session().log().contains("[done]"));
}

#[tokio::test]
async fn test_safe_mode_used_when_primary_refused() {
    let mut h = harness(
        2,
        vec![NodeScript::new(
            Reply::status(400),
            Reply::link("https://cdn/safe.mp4"),
        )],
    );
    ready(&mut h, VideoQuality::Q4K).await;

    h.orchestrator.download().await.unwrap();

    let calls = h.transport.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].request.v_quality, "max");
    assert!(!calls[0].request.disable_metadata);
    assert_eq!(calls[1].request.v_quality, "720");
    assert!(calls[1].request.disable_metadata);
    assert_eq!(calls[0].endpoint, calls[1].endpoint);

    let attempt = &h.orchestrator.session().attempts()[0];
    assert!(attempt.used_safe_mode);
    assert!(h.orchestrator.session().log().contains("(Safe Mode)"));
}

#[tokio::test]
async fn test_no_safe_mode_for_degraded_tiers() {
    for quality in [VideoQuality::Audio, VideoQuality::Q480] {
        let mut h = harness(3, vec![]);
        ready(&mut h, quality).await;

        let _ = h.orchestrator.download().await;

        assert_eq!(h.transport.safe_mode_calls(), 0, "{} used safe mode", quality);
        assert_eq!(h.transport.calls().len(), 3);
    }
}

#[tokio::test]
async fn test_safe_mode_at_most_once_per_endpoint() {
    let mut h = harness(4, vec![]);
    ready(&mut h, VideoQuality::Q1080).await;

    let _ = h.orchestrator.download().await;

    let calls = h.transport.calls();
    assert_eq!(calls.len(), 8);
    let mut per_endpoint: HashMap<String, usize> = HashMap::new();
    for call in calls.iter().filter(|c| c.request.is_safe_mode()) {
        *per_endpoint.entry(call.endpoint.clone()).or_default() += 1;
    }
    assert_eq!(per_endpoint.len(), 4);
    assert!(per_endpoint.values().all(|&n| n == 1));
}

#[tokio::test]
async fn test_no_safe_mode_after_network_failure() {
    let mut h = harness(
        2,
        vec![
            NodeScript::new(Reply::Network, Reply::link("https://cdn/never.mp4")),
            NodeScript::serving("https://cdn/x.mp4"),
        ],
    );
    ready(&mut h, VideoQuality::Q1080).await;

    h.orchestrator.download().await.unwrap();

    assert_eq!(h.transport.safe_mode_calls(), 0);
    assert!(matches!(
        h.orchestrator.session().attempts()[0].outcome,
        AttemptOutcome::NetworkFailure { .. }
    ));
}

#[tokio::test]
async fn test_error_replies_and_empty_replies_advance() {
    let mut h = harness(
        3,
        vec![
            NodeScript::new(
                Reply::Json(200, serde_json::json!({"status": "error", "text": "rate limited"})),
                Reply::status(500),
            ),
            NodeScript::new(Reply::Json(200, serde_json::json!({})), Reply::status(500)),
            NodeScript::new(Reply::Raw(200, "<html>".into()), Reply::status(500)),
        ],
    );
    ready(&mut h, VideoQuality::Q1080).await;

    let outcome = h.orchestrator.download().await.unwrap();

    assert!(matches!(outcome, DownloadOutcome::FallbackOffered { .. }));
    assert_eq!(h.transport.contacted().len(), 3);
    // 200 replies are not refusals, so no safe mode
    assert_eq!(h.transport.safe_mode_calls(), 0);
    assert!(h.orchestrator.session().log().contains("rate limited"));
}

#[tokio::test]
async fn test_traversal_is_a_permutation_of_the_pool() {
    for seed in 0..10 {
        let urls = endpoints(6);
        let mut h = harness_with(
            urls.clone(),
            ScriptedTransport::by_order(vec![]),
            OrchestratorSettings::default(),
            seed,
        );
        ready(&mut h, VideoQuality::Audio).await;
        let _ = h.orchestrator.download().await;

        let contacted = h.transport.contacted();
        assert_eq!(contacted.len(), urls.len());
        let unique: HashSet<_> = contacted.iter().cloned().collect();
        let expected: HashSet<_> = urls.into_iter().collect();
        assert_eq!(unique, expected);
    }
}

#[tokio::test]
async fn test_exhaustion_offers_fallback() {
    let mut h = harness(3, vec![]);
    ready(&mut h, VideoQuality::Q720).await;

    let outcome = h.orchestrator.download().await.unwrap();

    let session = h.orchestrator.session();
    assert_eq!(session.state(), SessionState::FallbackOffered);
    assert_eq!(session.progress(), 0);
    assert_eq!(session.mode(), DeliveryMode::Cli);
    assert!(session.log().contains("[fatal] All 3 nodes failed."));
    assert!(h.handoff.urls().is_empty());

    match outcome {
        DownloadOutcome::FallbackOffered { command, cause } => {
            assert_eq!(command.url, SAMPLE_URL);
            assert_eq!(cause, "All 3 nodes failed");
            assert_eq!(session.fallback_command(), Some(command.to_string().as_str()));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_exhaustion_without_fallback_is_an_error() {
    let settings = OrchestratorSettings {
        offer_fallback: false,
        ..OrchestratorSettings::default()
    };
    let mut h = harness_with(endpoints(3), ScriptedTransport::by_order(vec![]), settings, 1);
    ready(&mut h, VideoQuality::Q1080).await;

    let err = h.orchestrator.download().await.unwrap_err();

    assert!(matches!(err, AppError::ExhaustionFailure { pool_size: 3 }));
    let session = h.orchestrator.session();
    assert_eq!(session.state(), SessionState::Error);
    assert_eq!(session.progress(), 0);
    assert_eq!(session.state().exit_code(), 1);

    let entries = session.log().entries();
    let fatal = entries
        .iter()
        .position(|e| e.message == "[fatal] All 3 nodes failed.")
        .unwrap();
    assert_eq!(entries[fatal].severity, Severity::Error);
}

#[tokio::test]
async fn test_retry_from_error_runs_a_fresh_cycle() {
    let settings = OrchestratorSettings {
        offer_fallback: false,
        ..OrchestratorSettings::default()
    };
    let mut scripts = HashMap::new();
    scripts.insert(endpoints(1)[0].clone(), NodeScript::failing(503));
    let mut h = harness_with(endpoints(1), ScriptedTransport::by_endpoint(scripts), settings, 3);
    ready(&mut h, VideoQuality::Q1080).await;

    assert!(h.orchestrator.download().await.is_err());
    assert!(h.orchestrator.download().await.is_err());

    assert_eq!(h.orchestrator.session().attempts().len(), 1);
    assert_eq!(h.transport.calls().len(), 4);
}

#[tokio::test]
async fn test_malformed_endpoint_is_skipped() {
    let good = "https://good.test/api/json".to_string();
    let mut scripts = HashMap::new();
    scripts.insert(good.clone(), NodeScript::failing(503));

    // Whatever the shuffle order, the malformed entry is skipped and the good one is tried
    for seed in 0..8 {
        let urls = vec!["not a url".to_string(), good.clone()];
        let mut h = harness_with(
            urls,
            ScriptedTransport::by_endpoint(scripts.clone()),
            OrchestratorSettings::default(),
            seed,
        );
        ready(&mut h, VideoQuality::Q1080).await;

        let outcome = h.orchestrator.download().await.unwrap();

        let session = h.orchestrator.session();
        assert!(matches!(outcome, DownloadOutcome::FallbackOffered { .. }));
        assert_eq!(session.state(), SessionState::FallbackOffered);
        assert_eq!(h.transport.contacted(), vec![good.clone()]);
        assert_eq!(session.attempts().len(), 1);
        assert!(session.log().contains("malformed node address"));
        assert!(session.log().contains("[fatal] All 2 nodes failed."));
    }
}

#[tokio::test]
async fn test_invalid_url_makes_no_network_call() {
    let mut h = harness(3, vec![]);

    let err = h
        .orchestrator
        .analyze("https://example.com/not-a-video")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidUrl(_)));
    let session = h.orchestrator.session();
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.log().len(), 1);
    assert_eq!(session.log().count(Severity::Error), 1);
    assert_eq!(session.log().entries()[0].message, "Invalid YouTube URL format detected");
    assert_eq!(h.resolver.calls(), 0);
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn test_analysis_builds_metadata() {
    let mut h = harness(1, vec![]);

    let metadata = h.orchestrator.analyze(SAMPLE_URL).await.unwrap();

    assert_eq!(metadata.id, SAMPLE_ID);
    assert_eq!(
        metadata.thumbnail_url,
        "https://img.youtube.com/vi/dQw4w9WgXcQ/maxresdefault.jpg"
    );
    assert_eq!(metadata.title.as_deref(), Some("Sample"));
    assert_eq!(h.resolver.calls(), 1);
    assert!(h.orchestrator.session().log().contains("Resolving video ID: dQw4w9WgXcQ"));
    assert!(h.orchestrator.session().log().contains("Metadata extraction complete"));
}

#[tokio::test]
async fn test_unavailable_metadata_does_not_block() {
    let transport = Arc::new(ScriptedTransport::by_order(vec![]));
    let mut orchestrator = Orchestrator::new(
        InstancePool::new(endpoints(1)),
        transport,
        Arc::new(RecordingResolver::new(ResolvedMetadata::unavailable())),
        OrchestratorSettings::default(),
    );

    let metadata = orchestrator.analyze(SAMPLE_URL).await.unwrap();

    assert_eq!(metadata.title.as_deref(), Some("unavailable"));
    assert!(metadata.tags.is_empty());
    assert_eq!(orchestrator.session().state(), SessionState::Ready);
    assert_eq!(orchestrator.session().log().count(Severity::Warning), 1);
}

#[tokio::test]
async fn test_stalled_endpoint_times_out() {
    let settings = OrchestratorSettings {
        request_timeout: Duration::from_millis(50),
        ..OrchestratorSettings::default()
    };
    let mut h = harness_with(
        endpoints(2),
        ScriptedTransport::by_order(vec![
            NodeScript::new(Reply::Stall, Reply::Stall),
            NodeScript::serving("https://cdn/x.mp4"),
        ]),
        settings,
        5,
    );
    ready(&mut h, VideoQuality::Q1080).await;

    h.orchestrator.download().await.unwrap();

    let attempts = h.orchestrator.session().attempts();
    assert_eq!(attempts[0].outcome, AttemptOutcome::Timeout);
    assert!(attempts[1].outcome.is_success());
    assert_eq!(h.transport.calls()[0].timeout, Duration::from_millis(50));
}

#[tokio::test]
async fn test_transport_timeout_is_recorded_as_timeout() {
    let mut h = harness(
        2,
        vec![
            NodeScript::new(Reply::Timeout, Reply::status(500)),
            NodeScript::serving("https://cdn/x.mp4"),
        ],
    );
    ready(&mut h, VideoQuality::Q1080).await;

    h.orchestrator.download().await.unwrap();

    assert_eq!(
        h.orchestrator.session().attempts()[0].outcome,
        AttemptOutcome::Timeout
    );
}

#[tokio::test]
async fn test_handoff_failure_keeps_completed() {
    let transport = Arc::new(ScriptedTransport::by_order(vec![NodeScript::serving(
        "https://cdn/x.mp4",
    )]));
    let mut orchestrator = Orchestrator::new(
        InstancePool::new(endpoints(1)),
        transport,
        Arc::new(RecordingResolver::titled("Sample")),
        OrchestratorSettings::default(),
    )
    .with_handoff(Arc::new(RecordingHandoff::failing()));
    orchestrator.analyze(SAMPLE_URL).await.unwrap();

    let outcome = orchestrator.download().await.unwrap();

    assert_eq!(orchestrator.session().state(), SessionState::Completed);
    assert!(orchestrator.session().log().contains("Hand-off failed"));
    assert_eq!(
        outcome,
        DownloadOutcome::Completed {
            mode: DeliveryMode::Swarm,
            delivery: Delivery::Link {
                download_url: "https://cdn/x.mp4".into(),
                receipt: None
            }
        }
    );
}

#[tokio::test]
async fn test_receipt_recorded_on_session() {
    let mut h = harness(1, vec![NodeScript::serving("https://cdn/x.mp4")]);
    ready(&mut h, VideoQuality::Q1080).await;

    h.orchestrator.download().await.unwrap();

    assert_eq!(
        h.orchestrator.session().delivery(),
        Some(&Delivery::Link {
            download_url: "https://cdn/x.mp4".into(),
            receipt: Some(HandoffReceipt::Announced {
                url: "https://cdn/x.mp4".into()
            })
        })
    );
}

/// Cancels the shared handle as soon as the first endpoint is contacted
struct CancellingTransport {
    inner: ScriptedTransport,
    handle: std::sync::Mutex<Option<CancelHandle>>,
}

#[async_trait]
impl SwarmTransport for CancellingTransport {
    async fn post_json(
        &self,
        endpoint: &Url,
        request: &SwarmRequest,
        timeout: Duration,
    ) -> AppResult<TransportResponse> {
        if let Some(handle) = self.handle.lock().unwrap().as_ref() {
            handle.cancel();
        }
        self.inner.post_json(endpoint, request, timeout).await
    }
}

#[tokio::test]
async fn test_cancellation_checked_before_next_endpoint() {
    let transport = Arc::new(CancellingTransport {
        inner: ScriptedTransport::by_order(vec![]),
        handle: std::sync::Mutex::new(None),
    });
    let mut orchestrator = Orchestrator::new(
        InstancePool::new(endpoints(5)),
        transport.clone(),
        Arc::new(RecordingResolver::titled("Sample")),
        OrchestratorSettings::default(),
    );
    *transport.handle.lock().unwrap() = Some(orchestrator.cancel_handle());
    orchestrator.analyze(SAMPLE_URL).await.unwrap();

    let err = orchestrator.download().await.unwrap_err();

    assert!(matches!(err, AppError::Cancelled));
    assert_eq!(orchestrator.session().state(), SessionState::Error);
    assert_eq!(transport.inner.contacted().len(), 1);
    assert!(orchestrator.session().log().contains("[abort]"));
}

#[tokio::test]
async fn test_cancel_during_analysis_stops_the_download() {
    let mut h = harness(3, vec![NodeScript::serving("https://cdn/x.mp4")]);
    ready(&mut h, VideoQuality::Q1080).await;
    h.orchestrator.cancel_handle().cancel();

    let err = h.orchestrator.download().await.unwrap_err();

    assert!(matches!(err, AppError::Cancelled));
    assert_eq!(h.orchestrator.session().state(), SessionState::Error);
    assert!(h.transport.calls().is_empty());
    assert!(h.handoff.urls().is_empty());
    assert!(h.orchestrator.session().log().contains("[abort]"));

    // The abort consumed the request, so a retry runs normally
    h.orchestrator.download().await.unwrap();
    assert_eq!(h.orchestrator.session().state(), SessionState::Completed);
    assert_eq!(h.transport.contacted().len(), 1);
}

#[tokio::test]
async fn test_stale_cancel_cleared_by_new_analysis() {
    let mut h = harness(2, vec![NodeScript::serving("https://cdn/x.mp4")]);
    h.orchestrator.cancel_handle().cancel();
    ready(&mut h, VideoQuality::Q1080).await;

    h.orchestrator.download().await.unwrap();

    assert_eq!(h.orchestrator.session().state(), SessionState::Completed);
    assert!(!h.orchestrator.cancel_handle().is_cancelled());
}

#[tokio::test]
async fn test_session_fatal_transport_error_stops_traversal() {
    let mut h = harness(
        3,
        vec![NodeScript::new(Reply::Broken, Reply::status(500))],
    );
    ready(&mut h, VideoQuality::Q1080).await;

    let err = h.orchestrator.download().await.unwrap_err();

    assert!(matches!(err, AppError::Io(_)));
    assert_eq!(h.orchestrator.session().state(), SessionState::Error);
    assert_eq!(h.transport.contacted().len(), 1);
    assert!(h.orchestrator.session().attempts().is_empty());
    assert!(h.orchestrator.session().log().contains("[fatal]"));
}

#[tokio::test]
async fn test_fallback_does_not_stick_to_the_next_analysis() {
    let mut h = harness(2, vec![]);
    ready(&mut h, VideoQuality::Q1080).await;
    h.orchestrator.download().await.unwrap();
    assert_eq!(h.orchestrator.session().mode(), DeliveryMode::Cli);

    ready(&mut h, VideoQuality::Q1080).await;
    assert_eq!(h.orchestrator.session().mode(), DeliveryMode::Swarm);
}

#[tokio::test]
async fn test_cli_mode_needs_no_network() {
    let mut h = harness(3, vec![]);
    ready(&mut h, VideoQuality::Audio).await;
    h.orchestrator.select_mode(DeliveryMode::Cli).unwrap();

    let outcome = h.orchestrator.download().await.unwrap();

    assert!(h.transport.calls().is_empty());
    assert_eq!(h.orchestrator.session().state(), SessionState::Completed);
    match outcome {
        DownloadOutcome::Completed {
            delivery: Delivery::Command { command },
            ..
        } => {
            assert_eq!(command, r#"yt-dlp -x --audio-format mp3 "https://youtu.be/dQw4w9WgXcQ""#);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_direct_stream_failure_routes_to_cli() {
    let settings = OrchestratorSettings {
        direct_stream_endpoint: Some("https://relay.test/api/json".to_string()),
        ..OrchestratorSettings::default()
    };
    let mut h = harness_with(
        endpoints(3),
        ScriptedTransport::by_order(vec![NodeScript::new(
            Reply::status(500),
            Reply::link("https://cdn/unused.mp4"),
        )]),
        settings,
        2,
    );
    ready(&mut h, VideoQuality::Q1080).await;
    h.orchestrator.select_mode(DeliveryMode::DirectStream).unwrap();

    let outcome = h.orchestrator.download().await.unwrap();

    // One relay request, no safe mode, no swarm traversal
    let calls = h.transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].endpoint, "https://relay.test/api/json");
    assert!(matches!(outcome, DownloadOutcome::FallbackOffered { .. }));
    assert_eq!(h.orchestrator.session().state(), SessionState::FallbackOffered);
    assert_eq!(h.orchestrator.session().mode(), DeliveryMode::Cli);
}

#[tokio::test]
async fn test_direct_stream_success() {
    let settings = OrchestratorSettings {
        direct_stream_endpoint: Some("https://relay.test/api/json".to_string()),
        ..OrchestratorSettings::default()
    };
    let mut h = harness_with(
        endpoints(3),
        ScriptedTransport::by_order(vec![NodeScript::serving("https://relay.test/s/1")]),
        settings,
        2,
    );
    ready(&mut h, VideoQuality::Q1080).await;
    h.orchestrator.select_mode(DeliveryMode::DirectStream).unwrap();

    let outcome = h.orchestrator.download().await.unwrap();

    assert!(matches!(
        outcome,
        DownloadOutcome::Completed {
            mode: DeliveryMode::DirectStream,
            ..
        }
    ));
    assert_eq!(h.handoff.urls(), vec!["https://relay.test/s/1".to_string()]);
}

#[tokio::test]
async fn test_fallback_then_cli_mode_completes() {
    let mut h = harness(2, vec![]);
    ready(&mut h, VideoQuality::Q1080).await;
    h.orchestrator.download().await.unwrap();
    assert_eq!(h.orchestrator.session().state(), SessionState::FallbackOffered);

    h.orchestrator.select_mode(DeliveryMode::Cli).unwrap();
    assert_eq!(h.orchestrator.session().state(), SessionState::Ready);

    h.orchestrator.download().await.unwrap();
    assert_eq!(h.orchestrator.session().state(), SessionState::Completed);
}

#[tokio::test]
async fn test_bridge_mode_saves_stream() {
    let server = spawn_http_responder(
        CannedResponse::ok("binary-video")
            .with_header("Content-Disposition", r#"attachment; filename="video.mp4""#),
    )
    .await;
    let dir = TempDir::new().unwrap();
    let bridge = BridgeClient::new(
        reqwest::Client::new(),
        server.url("/download"),
        Duration::from_secs(10),
        dir.path(),
    );
    let mut h = harness(3, vec![]);
    h.orchestrator = h.orchestrator.with_bridge(bridge);
    ready(&mut h, VideoQuality::Q4K).await;
    h.orchestrator.select_mode(DeliveryMode::Bridge).unwrap();

    let outcome = h.orchestrator.download().await.unwrap();

    assert!(h.transport.calls().is_empty());
    assert_eq!(
        outcome,
        DownloadOutcome::Completed {
            mode: DeliveryMode::Bridge,
            delivery: Delivery::File {
                path: dir.path().join("video.mp4"),
                bytes: 12
            }
        }
    );
    let body: serde_json::Value = serde_json::from_str(&server.requests()[0].body).unwrap();
    assert_eq!(body["quality"], "2160p (4K)");
}

#[tokio::test]
async fn test_bridge_failure_surfaces_status_and_guidance() {
    let server = spawn_http_responder(CannedResponse::status(502, "yt-dlp exploded")).await;
    let dir = TempDir::new().unwrap();
    let bridge = BridgeClient::new(
        reqwest::Client::new(),
        server.url("/download"),
        Duration::from_secs(10),
        dir.path(),
    );
    let mut h = harness(3, vec![]);
    h.orchestrator = h.orchestrator.with_bridge(bridge);
    ready(&mut h, VideoQuality::Q1080).await;
    h.orchestrator.select_mode(DeliveryMode::Bridge).unwrap();

    let err = h.orchestrator.download().await.unwrap_err();

    assert!(matches!(
        err,
        AppError::BridgeFailure {
            status: Some(502),
            ..
        }
    ));
    let session = h.orchestrator.session();
    assert_eq!(session.state(), SessionState::Error);
    assert!(session.log().contains("HTTP 502"));
    assert!(session.log().contains("yt-dlp exploded"));
    assert!(session.log().contains("[help] Ensure the bridge server is running"));
}

#[tokio::test]
async fn test_log_timestamps_strictly_increase_across_cycle() {
    let mut h = harness(4, vec![]);
    ready(&mut h, VideoQuality::Q1080).await;
    let _ = h.orchestrator.download().await;

    let entries = h.orchestrator.session().log().entries();
    assert!(entries.len() > 10);
    for pair in entries.windows(2) {
        assert!(pair[0].at < pair[1].at);
    }
}
