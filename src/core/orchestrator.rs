//! Download orchestrator
//!
//! Owns the download session and drives it through analysis and one of the
//! delivery modes. All session mutation goes through [`DownloadSession::apply`];
//! the orchestrator decides which events to apply and logs every failure before
//! the transition that reports it.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};
use url::Url;
use uuid::Uuid;

use crate::core::activity_log::{ActivityLog, LogEntry};
use crate::core::config::AppConfig;
use crate::core::fallback::{cli_command, BridgeClient, CliCommand};
use crate::core::handoff::{AnnounceHandoff, LinkHandoff};
use crate::core::instance_pool::InstancePool;
use crate::core::metadata::{DisabledResolver, MetadataResolver, OEmbedResolver};
use crate::core::models::{
    AppError, AppResult, AttemptOutcome, AttemptResult, Delivery, DeliveryMode, HandoffReceipt,
    InstanceEndpoint, SessionState, VideoMetadata, VideoQuality, VideoRequest,
};
use crate::core::swarm::{
    ReqwestSwarmTransport, RequestProfile, SwarmRequest, SwarmTransport, TransportResponse,
};
use crate::core::video_id::{extract_video_id, thumbnail_url};
use crate::utils::network::build_http_client_with;

/// Progress reported when a download sequence starts
pub const PROGRESS_STARTED: u8 = 10;
/// Progress reported once an instance hands back a link
pub const PROGRESS_TUNNEL: u8 = 80;
pub const PROGRESS_DONE: u8 = 100;

/// Inputs accepted by the session state machine
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    BeginAnalysis { request: VideoRequest },
    AnalysisComplete { metadata: VideoMetadata },
    SelectQuality(VideoQuality),
    SelectMode(DeliveryMode),
    BeginDownload,
    Progress(u8),
    RecordAttempt(AttemptResult),
    Complete(Delivery),
    AttachReceipt(HandoffReceipt),
    Fail,
    OfferFallback { command: String },
    Reset,
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BeginAnalysis { .. } => "begin analysis",
            Self::AnalysisComplete { .. } => "complete analysis",
            Self::SelectQuality(_) => "select quality",
            Self::SelectMode(_) => "select mode",
            Self::BeginDownload => "begin download",
            Self::Progress(_) => "report progress",
            Self::RecordAttempt(_) => "record attempt",
            Self::Complete(_) => "complete",
            Self::AttachReceipt(_) => "attach receipt",
            Self::Fail => "fail",
            Self::OfferFallback { .. } => "offer fallback",
            Self::Reset => "reset",
        }
    }
}

/// In-memory state of the current analysis and download
#[derive(Debug)]
pub struct DownloadSession {
    id: Uuid,
    state: SessionState,
    mode: DeliveryMode,
    /// Mode chosen by the user; `mode` may temporarily hold the CLI fallback
    selected_mode: DeliveryMode,
    quality: VideoQuality,
    request: Option<VideoRequest>,
    metadata: Option<VideoMetadata>,
    attempts: Vec<AttemptResult>,
    progress: u8,
    delivery: Option<Delivery>,
    fallback_command: Option<String>,
    log: ActivityLog,
}

impl DownloadSession {
    pub fn new(quality: VideoQuality, mode: DeliveryMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
            mode,
            selected_mode: mode,
            quality,
            request: None,
            metadata: None,
            attempts: Vec::new(),
            progress: 0,
            delivery: None,
            fallback_command: None,
            log: ActivityLog::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub fn selected_mode(&self) -> DeliveryMode {
        self.selected_mode
    }

    pub fn quality(&self) -> VideoQuality {
        self.quality
    }

    pub fn request(&self) -> Option<&VideoRequest> {
        self.request.as_ref()
    }

    pub fn metadata(&self) -> Option<&VideoMetadata> {
        self.metadata.as_ref()
    }

    pub fn attempts(&self) -> &[AttemptResult] {
        &self.attempts
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn delivery(&self) -> Option<&Delivery> {
        self.delivery.as_ref()
    }

    pub fn fallback_command(&self) -> Option<&str> {
        self.fallback_command.as_deref()
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    pub(crate) fn log_mut(&mut self) -> &mut ActivityLog {
        &mut self.log
    }

    /// Apply one event, rejecting transitions the lifecycle does not allow
    pub fn apply(&mut self, event: SessionEvent) -> AppResult<()> {
        let from = self.state;
        let invalid = |event: &SessionEvent| AppError::InvalidTransition {
            from,
            event: event.name().to_string(),
        };

        match event {
            SessionEvent::BeginAnalysis { request } => {
                if from.is_busy() {
                    return Err(invalid(&SessionEvent::BeginAnalysis { request }));
                }
                self.log.clear();
                self.mode = self.selected_mode;
                self.request = Some(request.with_quality(self.quality));
                self.metadata = None;
                self.clear_download();
                self.state = SessionState::Analyzing;
            }
            SessionEvent::AnalysisComplete { metadata } => {
                if from != SessionState::Analyzing {
                    return Err(invalid(&SessionEvent::AnalysisComplete { metadata }));
                }
                self.metadata = Some(metadata);
                self.state = SessionState::Ready;
            }
            SessionEvent::SelectQuality(quality) => {
                if from.is_busy() {
                    return Err(invalid(&event));
                }
                self.quality = quality;
                self.request = self.request.as_ref().map(|r| r.with_quality(quality));
            }
            SessionEvent::SelectMode(mode) => {
                if from.is_busy() {
                    return Err(invalid(&event));
                }
                self.mode = mode;
                self.selected_mode = mode;
                if from == SessionState::FallbackOffered {
                    self.clear_download();
                    self.state = SessionState::Ready;
                }
            }
            SessionEvent::BeginDownload => {
                if !matches!(from, SessionState::Ready | SessionState::Error)
                    || self.request.is_none()
                {
                    return Err(invalid(&event));
                }
                self.clear_download();
                self.progress = PROGRESS_STARTED;
                self.state = SessionState::Downloading;
            }
            SessionEvent::Progress(progress) => {
                if from != SessionState::Downloading {
                    return Err(invalid(&event));
                }
                self.progress = progress.min(PROGRESS_DONE);
            }
            SessionEvent::RecordAttempt(attempt) => {
                let duplicate_success = attempt.outcome.is_success()
                    && self.attempts.iter().any(|a| a.outcome.is_success());
                if from != SessionState::Downloading || duplicate_success {
                    return Err(invalid(&SessionEvent::RecordAttempt(attempt)));
                }
                self.attempts.push(attempt);
            }
            SessionEvent::Complete(delivery) => {
                if from != SessionState::Downloading {
                    return Err(invalid(&SessionEvent::Complete(delivery)));
                }
                self.delivery = Some(delivery);
                self.progress = PROGRESS_DONE;
                self.state = SessionState::Completed;
            }
            SessionEvent::AttachReceipt(receipt) => match (&mut self.delivery, from) {
                (Some(Delivery::Link { receipt: slot, .. }), SessionState::Completed) => {
                    *slot = Some(receipt);
                }
                _ => return Err(invalid(&SessionEvent::AttachReceipt(receipt))),
            },
            SessionEvent::Fail => {
                if from != SessionState::Downloading {
                    return Err(invalid(&event));
                }
                self.progress = 0;
                self.state = SessionState::Error;
            }
            SessionEvent::OfferFallback { command } => {
                if from != SessionState::Downloading {
                    return Err(invalid(&SessionEvent::OfferFallback { command }));
                }
                self.fallback_command = Some(command);
                self.mode = DeliveryMode::Cli;
                self.progress = 0;
                self.state = SessionState::FallbackOffered;
            }
            SessionEvent::Reset => {
                self.log.clear();
                self.mode = self.selected_mode;
                self.request = None;
                self.metadata = None;
                self.clear_download();
                self.state = SessionState::Idle;
            }
        }

        debug!("Session {} {:?} -> {:?}", self.id, from, self.state);
        Ok(())
    }

    fn clear_download(&mut self) {
        self.attempts.clear();
        self.progress = 0;
        self.delivery = None;
        self.fallback_command = None;
    }
}

/// Shared flag for cooperative cancellation
///
/// Checked when a download starts and before each endpoint attempt. A new
/// analysis or a reset clears it; an abort consumes it.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    fn flag(&self) -> &AtomicBool {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    pub request_timeout: Duration,
    pub profile: RequestProfile,
    pub offer_fallback: bool,
    pub cli_tool: String,
    pub direct_stream_endpoint: Option<String>,
    pub direct_stream_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(12),
            profile: RequestProfile::default(),
            offer_fallback: true,
            cli_tool: "yt-dlp".to_string(),
            direct_stream_endpoint: None,
            direct_stream_timeout: Duration::from_secs(30),
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            request_timeout: Duration::from_secs(config.swarm.request_timeout_seconds),
            profile: RequestProfile {
                audio_format: config.swarm.audio_format.clone(),
                filename_style: config.swarm.filename_style.clone(),
            },
            offer_fallback: config.swarm.offer_fallback,
            cli_tool: config.cli.tool.clone(),
            direct_stream_endpoint: config.direct_stream.endpoint.clone(),
            direct_stream_timeout: Duration::from_secs(config.direct_stream.timeout_seconds),
        }
    }
}

/// How a download cycle ended, when it did not end in `Error`
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    Completed {
        mode: DeliveryMode,
        delivery: Delivery,
    },
    FallbackOffered {
        command: CliCommand,
        cause: String,
    },
}

impl DownloadOutcome {
    pub fn state(&self) -> SessionState {
        match self {
            Self::Completed { .. } => SessionState::Completed,
            Self::FallbackOffered { .. } => SessionState::FallbackOffered,
        }
    }
}

pub struct Orchestrator {
    session: DownloadSession,
    pool: InstancePool,
    transport: Arc<dyn SwarmTransport>,
    metadata: Arc<dyn MetadataResolver>,
    handoff: Arc<dyn LinkHandoff>,
    bridge: Option<BridgeClient>,
    settings: OrchestratorSettings,
    rng: StdRng,
    cancel: CancelHandle,
}

impl Orchestrator {
    pub fn new(
        pool: InstancePool,
        transport: Arc<dyn SwarmTransport>,
        metadata: Arc<dyn MetadataResolver>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            session: DownloadSession::new(VideoQuality::default(), DeliveryMode::default()),
            pool,
            transport,
            metadata,
            handoff: Arc::new(AnnounceHandoff::new()),
            bridge: None,
            settings,
            rng: StdRng::from_entropy(),
            cancel: CancelHandle::default(),
        }
    }

    /// Wire the production collaborators described by `config`
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let client = build_http_client_with(&config.advanced.user_agent)?;

        let metadata: Arc<dyn MetadataResolver> = if config.metadata.enabled {
            Arc::new(OEmbedResolver::from_config(client.clone(), &config.metadata))
        } else {
            Arc::new(DisabledResolver)
        };

        let orchestrator = Self::new(
            InstancePool::new(config.swarm.instances.iter().cloned()),
            Arc::new(ReqwestSwarmTransport::with_client(client)),
            metadata,
            OrchestratorSettings::from_config(config),
        );
        Ok(orchestrator.with_bridge(BridgeClient::from_config(&config.bridge)?))
    }

    /// Replace the shuffle source
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_bridge(mut self, bridge: BridgeClient) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn with_handoff(mut self, handoff: Arc<dyn LinkHandoff>) -> Self {
        self.handoff = handoff;
        self
    }

    pub fn session(&self) -> &DownloadSession {
        &self.session
    }

    pub fn pool(&self) -> &InstancePool {
        &self.pool
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Live feed of activity log entries
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.session.log().subscribe()
    }

    pub fn select_quality(&mut self, quality: VideoQuality) -> AppResult<()> {
        self.session.apply(SessionEvent::SelectQuality(quality))
    }

    pub fn select_mode(&mut self, mode: DeliveryMode) -> AppResult<()> {
        self.session.apply(SessionEvent::SelectMode(mode))
    }

    pub fn reset(&mut self) -> AppResult<()> {
        self.session.apply(SessionEvent::Reset)?;
        self.cancel.reset();
        Ok(())
    }

    fn log(&mut self) -> &mut ActivityLog {
        self.session.log_mut()
    }

    /// Validate the URL and gather metadata, ending in `Ready`
    ///
    /// An unrecognised URL leaves the session untouched apart from one error entry.
    pub async fn analyze(&mut self, url: &str) -> AppResult<VideoMetadata> {
        let Some(video_id) = extract_video_id(url) else {
            self.log().error("Invalid YouTube URL format detected");
            return Err(AppError::InvalidUrl(url.trim().to_string()));
        };
        let source_url = url.trim().to_string();

        self.cancel.reset();
        self.session.apply(SessionEvent::BeginAnalysis {
            request: VideoRequest {
                id: video_id.clone(),
                source_url: source_url.clone(),
                desired_quality: self.session.quality(),
            },
        })?;

        self.log().info("Connecting to Public Metadata API...");
        self.log().info(format!("Resolving video ID: {}", video_id));

        let thumbnail = thumbnail_url(&video_id);
        self.log().success("Thumbnail resource located");
        self.log().info("Fetching video details...");

        let resolved = self.metadata.resolve(&video_id, &source_url).await;
        if resolved.is_unavailable() {
            self.log()
                .warning("Metadata service unavailable, continuing without video details");
        }

        let metadata = VideoMetadata {
            id: video_id,
            url: source_url,
            thumbnail_url: thumbnail,
            title: resolved.title,
            description: resolved.description,
            tags: resolved.tags,
            duration: None,
            ai_summary: resolved.ai_summary,
        };

        self.log().success("Metadata extraction complete");
        self.session.apply(SessionEvent::AnalysisComplete {
            metadata: metadata.clone(),
        })?;
        Ok(metadata)
    }

    /// Run one download cycle in the selected delivery mode
    pub async fn download(&mut self) -> AppResult<DownloadOutcome> {
        self.session.apply(SessionEvent::BeginDownload)?;
        if self.cancel.is_cancelled() {
            return self.abort_cancelled();
        }

        let request = self
            .session
            .request()
            .cloned()
            .ok_or_else(|| AppError::Config("No analyzed video to download".to_string()))?;
        let mode = self.session.mode();

        self.log().info(format!(
            "[init] Initializing download sequence for ID: {}",
            request.id
        ));
        self.log()
            .info(format!("[cfg] Target Quality: {}", request.desired_quality));
        if mode != DeliveryMode::Swarm {
            self.log().info(format!("[cfg] Delivery Mode: {}", mode));
        }

        match mode {
            DeliveryMode::Swarm => self.run_swarm(request).await,
            DeliveryMode::DirectStream => self.run_direct_stream(request).await,
            DeliveryMode::Bridge => self.run_bridge(request).await,
            DeliveryMode::Cli => self.run_cli(request),
        }
    }

    #[instrument(skip_all, fields(video_id = %request.id, quality = %request.desired_quality))]
    async fn run_swarm(&mut self, request: VideoRequest) -> AppResult<DownloadOutcome> {
        let order = self.pool.shuffled(&mut self.rng);
        self.log()
            .info(format!("[net] Resolved {} candidate nodes.", order.len()));

        for endpoint in order {
            if self.cancel.is_cancelled() {
                return self.abort_cancelled();
            }

            let url = match endpoint.parse() {
                Ok(url) => url,
                Err(e) => {
                    self.log().warning(format!(
                        "[net] Skipping malformed node address {}: {}",
                        endpoint.url, e
                    ));
                    continue;
                }
            };
            let host = url.host_str().unwrap_or("unknown").to_string();

            let attempt = match self.try_endpoint(&endpoint, &url, &host, &request).await {
                Ok(attempt) => attempt,
                Err(AppError::Cancelled) => return self.abort_cancelled(),
                Err(e) => {
                    self.log().error(format!("[fatal] {}: {}", host, e));
                    self.session.apply(SessionEvent::Fail)?;
                    return Err(e);
                }
            };
            let download_url = match &attempt.outcome {
                AttemptOutcome::Success { download_url } => Some(download_url.clone()),
                failed => {
                    let reason = self.describe_failure(failed);
                    self.log()
                        .warning(format!("[api] {} unavailable: {}", host, reason));
                    None
                }
            };
            let used_safe_mode = attempt.used_safe_mode;
            self.session.apply(SessionEvent::RecordAttempt(attempt))?;

            if let Some(download_url) = download_url {
                let suffix = if used_safe_mode { " (Safe Mode)" } else { "" };
                self.log().success(format!(
                    "[success] Tunnel established via {}{}",
                    host, suffix
                ));
                return self.hand_off_link(download_url, DeliveryMode::Swarm, &request).await;
            }
        }

        self.exhausted(&request)
    }

    /// Primary request plus at most one safe-mode retry against one endpoint
    ///
    /// Network and protocol errors become a failed attempt; anything the
    /// session cannot survive is returned as `Err`.
    async fn try_endpoint(
        &mut self,
        endpoint: &InstanceEndpoint,
        url: &Url,
        host: &str,
        request: &VideoRequest,
    ) -> AppResult<AttemptResult> {
        self.log()
            .warning(format!("[api] Negotiating with {}...", host));

        let primary = SwarmRequest::primary(request, &self.settings.profile);
        let mut response = match self.send(url, &primary, self.settings.request_timeout).await {
            Ok(response) => response,
            Err(e) if e.is_session_fatal() => return Err(e),
            Err(e) => {
                debug!("Primary request to {} failed: {}", host, e);
                return Ok(AttemptResult {
                    endpoint: endpoint.clone(),
                    used_safe_mode: false,
                    outcome: network_outcome(&e),
                });
            }
        };

        let mut used_safe_mode = false;
        if !response.is_success() && !request.desired_quality.is_degraded_tier() {
            self.log().warning(format!(
                "[api] Preferred quality failed on {}. Retrying Safe Mode...",
                host
            ));
            let safe = SwarmRequest::safe_mode(request, &self.settings.profile);
            match self.send(url, &safe, self.settings.request_timeout).await {
                Ok(safe_response) if safe_response.is_success() => {
                    response = safe_response;
                    used_safe_mode = true;
                }
                Ok(safe_response) => {
                    debug!("Safe mode on {} answered HTTP {}", host, safe_response.status)
                }
                Err(e) if e.is_session_fatal() => return Err(e),
                Err(e) => debug!("Safe mode request to {} failed: {}", host, e),
            }
        }

        Ok(AttemptResult {
            endpoint: endpoint.clone(),
            used_safe_mode,
            outcome: response.interpret(),
        })
    }

    async fn send(
        &self,
        url: &Url,
        body: &SwarmRequest,
        timeout: Duration,
    ) -> AppResult<TransportResponse> {
        match tokio::time::timeout(timeout, self.transport.post_json(url, body, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::NetworkFailure {
                message: format!("no reply within {}s", timeout.as_secs_f32()),
                timed_out: true,
            }),
        }
    }

    fn describe_failure(&self, outcome: &AttemptOutcome) -> String {
        match outcome {
            AttemptOutcome::Success { .. } => "ok".to_string(),
            AttemptOutcome::Rejected { reason } => reason.clone(),
            AttemptOutcome::NetworkFailure { message } => message.clone(),
            AttemptOutcome::Timeout => format!(
                "timed out after {}s",
                self.settings.request_timeout.as_secs_f32()
            ),
        }
    }

    /// Complete the session with a resolved link, then pass it on
    async fn hand_off_link(
        &mut self,
        download_url: String,
        mode: DeliveryMode,
        request: &VideoRequest,
    ) -> AppResult<DownloadOutcome> {
        self.session.apply(SessionEvent::Progress(PROGRESS_TUNNEL))?;
        self.log().info("[io] Starting transfer...");
        self.session.apply(SessionEvent::Complete(Delivery::Link {
            download_url: download_url.clone(),
            receipt: None,
        }))?;

        let receipt = match self.handoff.hand_off(&download_url, request).await {
            Ok(receipt) => {
                let message = match &receipt {
                    HandoffReceipt::Announced { .. } => {
                        "[done] File handover to download manager".to_string()
                    }
                    HandoffReceipt::Saved { path, .. } => {
                        format!("[done] File saved to {}", path.display())
                    }
                };
                self.log().success(message);
                self.session
                    .apply(SessionEvent::AttachReceipt(receipt.clone()))?;
                Some(receipt)
            }
            Err(e) => {
                self.log().warning(format!(
                    "[io] Hand-off failed ({}). Link: {}",
                    e, download_url
                ));
                None
            }
        };

        info!("Session {} completed via {}", self.session.id(), mode);
        Ok(DownloadOutcome::Completed {
            mode,
            delivery: Delivery::Link {
                download_url,
                receipt,
            },
        })
    }

    fn exhausted(&mut self, request: &VideoRequest) -> AppResult<DownloadOutcome> {
        let pool_size = self.pool.len();
        self.log()
            .error(format!("[fatal] All {} nodes failed.", pool_size));
        let cause = AppError::ExhaustionFailure { pool_size };

        if self.settings.offer_fallback {
            self.log().info(
                "[help] Try selecting '720p' or 'Audio Only' manually, or run the command below.",
            );
            return self.offer_cli_fallback(request, cause.to_string());
        }

        self.log()
            .info("[help] Try selecting '720p' or 'Audio Only' manually, or wait a moment.");
        self.session.apply(SessionEvent::Fail)?;
        Err(cause)
    }

    fn offer_cli_fallback(
        &mut self,
        request: &VideoRequest,
        cause: String,
    ) -> AppResult<DownloadOutcome> {
        let command = cli_command(
            &self.settings.cli_tool,
            request.desired_quality,
            &request.source_url,
        );
        self.log().info(format!("[cli] {}", command));
        self.session.apply(SessionEvent::OfferFallback {
            command: command.to_string(),
        })?;
        Ok(DownloadOutcome::FallbackOffered { command, cause })
    }

    fn abort_cancelled(&mut self) -> AppResult<DownloadOutcome> {
        self.cancel.reset();
        self.log().error("[abort] Download cancelled.");
        self.session.apply(SessionEvent::Fail)?;
        Err(AppError::Cancelled)
    }

    /// Single relay endpoint, primary request only; any failure falls back to the CLI
    async fn run_direct_stream(&mut self, request: VideoRequest) -> AppResult<DownloadOutcome> {
        let Some(endpoint) = self.settings.direct_stream_endpoint.clone() else {
            self.log()
                .error("[direct] No relay endpoint configured. Falling back to CLI command.");
            return self.offer_cli_fallback(&request, "direct stream relay not configured".into());
        };

        let url = match Url::parse(&endpoint) {
            Ok(url) => url,
            Err(e) => {
                self.log().error(format!(
                    "[direct] Malformed relay address {}: {}. Falling back to CLI command.",
                    endpoint, e
                ));
                return self.offer_cli_fallback(&request, e.to_string());
            }
        };
        let host = url.host_str().unwrap_or("unknown").to_string();
        self.log()
            .info(format!("[direct] Requesting stream from {}...", host));

        let body = SwarmRequest::primary(&request, &self.settings.profile);
        let outcome = match self
            .send(&url, &body, self.settings.direct_stream_timeout)
            .await
        {
            Ok(response) => response.interpret(),
            Err(e) => network_outcome(&e),
        };

        match outcome {
            AttemptOutcome::Success { download_url } => {
                self.log()
                    .success(format!("[success] Stream ready via {}", host));
                self.hand_off_link(download_url, DeliveryMode::DirectStream, &request)
                    .await
            }
            failed => {
                let reason = match failed {
                    AttemptOutcome::Timeout => format!(
                        "timed out after {}s",
                        self.settings.direct_stream_timeout.as_secs_f32()
                    ),
                    other => self.describe_failure(&other),
                };
                self.log().error(format!(
                    "[direct] Relay failed: {}. Falling back to CLI command.",
                    reason
                ));
                self.offer_cli_fallback(&request, reason)
            }
        }
    }

    async fn run_bridge(&mut self, request: VideoRequest) -> AppResult<DownloadOutcome> {
        let Some(bridge) = self.bridge.clone() else {
            self.log().error("[bridge] No bridge endpoint configured.");
            self.session.apply(SessionEvent::Fail)?;
            return Err(AppError::Config("Bridge endpoint not configured".to_string()));
        };

        self.log().info(format!(
            "[bridge] Forwarding request to {} (timeout {}s)...",
            bridge.endpoint(),
            bridge.timeout().as_secs()
        ));

        let cancel = self.cancel.clone();
        match bridge.fetch(&request, Some(cancel.flag())).await {
            Ok(delivery) => {
                self.log().success(format!(
                    "[done] Bridge transfer saved to {}",
                    delivery.path.display()
                ));
                let delivery = Delivery::File {
                    path: delivery.path,
                    bytes: delivery.bytes,
                };
                self.session.apply(SessionEvent::Complete(delivery.clone()))?;
                Ok(DownloadOutcome::Completed {
                    mode: DeliveryMode::Bridge,
                    delivery,
                })
            }
            Err(AppError::Cancelled) => self.abort_cancelled(),
            Err(e) => {
                self.log().error(format!("[bridge] {}", e));
                self.log().info(format!(
                    "[help] Ensure the bridge server is running (`tubeforge bridge serve`) and the endpoint {} is correct.",
                    bridge.endpoint()
                ));
                self.session.apply(SessionEvent::Fail)?;
                Err(e)
            }
        }
    }

    /// No network I/O, always completes
    fn run_cli(&mut self, request: VideoRequest) -> AppResult<DownloadOutcome> {
        let command = cli_command(
            &self.settings.cli_tool,
            request.desired_quality,
            &request.source_url,
        );
        self.log().success(format!("[cli] {}", command));

        let delivery = Delivery::Command {
            command: command.to_string(),
        };
        self.session.apply(SessionEvent::Complete(delivery.clone()))?;
        Ok(DownloadOutcome::Completed {
            mode: DeliveryMode::Cli,
            delivery,
        })
    }
}

fn network_outcome(error: &AppError) -> AttemptOutcome {
    if error.is_timeout() {
        AttemptOutcome::Timeout
    } else {
        AttemptOutcome::NetworkFailure {
            message: error.to_string(),
        }
    }
}
