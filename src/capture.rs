use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;

use crate::encoding::{VideoArtifact, VideoEncoder};
use crate::schema::CaptureSettings;
use crate::surface::RenderSurface;

/// Failures of one capture session. All of them are fatal to the in-flight
/// session only: they never touch the presentation state and always leave
/// the recorder without a stored artifact.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no render surface to record")]
    NoSurface,
    #[error("a capture session is already in flight")]
    AlreadyRecording,
    #[error("frame render failed: {0}")]
    RenderFailed(String),
    #[error("video encode failed: {0}")]
    EncodeFailed(String),
    #[error("capture session cancelled")]
    Cancelled,
}

/// Cooperative cancellation for a capture session. Checked between
/// frame-capture suspension points; a tripped token stops sampling early
/// without ever invoking the encoder.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Samples a render surface at a fixed rate for a fixed frame budget and
/// encodes the ordered samples into a single mp4 artifact.
///
/// At most one session may be active at a time; the session's frames live
/// on its own stack and are discarded wholesale on any failure.
pub struct Recorder {
    encoder: Arc<dyn VideoEncoder>,
    active: AtomicBool,
    progress_tx: watch::Sender<u8>,
    artifact: Mutex<Option<VideoArtifact>>,
}

impl Recorder {
    pub fn new(encoder: Arc<dyn VideoEncoder>) -> Self {
        let (progress_tx, _) = watch::channel(0);
        Self {
            encoder,
            active: AtomicBool::new(false),
            progress_tx,
            artifact: Mutex::new(None),
        }
    }

    /// Observer for the session's percent progress: 0..=100, monotonically
    /// non-decreasing within a session, reset to 0 when a new one starts.
    pub fn progress(&self) -> watch::Receiver<u8> {
        self.progress_tx.subscribe()
    }

    pub fn is_recording(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Artifact of the most recent successful session, if any. Starting a
    /// new session clears it.
    pub fn last_artifact(&self) -> Option<VideoArtifact> {
        self.artifact.lock().clone()
    }

    /// Runs one capture session to completion or failure.
    ///
    /// Collects exactly `settings.target_frame_count()` samples in strict
    /// order, suspending for `1/fps` between samples. Pacing is fixed: a
    /// slow render stretches the recorded wall-clock window rather than
    /// dropping frames. Only after every frame is collected does the
    /// encoder run, on the blocking pool, receiving frames in capture order.
    pub async fn record_session(
        &self,
        surface: Option<&dyn RenderSurface>,
        settings: &CaptureSettings,
        cancel: &CancelToken,
    ) -> Result<VideoArtifact, CaptureError> {
        let surface = surface.ok_or(CaptureError::NoSurface)?;

        let _session = ActiveSession::acquire(&self.active)?;
        self.artifact.lock().take();
        self.progress_tx.send_replace(0);

        let target = settings.target_frame_count();
        let interval = settings.frame_interval();
        tracing::info!(
            frames = target,
            fps = settings.fps,
            "capture session started"
        );

        let mut frames = Vec::with_capacity(target);
        for index in 0..target {
            if cancel.is_cancelled() {
                tracing::info!(captured = frames.len(), "capture session cancelled");
                return Err(CaptureError::Cancelled);
            }

            let frame = surface
                .sample()
                .map_err(|error| CaptureError::RenderFailed(format!("{error:#}")))?;
            frames.push(frame);

            let percent = (100 * (index + 1) / target) as u8;
            self.progress_tx.send_replace(percent);
            if (index + 1) % settings.fps.max(1) as usize == 0 {
                tracing::debug!(frame = index + 1, total = target, percent, "captured");
            }

            sleep(interval).await;
        }

        if cancel.is_cancelled() {
            return Err(CaptureError::Cancelled);
        }

        tracing::info!(frames = frames.len(), "encoding capture session");
        let encoder = Arc::clone(&self.encoder);
        let fps = settings.fps;
        let artifact = tokio::task::spawn_blocking(move || encoder.encode(frames, fps))
            .await
            .map_err(|error| CaptureError::EncodeFailed(error.to_string()))?
            .map_err(|error| CaptureError::EncodeFailed(format!("{error:#}")))?;

        tracing::info!(bytes = artifact.data.len(), "capture session complete");
        *self.artifact.lock() = Some(artifact.clone());
        Ok(artifact)
    }
}

/// Re-entrancy guard: flips the active flag for the session's lifetime so
/// any exit path, error or not, releases it.
struct ActiveSession<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ActiveSession<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, CaptureError> {
        if flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CaptureError::AlreadyRecording);
        }
        Ok(Self { flag })
    }
}

impl Drop for ActiveSession<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
