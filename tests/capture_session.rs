use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use quizreel::capture::{CancelToken, CaptureError, Recorder};
use quizreel::encoding::{VideoArtifact, VideoEncoder};
use quizreel::schema::{CaptureSettings, Resolution};
use quizreel::surface::{FrameSample, RenderSurface};

const TEST_RESOLUTION: Resolution = Resolution {
    width: 4,
    height: 4,
};

/// Stamps a running counter into the first byte of every sample so frame
/// order is observable at the encoder boundary.
struct StampedSurface {
    samples: AtomicUsize,
}

impl StampedSurface {
    fn new() -> Self {
        Self {
            samples: AtomicUsize::new(0),
        }
    }
}

impl RenderSurface for StampedSurface {
    fn resolution(&self) -> Resolution {
        TEST_RESOLUTION
    }

    fn sample(&self) -> Result<FrameSample> {
        let stamp = self.samples.fetch_add(1, Ordering::SeqCst);
        let mut rgba = vec![0u8; TEST_RESOLUTION.pixel_count() * 4];
        rgba[0] = (stamp % 251) as u8;
        Ok(FrameSample {
            width: TEST_RESOLUTION.width,
            height: TEST_RESOLUTION.height,
            rgba,
        })
    }
}

struct BrokenSurface;

impl RenderSurface for BrokenSurface {
    fn resolution(&self) -> Resolution {
        TEST_RESOLUTION
    }

    fn sample(&self) -> Result<FrameSample> {
        bail!("surface torn down")
    }
}

/// Encoder double: records the stamp sequence of every call and can be told
/// to fail its first N calls.
#[derive(Default)]
struct EncoderSpy {
    fail_first: usize,
    calls: Mutex<Vec<Vec<u8>>>,
}

impl EncoderSpy {
    fn failing_first(fail_first: usize) -> Self {
        Self {
            fail_first,
            ..Self::default()
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl VideoEncoder for EncoderSpy {
    fn encode(&self, frames: Vec<FrameSample>, _fps: u32) -> Result<VideoArtifact> {
        let stamps = frames.iter().map(|frame| frame.rgba[0]).collect();
        let mut calls = self.calls.lock().unwrap();
        calls.push(stamps);
        if calls.len() <= self.fail_first {
            bail!("encoder exploded");
        }
        Ok(VideoArtifact {
            data: vec![0x42; frames.len()],
        })
    }
}

fn settings(duration_seconds: u32, fps: u32) -> CaptureSettings {
    CaptureSettings {
        duration_seconds,
        fps,
    }
}

#[tokio::test(start_paused = true)]
async fn default_window_collects_exactly_250_ordered_frames() {
    let encoder = Arc::new(EncoderSpy::default());
    let recorder = Recorder::new(encoder.clone());
    let surface = StampedSurface::new();

    // Observe every progress update as it is published.
    let mut progress_rx = recorder.progress();
    let observed = Arc::new(Mutex::new(Vec::new()));
    let observer = {
        let observed = Arc::clone(&observed);
        tokio::spawn(async move {
            while progress_rx.changed().await.is_ok() {
                let percent = *progress_rx.borrow();
                observed.lock().unwrap().push(percent);
                if percent == 100 {
                    break;
                }
            }
        })
    };

    let artifact = recorder
        .record_session(Some(&surface), &settings(50, 5), &CancelToken::new())
        .await
        .expect("session should complete");

    observer.await.expect("observer should finish");
    let observed = observed.lock().unwrap();
    assert_eq!(*observed.last().expect("progress observed"), 100);
    assert!(
        observed.windows(2).all(|pair| pair[0] <= pair[1]),
        "progress must be monotonically non-decreasing: {observed:?}"
    );

    let calls = encoder.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let stamps = &calls[0];
    assert_eq!(stamps.len(), 250);
    for (index, stamp) in stamps.iter().enumerate() {
        assert_eq!(usize::from(*stamp), index % 251, "frame {index} out of order");
    }

    assert_eq!(artifact.len(), 250);
    assert_eq!(VideoArtifact::MIME_TYPE, "video/mp4");
    assert_eq!(recorder.last_artifact(), Some(artifact));
}

#[tokio::test(start_paused = true)]
async fn missing_surface_fails_before_any_work() {
    let encoder = Arc::new(EncoderSpy::default());
    let recorder = Recorder::new(encoder.clone());

    let error = recorder
        .record_session(None, &settings(50, 5), &CancelToken::new())
        .await
        .expect_err("no surface should fail");
    assert!(matches!(error, CaptureError::NoSurface));
    assert_eq!(encoder.call_count(), 0);
    assert!(!recorder.is_recording());
}

#[tokio::test(start_paused = true)]
async fn concurrent_session_is_rejected_without_disturbing_the_first() {
    let encoder = Arc::new(EncoderSpy::default());
    let recorder = Arc::new(Recorder::new(encoder.clone()));
    let surface = Arc::new(StampedSurface::new());

    let first = {
        let recorder = Arc::clone(&recorder);
        let surface = Arc::clone(&surface);
        tokio::spawn(async move {
            recorder
                .record_session(Some(&*surface), &settings(2, 5), &CancelToken::new())
                .await
        })
    };

    // Let the first session take its first frame.
    tokio::task::yield_now().await;
    assert!(recorder.is_recording());

    let error = recorder
        .record_session(Some(&*surface), &settings(2, 5), &CancelToken::new())
        .await
        .expect_err("second session should be rejected");
    assert!(matches!(error, CaptureError::AlreadyRecording));

    let artifact = first
        .await
        .expect("first session should not panic")
        .expect("first session should complete");
    assert_eq!(artifact.len(), 10);

    // The rejected call left exactly one encode behind it.
    assert_eq!(encoder.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn render_failure_aborts_the_session() {
    let encoder = Arc::new(EncoderSpy::default());
    let recorder = Recorder::new(encoder.clone());

    let error = recorder
        .record_session(Some(&BrokenSurface), &settings(50, 5), &CancelToken::new())
        .await
        .expect_err("broken surface should fail");
    assert!(matches!(error, CaptureError::RenderFailed(_)));
    assert!(error.to_string().contains("surface torn down"));
    assert_eq!(encoder.call_count(), 0);
    assert!(recorder.last_artifact().is_none());
    assert!(!recorder.is_recording());
}

#[tokio::test(start_paused = true)]
async fn encoder_failure_leaves_no_artifact_and_frames_are_discarded() {
    let encoder = Arc::new(EncoderSpy::failing_first(1));
    let recorder = Recorder::new(encoder.clone());
    let surface = StampedSurface::new();

    let error = recorder
        .record_session(Some(&surface), &settings(4, 5), &CancelToken::new())
        .await
        .expect_err("first encode should fail");
    assert!(matches!(error, CaptureError::EncodeFailed(_)));
    assert!(recorder.last_artifact().is_none());

    // The retry starts from an empty frame sequence: same target count, and
    // stamps continue from where the surface left off rather than piling
    // onto the failed session's frames.
    let artifact = recorder
        .record_session(Some(&surface), &settings(4, 5), &CancelToken::new())
        .await
        .expect("second session should complete");
    assert_eq!(artifact.len(), 20);

    let calls = encoder.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].len(), 20);
    assert_eq!(calls[1].len(), 20);
    assert_eq!(calls[1][0], 20);
}

#[tokio::test(start_paused = true)]
async fn cancellation_between_frames_skips_the_encoder() {
    let encoder = Arc::new(EncoderSpy::default());
    let recorder = Arc::new(Recorder::new(encoder.clone()));
    let surface = Arc::new(StampedSurface::new());
    let cancel = CancelToken::new();

    let session = {
        let recorder = Arc::clone(&recorder);
        let surface = Arc::clone(&surface);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            recorder
                .record_session(Some(&*surface), &settings(50, 5), &cancel)
                .await
        })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();

    let error = session
        .await
        .expect("session should not panic")
        .expect_err("cancelled session should fail");
    assert!(matches!(error, CaptureError::Cancelled));
    assert_eq!(encoder.call_count(), 0);
    assert!(recorder.last_artifact().is_none());
    assert!(!recorder.is_recording());
}
