use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::Deserialize;

pub const QUESTIONS_PER_QUIZ: usize = 8;

/// One playthrough's worth of quiz material. Immutable once accepted;
/// the 8/8 question-answer invariant is enforced at parse time in
/// `content::parse_quiz_text`, never re-checked downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizContent {
    /// Opaque reference to the backdrop visual; the renderer resolves it
    /// as an image path.
    pub background_image: String,
    pub topic: String,
    pub main_question: String,
    pub questions: Vec<String>,
    pub answers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReelManifest {
    /// Quiz text file in the raw `question | answer` authoring format.
    pub quiz: PathBuf,
    /// TTF used for every piece of on-frame text.
    pub font: PathBuf,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub capture: CaptureSettings,
}

impl ReelManifest {
    pub fn validate(&self) -> Result<()> {
        self.resolution.validate()?;
        self.capture.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!(
                "resolution must be positive, got {}x{}",
                self.width,
                self.height
            );
        }
        Ok(())
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl Default for Resolution {
    // Portrait reel, matching the 540x960 preview the format was built for.
    fn default() -> Self {
        Self {
            width: 540,
            height: 960,
        }
    }
}

/// Fixed-window, fixed-rate sampling parameters for one capture session.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptureSettings {
    #[serde(default = "default_duration_seconds")]
    pub duration_seconds: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
}

impl CaptureSettings {
    pub fn validate(&self) -> Result<()> {
        if self.duration_seconds == 0 {
            bail!("capture duration must be > 0 seconds");
        }
        if self.fps == 0 {
            bail!("capture fps must be > 0");
        }
        Ok(())
    }

    /// Number of frames a session collects, fixed at session start.
    pub fn target_frame_count(&self) -> usize {
        (self.duration_seconds * self.fps) as usize
    }

    /// Pacing delay between consecutive samples.
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / f64::from(self.fps))
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            duration_seconds: default_duration_seconds(),
            fps: default_fps(),
        }
    }
}

fn default_duration_seconds() -> u32 {
    50
}

fn default_fps() -> u32 {
    5
}
