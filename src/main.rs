use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use quizreel::capture::{CancelToken, Recorder};
use quizreel::content::{load_and_validate_manifest, load_quiz_content};
use quizreel::director::Director;
use quizreel::encoding::{FfmpegEncoder, FfmpegMode, VideoArtifact};
use quizreel::render::QuizSurface;
use quizreel::schema::QUESTIONS_PER_QUIZ;

#[derive(Debug, Parser)]
#[command(name = "quizreel")]
#[command(about = "Quiz Reel Compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate a reel manifest and its quiz text.
    Check { manifest: PathBuf },
    /// Drive the presentation, record it and write the mp4 artifact.
    Render {
        manifest: PathBuf,
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
        /// Override the manifest's capture window length.
        #[arg(long = "duration-seconds")]
        duration_seconds: Option<u32>,
        /// Override the manifest's sampling rate.
        #[arg(long)]
        fps: Option<u32>,
        #[arg(long, value_enum, default_value_t = FfmpegArg::Auto)]
        ffmpeg: FfmpegArg,
        /// Let the presentation keep advancing while recording instead of
        /// freezing it on the current phase.
        #[arg(long = "free-run")]
        free_run: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FfmpegArg {
    Auto,
    System,
    Sidecar,
}

impl From<FfmpegArg> for FfmpegMode {
    fn from(arg: FfmpegArg) -> Self {
        match arg {
            FfmpegArg::Auto => FfmpegMode::Auto,
            FfmpegArg::System => FfmpegMode::System,
            FfmpegArg::Sidecar => FfmpegMode::Sidecar,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Check { manifest } => run_check(&manifest),
        Commands::Render {
            manifest,
            output,
            duration_seconds,
            fps,
            ffmpeg,
            free_run,
        } => {
            run_render(
                &manifest,
                &output,
                duration_seconds,
                fps,
                ffmpeg.into(),
                free_run,
            )
            .await
        }
    }
}

fn run_check(manifest_path: &Path) -> Result<()> {
    let manifest = load_and_validate_manifest(manifest_path)?;
    let content = load_quiz_content(&manifest)?;

    println!(
        "OK: {} ({}x{}, {}s @ {} fps = {} frames)",
        manifest_path.display(),
        manifest.resolution.width,
        manifest.resolution.height,
        manifest.capture.duration_seconds,
        manifest.capture.fps,
        manifest.capture.target_frame_count()
    );
    println!("Topic: {}", content.topic);
    println!("Main question: {}", content.main_question);
    println!("Questions: {QUESTIONS_PER_QUIZ}");
    Ok(())
}

async fn run_render(
    manifest_path: &Path,
    output_path: &Path,
    duration_seconds: Option<u32>,
    fps: Option<u32>,
    ffmpeg_mode: FfmpegMode,
    free_run: bool,
) -> Result<()> {
    let manifest = load_and_validate_manifest(manifest_path)?;
    let content = load_quiz_content(&manifest)?;

    let mut settings = manifest.capture;
    if let Some(duration_seconds) = duration_seconds {
        settings.duration_seconds = duration_seconds;
    }
    if let Some(fps) = fps {
        settings.fps = fps;
    }
    settings.validate()?;

    let mut director = Director::new();
    let surface = QuizSurface::new(&manifest, content, director.state_handle())?;
    let recorder = Recorder::new(Arc::new(FfmpegEncoder::new(ffmpeg_mode)));

    director.start();

    // Holding the guard freezes the presentation on its current phase for
    // the whole session, which is the stock behavior; --free-run trades
    // that consistency for a recording that follows the live phases.
    let artifact = if free_run {
        recorder
            .record_session(Some(&surface), &settings, &CancelToken::new())
            .await?
    } else {
        let _suppress = director.suppress_guard();
        recorder
            .record_session(Some(&surface), &settings, &CancelToken::new())
            .await?
    };

    director.stop();
    write_artifact(&artifact, output_path)?;
    println!("Wrote {} ({} bytes)", output_path.display(), artifact.len());
    Ok(())
}

fn write_artifact(artifact: &VideoArtifact, output_path: &Path) -> Result<()> {
    fs::write(output_path, &artifact.data)
        .with_context(|| format!("failed to write {}", output_path.display()))
}
