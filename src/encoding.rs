use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, bail, Context, Result};

use crate::surface::FrameSample;

/// The single binary output of a capture session: an mp4 byte blob,
/// playable in a standard video element. Ephemeral; nothing in the core
/// persists it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoArtifact {
    pub data: Vec<u8>,
}

impl VideoArtifact {
    pub const MIME_TYPE: &'static str = "video/mp4";

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Boundary to the external encoder: an ordered frame sequence in, one
/// artifact out. The implementation must never reorder its inputs.
pub trait VideoEncoder: Send + Sync {
    fn encode(&self, frames: Vec<FrameSample>, fps: u32) -> Result<VideoArtifact>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FfmpegMode {
    #[default]
    Auto,
    System,
    Sidecar,
}

/// Encodes frames by piping raw RGBA through an ffmpeg process into an
/// H.264 yuv420p mp4, then reading the container back from a scratch dir.
pub struct FfmpegEncoder {
    mode: FfmpegMode,
}

impl FfmpegEncoder {
    pub fn new(mode: FfmpegMode) -> Self {
        Self { mode }
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn encode(&self, frames: Vec<FrameSample>, fps: u32) -> Result<VideoArtifact> {
        let first = frames
            .first()
            .ok_or_else(|| anyhow!("cannot encode an empty frame sequence"))?;
        let (width, height) = (first.width, first.height);
        let expected_len = width as usize * height as usize * 4;
        for (index, frame) in frames.iter().enumerate() {
            if frame.width != width || frame.height != height || frame.byte_len() != expected_len {
                bail!(
                    "frame {index} is {}x{} ({} bytes), expected {width}x{height} ({expected_len} bytes)",
                    frame.width,
                    frame.height,
                    frame.byte_len()
                );
            }
        }

        let scratch = tempfile::tempdir().context("failed to create encode scratch dir")?;
        let output_path = scratch.path().join("output.mp4");

        let pipe = FfmpegPipe::spawn(self.mode, width, height, fps, &output_path)?;
        for frame in frames {
            pipe.write_frame(frame.rgba)?;
        }
        pipe.finish()?;

        let data = std::fs::read(&output_path)
            .with_context(|| format!("failed to read encoded video {}", output_path.display()))?;
        Ok(VideoArtifact { data })
    }
}

struct FfmpegPipe {
    sender: Option<mpsc::SyncSender<Vec<u8>>>,
    worker: Option<JoinHandle<Result<()>>>,
}

trait FfmpegBackend: Send {
    fn mode_label(&self) -> &'static str;
    fn run(self: Box<Self>, receiver: mpsc::Receiver<Vec<u8>>) -> Result<()>;
}

struct SystemFfmpegBackend {
    size: String,
    fps: String,
    output_path: PathBuf,
}

#[cfg(feature = "sidecar_ffmpeg")]
struct SidecarFfmpegBackend {
    size: String,
    fps: String,
    output_path: PathBuf,
}

impl FfmpegPipe {
    fn spawn(
        mode: FfmpegMode,
        width: u32,
        height: u32,
        fps: u32,
        output_path: &Path,
    ) -> Result<Self> {
        let size = format!("{width}x{height}");
        let fps = fps.to_string();
        let backend = select_backend(mode, size, fps, output_path.to_path_buf())?;
        let worker_name = format!("quizreel-ffmpeg-{}", backend.mode_label());
        let (sender, receiver) = mpsc::sync_channel::<Vec<u8>>(4);

        let worker = thread::Builder::new()
            .name(worker_name)
            .spawn(move || backend.run(receiver))
            .context("failed to spawn ffmpeg writer thread")?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    fn write_frame(&self, rgba_frame: Vec<u8>) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| anyhow!("encoder has already been finalized"))?;
        sender
            .send(rgba_frame)
            .map_err(|_| anyhow!("failed to enqueue frame for ffmpeg"))
    }

    fn finish(mut self) -> Result<()> {
        drop(self.sender.take());

        let handle = self
            .worker
            .take()
            .ok_or_else(|| anyhow!("ffmpeg worker thread missing"))?;
        match handle.join() {
            Ok(result) => result,
            Err(_) => Err(anyhow!("ffmpeg worker thread panicked")),
        }
    }
}

fn select_backend(
    mode: FfmpegMode,
    size: String,
    fps: String,
    output_path: PathBuf,
) -> Result<Box<dyn FfmpegBackend>> {
    match mode {
        FfmpegMode::Auto | FfmpegMode::System => Ok(Box::new(SystemFfmpegBackend {
            size,
            fps,
            output_path,
        })),
        FfmpegMode::Sidecar => {
            #[cfg(feature = "sidecar_ffmpeg")]
            {
                Ok(Box::new(SidecarFfmpegBackend {
                    size,
                    fps,
                    output_path,
                }))
            }
            #[cfg(not(feature = "sidecar_ffmpeg"))]
            {
                let _ = (size, fps, output_path);
                Err(anyhow!(
                    "ffmpeg sidecar mode requested but quizreel was built without `sidecar_ffmpeg`. Rebuild with `--features sidecar_ffmpeg`."
                ))
            }
        }
    }
}

impl FfmpegBackend for SystemFfmpegBackend {
    fn mode_label(&self) -> &'static str {
        "system"
    }

    fn run(self: Box<Self>, receiver: mpsc::Receiver<Vec<u8>>) -> Result<()> {
        run_ffmpeg_process(
            Path::new("ffmpeg"),
            receiver,
            &self.size,
            &self.fps,
            &self.output_path,
            self.mode_label(),
        )
    }
}

#[cfg(feature = "sidecar_ffmpeg")]
impl FfmpegBackend for SidecarFfmpegBackend {
    fn mode_label(&self) -> &'static str {
        "sidecar"
    }

    fn run(self: Box<Self>, receiver: mpsc::Receiver<Vec<u8>>) -> Result<()> {
        let path = ffmpeg_sidecar::paths::ffmpeg_path();
        if !path.exists() {
            ffmpeg_sidecar::download::auto_download()
                .context("failed to auto-download ffmpeg sidecar binary")?;
        }
        run_ffmpeg_process(
            &path,
            receiver,
            &self.size,
            &self.fps,
            &self.output_path,
            self.mode_label(),
        )
    }
}

fn run_ffmpeg_process(
    ffmpeg_path: &Path,
    receiver: mpsc::Receiver<Vec<u8>>,
    size: &str,
    fps: &str,
    output_path: &Path,
    mode_label: &str,
) -> Result<()> {
    let args = ffmpeg_args(size, fps, output_path);
    let mut command = Command::new(ffmpeg_path);
    command
        .args(args.iter().map(String::as_str))
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    let mut child = command.spawn().map_err(|error| {
        if error.kind() == ErrorKind::NotFound {
            anyhow!(
                "ffmpeg executable not found (mode={mode_label}, resolved_path={}). Install ffmpeg or use sidecar mode with `--features sidecar_ffmpeg`.",
                ffmpeg_path.display()
            )
        } else {
            anyhow!(
                "failed to spawn ffmpeg process (mode={mode_label}, resolved_path={}, args='{}'): {error}",
                ffmpeg_path.display(),
                args.join(" ")
            )
        }
    })?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("failed to capture ffmpeg stdin"))?;
    let mut stderr_pipe = child.stderr.take();

    while let Ok(frame) = receiver.recv() {
        stdin
            .write_all(&frame)
            .context("failed to write frame to ffmpeg stdin")?;
    }

    stdin.flush().context("failed to flush ffmpeg stdin")?;
    drop(stdin);

    let status = child.wait().context("failed waiting for ffmpeg process")?;
    let stderr_tail = read_stderr_tail(&mut stderr_pipe)?;
    if !status.success() {
        return Err(anyhow!(
            "ffmpeg failed with status {status} (mode={mode_label}, resolved_path={}, args='{}', stderr_tail='{}')",
            ffmpeg_path.display(),
            args.join(" "),
            stderr_tail
        ));
    }

    Ok(())
}

// H.264 + yuv420p + faststart mp4 for broad video-tag compatibility.
fn ffmpeg_args(size: &str, fps: &str, output_path: &Path) -> Vec<String> {
    vec![
        "-hide_banner".to_owned(),
        "-loglevel".to_owned(),
        "error".to_owned(),
        "-y".to_owned(),
        "-f".to_owned(),
        "rawvideo".to_owned(),
        "-pix_fmt".to_owned(),
        "rgba".to_owned(),
        "-s:v".to_owned(),
        size.to_owned(),
        "-r".to_owned(),
        fps.to_owned(),
        "-i".to_owned(),
        "-".to_owned(),
        "-an".to_owned(),
        "-c:v".to_owned(),
        "libx264".to_owned(),
        "-pix_fmt".to_owned(),
        "yuv420p".to_owned(),
        "-movflags".to_owned(),
        "+faststart".to_owned(),
        output_path.to_string_lossy().into_owned(),
    ]
}

fn read_stderr_tail(stderr: &mut Option<std::process::ChildStderr>) -> Result<String> {
    let Some(mut pipe) = stderr.take() else {
        return Ok(String::new());
    };
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf)
        .context("failed reading ffmpeg stderr")?;
    let text = String::from_utf8_lossy(&buf).to_string();
    Ok(last_n_chars(&text, 500))
}

fn last_n_chars(s: &str, max_chars: usize) -> String {
    let mut chars = s.chars().collect::<Vec<_>>();
    if chars.len() > max_chars {
        chars = chars[chars.len().saturating_sub(max_chars)..].to_vec();
    }
    chars.into_iter().collect::<String>().trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ffmpeg_args_produce_compatible_mp4_settings() {
        let args = ffmpeg_args("540x960", "5", Path::new("/tmp/out.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-pix_fmt yuv420p"));
        assert!(joined.contains("-s:v 540x960"));
        assert!(joined.contains("-r 5"));
        assert!(joined.ends_with("/tmp/out.mp4"));
    }

    #[test]
    fn encoder_rejects_empty_and_mismatched_sequences() {
        let encoder = FfmpegEncoder::new(FfmpegMode::System);
        assert!(encoder.encode(Vec::new(), 5).is_err());

        let frames = vec![
            FrameSample {
                width: 4,
                height: 4,
                rgba: vec![0; 64],
            },
            FrameSample {
                width: 2,
                height: 2,
                rgba: vec![0; 16],
            },
        ];
        let error = encoder.encode(frames, 5).expect_err("mismatch should fail");
        assert!(error.to_string().contains("frame 1"));
    }
}
