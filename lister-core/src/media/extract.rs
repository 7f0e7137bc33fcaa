use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::config::MediaSection;

use super::error::{MediaError, MediaResult};
use super::hash::frame_files;

/// Decodes every frame of a video into numbered images in a directory.
#[async_trait(?Send)]
pub trait FrameExtractor {
    /// Writes `0000.<ext>`, `0001.<ext>`, ... into `frames_dir` and returns the frame count.
    async fn extract(&self, source: &Path, frames_dir: &Path) -> MediaResult<usize>;
}

#[async_trait(?Send)]
impl<T: FrameExtractor + ?Sized> FrameExtractor for Box<T> {
    async fn extract(&self, source: &Path, frames_dir: &Path) -> MediaResult<usize> {
        (**self).extract(source, frames_dir).await
    }
}

#[derive(Debug, Clone)]
pub struct FfmpegExtractor {
    ffmpeg: String,
    timeout: Duration,
    extension: String,
}

impl FfmpegExtractor {
    pub fn new(config: &MediaSection) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            timeout: Duration::from_secs(config.extract_timeout_seconds),
            extension: config.frame_extension.trim_start_matches('.').to_string(),
        }
    }
}

#[async_trait(?Send)]
impl FrameExtractor for FfmpegExtractor {
    async fn extract(&self, source: &Path, frames_dir: &Path) -> MediaResult<usize> {
        fs::create_dir_all(frames_dir)
            .await
            .map_err(|source| MediaError::Io {
                path: frames_dir.to_path_buf(),
                source,
            })?;
        let pattern = frames_dir.join(format!("%04d.{}", self.extension));
        let mut command = Command::new(&self.ffmpeg);
        command
            .kill_on_drop(true)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-i")
            .arg(source)
            .arg("-start_number")
            .arg("0")
            .arg("-q:v")
            .arg("2")
            .arg(&pattern);
        debug!(source = %source.display(), pattern = %pattern.display(), "running ffmpeg");

        let output = match timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return Err(MediaError::Extraction(format!(
                    "failed to run {}: {err}",
                    self.ffmpeg
                )))
            }
            Err(_) => {
                return Err(MediaError::Extraction(format!(
                    "ffmpeg timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        };
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::Extraction(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let frames = frame_files(frames_dir)?.len();
        if frames == 0 {
            return Err(MediaError::Extraction(format!(
                "no frames decoded from {}",
                source.display()
            )));
        }
        info!(source = %source.display(), frames, "frames extracted");
        Ok(frames)
    }
}
