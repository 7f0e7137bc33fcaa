mod error;
mod extract;
mod hash;

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::backend::{BackendApi, MediaJob};
use crate::config::ListerConfig;
use crate::report::StatusReporter;

pub use error::{MediaError, MediaResult};
pub use extract::{FfmpegExtractor, FrameExtractor};
pub use hash::{dedup_directory, frame_files, select_distinct, DedupReport, PerceptualHash};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaOutcome {
    Completed {
        kept: usize,
        removed: usize,
        uploaded: usize,
        reported: bool,
    },
    /// Failed before upload; nothing was reported so the job stays pending.
    Aborted { reason: String },
}

/// Turns a source video into a minimal set of distinct frames in a photo group.
pub struct FramePipeline<E> {
    extractor: E,
    videos_dir: PathBuf,
    threshold: u32,
}

impl<E: FrameExtractor> FramePipeline<E> {
    pub fn new(extractor: E, videos_dir: impl Into<PathBuf>, threshold: u32) -> Self {
        Self {
            extractor,
            videos_dir: videos_dir.into(),
            threshold,
        }
    }

    pub fn from_config(extractor: E, config: &ListerConfig) -> Self {
        Self::new(
            extractor,
            config.paths.videos_dir.clone(),
            config.media.similarity_threshold,
        )
    }

    pub async fn process(
        &self,
        backend: &dyn BackendApi,
        reporter: &StatusReporter,
        job: &MediaJob,
    ) -> MediaOutcome {
        let stem = Uuid::new_v4().to_string();
        let source = self
            .videos_dir
            .join(format!("{stem}{}", source_extension(&job.video)));
        let frames_dir = self.videos_dir.join(&stem);

        let report = match self.prepare(backend, job, &source, &frames_dir).await {
            Ok(report) => report,
            Err(err) => {
                error!(job = %job.id, error = %err, "media job aborted");
                remove_file_quietly(&source).await;
                remove_dir_quietly(&frames_dir).await;
                return MediaOutcome::Aborted {
                    reason: err.to_string(),
                };
            }
        };

        let mut uploaded = 0usize;
        for frame in &report.kept {
            match backend.upload_photo(&job.photos_group_id, frame).await {
                Ok(()) => {
                    uploaded += 1;
                    info!(job = %job.id, frame = %frame.display(), "frame uploaded");
                }
                Err(err) => {
                    warn!(job = %job.id, frame = %frame.display(), error = %err, "frame upload failed")
                }
            }
        }
        remove_dir_quietly(&frames_dir).await;

        let reported = reporter
            .report_with_retry("media done", |_| backend.mark_media_done(&job.id))
            .await;
        MediaOutcome::Completed {
            kept: report.kept.len(),
            removed: report.removed.len(),
            uploaded,
            reported,
        }
    }

    async fn prepare(
        &self,
        backend: &dyn BackendApi,
        job: &MediaJob,
        source: &Path,
        frames_dir: &Path,
    ) -> MediaResult<DedupReport> {
        fs::create_dir_all(&self.videos_dir)
            .await
            .map_err(|err| MediaError::Io {
                path: self.videos_dir.clone(),
                source: err,
            })?;
        info!(job = %job.id, url = %job.video, "downloading source video");
        backend.download(&job.video, source).await?;

        self.extractor.extract(source, frames_dir).await?;
        fs::remove_file(source)
            .await
            .map_err(|err| MediaError::Io {
                path: source.to_path_buf(),
                source: err,
            })?;

        let dir = frames_dir.to_path_buf();
        let threshold = self.threshold;
        let report = tokio::task::spawn_blocking(move || dedup_directory(&dir, threshold)).await??;
        info!(
            job = %job.id,
            kept = report.kept.len(),
            removed = report.removed.len(),
            "frames deduplicated"
        );
        Ok(report)
    }
}

/// Extension of the URL path including the dot, or empty.
fn source_extension(video_url: &str) -> String {
    let path = match Url::parse(video_url) {
        Ok(url) => url.path().to_string(),
        Err(_) => video_url.to_string(),
    };
    Path::new(&path)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

async fn remove_file_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove media file"),
    }
}

async fn remove_dir_quietly(path: &Path) {
    match fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove frame directory"),
    }
}
