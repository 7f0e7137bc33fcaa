mod draft;
mod location;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::fs;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::backend::{BackendApi, Listing, RecordId};
use crate::browser::{click, AutomationResult, AutomationSurface, HumanPacing, Locator, Probe};
use crate::config::{ListerConfig, PollWindow};
use crate::marketplace;
use crate::report::StatusReporter;

pub use draft::ListingDraft;

pub const LIMIT_REACHED_REASON: &str = "creation limit reached";

/// Steps of the create-listing form, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingStep {
    NavigateToForm,
    CheckRateLimit,
    UploadPhotos,
    SetTitle,
    SetPrice,
    SetCategory,
    SetCondition,
    SetDescription,
    SetAvailability,
    SetTags,
    ResolveLocation,
    SetVisibility,
    SubmitNext,
    SubmitPublish,
    ConfirmPublication,
}

impl ListingStep {
    pub const SEQUENCE: [ListingStep; 15] = [
        ListingStep::NavigateToForm,
        ListingStep::CheckRateLimit,
        ListingStep::UploadPhotos,
        ListingStep::SetTitle,
        ListingStep::SetPrice,
        ListingStep::SetCategory,
        ListingStep::SetCondition,
        ListingStep::SetDescription,
        ListingStep::SetAvailability,
        ListingStep::SetTags,
        ListingStep::ResolveLocation,
        ListingStep::SetVisibility,
        ListingStep::SubmitNext,
        ListingStep::SubmitPublish,
        ListingStep::ConfirmPublication,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ListingStep::NavigateToForm => "navigate-to-create-form",
            ListingStep::CheckRateLimit => "check-rate-limit-gate",
            ListingStep::UploadPhotos => "upload-photos",
            ListingStep::SetTitle => "set-title",
            ListingStep::SetPrice => "set-price",
            ListingStep::SetCategory => "set-category",
            ListingStep::SetCondition => "set-condition",
            ListingStep::SetDescription => "set-description",
            ListingStep::SetAvailability => "set-availability",
            ListingStep::SetTags => "set-tags",
            ListingStep::ResolveLocation => "resolve-and-set-location",
            ListingStep::SetVisibility => "set-visibility-exclusion",
            ListingStep::SubmitNext => "submit-next",
            ListingStep::SubmitPublish => "submit-publish",
            ListingStep::ConfirmPublication => "confirm-publication",
        }
    }
}

impl fmt::Display for ListingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{}", LIMIT_REACHED_REASON)]
    RateLimitReached,
    #[error("{step} failed: {cause}")]
    StepFailed { step: ListingStep, cause: String },
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

impl WorkflowError {
    fn step(step: ListingStep, cause: impl fmt::Display) -> Self {
        WorkflowError::StepFailed {
            step,
            cause: cause.to_string(),
        }
    }
}

/// Terminal state of one listing attempt. `reported` tells whether the
/// backend acknowledged the status report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    Published { location_id: RecordId, reported: bool },
    Unpublished { reason: String, reported: bool },
    LimitReached { reported: bool },
}

impl WorkflowOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, WorkflowOutcome::Published { .. })
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub create_listing_url: String,
    pub location_country: String,
    pub photos_dir: PathBuf,
    pub location_max_attempts: usize,
    pub location_deadline: Duration,
    pub suggestions: PollWindow,
}

impl WorkflowSettings {
    pub fn from_config(config: &ListerConfig) -> Self {
        Self {
            create_listing_url: config.marketplace.create_listing_url.clone(),
            location_country: config.marketplace.location_country.clone(),
            photos_dir: config.paths.photos_dir.clone(),
            location_max_attempts: config.workflow.location_max_attempts.max(1),
            location_deadline: Duration::from_secs(config.workflow.location_deadline_seconds),
            suggestions: config.poll.suggestions,
        }
    }
}

/// Drives one listing through the create form and reports exactly one terminal status.
#[derive(Debug, Clone)]
pub struct ListingWorkflow {
    settings: WorkflowSettings,
    pacing: HumanPacing,
}

impl ListingWorkflow {
    pub fn new(settings: WorkflowSettings, pacing: HumanPacing) -> Self {
        Self { settings, pacing }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    pub async fn run(
        &self,
        surface: &mut dyn AutomationSurface,
        backend: &dyn BackendApi,
        reporter: &StatusReporter,
        listing: &Listing,
    ) -> WorkflowOutcome {
        let draft = match ListingDraft::from_listing(listing) {
            Ok(draft) => draft,
            Err(err) => {
                warn!(listing = %listing.id, error = %err, "listing rejected before any step");
                let reason = err.to_string();
                let reported = report_unpublished(backend, reporter, &listing.id, &reason).await;
                return WorkflowOutcome::Unpublished { reason, reported };
            }
        };

        let mut scratch = Vec::new();
        let result = self.execute(surface, backend, &draft, &mut scratch).await;
        remove_scratch(&scratch).await;

        match result {
            Ok(location_id) => {
                let reported = reporter
                    .report_with_retry("listing published", |_| {
                        backend.mark_listing_published(&draft.listing_id, &location_id)
                    })
                    .await;
                if reported {
                    info!(listing = %draft.listing_id, location = %location_id, "listing published");
                } else {
                    error!(
                        listing = %draft.listing_id,
                        step = %ListingStep::ConfirmPublication,
                        "listing published but the backend was not told"
                    );
                }
                WorkflowOutcome::Published {
                    location_id,
                    reported,
                }
            }
            Err(WorkflowError::RateLimitReached) => {
                info!(listing = %draft.listing_id, "listing creation aborted: limit reached");
                let reported =
                    report_unpublished(backend, reporter, &draft.listing_id, LIMIT_REACHED_REASON)
                        .await;
                WorkflowOutcome::LimitReached { reported }
            }
            Err(err) => {
                error!(listing = %draft.listing_id, error = %err, "listing creation failed");
                let reason = err.to_string();
                let reported =
                    report_unpublished(backend, reporter, &draft.listing_id, &reason).await;
                WorkflowOutcome::Unpublished { reason, reported }
            }
        }
    }

    async fn execute(
        &self,
        surface: &mut dyn AutomationSurface,
        backend: &dyn BackendApi,
        draft: &ListingDraft,
        scratch: &mut Vec<PathBuf>,
    ) -> Result<RecordId, WorkflowError> {
        let listing = &draft.listing_id;

        finish(
            listing,
            ListingStep::NavigateToForm,
            surface.navigate(&self.settings.create_listing_url).await,
        )?;

        match surface.probe(&marketplace::creation_limit_marker()).await {
            Probe::Found(()) => return Err(WorkflowError::RateLimitReached),
            Probe::NotFound => {}
            Probe::Error(err) => return Err(WorkflowError::step(ListingStep::CheckRateLimit, err)),
        }

        let photos = self.download_photos(backend, draft, scratch).await?;
        if photos.is_empty() {
            warn!(%listing, "listing has no photos to attach");
        } else {
            finish(
                listing,
                ListingStep::UploadPhotos,
                surface.attach_files(&marketplace::photos_input(), &photos).await,
            )?;
        }

        self.fill(surface, listing, ListingStep::SetTitle, &marketplace::title_input(), &draft.title)
            .await?;
        self.fill(surface, listing, ListingStep::SetPrice, &marketplace::price_input(), &draft.price)
            .await?;
        self.choose(
            surface,
            listing,
            ListingStep::SetCategory,
            &marketplace::category_dropdown(),
            &marketplace::category_option(&draft.category),
        )
        .await?;
        self.choose(
            surface,
            listing,
            ListingStep::SetCondition,
            &marketplace::condition_dropdown(),
            &marketplace::dropdown_option(&draft.condition),
        )
        .await?;
        if let Some(description) = &draft.description {
            self.fill(
                surface,
                listing,
                ListingStep::SetDescription,
                &marketplace::description_input(),
                description,
            )
            .await?;
        }
        self.choose(
            surface,
            listing,
            ListingStep::SetAvailability,
            &marketplace::availability_dropdown(),
            &marketplace::dropdown_option(&draft.availability),
        )
        .await?;
        self.pacing.settle().await;
        if let Some(tags) = &draft.tags {
            self.fill(surface, listing, ListingStep::SetTags, &marketplace::tags_input(), tags)
                .await?;
        }

        let location_id = self.resolve_location(surface, backend, draft).await?;

        for (step, locator) in [
            (ListingStep::SetVisibility, marketplace::hide_from_friends()),
            (ListingStep::SubmitNext, marketplace::next_button()),
            (ListingStep::SubmitPublish, marketplace::publish_button()),
        ] {
            finish(listing, step, self.press(surface, &locator).await)?;
        }
        Ok(location_id)
    }

    async fn fill(
        &self,
        surface: &mut dyn AutomationSurface,
        listing: &RecordId,
        step: ListingStep,
        locator: &Locator,
        value: &str,
    ) -> Result<(), WorkflowError> {
        let result = surface
            .type_text(locator, value, self.pacing.type_options())
            .await;
        finish(listing, step, result)
    }

    /// Clicks after a short human hesitation.
    async fn press(
        &self,
        surface: &mut dyn AutomationSurface,
        locator: &Locator,
    ) -> AutomationResult<()> {
        self.pacing.hesitate().await;
        click(surface, locator).await.map(|_| ())
    }

    /// Opens a dropdown, lets it render, then picks the option.
    async fn choose(
        &self,
        surface: &mut dyn AutomationSurface,
        listing: &RecordId,
        step: ListingStep,
        dropdown: &Locator,
        option: &Locator,
    ) -> Result<(), WorkflowError> {
        self.press(surface, dropdown)
            .await
            .map_err(|err| WorkflowError::step(step, format!("opening dropdown: {err}")))?;
        self.pacing.settle().await;
        finish(listing, step, self.press(surface, option).await)?;
        Ok(())
    }

    async fn download_photos(
        &self,
        backend: &dyn BackendApi,
        draft: &ListingDraft,
        scratch: &mut Vec<PathBuf>,
    ) -> Result<Vec<PathBuf>, WorkflowError> {
        let step = ListingStep::UploadPhotos;
        fs::create_dir_all(&self.settings.photos_dir)
            .await
            .map_err(|err| WorkflowError::step(step, err))?;
        let mut attachable = Vec::with_capacity(draft.photo_urls.len());
        for url in &draft.photo_urls {
            let path = self
                .settings
                .photos_dir
                .join(format!("{}.jpg", Uuid::new_v4()));
            scratch.push(path.clone());
            backend
                .download(url, &path)
                .await
                .map_err(|err| WorkflowError::step(step, err))?;
            let absolute = fs::canonicalize(&path)
                .await
                .map_err(|err| WorkflowError::step(step, err))?;
            attachable.push(absolute);
        }
        Ok(attachable)
    }
}

fn finish<T>(
    listing: &RecordId,
    step: ListingStep,
    result: AutomationResult<T>,
) -> Result<T, WorkflowError> {
    match result {
        Ok(value) => {
            info!(%listing, %step, "listing step done");
            Ok(value)
        }
        Err(err) => Err(WorkflowError::step(step, err)),
    }
}

async fn report_unpublished(
    backend: &dyn BackendApi,
    reporter: &StatusReporter,
    listing: &RecordId,
    reason: &str,
) -> bool {
    reporter
        .report_with_retry("listing unpublished", |_| {
            backend.mark_listing_unpublished(listing, reason)
        })
        .await
}

async fn remove_scratch(paths: &[PathBuf]) {
    for path in paths {
        remove_file_quietly(path).await;
    }
}

async fn remove_file_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove scratch file"),
    }
}
