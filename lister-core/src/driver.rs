use std::collections::HashSet;
use std::future::Future;

use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::accounts::{ListingRemover, StatsRefresher};
use crate::backend::{BackendApi, BackendError, HttpBackend, RecordId};
use crate::browser::{
    AutomationError, BrowserLauncher, HumanPacing, LaunchOverrides, Probe, ProfileManager,
    SurfaceLauncher,
};
use crate::config::{ListerConfig, SchedulerSection};
use crate::marketplace;
use crate::media::{FfmpegExtractor, FrameExtractor, FramePipeline, MediaOutcome};
use crate::report::StatusReporter;
use crate::session::{Authenticator, SessionManager};
use crate::workflow::{ListingWorkflow, WorkflowOutcome, WorkflowSettings};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Automation(#[from] AutomationError),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Counters for one scheduler iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IterationReport {
    pub media_completed: usize,
    pub media_aborted: usize,
    pub frames_uploaded: usize,
    pub listings_published: usize,
    pub listings_unpublished: usize,
    pub listings_limited: usize,
    pub listings_skipped: usize,
    pub accounts_cleared: usize,
    pub listings_removed: usize,
    pub stats_updated: usize,
    pub account_failures: usize,
}

/// Scheduler that pulls work from the backend and runs it strictly in sequence.
pub struct Driver {
    backend: Box<dyn BackendApi>,
    sessions: SessionManager,
    reporter: StatusReporter,
    workflow: ListingWorkflow,
    stats: StatsRefresher,
    remover: ListingRemover,
    media: FramePipeline<Box<dyn FrameExtractor>>,
    pacing: HumanPacing,
    scheduler: SchedulerSection,
}

impl Driver {
    pub fn new(
        config: &ListerConfig,
        backend: impl BackendApi + 'static,
        launcher: impl SurfaceLauncher + 'static,
        extractor: impl FrameExtractor + 'static,
    ) -> Self {
        let pacing = HumanPacing::new(config.pacing.clone());
        let authenticator = Authenticator::new(&config.marketplace, &config.auth);
        let extractor: Box<dyn FrameExtractor> = Box::new(extractor);
        Self {
            backend: Box::new(backend),
            sessions: SessionManager::new(launcher, authenticator),
            reporter: StatusReporter::new(&config.retry),
            workflow: ListingWorkflow::new(WorkflowSettings::from_config(config), pacing.clone()),
            stats: StatsRefresher::from_config(config),
            remover: ListingRemover::from_config(config),
            media: FramePipeline::from_config(extractor, config),
            pacing,
            scheduler: config.scheduler.clone(),
        }
    }

    /// Wires the HTTP backend, Chromium launcher and ffmpeg extractor.
    pub fn from_config(config: &ListerConfig, overrides: LaunchOverrides) -> DriverResult<Self> {
        let backend = HttpBackend::new(&config.backend)?;
        let profiles = ProfileManager::new(&config.paths.profiles_dir)?;
        let launcher = BrowserLauncher::new(
            config.chromium.clone(),
            profiles,
            HumanPacing::new(config.pacing.clone()),
        )
        .with_overrides(overrides);
        let extractor = FfmpegExtractor::new(&config.media);
        Ok(Self::new(config, backend, launcher, extractor))
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut SessionManager {
        &mut self.sessions
    }

    /// Runs iterations until `shutdown` resolves, then closes the bound session.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(interval_secs = self.scheduler.interval_seconds, "driver started");
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                result = self.run_iteration() => match result {
                    Ok(report) => info!(?report, "iteration finished"),
                    Err(err) => error!(error = %err, "iteration failed"),
                },
                _ = &mut shutdown => break,
            }
            tokio::select! {
                _ = sleep(self.scheduler.interval()) => {}
                _ = &mut shutdown => break,
            }
        }
        info!("shutdown requested");
        self.sessions.close_session().await;
    }

    pub async fn run_iteration(&mut self) -> DriverResult<IterationReport> {
        let mut report = IterationReport::default();
        if self.scheduler.process_media {
            self.process_media(&mut report).await?;
        }
        if self.scheduler.create_listings {
            self.create_listings(&mut report).await?;
        }
        if self.scheduler.remove_listings {
            self.remove_listings(&mut report).await?;
        }
        if self.scheduler.refresh_accounts {
            self.refresh_accounts(&mut report).await?;
        }
        Ok(report)
    }

    async fn process_media(&mut self, report: &mut IterationReport) -> DriverResult<()> {
        let jobs = self.backend.pending_media().await?;
        if jobs.is_empty() {
            info!("no new videos");
            return Ok(());
        }
        info!(jobs = jobs.len(), "fetched media jobs");
        for job in &jobs {
            match self
                .media
                .process(self.backend.as_ref(), &self.reporter, job)
                .await
            {
                MediaOutcome::Completed { uploaded, .. } => {
                    report.media_completed += 1;
                    report.frames_uploaded += uploaded;
                }
                MediaOutcome::Aborted { .. } => report.media_aborted += 1,
            }
        }
        Ok(())
    }

    async fn create_listings(&mut self, report: &mut IterationReport) -> DriverResult<()> {
        let listings = self.backend.pending_listings().await?;
        if listings.is_empty() {
            info!("no new listings to add");
            return Ok(());
        }
        let mut skipped_accounts: HashSet<RecordId> = HashSet::new();
        for listing in &listings {
            let account = &listing.account;
            if skipped_accounts.contains(&account.id) {
                info!(listing = %listing.id, account = %account.id, "account skipped for this batch");
                report.listings_skipped += 1;
                continue;
            }

            let blocked = match self.sessions.ensure_session(account).await {
                Ok(surface) => surface.probe(&marketplace::blocked_marker()).await,
                Err(err) => {
                    error!(listing = %listing.id, account = %account.id, error = %err, "session unavailable");
                    report.account_failures += 1;
                    report.listings_skipped += 1;
                    skipped_accounts.insert(account.id.clone());
                    continue;
                }
            };
            match blocked {
                Probe::Found(()) => {
                    info!(account = %account.id, "marketplace is blocked; re-authenticating");
                    if let Err(err) = self.sessions.reauthenticate().await {
                        error!(account = %account.id, error = %err, "re-authentication failed");
                        report.account_failures += 1;
                        report.listings_skipped += 1;
                        skipped_accounts.insert(account.id.clone());
                        continue;
                    }
                }
                Probe::NotFound => {}
                Probe::Error(err) => {
                    warn!(account = %account.id, error = %err, "blocked check failed")
                }
            }

            let Some(surface) = self.sessions.surface_mut() else {
                report.listings_skipped += 1;
                continue;
            };
            let outcome = self
                .workflow
                .run(surface, self.backend.as_ref(), &self.reporter, listing)
                .await;
            match outcome {
                WorkflowOutcome::Published { .. } => report.listings_published += 1,
                WorkflowOutcome::Unpublished { .. } => report.listings_unpublished += 1,
                WorkflowOutcome::LimitReached { .. } => {
                    report.listings_limited += 1;
                    skipped_accounts.insert(account.id.clone());
                }
            }
            self.pacing.between_jobs().await;
        }
        self.sessions.close_session().await;
        Ok(())
    }

    async fn remove_listings(&mut self, report: &mut IterationReport) -> DriverResult<()> {
        let accounts = self.backend.accounts_to_clear().await?;
        if accounts.is_empty() {
            info!("no listings to remove");
            return Ok(());
        }
        for account in &accounts {
            let surface = match self.sessions.ensure_session(account).await {
                Ok(surface) => surface,
                Err(err) => {
                    error!(account = %account.id, error = %err, "session unavailable");
                    report.account_failures += 1;
                    continue;
                }
            };
            match self
                .remover
                .clear(surface, self.backend.as_ref(), &self.reporter, account)
                .await
            {
                Ok(summary) => {
                    report.accounts_cleared += 1;
                    report.listings_removed += summary.removed;
                }
                Err(err) => {
                    error!(account = %account.id, error = %err, "failed to drop listings");
                    report.account_failures += 1;
                }
            }
            self.pacing.between_jobs().await;
        }
        self.sessions.close_session().await;
        Ok(())
    }

    async fn refresh_accounts(&mut self, report: &mut IterationReport) -> DriverResult<()> {
        let accounts = self.backend.accounts_to_update().await?;
        if accounts.is_empty() {
            info!("no accounts to update");
            return Ok(());
        }
        for account in &accounts {
            let surface = match self.sessions.ensure_session(account).await {
                Ok(surface) => surface,
                Err(err) => {
                    error!(account = %account.id, error = %err, "session unavailable");
                    report.account_failures += 1;
                    continue;
                }
            };
            match self
                .stats
                .refresh(surface, self.backend.as_ref(), account)
                .await
            {
                Ok(summary) => report.stats_updated += summary.updated,
                Err(err) => {
                    error!(account = %account.id, error = %err, "failed to process account");
                    report.account_failures += 1;
                }
            }
            self.pacing.between_jobs().await;
        }
        Ok(())
    }
}
