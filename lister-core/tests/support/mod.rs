#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use async_trait::async_trait;
use image::{ImageBuffer, Luma};

use lister_core::backend::{
    Account, BackendApi, BackendError, BackendResult, Listing, ListingStats, Location, MediaJob,
    RecordId,
};
use lister_core::browser::{
    AutomationError, AutomationResult, AutomationSurface, ClickStrategy, Locator, Probe,
    SurfaceLauncher, TypeOptions,
};
use lister_core::config::{ListerConfig, PacingSection, PollWindow};
use lister_core::media::{FrameExtractor, MediaError, MediaResult};

pub fn test_config(root: &Path) -> ListerConfig {
    let mut config = ListerConfig::default();
    config.paths.profiles_dir = root.join("chrome");
    config.paths.videos_dir = root.join("videos");
    config.paths.photos_dir = root.join("photos");
    config.pacing = PacingSection::immediate();
    config.auth.settle_seconds = 0;
    config.poll.suggestions = PollWindow {
        max_iterations: 3,
        delay_ms: [0, 0],
    };
    config.poll.feed = PollWindow {
        max_iterations: 3,
        delay_ms: [0, 0],
    };
    config.retry.base_delay_ms = 0;
    config.retry.max_attempts = 3;
    config.workflow.card_open_settle_ms = 0;
    config.workflow.removal_step_pause_ms = 0;
    config
}

pub fn account(id: u64) -> Account {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "username": format!("seller{id}@example.com"),
        "password": "secret",
        "facebook_user_id": format!("100{id}"),
        "total_listings": 2,
    }))
    .unwrap()
}

pub fn listing(id: u64, account_id: u64) -> Listing {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "posting_id": 500 + id,
        "account": {
            "id": account_id,
            "username": format!("seller{account_id}@example.com"),
            "password": "secret",
        },
        "photos": [
            {"photo": {"photo": "https://cdn.example/a.jpg"}},
            {"photo": {"photo": "https://cdn.example/b.jpg"}},
        ],
        "title": {"title": "Mountain bike"},
        "postings_price": {"price": 25000},
        "category": {"category": "Sports"},
        "condition": {"condition": "Used - Good"},
        "description": {"description": "Barely ridden"},
        "availability": {"availability": "In stock"},
        "tags": {"tags": "bike, mtb"},
    }))
    .unwrap()
}

// ---------------------------------------------------------------------------
// Surface

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Navigate(String),
    Type { locator: String, value: String },
    Click { locator: String, strategy: ClickStrategy },
    Script(String),
    Attach { locator: String, files: Vec<PathBuf> },
    DeleteCookies,
    Close,
}

impl Action {
    /// Identity of the target, ignoring typed values and strategies.
    pub fn key(&self) -> String {
        match self {
            Action::Navigate(url) => format!("navigate:{url}"),
            Action::Type { locator, .. } => format!("type:{locator}"),
            Action::Click { locator, .. } => format!("click:{locator}"),
            Action::Script(script) => format!("script:{script}"),
            Action::Attach { locator, .. } => format!("attach:{locator}"),
            Action::DeleteCookies => "cookies".into(),
            Action::Close => "close".into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SurfaceState {
    pub id: usize,
    pub account: String,
    /// Every locator not listed in `missing` is on the page.
    pub everything_present: bool,
    pub present: HashSet<String>,
    pub missing: HashSet<String>,
    pub failing: HashSet<String>,
    pub obstructed: HashSet<String>,
    pub counts: HashMap<String, usize>,
    /// Locators that are present only while their stock lasts.
    pub stock: HashMap<String, usize>,
    /// Clicking the key locator uses up one unit of the value's stock.
    pub consumes: HashMap<String, String>,
    pub texts: HashMap<String, String>,
    pub attributes: HashMap<(String, String), String>,
    /// Interactions start failing once this many have succeeded.
    pub fail_after: Option<usize>,
    pub succeeded: usize,
    pub attempts: Vec<String>,
    pub actions: Vec<Action>,
    /// Locators typed into one character at a time.
    pub paced_typing: Vec<String>,
    pub closed: bool,
}

impl SurfaceState {
    pub fn permissive() -> Self {
        Self {
            everything_present: true,
            ..Self::default()
        }
    }

    pub fn is_present(&self, locator: &Locator) -> bool {
        if self.missing.contains(&locator.value) {
            return false;
        }
        if let Some(left) = self.stock.get(&locator.value) {
            return *left > 0;
        }
        self.everything_present || self.present.contains(&locator.value)
    }

    pub fn clicks(&self) -> Vec<String> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                Action::Click { locator, .. } => Some(locator.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                Action::Navigate(url) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    fn interact(&mut self, key: String, locator: Option<&Locator>) -> AutomationResult<()> {
        self.attempts.push(key.clone());
        if self.closed {
            return Err(AutomationError::Closed);
        }
        if let Some(locator) = locator {
            if !self.is_present(locator) {
                return Err(AutomationError::NotFound(locator.to_string()));
            }
            if self.failing.contains(&locator.value) {
                return Err(AutomationError::Interaction {
                    locator: locator.to_string(),
                    reason: "scripted failure".into(),
                });
            }
        }
        if let Some(limit) = self.fail_after {
            if self.succeeded >= limit {
                return Err(AutomationError::Interaction {
                    locator: key,
                    reason: "injected failure".into(),
                });
            }
        }
        Ok(())
    }

    fn record(&mut self, action: Action) {
        self.succeeded += 1;
        self.actions.push(action);
    }
}

#[derive(Debug, Clone)]
pub struct FakeSurface {
    pub state: Rc<RefCell<SurfaceState>>,
}

impl FakeSurface {
    pub fn new(state: SurfaceState) -> Self {
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }
}

#[async_trait(?Send)]
impl AutomationSurface for FakeSurface {
    async fn navigate(&mut self, url: &str) -> AutomationResult<()> {
        let mut state = self.state.borrow_mut();
        state.interact(format!("navigate:{url}"), None)?;
        state.record(Action::Navigate(url.to_string()));
        Ok(())
    }

    async fn current_url(&mut self) -> AutomationResult<String> {
        let state = self.state.borrow();
        Ok(state.navigations().last().cloned().unwrap_or_default())
    }

    async fn probe(&mut self, locator: &Locator) -> Probe<()> {
        let state = self.state.borrow();
        if state.closed {
            return Probe::Error(AutomationError::Closed);
        }
        if state.is_present(locator) {
            Probe::Found(())
        } else {
            Probe::NotFound
        }
    }

    async fn count(&mut self, locator: &Locator) -> AutomationResult<usize> {
        let state = self.state.borrow();
        Ok(state.counts.get(&locator.value).copied().unwrap_or(0))
    }

    async fn type_text(
        &mut self,
        locator: &Locator,
        value: &str,
        options: TypeOptions,
    ) -> AutomationResult<()> {
        let mut state = self.state.borrow_mut();
        state.interact(format!("type:{}", locator.value), Some(locator))?;
        if options.paced {
            state.paced_typing.push(locator.value.clone());
        }
        state.record(Action::Type {
            locator: locator.value.clone(),
            value: value.to_string(),
        });
        Ok(())
    }

    async fn click_with(
        &mut self,
        locator: &Locator,
        strategy: ClickStrategy,
    ) -> AutomationResult<()> {
        let mut state = self.state.borrow_mut();
        state.interact(format!("click:{}", locator.value), Some(locator))?;
        if strategy == ClickStrategy::Direct && state.obstructed.contains(&locator.value) {
            return Err(AutomationError::Obstructed(locator.to_string()));
        }
        if let Some(target) = state.consumes.get(&locator.value).cloned() {
            if let Some(left) = state.stock.get_mut(&target) {
                *left = left.saturating_sub(1);
            }
        }
        state.record(Action::Click {
            locator: locator.value.clone(),
            strategy,
        });
        Ok(())
    }

    async fn read_text(&mut self, locator: &Locator) -> Probe<String> {
        let state = self.state.borrow();
        match state.texts.get(&locator.value) {
            Some(text) => Probe::Found(text.clone()),
            None if state.is_present(locator) => Probe::Found(String::new()),
            None => Probe::NotFound,
        }
    }

    async fn read_attribute(&mut self, locator: &Locator, name: &str) -> Probe<String> {
        let state = self.state.borrow();
        match state
            .attributes
            .get(&(locator.value.clone(), name.to_string()))
        {
            Some(value) => Probe::Found(value.clone()),
            None => Probe::NotFound,
        }
    }

    async fn execute_script(&mut self, script: &str) -> AutomationResult<()> {
        self.state
            .borrow_mut()
            .actions
            .push(Action::Script(script.to_string()));
        Ok(())
    }

    async fn attach_files(&mut self, locator: &Locator, files: &[PathBuf]) -> AutomationResult<()> {
        let mut state = self.state.borrow_mut();
        state.interact(format!("attach:{}", locator.value), Some(locator))?;
        for file in files {
            assert!(file.is_absolute(), "attached files must be absolute");
            assert!(file.exists(), "attached file {} must exist", file.display());
        }
        state.record(Action::Attach {
            locator: locator.value.clone(),
            files: files.to_vec(),
        });
        Ok(())
    }

    async fn delete_all_cookies(&mut self) -> AutomationResult<()> {
        self.state.borrow_mut().actions.push(Action::DeleteCookies);
        Ok(())
    }

    async fn close(&mut self) -> AutomationResult<()> {
        let mut state = self.state.borrow_mut();
        state.closed = true;
        state.actions.push(Action::Close);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Launcher

#[derive(Default)]
pub struct LauncherState {
    pub opened: Vec<String>,
    pub surfaces: Vec<Rc<RefCell<SurfaceState>>>,
    pub max_live: usize,
    pub fail_open: HashSet<String>,
}

impl LauncherState {
    pub fn live(&self) -> usize {
        self.surfaces
            .iter()
            .filter(|surface| !surface.borrow().closed)
            .count()
    }
}

#[derive(Clone)]
pub struct FakeLauncher {
    pub state: Rc<RefCell<LauncherState>>,
    template: Rc<dyn Fn(&str) -> SurfaceState>,
}

impl FakeLauncher {
    pub fn new(template: impl Fn(&str) -> SurfaceState + 'static) -> Self {
        Self {
            state: Rc::new(RefCell::new(LauncherState::default())),
            template: Rc::new(template),
        }
    }

    pub fn permissive() -> Self {
        Self::new(|_| SurfaceState::permissive())
    }

    pub fn surface(&self, index: usize) -> Rc<RefCell<SurfaceState>> {
        Rc::clone(&self.state.borrow().surfaces[index])
    }
}

#[async_trait(?Send)]
impl SurfaceLauncher for FakeLauncher {
    async fn open(&self, account_id: &str) -> AutomationResult<Box<dyn AutomationSurface>> {
        let mut launcher = self.state.borrow_mut();
        if launcher.fail_open.contains(account_id) {
            return Err(AutomationError::Launch(format!(
                "scripted launch failure for {account_id}"
            )));
        }
        let mut surface_state = (self.template)(account_id);
        surface_state.id = launcher.surfaces.len();
        surface_state.account = account_id.to_string();
        let surface = FakeSurface::new(surface_state);
        launcher.opened.push(account_id.to_string());
        launcher.surfaces.push(Rc::clone(&surface.state));
        let live = launcher.live();
        launcher.max_live = launcher.max_live.max(live);
        Ok(Box::new(surface))
    }
}

// ---------------------------------------------------------------------------
// Backend

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Published { listing: String, location: String },
    Unpublished { listing: String, reason: String },
    MediaDone(String),
    Dropped(String),
}

#[derive(Debug, Default)]
pub struct BackendState {
    pub media_jobs: Vec<MediaJob>,
    pub listings: Vec<Listing>,
    pub accounts_to_update: Vec<Account>,
    pub accounts_to_clear: Vec<Account>,
    pub location: Option<Location>,
    pub location_calls: usize,
    pub reports: Vec<Report>,
    pub report_calls: usize,
    /// Number of report calls that fail before they start succeeding.
    pub failing_reports: usize,
    pub uploads: Vec<(String, String)>,
    pub failing_uploads: HashSet<String>,
    pub downloads: Vec<String>,
    pub fail_downloads: bool,
    pub stats: Vec<(String, ListingStats)>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    pub state: Rc<RefCell<BackendState>>,
}

impl FakeBackend {
    pub fn with_location() -> Self {
        let backend = Self::default();
        backend.state.borrow_mut().location = Some(
            serde_json::from_value(serde_json::json!({
                "id": 77,
                "name": "Bab Ezzouar",
                "wilaya": {"name": "Alger"},
            }))
            .unwrap(),
        );
        backend
    }

    pub fn reports(&self) -> Vec<Report> {
        self.state.borrow().reports.clone()
    }

    fn report(&self, path: String, report: Report) -> BackendResult<()> {
        let mut state = self.state.borrow_mut();
        state.report_calls += 1;
        if state.failing_reports > 0 {
            state.failing_reports -= 1;
            return Err(BackendError::Status { status: 503, path });
        }
        state.reports.push(report);
        Ok(())
    }
}

#[async_trait(?Send)]
impl BackendApi for FakeBackend {
    async fn accounts_to_update(&self) -> BackendResult<Vec<Account>> {
        Ok(self.state.borrow().accounts_to_update.clone())
    }

    async fn accounts_to_clear(&self) -> BackendResult<Vec<Account>> {
        Ok(self.state.borrow().accounts_to_clear.clone())
    }

    async fn pending_listings(&self) -> BackendResult<Vec<Listing>> {
        Ok(self.state.borrow().listings.clone())
    }

    async fn pending_media(&self) -> BackendResult<Vec<MediaJob>> {
        Ok(self.state.borrow().media_jobs.clone())
    }

    async fn location(&self, posting_id: &RecordId) -> BackendResult<Location> {
        let mut state = self.state.borrow_mut();
        state.location_calls += 1;
        state.location.clone().ok_or(BackendError::Status {
            status: 404,
            path: format!("locations/{posting_id}/get"),
        })
    }

    async fn update_account(
        &self,
        account_id: &RecordId,
        stats: &ListingStats,
    ) -> BackendResult<()> {
        self.state
            .borrow_mut()
            .stats
            .push((account_id.to_string(), stats.clone()));
        Ok(())
    }

    async fn mark_listing_published(
        &self,
        listing_id: &RecordId,
        location_id: &RecordId,
    ) -> BackendResult<()> {
        self.report(
            format!("listings/{listing_id}/published"),
            Report::Published {
                listing: listing_id.to_string(),
                location: location_id.to_string(),
            },
        )
    }

    async fn mark_listing_unpublished(
        &self,
        listing_id: &RecordId,
        reason: &str,
    ) -> BackendResult<()> {
        self.report(
            format!("listings/{listing_id}/unpublished"),
            Report::Unpublished {
                listing: listing_id.to_string(),
                reason: reason.to_string(),
            },
        )
    }

    async fn mark_media_done(&self, job_id: &RecordId) -> BackendResult<()> {
        self.report(
            format!("videos/{job_id}/published"),
            Report::MediaDone(job_id.to_string()),
        )
    }

    async fn mark_account_dropped(&self, account_id: &RecordId) -> BackendResult<()> {
        self.report(
            format!("accounts/{account_id}/droped"),
            Report::Dropped(account_id.to_string()),
        )
    }

    async fn upload_photo(&self, group_id: &RecordId, path: &Path) -> BackendResult<()> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        assert!(path.exists(), "uploaded frame {} must exist", path.display());
        let mut state = self.state.borrow_mut();
        if state.failing_uploads.contains(&name) {
            return Err(BackendError::Status {
                status: 500,
                path: format!("photos/{group_id}/add"),
            });
        }
        state.uploads.push((group_id.to_string(), name));
        Ok(())
    }

    async fn download(&self, url: &str, dest: &Path) -> BackendResult<u64> {
        let mut state = self.state.borrow_mut();
        state.downloads.push(url.to_string());
        if state.fail_downloads {
            return Err(BackendError::Status {
                status: 404,
                path: url.to_string(),
            });
        }
        let io = |source| BackendError::Io {
            path: dest.to_path_buf(),
            source,
        };
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        std::fs::write(dest, b"payload").map_err(io)?;
        Ok(7)
    }
}

// ---------------------------------------------------------------------------
// Frames

/// 64x64 grayscale frame whose 8x8 cells follow `bits` (bit 63 = top-left).
pub fn block_frame(bits: u64) -> ImageBuffer<Luma<u8>, Vec<u8>> {
    ImageBuffer::from_fn(64, 64, |x, y| {
        let cell = (y / 8) * 8 + x / 8;
        let on = (bits >> (63 - cell)) & 1 == 1;
        Luma([if on { 255u8 } else { 0 }])
    })
}

pub fn write_frames(dir: &Path, patterns: &[u64]) {
    std::fs::create_dir_all(dir).unwrap();
    for (index, bits) in patterns.iter().enumerate() {
        block_frame(*bits)
            .save(dir.join(format!("{index:04}.png")))
            .unwrap();
    }
}

/// Writes one synthetic frame per pattern instead of decoding the source.
#[derive(Debug, Clone, Default)]
pub struct FakeExtractor {
    pub patterns: Vec<u64>,
    pub fail: bool,
    pub calls: Rc<RefCell<Vec<PathBuf>>>,
}

impl FakeExtractor {
    pub fn new(patterns: Vec<u64>) -> Self {
        Self {
            patterns,
            ..Self::default()
        }
    }
}

#[async_trait(?Send)]
impl FrameExtractor for FakeExtractor {
    async fn extract(&self, source: &Path, frames_dir: &Path) -> MediaResult<usize> {
        self.calls.borrow_mut().push(source.to_path_buf());
        assert!(source.exists(), "source video must be downloaded first");
        if self.fail {
            return Err(MediaError::Extraction("scripted decode failure".into()));
        }
        write_frames(frames_dir, &self.patterns);
        Ok(self.patterns.len())
    }
}
