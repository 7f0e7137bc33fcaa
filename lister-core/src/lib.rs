pub mod accounts;
pub mod backend;
pub mod browser;
pub mod config;
pub mod driver;
pub mod error;
pub mod marketplace;
pub mod media;
pub mod report;
pub mod session;
pub mod workflow;

pub use accounts::{
    AccountTaskError, ListingRemover, RemovalStop, RemovalSummary, StatsRefresher, StatsSummary,
};
pub use backend::{
    Account, BackendApi, BackendError, BackendResult, HttpBackend, Listing, ListingStats,
    Location, MediaJob, RecordId,
};
pub use browser::{
    AutomationError, AutomationResult, AutomationSurface, BrowserLauncher, ClickStrategy,
    LaunchOverrides, Locator, Probe, SurfaceLauncher, TypeOptions,
};
pub use config::{load_lister_config, ListerConfig};
pub use driver::{Driver, DriverError, DriverResult, IterationReport};
pub use error::{ConfigError, Result};
pub use media::{
    dedup_directory, DedupReport, FfmpegExtractor, FrameExtractor, FramePipeline, MediaError,
    MediaOutcome, PerceptualHash,
};
pub use report::StatusReporter;
pub use session::{AuthOutcome, AuthState, Authenticator, SessionError, SessionManager};
pub use workflow::{
    ListingDraft, ListingStep, ListingWorkflow, WorkflowError, WorkflowOutcome, WorkflowSettings,
};
