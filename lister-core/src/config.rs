use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ListerConfig {
    pub backend: BackendSection,
    pub paths: PathsSection,
    pub chromium: ChromiumSection,
    pub pacing: PacingSection,
    pub marketplace: MarketplaceSection,
    pub auth: AuthSection,
    pub workflow: WorkflowSection,
    pub poll: PollSection,
    pub retry: RetrySection,
    pub media: MediaSection,
    pub scheduler: SchedulerSection,
}

impl ListerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backend.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("backend.base_url is empty".into()));
        }
        url::Url::parse(&self.backend.base_url).map_err(|err| {
            ConfigError::Invalid(format!(
                "backend.base_url {:?} is not a url: {err}",
                self.backend.base_url
            ))
        })?;
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be >= 1".into()));
        }
        if self.workflow.location_max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "workflow.location_max_attempts must be >= 1".into(),
            ));
        }
        for (name, range) in [
            ("pacing.typing_delay_ms", self.pacing.typing_delay_ms),
            ("pacing.click_hesitation_ms", self.pacing.click_hesitation_ms),
            ("pacing.field_settle_ms", self.pacing.field_settle_ms),
            ("pacing.between_jobs_ms", self.pacing.between_jobs_ms),
            ("poll.suggestions.delay_ms", self.poll.suggestions.delay_ms),
            ("poll.feed.delay_ms", self.poll.feed.delay_ms),
        ] {
            if range[0] > range[1] {
                return Err(ConfigError::Invalid(format!(
                    "{name} lower bound {} exceeds upper bound {}",
                    range[0], range[1]
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendSection {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api".into(),
            timeout_seconds: 30,
            connect_timeout_seconds: 10,
            user_agent: "lister/0.1".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsSection {
    pub profiles_dir: PathBuf,
    pub videos_dir: PathBuf,
    pub photos_dir: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            profiles_dir: PathBuf::from("data/chrome"),
            videos_dir: PathBuf::from("download/videos"),
            photos_dir: PathBuf::from("download/photos"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChromiumSection {
    pub executable_path: Option<String>,
    pub headless: bool,
    pub sandbox: bool,
    pub disable_gpu: bool,
    pub lang: Option<String>,
    pub request_timeout_seconds: Option<u64>,
    pub extra_args: Vec<String>,
}

impl Default for ChromiumSection {
    fn default() -> Self {
        Self {
            executable_path: None,
            headless: false,
            sandbox: true,
            disable_gpu: true,
            lang: None,
            request_timeout_seconds: Some(60),
            extra_args: Vec::new(),
        }
    }
}

/// Randomized waits used to keep the interaction cadence human-like.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PacingSection {
    /// Types form fields one character at a time using `typing_delay_ms`.
    pub human_typing: bool,
    pub typing_delay_ms: [u64; 2],
    pub click_hesitation_ms: [u64; 2],
    pub field_settle_ms: [u64; 2],
    pub between_jobs_ms: [u64; 2],
}

impl Default for PacingSection {
    fn default() -> Self {
        Self {
            human_typing: true,
            typing_delay_ms: [100, 200],
            click_hesitation_ms: [500, 1000],
            field_settle_ms: [800, 1800],
            between_jobs_ms: [3000, 5000],
        }
    }
}

impl PacingSection {
    /// Zero pacing, handy for tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            human_typing: false,
            typing_delay_ms: [0, 0],
            click_hesitation_ms: [0, 0],
            field_settle_ms: [0, 0],
            between_jobs_ms: [0, 0],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MarketplaceSection {
    pub profile_url: String,
    pub login_url: String,
    pub create_listing_url: String,
    pub selling_url: String,
    /// `{user_id}` is replaced with the account's marketplace user id.
    pub activity_log_url: String,
    pub location_country: String,
}

impl Default for MarketplaceSection {
    fn default() -> Self {
        Self {
            profile_url: "https://mbasic.facebook.com/profile.php".into(),
            login_url: "https://mbasic.facebook.com/".into(),
            create_listing_url: "https://www.facebook.com/marketplace/create/item".into(),
            selling_url: "https://www.facebook.com/marketplace/you/selling".into(),
            activity_log_url:
                "https://www.facebook.com/{user_id}/allactivity?category_key=MARKETPLACELISTINGS"
                    .into(),
            location_country: "Algeria".into(),
        }
    }
}

impl MarketplaceSection {
    pub fn activity_log_for(&self, user_id: &str) -> String {
        self.activity_log_url.replace("{user_id}", user_id)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthSection {
    pub settle_seconds: u64,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self { settle_seconds: 5 }
    }
}

impl AuthSection {
    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_seconds)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowSection {
    pub location_max_attempts: usize,
    pub location_deadline_seconds: u64,
    pub max_removals: usize,
    pub card_open_settle_ms: u64,
    pub removal_step_pause_ms: u64,
}

impl Default for WorkflowSection {
    fn default() -> Self {
        Self {
            location_max_attempts: 10,
            location_deadline_seconds: 120,
            max_removals: 200,
            card_open_settle_ms: 2000,
            removal_step_pause_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct PollWindow {
    pub max_iterations: usize,
    pub delay_ms: [u64; 2],
}

impl Default for PollWindow {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            delay_ms: [1500, 2000],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollSection {
    pub suggestions: PollWindow,
    pub feed: PollWindow,
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            suggestions: PollWindow::default(),
            feed: PollWindow {
                max_iterations: 60,
                delay_ms: [1000, 2000],
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MediaSection {
    pub ffmpeg_path: String,
    pub extract_timeout_seconds: u64,
    pub similarity_threshold: u32,
    pub frame_extension: String,
}

impl Default for MediaSection {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".into(),
            extract_timeout_seconds: 600,
            similarity_threshold: 5,
            frame_extension: "jpg".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub interval_seconds: u64,
    pub process_media: bool,
    pub create_listings: bool,
    pub remove_listings: bool,
    pub refresh_accounts: bool,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            process_media: true,
            create_listings: true,
            remove_listings: true,
            refresh_accounts: true,
        }
    }
}

impl SchedulerSection {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

pub fn load_lister_config<P: AsRef<Path>>(path: P) -> Result<ListerConfig> {
    let config: ListerConfig = load_toml(path)?;
    config.validate()?;
    Ok(config)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
