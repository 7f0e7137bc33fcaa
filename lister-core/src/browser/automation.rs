use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::network::ClearBrowserCookiesParams;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ChromiumSection;

use super::error::{AutomationError, AutomationResult};
use super::human::HumanPacing;
use super::profile::{AccountProfile, ProfileManager};
use super::surface::{
    AutomationSurface, ClickStrategy, Locator, LocatorStrategy, Probe, SurfaceLauncher,
    TypeOptions,
};

const SCROLL_AND_CLICK: &str = "function() { this.scrollIntoView(true); this.click(); }";
const SELECT_CONTENTS: &str =
    "function() { if (typeof this.select === 'function') { this.select(); } }";

#[derive(Debug, Clone, Copy, Default)]
pub struct LaunchOverrides {
    pub headless: Option<bool>,
}

/// Launches Chromium against the persistent profile of an account.
#[derive(Debug, Clone)]
pub struct BrowserLauncher {
    config: Arc<ChromiumSection>,
    profiles: ProfileManager,
    pacing: HumanPacing,
    overrides: LaunchOverrides,
}

impl BrowserLauncher {
    pub fn new(config: ChromiumSection, profiles: ProfileManager, pacing: HumanPacing) -> Self {
        Self {
            config: Arc::new(config),
            profiles,
            pacing,
            overrides: LaunchOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: LaunchOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn profile_manager(&self) -> &ProfileManager {
        &self.profiles
    }

    pub async fn launch(&self, account_id: &str) -> AutomationResult<ChromiumSurface> {
        let profile = self.profiles.profile_for(account_id)?;
        let headless = self.overrides.headless.unwrap_or(self.config.headless);
        let chromium_config = self.build_chromium_config(&profile, headless)?;
        info!(
            account = %account_id,
            profile = %profile.path().display(),
            headless,
            "launching chromium session"
        );

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|err| AutomationError::Launch(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "chromium handler reported error");
                }
            }
        });

        let page = browser
            .new_page(CreateTargetParams::new("about:blank"))
            .await?;
        page.enable_stealth_mode().await?;
        profile.touch().await?;

        Ok(ChromiumSurface {
            browser: Some(browser),
            handler_task: Some(handler_task),
            page,
            profile,
            pacing: self.pacing.clone(),
        })
    }

    fn build_chromium_config(
        &self,
        profile: &AccountProfile,
        headless: bool,
    ) -> AutomationResult<ChromiumConfig> {
        let mut builder = ChromiumConfig::builder().user_data_dir(profile.path());
        if let Some(executable) = &self.config.executable_path {
            builder = builder.chrome_executable(executable);
        }
        if !headless {
            builder = builder.with_head();
        }
        if !self.config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(timeout) = self.config.request_timeout_seconds {
            builder = builder.request_timeout(Duration::from_secs(timeout));
        }

        let mut args = vec![
            "--start-maximized".to_string(),
            "--disable-notifications".to_string(),
            "--disable-features=AutomationControlled".to_string(),
            "--no-first-run".to_string(),
            "--password-store=basic".to_string(),
        ];
        if self.config.disable_gpu {
            args.push("--disable-gpu".into());
        }
        if let Some(lang) = &self.config.lang {
            args.push(format!("--lang={lang}"));
        }
        args.extend(self.config.extra_args.iter().cloned());
        builder = builder.args(args);

        builder.build().map_err(AutomationError::Configuration)
    }
}

#[async_trait(?Send)]
impl SurfaceLauncher for BrowserLauncher {
    async fn open(&self, account_id: &str) -> AutomationResult<Box<dyn AutomationSurface>> {
        let surface = self.launch(account_id).await?;
        Ok(Box::new(surface))
    }
}

/// A single Chromium window driven over CDP.
#[derive(Debug)]
pub struct ChromiumSurface {
    browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
    page: Page,
    profile: AccountProfile,
    pacing: HumanPacing,
}

impl ChromiumSurface {
    pub fn profile(&self) -> &AccountProfile {
        &self.profile
    }

    fn ensure_open(&self) -> AutomationResult<()> {
        if self.browser.is_none() {
            return Err(AutomationError::Closed);
        }
        Ok(())
    }

    async fn find(&self, locator: &Locator) -> AutomationResult<Element> {
        self.ensure_open()?;
        let result = match locator.strategy {
            LocatorStrategy::XPath => self.page.find_xpath(locator.value.as_str()).await,
            LocatorStrategy::Name | LocatorStrategy::Css => {
                self.page.find_element(locator.as_css()).await
            }
        };
        result.map_err(|err| classify(locator, err))
    }

    async fn find_all(&self, locator: &Locator) -> AutomationResult<Vec<Element>> {
        self.ensure_open()?;
        let result = match locator.strategy {
            LocatorStrategy::XPath => self.page.find_xpaths(locator.value.as_str()).await,
            LocatorStrategy::Name | LocatorStrategy::Css => {
                self.page.find_elements(locator.as_css()).await
            }
        };
        match result.map_err(|err| classify(locator, err)) {
            Ok(elements) => Ok(elements),
            Err(AutomationError::NotFound(_)) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }
}

/// Separates "nothing matched" from real protocol failures.
fn classify(locator: &Locator, err: CdpError) -> AutomationError {
    if matches!(err, CdpError::NotFound) {
        return AutomationError::NotFound(locator.to_string());
    }
    let message = err.to_string();
    if message.contains("Could not find node") || message.contains("No node with given id") {
        AutomationError::NotFound(locator.to_string())
    } else {
        AutomationError::Cdp(err)
    }
}

fn interaction(locator: &Locator, err: CdpError) -> AutomationError {
    AutomationError::Interaction {
        locator: locator.to_string(),
        reason: err.to_string(),
    }
}

#[async_trait(?Send)]
impl AutomationSurface for ChromiumSurface {
    async fn navigate(&mut self, url: &str) -> AutomationResult<()> {
        self.ensure_open()?;
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(AutomationError::Configuration)?;
        self.page.goto(params).await?;
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    async fn current_url(&mut self) -> AutomationResult<String> {
        self.ensure_open()?;
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn probe(&mut self, locator: &Locator) -> Probe<()> {
        Probe::from_result(self.find(locator).await.map(|_| ()))
    }

    async fn count(&mut self, locator: &Locator) -> AutomationResult<usize> {
        Ok(self.find_all(locator).await?.len())
    }

    async fn type_text(
        &mut self,
        locator: &Locator,
        value: &str,
        options: TypeOptions,
    ) -> AutomationResult<()> {
        let element = self.find(locator).await?;
        element.click().await.map_err(|err| interaction(locator, err))?;
        if options.clear_first {
            element
                .call_js_fn(SELECT_CONTENTS, false)
                .await
                .map_err(|err| interaction(locator, err))?;
            element
                .press_key("Backspace")
                .await
                .map_err(|err| interaction(locator, err))?;
        }
        if options.paced {
            for ch in value.chars() {
                element
                    .type_str(ch.to_string())
                    .await
                    .map_err(|err| interaction(locator, err))?;
                sleep(self.pacing.typing_delay()).await;
            }
        } else {
            element
                .type_str(value)
                .await
                .map_err(|err| interaction(locator, err))?;
        }
        Ok(())
    }

    async fn click_with(
        &mut self,
        locator: &Locator,
        strategy: ClickStrategy,
    ) -> AutomationResult<()> {
        let element = self.find(locator).await?;
        match strategy {
            ClickStrategy::Direct => {
                element.click().await.map_err(|err| {
                    debug!(locator = %locator, error = %err, "direct click rejected");
                    AutomationError::Obstructed(locator.to_string())
                })?;
            }
            ClickStrategy::ScrollAndScript => {
                element
                    .call_js_fn(SCROLL_AND_CLICK, false)
                    .await
                    .map_err(|err| interaction(locator, err))?;
            }
        }
        Ok(())
    }

    async fn read_text(&mut self, locator: &Locator) -> Probe<String> {
        let element = match self.find(locator).await {
            Ok(element) => element,
            Err(err) => return Probe::from_result(Err(err)),
        };
        match element.inner_text().await {
            Ok(text) => Probe::Found(text.unwrap_or_default()),
            Err(err) => Probe::Error(interaction(locator, err)),
        }
    }

    async fn read_attribute(&mut self, locator: &Locator, name: &str) -> Probe<String> {
        let element = match self.find(locator).await {
            Ok(element) => element,
            Err(err) => return Probe::from_result(Err(err)),
        };
        // Properties such as innerHTML are not DOM attributes; read the property first.
        let function = format!(
            "function() {{ const v = this[{name:?}]; return (v === undefined || v === null) ? this.getAttribute({name:?}) : String(v); }}"
        );
        match element.call_js_fn(function, false).await {
            Ok(returns) => match returns.result.value {
                Some(serde_json::Value::String(value)) => Probe::Found(value),
                Some(serde_json::Value::Null) | None => Probe::NotFound,
                Some(other) => Probe::Found(other.to_string()),
            },
            Err(err) => Probe::Error(interaction(locator, err)),
        }
    }

    async fn execute_script(&mut self, script: &str) -> AutomationResult<()> {
        self.ensure_open()?;
        self.page.evaluate(script).await?;
        Ok(())
    }

    async fn attach_files(&mut self, locator: &Locator, files: &[PathBuf]) -> AutomationResult<()> {
        let element = self.find(locator).await?;
        let files = files
            .iter()
            .map(|path| path.to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        let params = SetFileInputFilesParams::builder()
            .files(files)
            .backend_node_id(element.backend_node_id)
            .build()
            .map_err(AutomationError::Configuration)?;
        self.page.execute(params).await?;
        Ok(())
    }

    async fn delete_all_cookies(&mut self) -> AutomationResult<()> {
        self.ensure_open()?;
        self.page.execute(ClearBrowserCookiesParams::default()).await?;
        Ok(())
    }

    async fn close(&mut self) -> AutomationResult<()> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };
        info!(account = %self.profile.account_id(), "closing chromium session");
        if let Err(err) = browser.close().await {
            warn!(error = %err, "failed to close browser gracefully");
        }
        if let Some(handle) = self.handler_task.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "browser handler join error");
            }
        }
        Ok(())
    }
}

impl Drop for ChromiumSurface {
    fn drop(&mut self) {
        if self.browser.is_some() {
            warn!(
                account = %self.profile.account_id(),
                "chromium session dropped without explicit close"
            );
        }
    }
}
