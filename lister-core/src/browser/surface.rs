use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::error::{AutomationError, AutomationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocatorStrategy {
    XPath,
    Name,
    Css,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    pub strategy: LocatorStrategy,
    pub value: String,
}

impl Locator {
    pub fn xpath(value: impl Into<String>) -> Self {
        Self {
            strategy: LocatorStrategy::XPath,
            value: value.into(),
        }
    }

    pub fn name(value: impl Into<String>) -> Self {
        Self {
            strategy: LocatorStrategy::Name,
            value: value.into(),
        }
    }

    pub fn css(value: impl Into<String>) -> Self {
        Self {
            strategy: LocatorStrategy::Css,
            value: value.into(),
        }
    }

    /// The 1-based `index`-th match in document order.
    ///
    /// CSS has no selector for that, so a CSS locator gets `:nth-of-type`,
    /// which counts same-tag siblings instead of matches.
    pub fn nth(&self, index: usize) -> Self {
        match self.strategy {
            LocatorStrategy::XPath | LocatorStrategy::Name => {
                Self::xpath(format!("({})[{index}]", self.as_xpath()))
            }
            LocatorStrategy::Css => Self::css(format!("{}:nth-of-type({index})", self.value)),
        }
    }

    /// Scopes a relative XPath (starting with `//` or `/`) under this locator.
    pub fn within(&self, relative: &str) -> Self {
        let relative = relative.trim_start_matches('.');
        Self::xpath(format!("{}{}", self.as_xpath(), relative))
    }

    pub fn as_css(&self) -> String {
        match self.strategy {
            LocatorStrategy::Css => self.value.clone(),
            LocatorStrategy::Name => format!("[name=\"{}\"]", self.value),
            LocatorStrategy::XPath => self.value.clone(),
        }
    }

    fn as_xpath(&self) -> String {
        match self.strategy {
            LocatorStrategy::XPath => self.value.clone(),
            LocatorStrategy::Name => format!("//*[@name={}]", xpath_literal(&self.value)),
            LocatorStrategy::Css => self.value.clone(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.strategy {
            LocatorStrategy::XPath => "xpath",
            LocatorStrategy::Name => "name",
            LocatorStrategy::Css => "css",
        };
        write!(f, "{tag}={}", self.value)
    }
}

/// Quotes arbitrary text as an XPath string literal.
pub fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        return format!("'{text}'");
    }
    if !text.contains('"') {
        return format!("\"{text}\"");
    }
    let parts = text
        .split('\'')
        .map(|part| format!("'{part}'"))
        .collect::<Vec<_>>()
        .join(", \"'\", ");
    format!("concat({parts})")
}

/// Outcome of looking for something that may legitimately be absent.
#[derive(Debug)]
pub enum Probe<T> {
    Found(T),
    NotFound,
    Error(AutomationError),
}

impl<T> Probe<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Probe::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            Probe::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Probe<U> {
        match self {
            Probe::Found(value) => Probe::Found(f(value)),
            Probe::NotFound => Probe::NotFound,
            Probe::Error(err) => Probe::Error(err),
        }
    }

    pub fn into_result(self, locator: &Locator) -> AutomationResult<T> {
        match self {
            Probe::Found(value) => Ok(value),
            Probe::NotFound => Err(AutomationError::NotFound(locator.to_string())),
            Probe::Error(err) => Err(err),
        }
    }

    pub fn from_result(result: AutomationResult<T>) -> Self {
        match result {
            Ok(value) => Probe::Found(value),
            Err(AutomationError::NotFound(_)) => Probe::NotFound,
            Err(err) => Probe::Error(err),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeOptions {
    pub clear_first: bool,
    pub paced: bool,
}

impl TypeOptions {
    pub fn clearing(mut self) -> Self {
        self.clear_first = true;
        self
    }

    pub fn paced(mut self) -> Self {
        self.paced = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClickStrategy {
    Direct,
    ScrollAndScript,
}

/// Strategies tried in order by [`click`].
pub const CLICK_FALLBACK: [ClickStrategy; 2] = [ClickStrategy::Direct, ClickStrategy::ScrollAndScript];

/// Page-level capabilities of a live, account-bound browser session.
#[async_trait(?Send)]
pub trait AutomationSurface {
    async fn navigate(&mut self, url: &str) -> AutomationResult<()>;
    async fn current_url(&mut self) -> AutomationResult<String>;
    async fn probe(&mut self, locator: &Locator) -> Probe<()>;
    async fn count(&mut self, locator: &Locator) -> AutomationResult<usize>;
    async fn type_text(
        &mut self,
        locator: &Locator,
        value: &str,
        options: TypeOptions,
    ) -> AutomationResult<()>;
    async fn click_with(&mut self, locator: &Locator, strategy: ClickStrategy)
        -> AutomationResult<()>;
    async fn read_text(&mut self, locator: &Locator) -> Probe<String>;
    async fn read_attribute(&mut self, locator: &Locator, name: &str) -> Probe<String>;
    async fn execute_script(&mut self, script: &str) -> AutomationResult<()>;
    async fn attach_files(&mut self, locator: &Locator, files: &[PathBuf]) -> AutomationResult<()>;
    async fn delete_all_cookies(&mut self) -> AutomationResult<()>;
    async fn close(&mut self) -> AutomationResult<()>;
}

/// Opens sessions whose state persists in a per-account profile.
#[async_trait(?Send)]
pub trait SurfaceLauncher {
    async fn open(&self, account_id: &str) -> AutomationResult<Box<dyn AutomationSurface>>;
}

/// Clicks `locator`, walking [`CLICK_FALLBACK`] until one strategy succeeds.
pub async fn click(
    surface: &mut dyn AutomationSurface,
    locator: &Locator,
) -> AutomationResult<ClickStrategy> {
    let mut last_error = None;
    for strategy in CLICK_FALLBACK {
        match surface.click_with(locator, strategy).await {
            Ok(()) => return Ok(strategy),
            Err(err @ AutomationError::NotFound(_)) => return Err(err),
            Err(err) => {
                debug!(locator = %locator, ?strategy, error = %err, "click strategy failed");
                last_error = Some(err);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| AutomationError::Interaction {
        locator: locator.to_string(),
        reason: "no click strategy available".into(),
    }))
}

/// Clicks `locator` if present; absence is not an error.
pub async fn click_if_present(
    surface: &mut dyn AutomationSurface,
    locator: &Locator,
) -> Probe<ClickStrategy> {
    Probe::from_result(click(surface, locator).await)
}
