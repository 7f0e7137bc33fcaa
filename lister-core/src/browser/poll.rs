use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::PollWindow;

use super::error::AutomationResult;
use super::human::random_duration;
use super::surface::{AutomationSurface, Locator, Probe};

/// Something observed repeatedly until the page stops changing.
#[async_trait(?Send)]
pub trait PollProbe {
    type Item;

    /// Nudges the page to produce more content (scroll, etc).
    async fn request_more(&mut self, _surface: &mut dyn AutomationSurface) -> AutomationResult<()> {
        Ok(())
    }

    async fn sample(&mut self, surface: &mut dyn AutomationSurface)
        -> AutomationResult<Vec<Self::Item>>;

    async fn is_done(&mut self, _surface: &mut dyn AutomationSurface) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStop {
    Done,
    BoundReached,
    Exhausted,
}

#[derive(Debug)]
pub struct PollOutcome<T> {
    pub items: Vec<T>,
    pub iterations: usize,
    pub stop: PollStop,
}

impl<T> PollOutcome<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Samples `probe` until it reports done, the sample reaches `bound` items,
/// or `window.max_iterations` runs out. Never fails.
pub async fn wait_until<P>(
    probe: &mut P,
    surface: &mut dyn AutomationSurface,
    window: PollWindow,
    bound: Option<usize>,
) -> PollOutcome<P::Item>
where
    P: PollProbe + ?Sized,
{
    let mut items = Vec::new();
    let mut iterations = 0;
    while iterations < window.max_iterations {
        iterations += 1;
        if let Err(err) = probe.request_more(surface).await {
            warn!(iteration = iterations, error = %err, "poll request failed");
        }
        sleep(random_duration(window.delay_ms)).await;
        match probe.sample(surface).await {
            Ok(sample) => items = sample,
            Err(err) => {
                warn!(iteration = iterations, error = %err, "poll sample failed; keeping previous");
            }
        }
        if probe.is_done(surface).await {
            debug!(iterations, items = items.len(), "poll condition satisfied");
            return PollOutcome {
                items,
                iterations,
                stop: PollStop::Done,
            };
        }
        if bound.is_some_and(|bound| items.len() >= bound) {
            debug!(iterations, items = items.len(), "poll bound reached");
            return PollOutcome {
                items,
                iterations,
                stop: PollStop::BoundReached,
            };
        }
    }
    debug!(iterations, items = items.len(), "poll window exhausted");
    PollOutcome {
        items,
        iterations,
        stop: PollStop::Exhausted,
    }
}

/// Counts the elements matching a locator; used for autocomplete suggestion lists.
#[derive(Debug, Clone)]
pub struct CountProbe {
    locator: Locator,
}

impl CountProbe {
    pub fn new(locator: Locator) -> Self {
        Self { locator }
    }
}

#[async_trait(?Send)]
impl PollProbe for CountProbe {
    type Item = usize;

    async fn sample(&mut self, surface: &mut dyn AutomationSurface) -> AutomationResult<Vec<usize>> {
        let count = surface.count(&self.locator).await?;
        Ok((1..=count).collect())
    }
}

/// Scrolls an infinite feed until its loading marker disappears.
#[derive(Debug, Clone)]
pub struct InfiniteScrollProbe {
    items: Locator,
    loading: Locator,
}

impl InfiniteScrollProbe {
    pub const SCROLL_TO_BOTTOM: &'static str =
        "window.scrollTo(0, document.body.scrollHeight);";

    pub fn new(items: Locator, loading: Locator) -> Self {
        Self { items, loading }
    }
}

#[async_trait(?Send)]
impl PollProbe for InfiniteScrollProbe {
    type Item = Locator;

    async fn request_more(&mut self, surface: &mut dyn AutomationSurface) -> AutomationResult<()> {
        surface.execute_script(Self::SCROLL_TO_BOTTOM).await
    }

    async fn sample(&mut self, surface: &mut dyn AutomationSurface)
        -> AutomationResult<Vec<Locator>> {
        let count = surface.count(&self.items).await?;
        Ok((1..=count).map(|index| self.items.nth(index)).collect())
    }

    async fn is_done(&mut self, surface: &mut dyn AutomationSurface) -> bool {
        match surface.probe(&self.loading).await {
            Probe::NotFound => true,
            Probe::Found(()) => false,
            Probe::Error(err) => {
                warn!(error = %err, "loading marker probe failed");
                false
            }
        }
    }
}
