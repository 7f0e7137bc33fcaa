use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::backend::{Account, BackendApi, ListingStats};
use crate::browser::{
    click, click_if_present, wait_until, AutomationSurface, InfiniteScrollProbe, Locator, Probe,
};
use crate::config::{ListerConfig, PollWindow};
use crate::marketplace;

use super::{AccountTaskError, AccountTaskResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSummary {
    pub cards: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Scrapes per-listing counters from the selling page and pushes them to the backend.
#[derive(Debug, Clone)]
pub struct StatsRefresher {
    selling_url: String,
    feed: PollWindow,
    card_open_settle: Duration,
}

impl StatsRefresher {
    pub fn new(selling_url: impl Into<String>, feed: PollWindow, card_open_settle: Duration) -> Self {
        Self {
            selling_url: selling_url.into(),
            feed,
            card_open_settle,
        }
    }

    pub fn from_config(config: &ListerConfig) -> Self {
        Self::new(
            config.marketplace.selling_url.clone(),
            config.poll.feed,
            Duration::from_millis(config.workflow.card_open_settle_ms),
        )
    }

    pub async fn refresh(
        &self,
        surface: &mut dyn AutomationSurface,
        backend: &dyn BackendApi,
        account: &Account,
    ) -> AccountTaskResult<StatsSummary> {
        surface.navigate(&self.selling_url).await?;
        let mut feed = InfiniteScrollProbe::new(marketplace::selling_cards(), marketplace::feed_loading());
        let outcome = wait_until(&mut feed, surface, self.feed, account.total_listings).await;
        info!(
            account = %account.id,
            cards = outcome.items.len(),
            iterations = outcome.iterations,
            stop = ?outcome.stop,
            "selling feed loaded"
        );

        let mut summary = StatsSummary {
            cards: outcome.items.len(),
            ..StatsSummary::default()
        };
        for card in &outcome.items {
            match self.read_card(surface, card).await {
                Ok(stats) => match backend.update_account(&account.id, &stats).await {
                    Ok(()) => {
                        info!(account = %account.id, title = %stats.title, "listing stats updated");
                        summary.updated += 1;
                    }
                    Err(err) => {
                        warn!(account = %account.id, error = %err, "failed to push listing stats");
                        summary.failed += 1;
                    }
                },
                Err(err) => {
                    warn!(account = %account.id, card = %card, error = %err, "failed to read listing card");
                    summary.failed += 1;
                }
            }
            if let Probe::Error(err) = click_if_present(surface, &marketplace::dialog_close()).await {
                warn!(account = %account.id, error = %err, "failed to close listing dialog");
            }
        }
        Ok(summary)
    }

    async fn read_card(
        &self,
        surface: &mut dyn AutomationSurface,
        card: &Locator,
    ) -> Result<ListingStats, AccountTaskError> {
        let clicks_locator = card.within(marketplace::CARD_CLICKS);
        let clicks = surface.read_text(&clicks_locator).await.into_result(&clicks_locator)?;
        click(surface, card).await?;
        sleep(self.card_open_settle).await;
        let title_locator = marketplace::listing_dialog_title();
        let title = surface.read_text(&title_locator).await.into_result(&title_locator)?;
        let location_locator = marketplace::listing_dialog_location();
        let location = surface
            .read_text(&location_locator)
            .await
            .into_result(&location_locator)?;
        Ok(ListingStats {
            title: title.trim().to_string(),
            clicks: clicks.trim().to_string(),
            location: location.trim().to_string(),
        })
    }
}
