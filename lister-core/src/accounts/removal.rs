use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::backend::{Account, BackendApi};
use crate::browser::{click, AutomationError, AutomationSurface, Probe};
use crate::config::{ListerConfig, MarketplaceSection};
use crate::marketplace;
use crate::report::StatusReporter;

use super::{AccountTaskError, AccountTaskResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalStop {
    /// No activity item left on the page.
    Exhausted,
    /// Hit the per-account removal cap.
    Capped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalSummary {
    pub removed: usize,
    pub stop: RemovalStop,
    pub reported: bool,
}

/// Deletes an account's listings from its activity log, one item at a time.
#[derive(Debug, Clone)]
pub struct ListingRemover {
    marketplace: MarketplaceSection,
    max_removals: usize,
    step_pause: Duration,
}

impl ListingRemover {
    pub fn new(marketplace: MarketplaceSection, max_removals: usize, step_pause: Duration) -> Self {
        Self {
            marketplace,
            max_removals,
            step_pause,
        }
    }

    pub fn from_config(config: &ListerConfig) -> Self {
        Self::new(
            config.marketplace.clone(),
            config.workflow.max_removals,
            Duration::from_millis(config.workflow.removal_step_pause_ms),
        )
    }

    /// Removes listings and then reports the account dropped, even when the
    /// removal stopped part-way.
    pub async fn clear(
        &self,
        surface: &mut dyn AutomationSurface,
        backend: &dyn BackendApi,
        reporter: &StatusReporter,
        account: &Account,
    ) -> AccountTaskResult<RemovalSummary> {
        let user_id = account
            .facebook_user_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AccountTaskError::MissingUserId(account.id.clone()))?;

        let (removed, stop) = match self.remove_all(surface, user_id).await {
            Ok(result) => result,
            Err((removed, err)) => {
                warn!(account = %account.id, removed, error = %err, "listing removal stopped");
                (removed, RemovalStop::Failed)
            }
        };
        info!(account = %account.id, removed, stop = ?stop, "listing removal finished");

        let reported = reporter
            .report_with_retry("account dropped", |_| {
                backend.mark_account_dropped(&account.id)
            })
            .await;
        Ok(RemovalSummary {
            removed,
            stop,
            reported,
        })
    }

    async fn remove_all(
        &self,
        surface: &mut dyn AutomationSurface,
        user_id: &str,
    ) -> Result<(usize, RemovalStop), (usize, AutomationError)> {
        let url = self.marketplace.activity_log_for(user_id);
        surface.navigate(&url).await.map_err(|err| (0, err))?;
        sleep(self.step_pause).await;

        let mut removed = 0usize;
        while removed < self.max_removals {
            match surface.probe(&marketplace::activity_item()).await {
                Probe::Found(()) => {}
                Probe::NotFound => return Ok((removed, RemovalStop::Exhausted)),
                Probe::Error(err) => return Err((removed, err)),
            }
            sleep(self.step_pause).await;
            match self.delete_first(surface).await {
                Ok(()) => removed += 1,
                Err(err) if err.is_not_found() => return Ok((removed, RemovalStop::Exhausted)),
                Err(err) => return Err((removed, err)),
            }
        }
        Ok((removed, RemovalStop::Capped))
    }

    async fn delete_first(&self, surface: &mut dyn AutomationSurface) -> Result<(), AutomationError> {
        click(surface, &marketplace::activity_actions()).await?;
        click(surface, &marketplace::delete_entry()).await?;
        click(surface, &marketplace::delete_confirm()).await?;
        Ok(())
    }
}
