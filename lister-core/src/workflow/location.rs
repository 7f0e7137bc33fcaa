use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::{BackendApi, RecordId};
use crate::browser::{wait_until, AutomationSurface, CountProbe};
use crate::marketplace;

use super::{ListingDraft, ListingStep, ListingWorkflow, WorkflowError};

impl ListingWorkflow {
    /// Looks the posting's location up, types it and picks the first suggestion.
    /// The whole cycle is retried until it succeeds, the attempts run out, or
    /// the deadline passes.
    pub(super) async fn resolve_location(
        &self,
        surface: &mut dyn AutomationSurface,
        backend: &dyn BackendApi,
        draft: &ListingDraft,
    ) -> Result<RecordId, WorkflowError> {
        let settings = &self.settings;
        let started = Instant::now();
        let mut attempt = 0usize;
        let mut last_cause = String::from("no attempt was made");
        while attempt < settings.location_max_attempts
            && started.elapsed() < settings.location_deadline
        {
            attempt += 1;
            match self.try_location(surface, backend, draft).await {
                Ok(location_id) => {
                    info!(
                        listing = %draft.listing_id,
                        location = %location_id,
                        attempt,
                        "location selected"
                    );
                    return Ok(location_id);
                }
                Err(cause) => {
                    warn!(
                        listing = %draft.listing_id,
                        attempt,
                        waited_ms = started.elapsed().as_millis() as u64,
                        error = %cause,
                        "location attempt failed"
                    );
                    last_cause = cause;
                }
            }
        }
        Err(WorkflowError::step(
            ListingStep::ResolveLocation,
            format!("gave up after {attempt} attempts: {last_cause}"),
        ))
    }

    async fn try_location(
        &self,
        surface: &mut dyn AutomationSurface,
        backend: &dyn BackendApi,
        draft: &ListingDraft,
    ) -> Result<RecordId, String> {
        let location = backend
            .location(&draft.posting_id)
            .await
            .map_err(|err| format!("lookup: {err}"))?;
        let display_text = location.display(&self.settings.location_country);
        debug!(listing = %draft.listing_id, location = %display_text, "typing location");
        surface
            .type_text(
                &marketplace::location_input(),
                &display_text,
                self.pacing.type_options().clearing(),
            )
            .await
            .map_err(|err| format!("typing: {err}"))?;

        let mut suggestions = CountProbe::new(marketplace::location_suggestions());
        let outcome = wait_until(&mut suggestions, surface, self.settings.suggestions, Some(1)).await;
        if outcome.is_empty() {
            return Err(format!(
                "no suggestion for {display_text:?} after {} polls",
                outcome.iterations
            ));
        }
        self.press(surface, &marketplace::first_location_suggestion())
            .await
            .map_err(|err| format!("selecting suggestion: {err}"))?;
        Ok(location.id)
    }
}
