use std::time::Duration;

use rand::{thread_rng, Rng};
use tokio::time::sleep;

use crate::config::PacingSection;

use super::surface::TypeOptions;

/// Randomized human-like waits between page interactions.
#[derive(Debug, Clone)]
pub struct HumanPacing {
    config: PacingSection,
}

impl HumanPacing {
    pub fn new(config: PacingSection) -> Self {
        Self { config }
    }

    pub fn immediate() -> Self {
        Self::new(PacingSection::immediate())
    }

    pub fn config(&self) -> &PacingSection {
        &self.config
    }

    /// Pause after filling a field so dependent widgets can react.
    pub async fn settle(&self) {
        sleep(self.field_settle()).await;
    }

    pub async fn hesitate(&self) {
        sleep(random_duration(self.config.click_hesitation_ms)).await;
    }

    pub async fn between_jobs(&self) {
        sleep(random_duration(self.config.between_jobs_ms)).await;
    }

    /// Options for typing into a form field.
    pub fn type_options(&self) -> TypeOptions {
        TypeOptions {
            clear_first: false,
            paced: self.config.human_typing,
        }
    }

    pub fn typing_delay(&self) -> Duration {
        random_duration(self.config.typing_delay_ms)
    }

    pub fn field_settle(&self) -> Duration {
        random_duration(self.config.field_settle_ms)
    }
}

impl Default for HumanPacing {
    fn default() -> Self {
        Self::new(PacingSection::default())
    }
}

/// Uniform duration within `[lower, upper]` milliseconds.
pub fn random_duration(bounds: [u64; 2]) -> Duration {
    let (lower, upper) = (bounds[0].min(bounds[1]), bounds[0].max(bounds[1]));
    if upper == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(thread_rng().gen_range(lower..=upper))
}
