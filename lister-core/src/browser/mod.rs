mod automation;
mod error;
mod human;
mod poll;
mod profile;
mod surface;

pub use automation::{BrowserLauncher, ChromiumSurface, LaunchOverrides};
pub use error::{AutomationError, AutomationResult};
pub use human::{random_duration, HumanPacing};
pub use poll::{wait_until, CountProbe, InfiniteScrollProbe, PollOutcome, PollProbe, PollStop};
pub use profile::{AccountProfile, ProfileManager};
pub use surface::{
    click, click_if_present, xpath_literal, AutomationSurface, ClickStrategy, Locator,
    LocatorStrategy, Probe, SurfaceLauncher, TypeOptions, CLICK_FALLBACK,
};
